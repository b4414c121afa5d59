//! Power Watch Bot library.
//!
//! Watches the host's AC adapter and tells subscribed Telegram chats when the
//! power goes out or comes back.

pub mod commands;
pub mod config;
pub mod error;
pub mod instance_lock;
pub mod monitor;
pub mod notifier;
pub mod power;
pub mod subscribers;
pub mod telegram;
