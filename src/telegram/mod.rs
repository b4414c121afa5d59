//! Telegram transport.
//!
//! Long-polls the Bot API for incoming chat messages and sends notification
//! and reply texts.

mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::IncomingMessage;
