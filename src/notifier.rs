//! Transition notifier.
//!
//! When the power state changes, every subscriber gets the same message. Sends
//! happen one after another, each bounded by a timeout, and a failure for one
//! chat never stops delivery to the rest. There is no retry: a chat that
//! misses a message simply gets the next one.

use crate::error::{BotError, Result};
use crate::power::TransitionEvent;
use crate::subscribers::ChatId;
use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

/// Outbound text messaging, implemented by the Telegram client.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

/// Result of delivering one notification to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: ChatId,
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    fn delivered(recipient: ChatId) -> Self {
        Self {
            recipient,
            success: true,
            error: None,
        }
    }

    fn failed(recipient: ChatId, error: String) -> Self {
        Self {
            recipient,
            success: false,
            error: Some(error),
        }
    }
}

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const POWER_RESTORED_TEXT: &str = "החשמל חזר";
const POWER_LOST_TEXT: &str = "הפסקת חשמל";

/// Build the notification text for a transition.
pub fn format_message(event: &TransitionEvent) -> String {
    let text = if event.is_restored() {
        POWER_RESTORED_TEXT
    } else {
        POWER_LOST_TEXT
    };
    format!("{} {}", event.timestamp.format(TIMESTAMP_FORMAT), text)
}

/// Fans transition messages out to subscribers.
pub struct Notifier {
    transport: Arc<dyn MessageTransport>,
    send_timeout: Duration,
}

impl Notifier {
    /// Create a notifier.
    ///
    /// # Arguments
    /// * `transport` - Where messages are sent
    /// * `send_timeout` - Upper bound for a single send
    pub fn new(transport: Arc<dyn MessageTransport>, send_timeout: Duration) -> Self {
        Self {
            transport,
            send_timeout,
        }
    }

    /// Send the message for `event` to every recipient.
    ///
    /// Never fails as a whole; per-chat failures are logged and reported in
    /// the returned outcomes, in recipient order.
    pub async fn notify(&self, event: &TransitionEvent, recipients: &[ChatId]) -> Vec<DeliveryOutcome> {
        let message = format_message(event);
        let mut outcomes = Vec::with_capacity(recipients.len());

        for &chat_id in recipients {
            let result =
                match tokio::time::timeout(self.send_timeout, self.transport.send_message(chat_id, &message))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BotError::SendTimeout(self.send_timeout)),
                };

            match result {
                Ok(()) => outcomes.push(DeliveryOutcome::delivered(chat_id)),
                Err(e) => {
                    error!("[Notifier] Failed to send message to user {}: {}", chat_id, e);
                    outcomes.push(DeliveryOutcome::failed(chat_id, e.to_string()));
                }
            }
        }

        let delivered = outcomes.iter().filter(|o| o.success).count();
        info!(
            "[Notifier] Delivered \"{}\" to {}/{} subscribers",
            message,
            delivered,
            outcomes.len()
        );
        outcomes
    }
}
