//! Telegram Bot API client.

use super::types::{
    ApiResponse, GetUpdatesRequest, IncomingMessage, SendMessageRequest, Update, User,
};
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use crate::notifier::MessageTransport;
use crate::subscribers::ChatId;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Delay before polling again after a failed getUpdates.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Thin client over the HTTP Bot API.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    long_poll_timeout: Duration,
    send_timeout: Duration,
}

impl TelegramClient {
    /// Create a new client from configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(BotError::MissingToken);
        }

        // Long polls hold the connection open for the poll timeout
        let http = reqwest::Client::builder()
            .timeout(config.long_poll_timeout + Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: method_base_url(&config.api_url, &config.token),
            long_poll_timeout: config.long_poll_timeout,
            send_timeout: config.send_timeout,
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Option<Duration>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Errors come back as JSON with a non-2xx status, so parse either way
        let response: ApiResponse<T> = request.send().await?.json().await?;
        into_result(response)
    }

    /// Validate the token. Rejection by Telegram is fatal at startup.
    pub async fn get_me(&self) -> Result<User> {
        let result = self.call::<_, User>("getMe", &serde_json::json!({}), None).await;
        check_token(result)
    }

    /// Fetch updates starting at `offset`, blocking up to the long-poll timeout.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            limit: None,
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &request, None).await
    }

    /// Discard updates queued while the bot was offline.
    ///
    /// Returns the offset to resume from.
    pub async fn skip_pending_updates(&self) -> Result<Option<i64>> {
        let request = GetUpdatesRequest {
            offset: Some(-1),
            timeout: 0,
            limit: Some(1),
            allowed_updates: vec!["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request, None).await?;
        let next = next_offset(None, &updates);
        if next.is_some() {
            info!("[Telegram] Dropped pending updates");
        }
        Ok(next)
    }

    /// Run the long-polling loop and forward messages to the provided channel.
    ///
    /// Runs until cancelled or the receiving side is dropped. Polling errors
    /// are logged and retried after a short delay.
    pub async fn run(&self, tx: mpsc::Sender<IncomingMessage>, cancel: CancellationToken) {
        info!("[Telegram] Starting update loop");

        let mut offset = match self.skip_pending_updates().await {
            Ok(offset) => offset,
            Err(e) => {
                warn!("[Telegram] Failed to drop pending updates: {}", e);
                None
            }
        };

        loop {
            let updates = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.get_updates(offset, self.long_poll_timeout) => result,
            };

            match updates {
                Ok(updates) => {
                    offset = next_offset(offset, &updates);
                    for update in updates {
                        let Some(message) = update.message else {
                            continue;
                        };
                        debug!("[Telegram] Message in chat {}", message.chat.id);
                        if tx.send(IncomingMessage::from(message)).await.is_err() {
                            error!("[Telegram] Message channel closed");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("[Telegram] Polling error: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("[Telegram] Update loop stopped");
    }
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self
            .call("sendMessage", &request, Some(self.send_timeout))
            .await?;
        Ok(())
    }
}

fn method_base_url(api_url: &str, token: &str) -> String {
    format!("{}/bot{}", api_url.trim_end_matches('/'), token)
}

fn into_result<T>(response: ApiResponse<T>) -> Result<T> {
    match (response.ok, response.result) {
        (true, Some(result)) => Ok(result),
        (true, None) => Err(BotError::TelegramApi("response without result".to_string())),
        (false, _) => Err(BotError::TelegramApi(format!(
            "{} ({})",
            response
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
            response.error_code.unwrap_or_default()
        ))),
    }
}

/// An API-level refusal of `getMe` means the token is bad. Network and
/// decoding errors pass through unchanged.
fn check_token(result: Result<User>) -> Result<User> {
    match result {
        Err(BotError::TelegramApi(detail)) => Err(BotError::TokenRejected(detail)),
        other => other,
    }
}

/// The offset acknowledging every update in `updates`.
fn next_offset(current: Option<i64>, updates: &[Update]) -> Option<i64> {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .max(current)
}
