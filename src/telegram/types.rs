//! Telegram Bot API wire types.
//!
//! Only the fields the bot reads are modelled; serde ignores the rest.

use crate::subscribers::ChatId;
use serde::{Deserialize, Serialize};

/// Envelope returned by every Bot API method.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// First and last name joined, like Telegram clients display it.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: ChatId,
    pub text: &'a str,
}

/// A chat message handed to the command dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    /// Display name of the sender, for logs.
    pub sender_name: String,
    /// `None` for non-text content (stickers, photos, ...).
    pub text: Option<String>,
}

impl From<Message> for IncomingMessage {
    fn from(message: Message) -> Self {
        let sender_name = message
            .from
            .as_ref()
            .map(User::full_name)
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            chat_id: message.chat.id,
            sender_name,
            text: message.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {
                    "message_id": 1, "date": 1700000000,
                    "chat": {"id": 100, "type": "private"},
                    "from": {"id": 100, "is_bot": false, "first_name": "Dana", "last_name": "Levi"},
                    "text": "/start"
                }},
                {"update_id": 11, "edited_message": {}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(response.ok);
        let updates = response.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].message.is_none());

        let incoming = IncomingMessage::from(updates[0].message.clone().unwrap());
        assert_eq!(incoming.chat_id, 100);
        assert_eq!(incoming.sender_name, "Dana Levi");
        assert_eq!(incoming.text.as_deref(), Some("/start"));
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<User> = serde_json::from_str(body).unwrap();
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(401));
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_non_text_message() {
        let body = r#"{"message_id": 3, "chat": {"id": -5}, "sticker": {}}"#;
        let message: Message = serde_json::from_str(body).unwrap();
        let incoming = IncomingMessage::from(message);
        assert_eq!(incoming.text, None);
        assert_eq!(incoming.sender_name, "unknown");
    }
}
