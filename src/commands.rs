//! Bot command handling.
//!
//! `/start` subscribes the chat, `/stop` unsubscribes it and `/help` explains
//! the bot. Anything else gets a short "can't read messages" reply.

use crate::error::Result;
use crate::notifier::MessageTransport;
use crate::subscribers::SubscriberStore;
use crate::telegram::IncomingMessage;
use log::{error, info, warn};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, EnumString};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const SUBSCRIBED_TEXT: &str = "נרשמת בהצלחה! תקבל התראות על שינויים במצב החשמל.";
pub const ALREADY_SUBSCRIBED_TEXT: &str = "כבר נרשמת! אתה תקבל התראות על שינויים במצב החשמל.";
pub const UNSUBSCRIBED_TEXT: &str = "הוסרת בהצלחה מרשימת המנויים.";
pub const NOT_SUBSCRIBED_TEXT: &str = "לא היית רשום לקבלת התראות.";
pub const STORAGE_ERROR_TEXT: &str = "אירעה שגיאה בשמירת ההרשמה. נסה שוב מאוחר יותר.";
pub const UNKNOWN_MESSAGE_TEXT: &str = "אינני מסוגל לקרוא הודעות.\n לקבלת עזרה הקש: /help";
pub const HELP_TEXT: &str = "הבוט מתריע על הפסקות חשמל והתחדשות החשמל.
שימו לב: המדידה מתבצעת בכתובת ספציפית ברחוב הקרן במעלה אדומים, ולא משקפת את מצב החשמל בכל העיר.

פקודות זמינות:
/start - הרשמה לקבלת התראות
/stop - ביטול הרשמה להתראות
/help - הצגת הודעה זו";

/// Commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Command {
    Start,
    Stop,
    Help,
}

impl Command {
    /// Parse `/name`, `/name@BotName` or `/name args`.
    ///
    /// A command addressed to a different bot is not a command for us. When
    /// `bot_username` is `None` any suffix is accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let token = token.strip_prefix('/')?;
        let (name, target) = match token.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (token, None),
        };
        if let (Some(target), Some(ours)) = (target, bot_username)
            && !target.eq_ignore_ascii_case(ours)
        {
            return None;
        }
        Command::from_str(name).ok()
    }
}

/// Replies to chat messages and updates the subscriber store.
pub struct CommandHandler {
    subscribers: Arc<SubscriberStore>,
    transport: Arc<dyn MessageTransport>,
    bot_username: Option<String>,
}

impl CommandHandler {
    pub fn new(subscribers: Arc<SubscriberStore>, transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            subscribers,
            transport,
            bot_username: None,
        }
    }

    /// Only accept `/cmd@name` suffixes naming this bot.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Apply a message's effect and return the reply text.
    pub fn reply_for(&self, message: &IncomingMessage) -> &'static str {
        let command = message
            .text
            .as_deref()
            .and_then(|text| Command::parse(text, self.bot_username.as_deref()));

        match command {
            Some(Command::Start) => match self.subscribers.add(message.chat_id) {
                Ok(true) => {
                    info!(
                        "[Commands] New user subscribed: {} (ID: {})",
                        message.sender_name, message.chat_id
                    );
                    SUBSCRIBED_TEXT
                }
                Ok(false) => ALREADY_SUBSCRIBED_TEXT,
                Err(e) => {
                    error!("[Commands] Failed to subscribe {}: {}", message.chat_id, e);
                    STORAGE_ERROR_TEXT
                }
            },
            Some(Command::Stop) => match self.subscribers.remove(message.chat_id) {
                Ok(true) => {
                    info!(
                        "[Commands] User unsubscribed: {} (ID: {})",
                        message.sender_name, message.chat_id
                    );
                    UNSUBSCRIBED_TEXT
                }
                Ok(false) => NOT_SUBSCRIBED_TEXT,
                Err(e) => {
                    error!("[Commands] Failed to unsubscribe {}: {}", message.chat_id, e);
                    STORAGE_ERROR_TEXT
                }
            },
            Some(Command::Help) => HELP_TEXT,
            None => UNKNOWN_MESSAGE_TEXT,
        }
    }

    /// Handle one message and send the reply.
    pub async fn handle(&self, message: &IncomingMessage) -> Result<()> {
        let reply = self.reply_for(message);
        self.transport.send_message(message.chat_id, reply).await
    }

    /// Consume messages until the channel closes or `cancel` fires.
    pub async fn run(&self, mut rx: mpsc::Receiver<IncomingMessage>, cancel: CancellationToken) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            if let Err(e) = self.handle(&message).await {
                warn!("[Commands] Failed to reply to chat {}: {}", message.chat_id, e);
            }
        }
        info!("[Commands] Command handler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::tests::MockTransport;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn message(chat_id: i64, text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            chat_id,
            sender_name: "Dana Levi".to_string(),
            text: text.map(str::to_string),
        }
    }

    fn handler() -> (CommandHandler, Arc<SubscriberStore>, Arc<MockTransport>, TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SubscriberStore::open(dir.path().join("users.json")).unwrap());
        let transport = Arc::new(MockTransport::default());
        (
            CommandHandler::new(store.clone(), transport.clone()),
            store,
            transport,
            dir,
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", None), Some(Command::Start));
        assert_eq!(Command::parse("  /stop now", None), Some(Command::Stop));
        assert_eq!(Command::parse("/help@PowerWatchBot", None), Some(Command::Help));
        assert_eq!(Command::parse("/HELP", None), Some(Command::Help));
        assert_eq!(Command::parse("start", None), None);
        assert_eq!(Command::parse("/restart", None), None);
        assert_eq!(Command::parse("", None), None);
        assert_eq!(Command::Start.as_ref(), "start");
    }

    #[test]
    fn test_parse_checks_bot_suffix() {
        let ours = Some("PowerWatchBot");
        assert_eq!(Command::parse("/start@PowerWatchBot", ours), Some(Command::Start));
        assert_eq!(Command::parse("/start@powerwatchbot", ours), Some(Command::Start));
        assert_eq!(Command::parse("/start", ours), Some(Command::Start));
        assert_eq!(Command::parse("/start@SomeOtherBot", ours), None);
        assert_eq!(Command::parse("/stop@SomeOtherBot now", ours), None);
    }

    #[test]
    fn test_command_for_other_bot_does_not_subscribe() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SubscriberStore::open(dir.path().join("users.json")).unwrap());
        let handler = CommandHandler::new(store.clone(), Arc::new(MockTransport::default()))
            .with_bot_username("PowerWatchBot");

        assert_eq!(
            handler.reply_for(&message(-100, Some("/start@SomeOtherBot"))),
            UNKNOWN_MESSAGE_TEXT
        );
        assert!(!store.contains(-100));

        assert_eq!(
            handler.reply_for(&message(-100, Some("/start@PowerWatchBot"))),
            SUBSCRIBED_TEXT
        );
        assert!(store.contains(-100));
    }

    #[test]
    fn test_storage_failure_gets_error_reply() {
        let (handler, store, _transport, dir) = handler();
        let path = dir.path().join("users.json");
        assert_eq!(handler.reply_for(&message(7, Some("/start"))), SUBSCRIBED_TEXT);

        // Replace the file with a non-empty directory so the rename fails
        fs::remove_file(&path).unwrap();
        fs::create_dir_all(path.join("blocker")).unwrap();

        assert_eq!(handler.reply_for(&message(8, Some("/start"))), STORAGE_ERROR_TEXT);
        assert!(!store.contains(8));

        assert_eq!(handler.reply_for(&message(7, Some("/stop"))), STORAGE_ERROR_TEXT);
        assert!(store.contains(7));
    }

    #[test]
    fn test_subscribe_flow() {
        let (handler, store, _transport, _dir) = handler();

        assert_eq!(handler.reply_for(&message(100, Some("/start"))), SUBSCRIBED_TEXT);
        assert_eq!(handler.reply_for(&message(100, Some("/start"))), ALREADY_SUBSCRIBED_TEXT);
        assert!(store.contains(100));

        assert_eq!(handler.reply_for(&message(100, Some("/stop"))), UNSUBSCRIBED_TEXT);
        assert_eq!(handler.reply_for(&message(100, Some("/stop"))), NOT_SUBSCRIBED_TEXT);
        assert!(store.is_empty());
    }

    #[test]
    fn test_help_and_unknown() {
        let (handler, store, _transport, _dir) = handler();
        assert_eq!(handler.reply_for(&message(1, Some("/help"))), HELP_TEXT);
        assert_eq!(handler.reply_for(&message(1, Some("hello"))), UNKNOWN_MESSAGE_TEXT);
        assert_eq!(handler.reply_for(&message(1, None)), UNKNOWN_MESSAGE_TEXT);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_run_replies_until_channel_closes() {
        let (handler, store, transport, _dir) = handler();
        let (tx, rx) = mpsc::channel(8);

        tx.send(message(7, Some("/start"))).await.unwrap();
        tx.send(message(7, Some("what?"))).await.unwrap();
        drop(tx);

        handler.run(rx, CancellationToken::new()).await;

        let sent = transport.sent.lock();
        assert_eq!(
            *sent,
            vec![
                (7, SUBSCRIBED_TEXT.to_string()),
                (7, UNKNOWN_MESSAGE_TEXT.to_string()),
            ]
        );
        assert!(store.contains(7));
    }

    #[tokio::test]
    async fn test_reply_failure_does_not_stop_handler() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SubscriberStore::open(dir.path().join("users.json")).unwrap());
        let transport = Arc::new(MockTransport {
            failing: [1].into(),
            ..Default::default()
        });
        let handler = CommandHandler::new(store.clone(), transport.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(message(1, Some("/start"))).await.unwrap();
        tx.send(message(2, Some("/start"))).await.unwrap();
        drop(tx);

        handler.run(rx, CancellationToken::new()).await;

        assert!(store.contains(1));
        assert!(store.contains(2));
        tokio_test::assert_err!(handler.handle(&message(1, Some("/help"))).await);
        assert_eq!(transport.sent.lock().len(), 1);
    }
}
