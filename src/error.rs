use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BotError {
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,

    #[error("Telegram rejected the bot token: {0}")]
    TokenRejected(String),

    #[error("Telegram API error: {0}")]
    TelegramApi(String),

    #[error("Message delivery timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    #[error("Power sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Subscriber file {path} is corrupt: {source}")]
    CorruptSubscriberFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist subscribers: {0}")]
    PersistFailed(#[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InstanceLock(#[from] crate::instance_lock::InstanceLockError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
