use crate::error::{BotError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split `.env` content into key/value pairs, skipping blanks and comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            if !key.is_empty() {
                pairs.push((key, value));
            }
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub api_url: String,
    /// Upper bound for a single sendMessage call.
    pub send_timeout: Duration,
    /// Long-poll timeout passed to getUpdates.
    pub long_poll_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Use the toggling simulated sensor instead of sysfs.
    pub simulate: bool,
    pub simulation_period: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub subscribers_file: PathBuf,
}

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_SUBSCRIBERS_FILE: &str = "subscribed_users.json";

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                token: String::new(),
                api_url: DEFAULT_API_URL.to_string(),
                send_timeout: Duration::from_secs(10),
                long_poll_timeout: Duration::from_secs(30),
            },
            monitor: MonitorConfig {
                poll_interval: Duration::from_secs(2),
                simulate: false,
                simulation_period: Duration::from_secs(30),
            },
            storage: StorageConfig {
                subscribers_file: PathBuf::from(DEFAULT_SUBSCRIBERS_FILE),
            },
        }
    }
}

impl Config {
    /// Build configuration from the process environment.
    ///
    /// Fails only when the bot token is missing; malformed numeric overrides
    /// are logged and the default is kept.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            config.telegram.token = token.trim().to_string();
        }
        if let Some(url) = lookup("TELEGRAM_API_URL") {
            config.telegram.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "SEND_TIMEOUT_SECS")
            && secs > 0
        {
            config.telegram.send_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "POLL_INTERVAL_SECS") {
            if secs > 0 {
                config.monitor.poll_interval = Duration::from_secs(secs);
            } else {
                warn!("POLL_INTERVAL_SECS must be positive, keeping default");
            }
        }
        if let Some(simulate) = parse_var::<bool>(&lookup, "SIMULATE_POWER") {
            config.monitor.simulate = simulate;
        }
        if let Some(path) = lookup("SUBSCRIBERS_FILE") {
            config.storage.subscribers_file = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings that startup cannot proceed without.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.is_empty() {
            return Err(BotError::MissingToken);
        }
        if self.monitor.poll_interval.is_zero() {
            return Err(BotError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(BotError::MissingToken)));
    }

    #[test]
    fn test_defaults_with_token() {
        let config = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(2));
        assert_eq!(config.telegram.api_url, DEFAULT_API_URL);
        assert_eq!(
            config.storage.subscribers_file,
            PathBuf::from(DEFAULT_SUBSCRIBERS_FILE)
        );
        assert!(!config.monitor.simulate);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POLL_INTERVAL_SECS", "5"),
            ("SEND_TIMEOUT_SECS", "3"),
            ("TELEGRAM_API_URL", "http://localhost:8081/"),
            ("SUBSCRIBERS_FILE", "/var/lib/bot/users.json"),
            ("SIMULATE_POWER", "true"),
        ]))
        .unwrap();
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(5));
        assert_eq!(config.telegram.send_timeout, Duration::from_secs(3));
        assert_eq!(config.telegram.api_url, "http://localhost:8081");
        assert_eq!(
            config.storage.subscribers_file,
            PathBuf::from("/var/lib/bot/users.json")
        );
        assert!(config.monitor.simulate);
    }

    #[test]
    fn test_invalid_interval_keeps_default() {
        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POLL_INTERVAL_SECS", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(2));

        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POLL_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_dotenv() {
        let content = "# comment\n\nTELEGRAM_BOT_TOKEN = \"123:abc\"\nNAME=Power bot\nBROKEN\n";
        let pairs = parse_dotenv(content);
        assert_eq!(
            pairs,
            vec![("TELEGRAM_BOT_TOKEN", "123:abc"), ("NAME", "Power bot")]
        );
    }
}
