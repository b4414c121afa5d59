//! Subscriber persistence.
//!
//! The subscriber set is a JSON array of Telegram chat IDs. It is loaded once
//! at startup and rewritten after every successful subscribe/unsubscribe.
//!
//! ## Crash safety
//!
//! Writes go to a sibling `.tmp` file which is flushed, synced and then
//! renamed over the real file, after which the directory is synced too. A
//! crash mid-write leaves either the old file or the new one, never a
//! truncated mix.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};

/// Telegram chat identifier.
pub type ChatId = i64;

/// Persisted subscribers state
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedSubscribers {
    pub chat_ids: BTreeSet<ChatId>,
}

impl PersistedSubscribers {
    /// Load from file.
    ///
    /// A missing file is the first run and yields an empty set. A file that
    /// exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => {
                let state: PersistedSubscribers =
                    serde_json::from_slice(&bytes).map_err(|source| {
                        BotError::CorruptSubscriberFile {
                            path: path.display().to_string(),
                            source,
                        }
                    })?;
                info!(
                    "[Subscribers] Loaded {} subscribers from {:?}",
                    state.chat_ids.len(),
                    path
                );
                Ok(state)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("[Subscribers] No subscriber file found (first run)");
                Ok(Self::default())
            }
            Err(e) => Err(BotError::IoError(e)),
        }
    }

    /// Save to file atomically.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec(self)?;
        let temp_path = temp_path_for(path);

        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        // The rename itself is only durable once the directory entry is synced
        if let Err(e) = File::open(parent_dir(path)).and_then(|dir| dir.sync_all()) {
            warn!("[Subscribers] Failed to sync directory of {:?}: {}", path, e);
        }
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "subscribers".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Store wrapper with auto-save.
///
/// Shared between the command handler (writes) and the power monitor
/// (reads). The lock is held across the file write so the in-memory set and
/// the file never disagree.
pub struct SubscriberStore {
    path: PathBuf,
    state: RwLock<PersistedSubscribers>,
}

impl SubscriberStore {
    /// Open the store, loading any existing subscribers.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = PersistedSubscribers::load(&path)?;
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe a chat. Returns `Ok(false)` if it was already subscribed.
    pub fn add(&self, chat_id: ChatId) -> Result<bool> {
        let mut state = self.state.write();
        if !state.chat_ids.insert(chat_id) {
            return Ok(false);
        }
        if let Err(e) = state.save(&self.path) {
            state.chat_ids.remove(&chat_id);
            return Err(BotError::PersistFailed(e));
        }
        info!("[Subscribers] Chat {} subscribed", chat_id);
        Ok(true)
    }

    /// Unsubscribe a chat. Returns `Ok(false)` if it was not subscribed.
    pub fn remove(&self, chat_id: ChatId) -> Result<bool> {
        let mut state = self.state.write();
        if !state.chat_ids.remove(&chat_id) {
            return Ok(false);
        }
        if let Err(e) = state.save(&self.path) {
            state.chat_ids.insert(chat_id);
            return Err(BotError::PersistFailed(e));
        }
        info!("[Subscribers] Chat {} unsubscribed", chat_id);
        Ok(true)
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.state.read().chat_ids.contains(&chat_id)
    }

    /// Current subscribers in ascending order.
    pub fn snapshot(&self) -> Vec<ChatId> {
        self.state.read().chat_ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().chat_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().chat_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_ids(path: &Path) -> Vec<ChatId> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SubscriberStore::open(dir.path().join("users.json")).unwrap();
        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_startup_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "not json").unwrap();
        let result = SubscriberStore::open(&path);
        assert!(matches!(
            result,
            Err(BotError::CorruptSubscriberFile { .. })
        ));
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = SubscriberStore::open(&path).unwrap();

        assert!(store.add(100).unwrap());
        assert_eq!(read_ids(&path), vec![100]);

        assert!(!store.add(100).unwrap());
        assert_eq!(read_ids(&path), vec![100]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_non_member_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = SubscriberStore::open(&path).unwrap();
        store.add(1).unwrap();
        let before = fs::read(&path).unwrap();

        assert!(!store.remove(2).unwrap());
        assert_eq!(fs::read(&path).unwrap(), before);

        assert!(store.remove(1).unwrap());
        assert_eq!(read_ids(&path), Vec::<ChatId>::new());
    }

    #[test]
    fn test_reload_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");
        {
            let store = SubscriberStore::open(&path).unwrap();
            store.add(-1001).unwrap();
            store.add(42).unwrap();
        }
        let store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.snapshot(), vec![-1001, 42]);
        assert!(store.contains(42));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_loads_unordered_list_with_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "[3, 1, 3, 2]").unwrap();
        let store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("users.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/users.json")), Path::new("data"));
        assert_eq!(parent_dir(Path::new("/var/lib/bot/users.json")), Path::new("/var/lib/bot"));
    }

    #[test]
    fn test_save_syncs_directory_and_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "[1]").unwrap();

        let state = PersistedSubscribers {
            chat_ids: BTreeSet::from([2, 3]),
        };
        state.save(&path).unwrap();

        assert_eq!(read_ids(&path), vec![2, 3]);
        assert!(!temp_path_for(&path).exists());
        File::open(parent_dir(&path)).unwrap().sync_all().unwrap();
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempdir().unwrap();
        // The target path is a directory, so the rename cannot succeed
        let path = dir.path().join("users.json");
        fs::create_dir_all(path.join("blocker")).unwrap();
        let store = SubscriberStore {
            path: path.clone(),
            state: RwLock::new(PersistedSubscribers::default()),
        };

        let result = store.add(7);
        assert!(matches!(result, Err(BotError::PersistFailed(_))));
        assert!(!store.contains(7));
        assert!(!temp_path_for(&path).exists());
    }
}
