//! Persisted client state
//!
//! The browser build of this product kept three flat string keys in
//! localStorage; here the same slots live in a small JSON map on disk.
//! Both the resolver and the chat controller receive the store as an
//! injected capability so tests can swap in the in-memory variant.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use crate::api::types::Identity;

/// Key for the logged-in user's id
pub const KEY_USER_ID: &str = "user_id";

/// Key for the logged-in user's display name
pub const KEY_USER_NAME: &str = "user_name";

/// Key for the current conversation session id
pub const KEY_SESSION_ID: &str = "sessao_id";

/// Flat string key-value storage, one slot per key.
///
/// Absence of a key means "no identity" / "no session". Writes are
/// last-write-wins; concurrent processes sharing the file are an accepted
/// hazard, not arbitrated.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Load the persisted identity, if both of its keys are present.
pub fn load_identity(store: &dyn Storage) -> Option<Identity> {
    let user_id = store.get(KEY_USER_ID)?;
    let display_name = store.get(KEY_USER_NAME)?;
    Some(Identity {
        user_id,
        display_name,
    })
}

/// Persist a freshly logged-in identity.
///
/// The session slot is cleared first: a session handle must never be
/// carried across identities.
pub fn save_identity(store: &dyn Storage, identity: &Identity) {
    store.remove(KEY_SESSION_ID);
    store.set(KEY_USER_ID, &identity.user_id);
    store.set(KEY_USER_NAME, &identity.display_name);
}

/// Clear identity and session on logout.
pub fn clear_identity(store: &dyn Storage) {
    store.remove(KEY_SESSION_ID);
    store.remove(KEY_USER_ID);
    store.remove(KEY_USER_NAME);
}

/// File-backed store at `~/.mentor/state.json`.
///
/// The map is read once at open and rewritten wholesale on every mutation.
/// I/O failures are logged and swallowed; losing a slot degrades to the
/// "nothing stored" path, which every reader already handles.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or start empty at) the given path.
    pub fn open(path: PathBuf) -> Self {
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("state file {} is not valid JSON, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Default location under the user's home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".mentor")
            .join("state.json")
    }

    fn flush(&self, values: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(values) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("failed to write state file {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("failed to serialize state: {}", e),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.lock();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.lock();
        if values.remove(key).is_some() {
            self.flush(&values);
        }
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}
