//! User persistence.
//!
//! The whole mapping `username -> UserRecord` is one JSON document, read and
//! rewritten wholesale. Backends implement [`UserStore`]; `update` runs a
//! read-modify-write cycle under the backend's lock so concurrent logins for
//! the same user cannot drop each other's timestamps.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persisted credential and login history for one username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stored and compared as-is.
    pub password: String,
    /// ISO-8601 timestamps, append-only, oldest first.
    #[serde(default)]
    pub logins: Vec<String>,
}

impl UserRecord {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            logins: Vec::new(),
        }
    }
}

pub type Users = BTreeMap<String, UserRecord>;

/// Storage seam for the user mapping.
pub trait UserStore: Send + Sync {
    fn load(&self) -> Result<Users>;

    fn save(&self, users: &Users) -> Result<()>;

    /// Load, hand the mapping to `apply`, and persist it if `apply` returns
    /// `true`. No other `update` on the same store interleaves.
    fn update(&self, apply: &mut dyn FnMut(&mut Users) -> bool) -> Result<()>;
}

// ── JSON file backend ───────────────────────────────────────────────

/// Flat-file store: one pretty-printed JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, writing `seed` there if the file is absent.
    /// An existing file is never touched.
    pub fn open(path: impl Into<PathBuf>, seed: &Users) -> Result<Self> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory {}", parent.display())
                })?;
            }
            store.write_document(seed)?;
            tracing::info!(
                path = %store.path.display(),
                users = seed.len(),
                "Seeded new user store"
            );
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Users> {
        if !self.path.exists() {
            return Ok(Users::new());
        }
        let raw = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read user store {}", self.path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("User store {} is not valid JSON", self.path.display()))
    }

    fn write_document(&self, users: &Users) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        users
            .serialize(&mut ser)
            .context("Failed to serialize users")?;

        // Same directory so the rename stays on one filesystem.
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace user store {}", self.path.display()))?;
        Ok(())
    }
}

impl UserStore for JsonFileStore {
    fn load(&self) -> Result<Users> {
        self.read_document()
    }

    fn save(&self, users: &Users) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write_document(users)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Users) -> bool) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut users = self.read_document()?;
        if apply(&mut users) {
            self.write_document(&users)?;
        }
        Ok(())
    }
}

// ── In-memory backend ───────────────────────────────────────────────

/// Process-local store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Users>,
}

impl MemoryStore {
    pub fn new(users: Users) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }
}

impl UserStore for MemoryStore {
    fn load(&self) -> Result<Users> {
        Ok(self.users.lock().clone())
    }

    fn save(&self, users: &Users) -> Result<()> {
        *self.users.lock() = users.clone();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Users) -> bool) -> Result<()> {
        let mut guard = self.users.lock();
        let mut working = guard.clone();
        if apply(&mut working) {
            *guard = working;
        }
        Ok(())
    }
}

/// The mapping a fresh store starts with: one user, no history.
pub fn seed_users(username: &str, password: &str) -> Users {
    let mut users = Users::new();
    users.insert(username.to_owned(), UserRecord::new(password));
    users
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, JsonFileStore) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        let store = JsonFileStore::open(&path, &seed_users("admin", "bio123")).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_seeds_missing_file() {
        let (_tmp, store) = test_store();

        let users = store.load().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users["admin"], UserRecord::new("bio123"));
    }

    #[test]
    fn seeded_document_is_four_space_indented() {
        let (_tmp, store) = test_store();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            raw,
            "{\n    \"admin\": {\n        \"password\": \"bio123\",\n        \"logins\": []\n    }\n}"
        );
    }

    #[test]
    fn open_leaves_existing_file_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        std::fs::write(
            &path,
            r#"{"nurse": {"password": "pw", "logins": ["2024-01-02T09:00:00.000000"]}}"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path, &seed_users("admin", "bio123")).unwrap();
        let users = store.load().unwrap();
        assert!(!users.contains_key("admin"));
        assert_eq!(users["nurse"].logins.len(), 1);
    }

    #[test]
    fn open_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("nested").join("users.json");

        let store = JsonFileStore::open(&path, &seed_users("admin", "bio123")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn missing_logins_field_defaults_to_empty() {
        let record: UserRecord = serde_json::from_str(r#"{"password": "x"}"#).unwrap();
        assert!(record.logins.is_empty());
    }

    #[test]
    fn save_and_reload_preserves_mapping() {
        let (_tmp, store) = test_store();

        let mut users = seed_users("admin", "bio123");
        users.insert(
            "ward-7".into(),
            UserRecord {
                password: "p@ss word ✓".into(),
                logins: vec![
                    "2024-01-01T08:00:00.000001".into(),
                    "2024-01-02T09:30:00.500000".into(),
                ],
            },
        );
        store.save(&users).unwrap();

        let reopened = JsonFileStore::open(store.path(), &Users::new()).unwrap();
        assert_eq!(reopened.load().unwrap(), users);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let (_tmp, store) = test_store();
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }

    #[test]
    fn update_persists_only_when_requested() {
        let (_tmp, store) = test_store();

        store
            .update(&mut |users| {
                users.get_mut("admin").unwrap().logins.push("discarded".into());
                false
            })
            .unwrap();
        assert!(store.load().unwrap()["admin"].logins.is_empty());

        store
            .update(&mut |users| {
                users.get_mut("admin").unwrap().logins.push("kept".into());
                true
            })
            .unwrap();
        assert_eq!(store.load().unwrap()["admin"].logins, vec!["kept"]);
    }

    #[test]
    fn concurrent_updates_do_not_lose_appends() {
        let (_tmp, store) = test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .update(&mut |users| {
                            users
                                .get_mut("admin")
                                .unwrap()
                                .logins
                                .push(format!("entry-{i}"));
                            true
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap()["admin"].logins.len(), 8);
    }

    #[test]
    fn memory_store_update_discards_rejected_changes() {
        let store = MemoryStore::new(seed_users("admin", "bio123"));

        store
            .update(&mut |users| {
                users.remove("admin");
                false
            })
            .unwrap();
        assert!(store.load().unwrap().contains_key("admin"));

        store
            .update(&mut |users| {
                users.get_mut("admin").unwrap().logins.push("t".into());
                true
            })
            .unwrap();
        assert_eq!(store.load().unwrap()["admin"].logins.len(), 1);
    }
}
