use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const APP_DIR: &str = "nocturne";
const ENV_OVERRIDE: &str = "NOCTURNE_DATA_DIR";

pub const KEY_PLAYLIST: &str = "playlist";
pub const KEY_THEME: &str = "theme";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_CURRENT_TRACK: &str = "current_track";
pub const KEY_CURRENT_INDEX: &str = "current_index";
pub const KEY_SHUFFLE: &str = "shuffle";
pub const KEY_REPEAT: &str = "repeat";

const KEYS: &[&str] = &[
    KEY_PLAYLIST,
    KEY_THEME,
    KEY_VOLUME,
    KEY_CURRENT_TRACK,
    KEY_CURRENT_INDEX,
    KEY_SHUFFLE,
    KEY_REPEAT,
];

/// Durable key-value store for player settings. Each key is one JSON file
/// under the store root. Write failures cost durability, never the caller:
/// they are logged and swallowed, and corrupt values load as the default.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn open_default() -> Result<Self> {
        if let Ok(override_dir) = env::var(ENV_OVERRIDE) {
            return Self::open(PathBuf::from(override_dir));
        }

        let base = dirs::config_dir().context("no config directory on this platform")?;
        Self::open(base.join(APP_DIR))
    }

    pub fn open(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string_pretty(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(key, %err, "failed to serialize value, not persisted");
                return;
            }
        };

        if let Err(err) = fs::write(self.key_path(key), json) {
            warn!(key, %err, "failed to persist value");
        }
    }

    /// Absent keys return the default silently; corrupt values are logged
    /// and return the default.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Ok(raw) = fs::read_to_string(self.key_path(key)) else {
            return default;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "stored value is corrupt, using default");
                default
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(err) = fs::remove_file(self.key_path(key)) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(key, %err, "failed to remove stored value");
            }
        }
    }

    pub fn clear_all(&self) {
        for key in KEYS {
            self.remove(key);
        }
    }

    pub fn export_all(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut data = serde_json::Map::new();
        for key in KEYS {
            let Ok(raw) = fs::read_to_string(self.key_path(key)) else {
                continue;
            };
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    data.insert((*key).to_string(), value);
                }
                Err(err) => warn!(key, %err, "skipping corrupt value in export"),
            }
        }
        data
    }

    /// Writes back every recognized key; unknown keys are ignored.
    pub fn import_all(&self, data: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in data {
            if KEYS.contains(&key.as_str()) {
                self.save(key, value);
            } else {
                warn!(key, "ignoring unrecognized key in import");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().expect("tempdir");
        let store = Storage::open(dir.path().join("store")).expect("open");
        (dir, store)
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, store) = open_temp();
        store.save(KEY_VOLUME, &55u8);
        assert_eq!(store.load(KEY_VOLUME, 70u8), 55);
    }

    #[test]
    fn absent_key_returns_default() {
        let (_dir, store) = open_temp();
        assert_eq!(store.load(KEY_VOLUME, 70u8), 70);
    }

    #[test]
    fn corrupt_value_returns_default() {
        let (_dir, store) = open_temp();
        fs::write(store.key_path(KEY_VOLUME), "not json").expect("write");
        assert_eq!(store.load(KEY_VOLUME, 70u8), 70);
    }

    #[test]
    fn clear_all_removes_every_key() {
        let (_dir, store) = open_temp();
        store.save(KEY_VOLUME, &40u8);
        store.save(KEY_SHUFFLE, &true);
        store.clear_all();
        assert_eq!(store.load(KEY_VOLUME, 70u8), 70);
        assert!(!store.load(KEY_SHUFFLE, false));
    }

    #[test]
    fn export_and_import_round_trip() {
        let (_dir, source) = open_temp();
        source.save(KEY_VOLUME, &33u8);
        source.save(KEY_SHUFFLE, &true);

        let (_dir2, target) = open_temp();
        target.import_all(&source.export_all());

        assert_eq!(target.load(KEY_VOLUME, 70u8), 33);
        assert!(target.load(KEY_SHUFFLE, false));
    }

    #[test]
    fn import_ignores_unknown_keys() {
        let (_dir, store) = open_temp();
        let mut data = serde_json::Map::new();
        data.insert(String::from("bogus"), serde_json::json!(1));
        store.import_all(&data);
        assert!(!store.key_path("bogus").exists());
    }
}
