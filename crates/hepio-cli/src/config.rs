// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tool preferences and the store they live in.
//!
//! Preferences are JSON blobs keyed by name. [`ConfigService`] handles
//! (de)serialization and delegates storage to a [`ConfigStore`];
//! [`FsConfigStore`] keeps one file per key under the platform config
//! directory. Command-line flags always win over stored preferences.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use hepio_event::stream::DEFAULT_MAX_FRAME_LEN;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "HEPIO_CONFIG_DIR";
/// Key the tool preferences are stored under.
pub const PREFS_KEY: &str = "tools";

/// Storage port for raw config blobs.
pub trait ConfigStore {
    /// Loads the blob for `key`. Returns [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persists the blob for `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Errors from config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in the store.
    #[error("not found")]
    NotFound,
    /// Reading or writing failed.
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    /// The stored blob is not valid JSON for the requested type.
    #[error("config serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// No config directory could be determined.
    #[error("could not resolve config dir")]
    NoConfigDir,
}

/// Serializes values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Loads `key`. `Ok(None)` when it is missing or empty.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stores `value` under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// JSON files under a base directory, one per key.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store under `$HEPIO_CONFIG_DIR`, or the platform config directory
    /// (for example `~/.config/hepio`).
    pub fn new() -> Result<Self, ConfigError> {
        if let Some(dir) = env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::at(dir));
        }
        let proj =
            ProjectDirs::from("dev", "flyingrobots", "hepio").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::at(proj.config_dir()))
    }

    /// Store rooted at `base`.
    pub fn at(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// Preferences shared by the hepio tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPrefs {
    /// Compress converter output on standard output even without `-g`.
    pub gzip_output: bool,
    /// Largest frame section the readers accept.
    pub max_frame_len: u32,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ToolPrefs {
    fn default() -> Self {
        Self {
            gzip_output: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            log_filter: "warn".into(),
        }
    }
}

/// Loads tool preferences from the default store. Missing means defaults.
pub fn load_prefs() -> Result<ToolPrefs, ConfigError> {
    let service = ConfigService::new(FsConfigStore::new()?);
    Ok(service.load(PREFS_KEY)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct MemStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MemStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_key_loads_as_none() {
        let service = ConfigService::new(MemStore::default());
        assert!(service.load::<ToolPrefs>(PREFS_KEY).unwrap().is_none());
    }

    #[test]
    fn prefs_round_trip_through_the_service() {
        let service = ConfigService::new(MemStore::default());
        let prefs = ToolPrefs {
            gzip_output: true,
            max_frame_len: 1024,
            log_filter: "hepio_event=debug".into(),
        };
        service.save(PREFS_KEY, &prefs).unwrap();
        assert_eq!(service.load::<ToolPrefs>(PREFS_KEY).unwrap(), Some(prefs));
    }

    #[test]
    fn partial_prefs_fill_in_defaults() {
        let store = MemStore::default();
        store.save_raw(PREFS_KEY, br#"{"gzip_output": true}"#).unwrap();
        let prefs: ToolPrefs = ConfigService::new(store).load(PREFS_KEY).unwrap().unwrap();
        assert!(prefs.gzip_output);
        assert_eq!(prefs.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert_eq!(prefs.log_filter, "warn");
    }

    #[test]
    fn fs_store_writes_one_file_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path().join("nested"));
        assert!(matches!(store.load_raw("tools"), Err(ConfigError::NotFound)));
        store.save_raw("tools", b"{}").unwrap();
        assert!(store.base().join("tools.json").is_file());
        assert_eq!(store.load_raw("tools").unwrap(), b"{}");
    }
}
