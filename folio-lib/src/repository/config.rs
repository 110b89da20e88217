use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::{Result, fs::config_dir};

const FILE_NAME: &str = "folio.toml";

/// Handle to the core configuration
pub type Cfg = Arc<RwLock<CoreConfig>>;

/// The core configuration, serialized to TOML.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub remote: RemoteConfig,
    pub images: ImageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub transport: TransportKind,
    /// Base URL of the table API, or the endpoint of the RPC store
    pub base_url: String,
    /// Upper bound for a single attempt of a remote call
    pub timeout_secs: u64,
    /// Pause before the one retry a failed read gets
    pub retry_backoff_ms: u64,
    /// `limit` sent with every list request
    pub page_limit: u32,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Table,
            base_url: "http://localhost:8080/".to_string(),
            timeout_secs: 15,
            retry_backoff_ms: 500,
            page_limit: 100,
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Table,
    Rpc,
    Memory,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Upload images to the store and keep its URL instead of storing them inline
    pub hosted: bool,
}

impl CoreConfig {
    pub fn path() -> Result<PathBuf> {
        Ok(config_dir()?.join(FILE_NAME))
    }

    /// Load the configuration from the default location, writing the defaults there first if the
    /// file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            Ok(toml::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable config {}: {e}", path.display());
                Self::default()
            }))
        } else {
            let cfg = Self::default();
            cfg.save_to(path)?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;

        Ok(())
    }

    /// Configuration for tests: everything in memory
    #[cfg(test)]
    pub(crate) fn mock() -> Self {
        Self {
            remote: RemoteConfig {
                transport: TransportKind::Memory,
                retry_backoff_ms: 0,
                ..Default::default()
            },
            images: ImageConfig::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);

        let cfg = CoreConfig::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(cfg, CoreConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(
            &path,
            "[remote]\ntransport = \"rpc\"\nbase_url = \"https://script.example.org/exec\"\n",
        )
        .unwrap();

        let cfg = CoreConfig::load_from(&path).unwrap();

        assert_eq!(cfg.remote.transport, TransportKind::Rpc);
        assert_eq!(cfg.remote.timeout_secs, 15);
        assert!(!cfg.images.hosted);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);
        let mut cfg = CoreConfig::default();
        cfg.images.hosted = true;
        cfg.remote.page_limit = 20;

        cfg.save_to(&path).unwrap();

        assert_eq!(CoreConfig::load_from(&path).unwrap(), cfg);
    }
}
