//! Durable config stores
//!
//! The adapter treats its persisted configuration as an opaque document:
//! it is loaded once at startup and written back after identity assignment.

use super::AdapterConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Key used to store the config document in sled
const CONFIG_KEY: &[u8] = b"pulse_config";

/// Durable storage for the adapter configuration document
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Human readable location, used in logs
    fn describe(&self) -> String;

    /// Load the stored document, `None` if nothing has been stored yet
    async fn load_config(&self) -> Result<Option<AdapterConfig>>;

    /// Replace the stored document
    async fn save_config(&self, config: &AdapterConfig) -> Result<()>;
}

/// Store backed by a YAML file on disk
#[derive(Debug, Clone)]
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigStore for YamlFileStore {
    fn describe(&self) -> String {
        format!("yaml:{}", self.path.display())
    }

    async fn load_config(&self) -> Result<Option<AdapterConfig>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to access config file: {}", self.path.display()))?
        {
            debug!("No config file at {}", self.path.display());
            return Ok(None);
        }

        AdapterConfig::load(&self.path).await.map(Some)
    }

    async fn save_config(&self, config: &AdapterConfig) -> Result<()> {
        config.save(&self.path).await
    }
}

/// Store backed by an embedded sled database
///
/// The whole document lives under a single key as JSON.
#[derive(Clone)]
pub struct SledConfigStore {
    db: sled::Db,
    path: PathBuf,
}

impl SledConfigStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = sled::open(&path)
            .with_context(|| format!("Failed to open sled database at: {}", path.display()))?;

        debug!("Config store opened database at: {}", path.display());
        Ok(Self { db, path })
    }
}

#[async_trait]
impl ConfigStore for SledConfigStore {
    fn describe(&self) -> String {
        format!("sled:{}", self.path.display())
    }

    async fn load_config(&self) -> Result<Option<AdapterConfig>> {
        let db = self.db.clone();
        let data = tokio::task::spawn_blocking(move || db.get(CONFIG_KEY))
            .await
            .context("Config load task panicked")?
            .context("Failed to read config from sled")?;

        let Some(data) = data else {
            debug!("No config document in sled");
            return Ok(None);
        };

        let config = serde_json::from_slice::<AdapterConfig>(&data)
            .context("Failed to parse config document stored in sled")?;
        trace!("Loaded {} pulse entries from sled", config.pulses.len());
        Ok(Some(config))
    }

    async fn save_config(&self, config: &AdapterConfig) -> Result<()> {
        let json = serde_json::to_vec(config).context("Failed to serialize config document")?;

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            db.insert(CONFIG_KEY, json)?;
            db.flush()?;
            Ok::<_, sled::Error>(())
        })
        .await
        .context("Config save task panicked")?
        .context("Failed to write config to sled")?;

        trace!("Config document flushed to sled");
        Ok(())
    }
}

/// Pick the durable store for this run
///
/// Without `db` the YAML file at `config_path` is the store itself. With `db`
/// the sled database is the store and the YAML file, when present and
/// readable, is returned as the seed for an empty database. An unreadable
/// seed is logged and skipped.
pub async fn open_store(
    config_path: &Path,
    db: Option<&Path>,
) -> Result<(Arc<dyn ConfigStore>, Option<AdapterConfig>)> {
    let Some(db) = db else {
        let store: Arc<dyn ConfigStore> = Arc::new(YamlFileStore::new(config_path));
        return Ok((store, None));
    };

    let store: Arc<dyn ConfigStore> = Arc::new(SledConfigStore::open(db)?);
    let seed = match tokio::fs::try_exists(config_path).await {
        Ok(true) => match AdapterConfig::load(config_path).await {
            Ok(seed) => Some(seed),
            Err(e) => {
                warn!("Ignoring seed config: {:#}", e);
                None
            }
        },
        _ => None,
    };

    Ok((store, seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PulseConfig;

    fn sample() -> AdapterConfig {
        let mut porch = PulseConfig::new("Porch", false, 5.0);
        porch.id = Some("porch-id".into());
        porch.extra.insert("pin".into(), serde_json::json!(4));
        AdapterConfig {
            pulses: vec![porch, PulseConfig::new("Gate", true, 1.0)],
            ..AdapterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_yaml_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlFileStore::new(dir.path().join("absent.yaml"));
        assert!(store.load_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_yaml_store_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlFileStore::new(dir.path().join("pulses.yaml"));

        store.save_config(&sample()).await.unwrap();
        let loaded = store.load_config().await.unwrap();
        assert_eq!(loaded, Some(sample()));
    }

    #[tokio::test]
    async fn test_sled_store_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sled");

        let store = SledConfigStore::open(&path).unwrap();
        assert!(store.load_config().await.unwrap().is_none());

        store.save_config(&sample()).await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_open_store_without_db_uses_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulses.yaml");
        sample().save(&path).await.unwrap();

        let (store, seed) = open_store(&path, None).await.unwrap();
        assert!(seed.is_none());
        assert_eq!(store.describe(), format!("yaml:{}", path.display()));
        assert_eq!(store.load_config().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_open_store_with_db_reads_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulses.yaml");
        sample().save(&path).await.unwrap();

        let db = dir.path().join("state.sled");
        let (store, seed) = open_store(&path, Some(db.as_path())).await.unwrap();
        assert_eq!(seed, Some(sample()));
        assert!(store.describe().starts_with("sled:"));
        assert!(store.load_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_store_skips_unreadable_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulses.yaml");
        tokio::fs::write(&path, "pulses: [ {name: x, duration: soon").await.unwrap();

        let db = dir.path().join("state.sled");
        let (_store, seed) = open_store(&path, Some(db.as_path())).await.unwrap();
        assert!(seed.is_none());
    }

    #[tokio::test]
    async fn test_open_store_missing_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let db = dir.path().join("state.sled");
        let (_store, seed) = open_store(&path, Some(db.as_path())).await.unwrap();
        assert!(seed.is_none());
    }
}
