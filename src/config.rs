use crate::cache::{CacheChain, CacheLayer, DiskCache, InMemoryCache, PassThrough, UpstreamModifiedCache};
use crate::error::{Error, Result};
use crate::source::{EventBatch, FreshnessOracle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Refresh and cache settings.
///
/// Every field has a default, so an empty JSON object is a valid config.
///
/// # Examples
///
/// ```
/// use curatefold::Config;
/// use std::time::Duration;
///
/// let config = Config::from_json_str(r#"{"update_interval_secs": 600}"#).unwrap();
/// assert_eq!(config.update_interval(), Duration::from_secs(600));
/// assert!(config.cache_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between background refreshes.
    pub update_interval_secs: u64,
    pub cache_dir: PathBuf,
    /// When false, every refresh goes straight to the event source.
    pub cache_enabled: bool,
    /// Maximum age of the in-memory and disk copies of the event log. Kept
    /// longer than the update interval so refreshes usually hit the source
    /// only once the upstream data has aged out.
    pub max_age_secs: u64,
    pub event_cache_slot: String,
    /// Dataset to ask the freshness oracle about. Only used when an oracle
    /// is supplied to [`Config::build_event_cache`].
    pub upstream_dataset_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            update_interval_secs: 60 * 60,
            cache_dir: PathBuf::from(".cache"),
            cache_enabled: true,
            max_age_secs: 24 * 60 * 60,
            event_cache_slot: "curation_events".to_string(),
            upstream_dataset_id: None,
        }
    }
}

impl Config {
    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] for malformed JSON and [`Error::Config`] for
    /// values that cannot work.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_secs == 0 {
            return Err(Error::Config(
                "update_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.event_cache_slot.is_empty()
            || self
                .event_cache_slot
                .contains(|c: char| c == '/' || c == '\\')
        {
            return Err(Error::Config(format!(
                "event_cache_slot must be a plain file name, got '{}'",
                self.event_cache_slot
            )));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Assemble the cache chain guarding the event source.
    ///
    /// - caching disabled: a single pass-through layer;
    /// - oracle and `upstream_dataset_id` both present: upstream-modified
    ///   check in front of the disk slot. Every load it triggers reloads the
    ///   slot too, so the slot stays current for runs without an oracle;
    /// - otherwise: in-memory copy in front of the disk slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn build_event_cache(
        &self,
        oracle: Option<Arc<dyn FreshnessOracle>>,
    ) -> Result<CacheChain<EventBatch>> {
        if !self.cache_enabled {
            let layer: Arc<dyn CacheLayer<EventBatch>> = Arc::new(PassThrough);
            return CacheChain::new(vec![layer]);
        }

        let front: Arc<dyn CacheLayer<EventBatch>> =
            match (oracle, self.upstream_dataset_id.as_deref()) {
                (Some(oracle), Some(dataset_id)) => {
                    Arc::new(UpstreamModifiedCache::<EventBatch>::new(dataset_id, oracle))
                }
                _ => Arc::new(InMemoryCache::<EventBatch>::new(Some(self.max_age()))),
            };
        let disk: Arc<dyn CacheLayer<EventBatch>> = Arc::new(DiskCache::<EventBatch>::open(
            &self.cache_dir,
            &self.event_cache_slot,
            self.max_age(),
        )?);
        CacheChain::new(vec![front, disk])
    }
}
