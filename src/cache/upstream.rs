use super::{CacheLayer, ChainLoader, LoadPolicy};
use crate::error::Result;
use crate::source::FreshnessOracle;
use crate::sync::lock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

struct Observed<T> {
    value: T,
    modified: DateTime<Utc>,
}

/// Serves its value until the upstream dataset reports a newer
/// modification time.
///
/// Elapsed wall-clock time plays no part: the oracle is asked on every
/// call, and the loader runs only when the reported time is strictly after
/// the one seen at the last load.
///
/// Whenever it loads, this layer asks the layers behind it to reload as
/// well. A copy they still hold may predate the reported modification, and
/// storing it under the new time would pin stale data until upstream
/// changes again.
pub struct UpstreamModifiedCache<T> {
    dataset_id: String,
    oracle: Arc<dyn FreshnessOracle>,
    observed: Mutex<Option<Observed<T>>>,
}

impl<T> UpstreamModifiedCache<T> {
    pub fn new(dataset_id: impl Into<String>, oracle: Arc<dyn FreshnessOracle>) -> Self {
        UpstreamModifiedCache {
            dataset_id: dataset_id.into(),
            oracle,
            observed: Mutex::new(None),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Modification time observed at the last successful load.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        lock(&self.observed).as_ref().map(|observed| observed.modified)
    }
}

impl<T> std::fmt::Debug for UpstreamModifiedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamModifiedCache")
            .field("dataset_id", &self.dataset_id)
            .field("last_modified", &self.last_modified())
            .finish()
    }
}

impl<T> CacheLayer<T> for UpstreamModifiedCache<T>
where
    T: Clone + Send,
{
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T> {
        let mut observed = lock(&self.observed);
        let modified = self.oracle.modified_time(&self.dataset_id)?;

        if policy == LoadPolicy::PreferCached {
            if let Some(current) = observed.as_ref() {
                if modified <= current.modified {
                    log::info!(
                        "not reloading '{}', upstream not modified since {}",
                        self.dataset_id,
                        current.modified
                    );
                    return Ok(current.value.clone());
                }
            }
        }

        log::info!("loading '{}', upstream modified at {modified}", self.dataset_id);
        let value = loader(LoadPolicy::Reload)?;
        *observed = Some(Observed {
            value: value.clone(),
            modified,
        });
        Ok(value)
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.observed) = None;
        Ok(())
    }
}
