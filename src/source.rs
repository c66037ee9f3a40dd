//! Where events come from, and how to tell when they changed.

use crate::cache::CacheLayer;
use crate::error::{Error, Result};
use crate::event::{Event, RawEvent};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A complete, ordered batch of events, shared between views and caches.
pub type EventBatch = Arc<Vec<Event>>;

/// Supplies the full event log, oldest event first.
pub trait EventSource: Send + Sync {
    fn fetch_all_events(&self) -> Result<Vec<Event>>;
}

/// Reports when an upstream dataset last changed.
pub trait FreshnessOracle: Send + Sync {
    fn modified_time(&self, dataset_id: &str) -> Result<DateTime<Utc>>;
}

/// Reads events from a file holding one JSON record per line.
///
/// Blank lines are skipped. Lines that are not valid event records are
/// logged and skipped rather than failing the whole fetch.
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlEventSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for JsonlEventSource {
    fn fetch_all_events(&self) -> Result<Vec<Event>> {
        let file = File::open(&self.path).map_err(Error::source_failed)?;
        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(Error::source_failed)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(&line) {
                Ok(raw) => events.push(Event::from(raw)),
                Err(e) => log::warn!(
                    "skipping malformed event at {}:{}: {e}",
                    self.path.display(),
                    index + 1
                ),
            }
        }
        Ok(events)
    }
}

/// Uses the modification time of `<dir>/<dataset_id>` as the dataset's
/// upstream modification time.
#[derive(Debug, Clone)]
pub struct FileModifiedOracle {
    dir: PathBuf,
}

impl FileModifiedOracle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileModifiedOracle { dir: dir.into() }
    }
}

impl FreshnessOracle for FileModifiedOracle {
    fn modified_time(&self, dataset_id: &str) -> Result<DateTime<Utc>> {
        let modified = fs::metadata(self.dir.join(dataset_id))
            .and_then(|metadata| metadata.modified())
            .map_err(|e: io::Error| Error::Oracle {
                dataset_id: dataset_id.to_string(),
                source: e.into(),
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Fetches the event log from a source through a cache layer.
pub struct CachedEventProvider {
    name: String,
    source: Arc<dyn EventSource>,
    cache: Arc<dyn CacheLayer<EventBatch>>,
}

impl std::fmt::Debug for CachedEventProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEventProvider")
            .field("name", &self.name)
            .finish()
    }
}

impl CachedEventProvider {
    pub fn new(
        name: &str,
        source: Arc<dyn EventSource>,
        cache: Arc<dyn CacheLayer<EventBatch>>,
    ) -> Self {
        CachedEventProvider {
            name: name.to_string(),
            source,
            cache,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn load_from_source(&self) -> Result<EventBatch> {
        log::info!("loading {} events from source", self.name);
        let start = Instant::now();
        let events = self.source.fetch_all_events()?;
        log::info!(
            "loaded {} events from source, count={}, time={:.3}s",
            self.name,
            events.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(Arc::new(events))
    }

    /// Return the event log, served from cache when it is fresh.
    pub fn get_events(&self) -> Result<EventBatch> {
        self.cache.get_or_load(&mut || self.load_from_source())
    }

    /// Fetch the event log from the source and replace every cached copy.
    pub fn refresh(&self) -> Result<EventBatch> {
        self.cache.reload(&mut || self.load_from_source())
    }

    /// Warm the cache without using the result.
    pub fn preload(&self) -> Result<()> {
        self.get_events().map(|_| ())
    }
}
