use super::{CacheLayer, ChainLoader, LoadPolicy};
use crate::error::Result;
use crate::sync::lock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time for age checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Stored<T> {
    value: T,
    stored_at: Instant,
}

/// Keeps the last loaded value in memory for up to `max_age`.
///
/// With no `max_age` the value never expires; only `reload` or `clear`
/// replace it. A `max_age` of zero means the value is always stale, so
/// every call runs the loader.
pub struct InMemoryCache<T> {
    max_age: Option<Duration>,
    clock: Arc<dyn Clock>,
    stored: Mutex<Option<Stored<T>>>,
}

impl<T> InMemoryCache<T> {
    pub fn new(max_age: Option<Duration>) -> Self {
        Self::with_clock(max_age, Arc::new(MonotonicClock))
    }

    pub fn with_clock(max_age: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        InMemoryCache {
            max_age,
            clock,
            stored: Mutex::new(None),
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    fn is_fresh(&self, stored: &Stored<T>, now: Instant) -> bool {
        match self.max_age {
            None => true,
            Some(max_age) if max_age.is_zero() => false,
            Some(max_age) => now.saturating_duration_since(stored.stored_at) <= max_age,
        }
    }
}

impl<T> std::fmt::Debug for InMemoryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl<T> CacheLayer<T> for InMemoryCache<T>
where
    T: Clone + Send,
{
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T> {
        let mut stored = lock(&self.stored);

        if policy == LoadPolicy::PreferCached {
            if let Some(current) = stored.as_ref() {
                if self.is_fresh(current, self.clock.now()) {
                    log::debug!("in-memory cache hit");
                    return Ok(current.value.clone());
                }
                log::debug!("in-memory cache value expired");
            }
        }

        let value = loader(policy)?;
        *stored = Some(Stored {
            value: value.clone(),
            stored_at: self.clock.now(),
        });
        Ok(value)
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.stored) = None;
        Ok(())
    }
}
