use crate::error::Result;
use crate::event::Event;
use crate::scheduler::RefreshScheduler;
use crate::source::CachedEventProvider;
use crate::view::MaterializedView;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Feeds the cached event log into every registered view.
///
/// This is the refresh step the [`RefreshScheduler`] runs and the manual
/// "reload now" entry point for operators.
pub struct UpdateManager {
    provider: CachedEventProvider,
    views: Vec<Arc<dyn MaterializedView>>,
}

impl std::fmt::Debug for UpdateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateManager")
            .field("provider", &self.provider)
            .field(
                "views",
                &self.views.iter().map(|v| v.view_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl UpdateManager {
    pub fn new(provider: CachedEventProvider, views: Vec<Arc<dyn MaterializedView>>) -> Self {
        UpdateManager { provider, views }
    }

    fn apply(&self, events: &[Event]) {
        for view in &self.views {
            let start = Instant::now();
            view.apply_events(events);
            log::debug!(
                "view '{}' applied {} events in {:.3}s",
                view.view_name(),
                events.len(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    /// Fetch the event log (cache permitting) and apply it to every view.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; views are left untouched in that case.
    pub fn check_or_reload_data(&self) -> Result<()> {
        let events = self.provider.get_events()?;
        self.apply(&events);
        Ok(())
    }

    /// Bypass every cache layer, refetch from the source and apply.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; views are left untouched in that case.
    pub fn reload_data(&self) -> Result<()> {
        let events = self.provider.refresh()?;
        self.apply(&events);
        Ok(())
    }

    /// Initial load at startup. Served from the disk cache when a recent
    /// slot survives from a previous run.
    pub fn preload(&self) -> Result<()> {
        log::info!("preloading {} data", self.provider.name());
        self.check_or_reload_data()
    }

    /// A refresh closure that logs failures instead of returning them.
    pub fn refresh_fn(self: &Arc<Self>) -> Box<dyn Fn() + Send + Sync> {
        let manager = Arc::clone(self);
        Box::new(move || {
            if let Err(e) = manager.check_or_reload_data() {
                log::error!("failed to refresh {} data: {e}", manager.provider.name());
            }
        })
    }

    /// Start refreshing every `interval` on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(self: &Arc<Self>, interval: Duration) -> io::Result<RefreshScheduler> {
        RefreshScheduler::start(interval, self.refresh_fn())
    }
}
