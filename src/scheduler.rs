use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Run `refresh_fn`, containing any panic. Returns whether it completed.
fn run_contained(refresh_fn: &(dyn Fn() + Send + Sync)) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| refresh_fn())) {
        Ok(()) => true,
        Err(payload) => {
            log::error!("refresh panicked: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

/// Calls a refresh function on a fixed interval from a background thread.
///
/// The thread sleeps first, then refreshes, forever. It is detached:
/// dropping the scheduler does not stop it, and it never delays process
/// exit. There is no retry or backoff; a refresh that fails simply waits
/// for the next tick, so `refresh_fn` should log its own errors.
pub struct RefreshScheduler {
    interval: Duration,
    refresh_fn: RefreshFn,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl RefreshScheduler {
    /// Spawn the refresh thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(
        interval: Duration,
        refresh_fn: impl Fn() + Send + Sync + 'static,
    ) -> io::Result<Self> {
        let refresh_fn: RefreshFn = Arc::new(refresh_fn);
        let loop_fn = Arc::clone(&refresh_fn);
        let handle = thread::Builder::new()
            .name("curatefold-refresh".to_string())
            .spawn(move || {
                log::info!("refresh thread running, interval={interval:?}");
                loop {
                    thread::sleep(interval);
                    run_contained(loop_fn.as_ref());
                }
            })?;
        Ok(RefreshScheduler {
            interval,
            refresh_fn,
            handle,
        })
    }

    /// Refresh now, on the calling thread.
    ///
    /// May overlap a timer-driven refresh; the views' own locks keep each
    /// batch application atomic. Returns `false` if the refresh panicked.
    pub fn trigger(&self) -> bool {
        run_contained(self.refresh_fn.as_ref())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}
