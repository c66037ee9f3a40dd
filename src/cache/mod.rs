//! Single-value caches with a shared get-or-load contract.
//!
//! Each layer stores at most one value. Layers compose into a
//! [`CacheChain`], cheapest first, so an expensive loader only runs when
//! every layer in front of it is stale.

mod disk;
mod memory;
mod upstream;

pub use disk::DiskCache;
pub use memory::{Clock, InMemoryCache, MonotonicClock};
pub use upstream::UpstreamModifiedCache;

use crate::error::{Error, Result};
use std::sync::Arc;

/// Produces a fresh value when a cache layer cannot serve one.
pub type Loader<'a, T> = &'a mut dyn FnMut() -> Result<T>;

/// The loader a layer receives from [`CacheLayer::load`].
///
/// The layer passes down the policy the layers behind it must follow: its
/// own policy when it merely missed, or [`LoadPolicy::Reload`] when it knows
/// anything cached further down is out of date.
pub type ChainLoader<'a, T> = &'a mut dyn FnMut(LoadPolicy) -> Result<T>;

/// Whether a layer may answer from its own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Serve the stored value if it is still fresh.
    PreferCached,
    /// Always run the loader and replace the stored value.
    Reload,
}

/// A get-or-load cache holding a single value.
///
/// Implementations hold their own lock for the whole of [`load`], loader
/// included, so concurrent callers on one layer never run the loader twice
/// at once. A failing loader leaves the stored value untouched.
///
/// [`load`]: CacheLayer::load
pub trait CacheLayer<T>: Send + Sync {
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T>;

    /// Clear any stored state.
    fn clear(&self) -> Result<()>;

    fn get_or_load(&self, loader: Loader<'_, T>) -> Result<T> {
        self.load(&mut |_| loader(), LoadPolicy::PreferCached)
    }

    /// Run the loader regardless of freshness and store its result.
    fn reload(&self, loader: Loader<'_, T>) -> Result<T> {
        self.load(&mut |_| loader(), LoadPolicy::Reload)
    }
}

/// Never stores anything; every call runs the loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<T> CacheLayer<T> for PassThrough {
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T> {
        loader(policy)
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// An ordered stack of cache layers, cheapest first.
///
/// A request enters the first layer; on a miss that layer's loader is the
/// rest of the chain, and the original loader sits behind the last layer.
/// A layer that reloads makes every layer behind it reload too. `reload`
/// and `clear` reach every layer; `clear` keeps going past a failing layer
/// and reports the first error.
pub struct CacheChain<T> {
    layers: Vec<Arc<dyn CacheLayer<T>>>,
}

impl<T> CacheChain<T> {
    /// Build a chain from at least one layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `layers` is empty.
    pub fn new(layers: Vec<Arc<dyn CacheLayer<T>>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Config(
                "a cache chain needs at least one layer".to_string(),
            ));
        }
        Ok(CacheChain { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<T> std::fmt::Debug for CacheChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

fn load_through<T>(
    layers: &[Arc<dyn CacheLayer<T>>],
    loader: ChainLoader<'_, T>,
    policy: LoadPolicy,
) -> Result<T> {
    match layers.split_first() {
        None => loader(policy),
        Some((layer, rest)) => layer.load(
            &mut |downstream| load_through(rest, &mut *loader, downstream),
            policy,
        ),
    }
}

impl<T> CacheLayer<T> for CacheChain<T>
where
    T: 'static,
{
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T> {
        load_through(&self.layers, loader, policy)
    }

    fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for layer in &self.layers {
            if let Err(e) = layer.clear() {
                log::warn!("failed to clear cache layer: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
