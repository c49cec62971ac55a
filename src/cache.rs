//! Single-slot TTL cache with single-flight population.
//!
//! The slot holds the last aggregation result under one fixed name. A miss
//! runs the populate future while holding the fill lock, so concurrent misses
//! wait for that one population and then read its result. A failure is handed
//! to the callers that were already waiting but is never stored in the slot.

use crate::config::CacheConfig;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Logical name of the aggregated dataset slot.
pub const DATASET_CACHE_NAME: &str = "bookmarks";

struct Entry<T> {
    value: Arc<T>,
    stored_at: Instant,
}

/// The outcome of the most recent population, kept only when it failed.
struct Failure<E> {
    fill: u64,
    generation: u64,
    error: E,
}

pub struct DatasetCache<T, E> {
    name: &'static str,
    enabled: bool,
    ttl: Option<Duration>,
    slot: RwLock<Option<Entry<T>>>,
    fill: Mutex<Option<Failure<E>>>,
    /// Completed populations, successful or not.
    fills: AtomicU64,
    generation: AtomicU64,
}

impl<T, E: Clone> DatasetCache<T, E> {
    /// `ttl` of `None` keeps entries until invalidated.
    pub fn new(name: &'static str, enabled: bool, ttl: Option<Duration>) -> Self {
        Self {
            name,
            enabled,
            ttl,
            slot: RwLock::new(None),
            fill: Mutex::new(None),
            fills: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(DATASET_CACHE_NAME, config.enabled, config.ttl())
    }

    pub fn name(&self) -> &str {
        self.name
    }

    fn is_fresh(&self, entry: &Entry<T>) -> bool {
        match self.ttl {
            Some(ttl) => entry.stored_at.elapsed() < ttl,
            None => true,
        }
    }

    /// The cached value, if present and not expired.
    pub async fn get_fresh(&self) -> Option<Arc<T>> {
        if !self.enabled {
            return None;
        }
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Return the cached value or run `populate` to produce it.
    ///
    /// At most one population runs at a time. Callers that waited on a
    /// population which failed receive its error instead of starting another.
    /// A value produced while an invalidation happened is returned to the
    /// caller but not stored.
    pub async fn get_or_populate<F, Fut>(&self, populate: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return populate().await.map(Arc::new);
        }

        if let Some(value) = self.get_fresh().await {
            debug!("Cache hit for '{}'", self.name);
            return Ok(value);
        }

        let seen = self.fills.load(Ordering::SeqCst);
        let mut last_failure = self.fill.lock().await;

        // Another caller may have filled the slot while we waited.
        if let Some(value) = self.get_fresh().await {
            debug!("Cache filled concurrently for '{}'", self.name);
            return Ok(value);
        }

        if let Some(failure) = last_failure.as_ref() {
            if failure.fill > seen && failure.generation == self.generation.load(Ordering::SeqCst) {
                debug!("Sharing failed population of '{}'", self.name);
                return Err(failure.error.clone());
            }
        }

        debug!("Cache miss for '{}'", self.name);
        let generation = self.generation.load(Ordering::SeqCst);
        let result = populate().await;
        let fill = self.fills.fetch_add(1, Ordering::SeqCst) + 1;

        let value = match result {
            Ok(value) => Arc::new(value),
            Err(error) => {
                *last_failure = Some(Failure {
                    fill,
                    generation,
                    error: error.clone(),
                });
                return Err(error);
            }
        };
        *last_failure = None;

        if self.generation.load(Ordering::SeqCst) == generation {
            *self.slot.write().await = Some(Entry {
                value: Arc::clone(&value),
                stored_at: Instant::now(),
            });
        } else {
            debug!("'{}' was invalidated during population; not storing", self.name);
        }

        Ok(value)
    }

    /// Evict the slot. Populations already running will not store.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let evicted = self.slot.write().await.take().is_some();
        info!(
            "Invalidated cache '{}'{}",
            self.name,
            if evicted { "" } else { " (was empty)" }
        );
    }
}
