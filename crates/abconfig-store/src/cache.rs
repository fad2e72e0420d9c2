//! Read-through cache for the experiment dataset using moka
//!
//! Holds a single entry: the whole [`ExperimentSet`] snapshot. Writers never
//! patch it; they invalidate, and the next reader rebuilds from the record
//! store. Readers therefore see either the old or the new snapshot.
//!
//! Every invalidation bumps a generation counter. A load that overlapped an
//! invalidation returns its snapshot without leaving it cached.

use crate::error::Result;
use crate::snapshot::ExperimentSet;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Key of the single dataset entry
const ALL_EXPERIMENTS: &str = "allexperiment";

/// Cache holding the current dataset snapshot
#[derive(Debug, Clone)]
pub struct ExperimentCache {
    inner: Cache<&'static str, Arc<ExperimentSet>>,
    generation: Arc<AtomicU64>,
}

impl ExperimentCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create cache whose snapshot also expires after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached snapshot, if present
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Arc<ExperimentSet>> {
        self.inner.get(&ALL_EXPERIMENTS)
    }

    /// Store a freshly built snapshot
    #[inline]
    pub fn insert(&self, set: Arc<ExperimentSet>) {
        self.inner.insert(ALL_EXPERIMENTS, set);
    }

    /// Cached snapshot, or build and cache one
    ///
    /// # Errors
    /// Returns the loader's error; nothing is cached in that case
    pub fn try_get_or_load<F>(&self, load: F) -> Result<Arc<ExperimentSet>>
    where
        F: FnOnce() -> Result<ExperimentSet>,
    {
        if let Some(cached) = self.get() {
            return Ok(cached);
        }

        let started = self.generation();
        let set = Arc::new(load()?);
        self.insert(Arc::clone(&set));

        // A write that landed during the load may have been read as the old rows
        if self.generation() == started {
            tracing::debug!(experiments = set.len(), "experiment cache rebuilt");
        } else {
            self.inner.invalidate(&ALL_EXPERIMENTS);
            tracing::debug!("dataset changed during load, snapshot not cached");
        }
        Ok(set)
    }

    /// Drop the snapshot
    #[inline]
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(&ALL_EXPERIMENTS);
    }

    /// Number of invalidations so far
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a snapshot is cached
    #[inline]
    #[must_use]
    pub fn contains(&self) -> bool {
        self.inner.contains_key(&ALL_EXPERIMENTS)
    }
}

impl Default for ExperimentCache {
    fn default() -> Self {
        Self::new(16)
    }
}
