//! Process-wide registries for snapshots and caches.
//!
//! The [`Registry`] owns two concurrent maps: snapshots interned by
//! content id, and caches deduplicated by connection identity. It is an
//! explicit service with a documented lifecycle: created once, entries
//! never evicted unless [`Registry::clear`] is called. Most callers use
//! the process singleton via [`Registry::global`]; tests may construct
//! their own isolated instance.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use futures::future::join_all;

use crate::cache::{CacheConfig, SchemaCache};
use crate::error::{redact_connection_identity, LoadError};
use crate::executor::QueryExecutor;
use crate::snapshot::SchemaSnapshot;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Process-wide snapshot and cache registry.
///
/// A `Registry` is a cheap clone-shareable handle: clones observe the
/// same underlying maps. Caches created through [`Registry::cache`]
/// intern their snapshots into the registry that created them.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    snapshots: DashMap<String, Arc<SchemaSnapshot>>,
    caches: DashMap<String, Arc<SchemaCache>>,
}

impl Registry {
    /// Creates an empty, isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process singleton.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Interns a freshly assembled snapshot, returning the shared
    /// instance when a structurally identical snapshot already exists.
    pub(crate) fn intern_snapshot(&self, snapshot: SchemaSnapshot) -> Arc<SchemaSnapshot> {
        self.inner
            .snapshots
            .entry(snapshot.id().to_string())
            .or_insert_with(|| Arc::new(snapshot))
            .clone()
    }

    /// Looks up an interned snapshot by content id.
    #[must_use]
    pub fn snapshot_by_id(&self, id: &str) -> Option<Arc<SchemaSnapshot>> {
        self.inner.snapshots.get(id).map(|entry| entry.clone())
    }

    /// Returns the cache for a connection identity, creating it on first
    /// use. Concurrent callers for the same identity get the same
    /// instance; the executor and config of the first creator win. The
    /// cache interns its snapshots into this registry.
    pub fn cache(
        &self,
        connection: &str,
        executor: Arc<dyn QueryExecutor>,
        config: CacheConfig,
    ) -> Arc<SchemaCache> {
        self.inner
            .caches
            .entry(connection.to_string())
            .or_insert_with(|| {
                Arc::new(SchemaCache::with_registry(
                    connection,
                    executor,
                    config,
                    self.clone(),
                ))
            })
            .clone()
    }

    /// The currently registered caches.
    #[must_use]
    pub fn caches(&self) -> Vec<Arc<SchemaCache>> {
        self.inner.caches.iter().map(|entry| entry.clone()).collect()
    }

    /// Concurrently reloads every registered cache, waiting for all.
    ///
    /// # Errors
    /// [`LoadError::Aggregate`] collecting every failed cache; no failure
    /// is dropped.
    pub async fn reload_all(&self) -> Result<(), LoadError> {
        let caches = self.caches();
        let results = join_all(caches.iter().map(|cache| cache.reload())).await;
        let failures: Vec<(String, LoadError)> = caches
            .iter()
            .zip(results)
            .filter_map(|(cache, result)| {
                result
                    .err()
                    .map(|e| (redact_connection_identity(cache.connection()), e))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Aggregate { failures })
        }
    }

    /// Drops every registered snapshot and cache.
    pub fn clear(&self) {
        self.inner.snapshots.clear();
        self.inner.caches.clear();
    }
}
