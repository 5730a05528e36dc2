//! Memoizing cache in front of a [`SchemaSource`].
//!
//! Keys are the requested model names, sorted and comma-joined, so
//! `["home", "food"]` and `["food", "home"]` share an entry. Concurrent
//! misses for the same key share one in-flight fetch. Only non-empty
//! successful results are stored; when the cache is full the oldest entry
//! is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::model::ModelSchema;
use crate::traits::SchemaSource;

/// Default number of cached keys.
pub const DEFAULT_CAPACITY: usize = 32;

type SharedFetch = Shared<BoxFuture<'static, Result<Vec<ModelSchema>, String>>>;

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Vec<ModelSchema>>,
    // insertion order, oldest first
    order: VecDeque<String>,
    in_flight: HashMap<String, SharedFetch>,
}

/// Schema cache with in-flight request deduplication.
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

/// Cache key of a set of model names.
pub fn cache_key(model_names: &[String]) -> String {
    let mut sorted: Vec<&str> = model_names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(",")
}

impl SchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    /// A cache holding at most `capacity` keys. Zero disables caching but
    /// keeps in-flight deduplication.
    pub fn with_capacity(source: Arc<dyn SchemaSource>, capacity: usize) -> Self {
        Self {
            source,
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached schemas for `model_names`, without fetching.
    pub fn peek(&self, model_names: &[String]) -> Option<Vec<ModelSchema>> {
        self.inner().entries.get(&cache_key(model_names)).cloned()
    }

    /// Schemas for `model_names`, from cache or from the source.
    pub async fn get(&self, model_names: &[String]) -> anyhow::Result<Vec<ModelSchema>> {
        let key = cache_key(model_names);

        let fetch = {
            let mut inner = self.inner();
            if let Some(hit) = inner.entries.get(&key) {
                tracing::debug!(key = %key, "schema cache hit");
                return Ok(hit.clone());
            }
            match inner.in_flight.get(&key) {
                Some(pending) => {
                    tracing::debug!(key = %key, "joining in-flight schema fetch");
                    pending.clone()
                }
                None => {
                    let source = Arc::clone(&self.source);
                    let names = model_names.to_vec();
                    let fetch = async move {
                        source
                            .fetch_model_schemas(&names)
                            .await
                            .map_err(|e| format!("{e:#}"))
                    }
                    .boxed()
                    .shared();
                    inner.in_flight.insert(key.clone(), fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        {
            let mut inner = self.inner();
            if inner
                .in_flight
                .get(&key)
                .is_some_and(|pending| pending.ptr_eq(&fetch))
            {
                inner.in_flight.remove(&key);
            }
            if let Ok(schemas) = &result {
                if !schemas.is_empty() {
                    self.insert(&mut inner, key, schemas.clone());
                }
            }
        }

        result.map_err(|message| anyhow::anyhow!("failed to fetch schemas: {message}"))
    }

    fn insert(&self, inner: &mut CacheInner, key: String, schemas: Vec<ModelSchema>) {
        if self.capacity == 0 || inner.entries.contains_key(&key) {
            return;
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, schemas);
    }

    /// Drop the entry for `model_names`.
    pub fn invalidate(&self, model_names: &[String]) {
        let key = cache_key(model_names);
        let mut inner = self.inner();
        inner.entries.remove(&key);
        inner.order.retain(|k| k != &key);
    }

    pub fn clear(&self) {
        let mut inner = self.inner();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::model::SchemaField;

    struct CountingSource {
        calls: AtomicU32,
        delay: Duration,
        fail: bool,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                delay,
                fail: false,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaSource for CountingSource {
        async fn fetch_model_schemas(
            &self,
            model_names: &[String],
        ) -> anyhow::Result<Vec<ModelSchema>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("HTTP error! status: 500");
            }
            Ok(model_names
                .iter()
                .filter(|name| name.as_str() != "unknown")
                .map(|name| ModelSchema {
                    model_name: name.clone(),
                    fields: vec![SchemaField {
                        name: "id".into(),
                        field_type: "ID".into(),
                    }],
                })
                .collect())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_ignores_order() {
        assert_eq!(cache_key(&names(&["home", "food"])), "food,home");
        assert_eq!(
            cache_key(&names(&["food", "home"])),
            cache_key(&names(&["home", "food"]))
        );
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let cache = SchemaCache::new(source.clone());

        let first = cache.get(&names(&["jellyfish", "food"])).await.unwrap();
        let second = cache.get(&names(&["food", "jellyfish"])).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
        assert!(cache.peek(&names(&["jellyfish", "food"])).is_some());
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let source = Arc::new(CountingSource::new(Duration::from_millis(50)));
        let cache = SchemaCache::new(source.clone());
        let request = names(&["jellyfish"]);

        let (a, b, c) = tokio::join!(cache.get(&request), cache.get(&request), cache.get(&request));
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);
        assert_eq!(c.unwrap().len(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failures_and_empty_results_are_not_cached() {
        let failing = Arc::new(CountingSource {
            fail: true,
            ..CountingSource::new(Duration::ZERO)
        });
        let cache = SchemaCache::new(failing.clone());
        let err = cache.get(&names(&["jellyfish"])).await.unwrap_err();
        assert!(err.to_string().contains("status: 500"));
        assert!(cache.get(&names(&["jellyfish"])).await.is_err());
        assert_eq!(failing.calls(), 2);

        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let cache = SchemaCache::new(source.clone());
        assert!(cache.get(&names(&["unknown"])).await.unwrap().is_empty());
        assert!(cache.get(&names(&["unknown"])).await.unwrap().is_empty());
        assert_eq!(source.calls(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn oldest_entry_is_evicted() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let cache = SchemaCache::with_capacity(source.clone(), 2);

        cache.get(&names(&["food"])).await.unwrap();
        cache.get(&names(&["home"])).await.unwrap();
        cache.get(&names(&["jellyfish"])).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&names(&["food"])).is_none());
        assert!(cache.peek(&names(&["jellyfish"])).is_some());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let cache = SchemaCache::new(source.clone());

        cache.get(&names(&["food"])).await.unwrap();
        cache.invalidate(&names(&["food"]));
        cache.get(&names(&["food"])).await.unwrap();
        assert_eq!(source.calls(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
