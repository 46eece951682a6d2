//! Read-through reputation cache
//!
//! Short-lived TTL cache over raw provider responses, keyed by
//! `provider:kind:lookup-key`. Avoids duplicate billable calls within a
//! burst of correlated indicators (e.g. IPs extracted from one email).
//! `try_get_with` coalesces concurrent misses for the same key into a
//! single in-flight fetch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use vigil_common::{error::ProviderResult, ProviderError};

/// TTL cache with single-flight miss resolution.
pub struct IntelCache {
    inner: moka::future::Cache<String, Arc<serde_json::Value>>,
}

impl IntelCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached body for `key`, or run `fetch` once (shared by
    /// all concurrent callers of the same key) and cache its result.
    /// Errors are not cached; the next caller retries.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> ProviderResult<Arc<serde_json::Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<serde_json::Value>>,
    {
        self.inner
            .try_get_with(key.to_string(), async move {
                fetch().await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<ProviderError>| (*e).clone())
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_read_through() {
        let cache = IntelCache::new(100, Duration::from_secs(60));
        let fetches = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("vt:ip:1.2.3.4", || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({"score": 42}))
                })
                .await
                .unwrap();
            assert_eq!(value["score"], 42);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = IntelCache::new(100, Duration::from_secs(60));

        let err = cache
            .get_or_fetch("vt:ip:broken", || async {
                Err(ProviderError::Http(500))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http(500)));

        // A later caller gets a fresh fetch.
        let value = cache
            .get_or_fetch("vt:ip:broken", || async {
                Ok(serde_json::json!({"ok": true}))
            })
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = Arc::new(IntelCache::new(100, Duration::from_secs(60)));
        let fetches = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("abuse:ip:9.9.9.9", || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(serde_json::json!({"confidence": 10}))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
