use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{DashboardError, DashboardResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Applications,
    Snapshots,
    ProtectionPlans,
    StorageClusters,
    RestoreJobs,
}

struct Entry {
    value: Value,
    stored_at: Instant,
}

/// TTL-bound read cache for list views.
///
/// A failed refresh serves the stale entry when one exists.
#[derive(Clone)]
pub struct ResourceCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<CacheKey, Entry>>>,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> DashboardResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DashboardResult<T>>,
    {
        {
            let r = self.entries.read().await;
            if let Some(e) = r.get(&key) {
                if e.stored_at.elapsed() < self.ttl {
                    debug!(?key, "cache hit");
                    return decode(e.value.clone());
                }
            }
        }

        match fetch().await {
            Ok(fresh) => {
                let value = serde_json::to_value(&fresh)
                    .map_err(|e| DashboardError::Internal(e.to_string()))?;
                let mut w = self.entries.write().await;
                w.insert(
                    key,
                    Entry {
                        value,
                        stored_at: Instant::now(),
                    },
                );
                Ok(fresh)
            }
            Err(err) => {
                let r = self.entries.read().await;
                match r.get(&key) {
                    Some(stale) => {
                        warn!(?key, error = %err, "refresh failed, serving stale entry");
                        decode(stale.value.clone())
                    }
                    None => Err(err),
                }
            }
        }
    }

    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let mut w = self.entries.write().await;
        for k in keys {
            w.remove(k);
        }
    }
}

fn decode<T: DeserializeOwned>(v: Value) -> DashboardResult<T> {
    serde_json::from_value(v).map_err(|e| DashboardError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn serves_fresh_then_refetches_after_ttl() {
        let cache = ResourceCache::new(Duration::from_secs(30));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let fetch = move || async move {
            Ok::<_, DashboardError>(vec![calls.fetch_add(1, Ordering::SeqCst)])
        };

        assert_eq!(cache.get_or_fetch(CacheKey::Snapshots, fetch).await.unwrap(), vec![0]);
        assert_eq!(cache.get_or_fetch(CacheKey::Snapshots, fetch).await.unwrap(), vec![0]);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get_or_fetch(CacheKey::Snapshots, fetch).await.unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_on_error_and_invalidate() {
        let cache = ResourceCache::new(Duration::from_secs(1));
        let v: Vec<u32> = cache
            .get_or_fetch(CacheKey::Applications, || async { Ok(vec![7]) })
            .await
            .unwrap();
        assert_eq!(v, vec![7]);
        tokio::time::advance(Duration::from_secs(2)).await;

        let v: Vec<u32> = cache
            .get_or_fetch(CacheKey::Applications, || async {
                Err(DashboardError::Internal("down".into()))
            })
            .await
            .unwrap();
        assert_eq!(v, vec![7]);

        cache.invalidate(&[CacheKey::Applications]).await;
        let r: DashboardResult<Vec<u32>> = cache
            .get_or_fetch(CacheKey::Applications, || async {
                Err(DashboardError::Internal("down".into()))
            })
            .await;
        assert!(r.is_err());
    }
}
