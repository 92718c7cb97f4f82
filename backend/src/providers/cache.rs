use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use shared::GeoPoint;
use tokio::sync::Mutex;

use super::{DirectionsProvider, ProviderError};

type WaypointKey = Vec<(i64, i64)>;

/// Remembers routed paths so regenerating after a selection change only asks
/// the provider for detours it has not seen yet.
pub struct CachedDirections {
    inner: Arc<dyn DirectionsProvider>,
    cache: Mutex<LruCache<WaypointKey, Vec<GeoPoint>>>,
}

impl CachedDirections {
    pub fn new(inner: Arc<dyn DirectionsProvider>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

/// Coordinates rounded to 1e-6 degrees.
fn cache_key(waypoints: &[GeoPoint]) -> WaypointKey {
    waypoints
        .iter()
        .map(|p| ((p.lat * 1e6).round() as i64, (p.lon * 1e6).round() as i64))
        .collect()
}

#[async_trait]
impl DirectionsProvider for CachedDirections {
    async fn route_through(&self, waypoints: &[GeoPoint]) -> Result<Vec<GeoPoint>, ProviderError> {
        let key = cache_key(waypoints);
        if let Some(path) = self.cache.lock().await.get(&key) {
            tracing::debug!("directions cache hit ({} points)", path.len());
            return Ok(path.clone());
        }

        let path = self.inner.route_through(waypoints).await?;
        if !path.is_empty() {
            self.cache.lock().await.put(key, path.clone());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingDirections {
        calls: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl DirectionsProvider for CountingDirections {
        async fn route_through(&self, waypoints: &[GeoPoint]) -> Result<Vec<GeoPoint>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                Ok(Vec::new())
            } else {
                Ok(waypoints.to_vec())
            }
        }
    }

    fn waypoints() -> Vec<GeoPoint> {
        vec![GeoPoint::new(45.0, 5.0), GeoPoint::new(45.01, 5.01)]
    }

    #[tokio::test]
    async fn repeated_request_hits_cache() {
        let inner = Arc::new(CountingDirections {
            calls: AtomicUsize::new(0),
            empty: false,
        });
        let cached = CachedDirections::new(inner.clone(), NonZeroUsize::new(8).unwrap());

        let first = cached.route_through(&waypoints()).await.unwrap();
        let second = cached.route_through(&waypoints()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_paths_are_not_cached() {
        let inner = Arc::new(CountingDirections {
            calls: AtomicUsize::new(0),
            empty: true,
        });
        let cached = CachedDirections::new(inner.clone(), NonZeroUsize::new(8).unwrap());

        cached.route_through(&waypoints()).await.unwrap();
        cached.route_through(&waypoints()).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn key_rounds_to_micro_degrees() {
        let a = cache_key(&[GeoPoint::new(45.0000001, 5.0)]);
        let b = cache_key(&[GeoPoint::new(45.0000002, 5.0)]);
        assert_eq!(a, b);
        assert_ne!(a, cache_key(&[GeoPoint::new(45.000002, 5.0)]));
    }
}
