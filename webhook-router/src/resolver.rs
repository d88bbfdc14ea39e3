// Read-through TTL cache in front of the tenant registry. Entries older than the
// TTL are treated as absent; misses are never cached so a newly registered page
// is routable immediately. Deactivation does not invalidate, so a deactivated
// page may keep resolving for at most one TTL window.

use crate::errors::StorageError;
use crate::metrics_defs::{ROUTE_CACHE_HIT, ROUTE_CACHE_MISS};
use crate::registry::RouteStore;
use moka::sync::Cache;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RouteResolver {
    store: Arc<dyn RouteStore>,
    cache: Cache<String, String>,
}

impl RouteResolver {
    pub fn new(store: Arc<dyn RouteStore>, ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { store, cache }
    }

    /// Destination for an active route, or `None` if the page is unknown or inactive.
    pub async fn resolve_destination(&self, page_id: &str) -> Result<Option<String>, StorageError> {
        if let Some(destination) = self.cache.get(page_id) {
            counter!(ROUTE_CACHE_HIT).increment(1);
            return Ok(Some(destination));
        }
        counter!(ROUTE_CACHE_MISS).increment(1);

        let destination = self.store.find_active_destination(page_id).await?;
        if let Some(destination) = &destination {
            self.cache.insert(page_id.to_string(), destination.clone());
        }
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{NewTenantRoute, TenantRoute};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts lookups so tests can tell cache hits from store reads.
    #[derive(Default)]
    struct CountingStore {
        routes: Mutex<HashMap<String, String>>,
        lookups: AtomicUsize,
    }

    impl CountingStore {
        fn set(&self, page_id: &str, destination: Option<&str>) {
            let mut routes = self.routes.lock().unwrap();
            match destination {
                Some(d) => routes.insert(page_id.into(), d.into()),
                None => routes.remove(page_id),
            };
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RouteStore for CountingStore {
        async fn list_routes(&self) -> Result<Vec<TenantRoute>, StorageError> {
            unimplemented!()
        }

        async fn upsert_route(&self, _route: &NewTenantRoute) -> Result<TenantRoute, StorageError> {
            unimplemented!()
        }

        async fn deactivate_route(&self, _page_id: &str) -> Result<bool, StorageError> {
            unimplemented!()
        }

        async fn find_active_destination(
            &self,
            page_id: &str,
        ) -> Result<Option<String>, StorageError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.routes.lock().unwrap().get(page_id).cloned())
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_store() {
        let store = Arc::new(CountingStore::default());
        store.set("123", Some("http://shop.test/hook"));
        let resolver = RouteResolver::new(store.clone(), Duration::from_secs(60), 100);

        for _ in 0..3 {
            assert_eq!(
                resolver.resolve_destination("123").await.unwrap(),
                Some("http://shop.test/hook".to_string())
            );
        }
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let store = Arc::new(CountingStore::default());
        let resolver = RouteResolver::new(store.clone(), Duration::from_secs(60), 100);

        assert_eq!(resolver.resolve_destination("123").await.unwrap(), None);

        // Registered after the miss: visible on the very next lookup
        store.set("123", Some("http://shop.test/hook"));
        assert_eq!(
            resolver.resolve_destination("123").await.unwrap(),
            Some("http://shop.test/hook".to_string())
        );
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_staleness_bounded_by_ttl() {
        let ttl = Duration::from_millis(300);
        let store = Arc::new(CountingStore::default());
        store.set("123", Some("http://shop.test/hook"));
        let resolver = RouteResolver::new(store.clone(), ttl, 100);

        assert!(resolver.resolve_destination("123").await.unwrap().is_some());

        // Deactivated in the store; the cached value may still be served inside the window
        store.set("123", None);
        assert_eq!(
            resolver.resolve_destination("123").await.unwrap(),
            Some("http://shop.test/hook".to_string())
        );

        tokio::time::sleep(ttl + Duration::from_millis(100)).await;
        assert_eq!(resolver.resolve_destination("123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let ttl = Duration::from_millis(200);
        let store = Arc::new(CountingStore::default());
        store.set("123", Some("http://old.test/hook"));
        let resolver = RouteResolver::new(store.clone(), ttl, 100);

        resolver.resolve_destination("123").await.unwrap();
        store.set("123", Some("http://new.test/hook"));
        tokio::time::sleep(ttl + Duration::from_millis(100)).await;

        assert_eq!(
            resolver.resolve_destination("123").await.unwrap(),
            Some("http://new.test/hook".to_string())
        );
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_instances_do_not_share_state() {
        let store = Arc::new(CountingStore::default());
        store.set("123", Some("http://shop.test/hook"));
        let first = RouteResolver::new(store.clone(), Duration::from_secs(60), 100);
        let second = RouteResolver::new(store.clone(), Duration::from_secs(60), 100);

        first.resolve_destination("123").await.unwrap();
        second.resolve_destination("123").await.unwrap();
        assert_eq!(store.lookups(), 2);
    }
}
