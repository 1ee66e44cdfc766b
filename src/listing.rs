//! Resource lister with a single-slot listing cache.
//!
//! Listing the source account burns admin-API quota (500 calls/hour), so
//! results are cached to a JSON file keyed by the requested prefix. A cache
//! whose prefix matches is returned as-is — even when marked partial — which
//! trades freshness for the ability to keep migrating through a rate-limit
//! window. A rate-limit abort mid-fetch persists whatever accumulated so far
//! as a partial cache; the next run bootstraps from it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cloudinary::{MediaApi, Resource};

/// On-disk cache schema.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedListing {
    pub folder_prefix: String,
    pub resources: Vec<Resource>,
    pub timestamp: DateTime<Utc>,
    pub partial: bool,
    pub fetch_count: u32,
}

/// Paginated enumeration of source resources under a path prefix.
pub struct ResourceLister {
    api: Arc<dyn MediaApi>,
    cache_path: PathBuf,
    /// Inter-page delay keeping the fetch under published rate limits.
    page_delay: Duration,
}

impl ResourceLister {
    pub fn new(api: Arc<dyn MediaApi>, cache_path: impl Into<PathBuf>, page_delay: Duration) -> Self {
        Self {
            api,
            cache_path: cache_path.into(),
            page_delay,
        }
    }

    /// Enumerate all resources under `prefix`, cache-or-fetch.
    ///
    /// Errors never propagate: a rate-limit abort returns (and caches) the
    /// partial accumulation, any other fetch error returns whatever
    /// accumulated — possibly nothing, which the caller reports as "nothing
    /// to migrate". Ordering is whatever the provider returns.
    pub async fn list(&self, prefix: &str) -> Vec<Resource> {
        if let Some(cached) = self.load_cache(prefix) {
            tracing::info!(
                count = cached.resources.len(),
                cached_at = %cached.timestamp,
                "Using cached resource listing"
            );
            if cached.partial {
                tracing::warn!("Cache is partial (fetch hit the rate limit); proceeding with it");
            }
            return cached.resources;
        }

        tracing::info!(prefix, "Fetching resource listing from source");

        let mut all_resources: Vec<Resource> = Vec::new();
        let mut next_cursor: Option<String> = None;
        let mut fetch_count: u32 = 0;

        loop {
            fetch_count += 1;
            match self.api.list_page(prefix, next_cursor.as_deref()).await {
                Ok(page) => {
                    all_resources.extend(page.resources);
                    tracing::info!(
                        total = all_resources.len(),
                        api_call = fetch_count,
                        "Fetched listing page"
                    );
                    next_cursor = page.next_cursor;
                    if next_cursor.is_none() {
                        break;
                    }
                    tokio::time::sleep(self.page_delay).await;
                }
                Err(e) if e.is_rate_limit() && !all_resources.is_empty() => {
                    tracing::warn!(
                        accumulated = all_resources.len(),
                        "Rate limit hit mid-fetch; caching partial listing"
                    );
                    self.store_cache(prefix, &all_resources, true, fetch_count);
                    return all_resources;
                }
                Err(e) => {
                    tracing::warn!("Error fetching resource listing: {}", e);
                    return all_resources;
                }
            }
        }

        if !all_resources.is_empty() {
            self.store_cache(prefix, &all_resources, false, fetch_count);
        }
        tracing::info!(total = all_resources.len(), "Resource listing complete");
        all_resources
    }

    /// Read the cache slot; `None` unless it exists, parses, and its stored
    /// prefix matches the requested one.
    fn load_cache(&self, prefix: &str) -> Option<CachedListing> {
        let contents = match std::fs::read_to_string(&self.cache_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cache read error at {}: {}", self.cache_path.display(), e);
                return None;
            }
        };
        let cached: CachedListing = match serde_json::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Cache parse error at {}: {}", self.cache_path.display(), e);
                return None;
            }
        };
        (cached.folder_prefix == prefix).then_some(cached)
    }

    /// Replace the cache slot wholesale. Write failures are warnings — the
    /// run proceeds on the in-memory listing either way.
    fn store_cache(&self, prefix: &str, resources: &[Resource], partial: bool, fetch_count: u32) {
        let cached = CachedListing {
            folder_prefix: prefix.to_string(),
            resources: resources.to_vec(),
            timestamp: Utc::now(),
            partial,
            fetch_count,
        };
        let serialized = match serde_json::to_string_pretty(&cached) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Could not serialize listing cache: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.cache_path, serialized) {
            tracing::warn!("Could not save listing cache to {}: {}", self.cache_path.display(), e);
        } else {
            tracing::info!(count = resources.len(), partial, "Cached resource listing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudinary::{ApiError, ResourcePage, UploadReceipt};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted lister: pops one pre-baked page result per `list_page` call.
    struct ScriptedApi {
        pages: Mutex<VecDeque<Result<ResourcePage, ApiError>>>,
        list_calls: AtomicU32,
    }

    impl ScriptedApi {
        fn new(pages: Vec<Result<ResourcePage, ApiError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                list_calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MediaApi for ScriptedApi {
        async fn list_page(
            &self,
            _prefix: &str,
            _cursor: Option<&str>,
        ) -> Result<ResourcePage, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted pages exhausted")
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, ApiError> {
            unreachable!("lister never downloads")
        }

        async fn create_folder(&self, _folder: &str) -> Result<(), ApiError> {
            unreachable!("lister never creates folders")
        }

        async fn upload(&self, _public_id: &str, _data: Vec<u8>) -> Result<UploadReceipt, ApiError> {
            unreachable!("lister never uploads")
        }
    }

    fn resource(public_id: &str) -> Resource {
        Resource {
            public_id: public_id.to_string(),
            folder: String::new(),
            secure_url: format!("https://res.example.com/{}", public_id),
            format: "jpg".to_string(),
        }
    }

    fn page(ids: &[&str], next_cursor: Option<&str>) -> ResourcePage {
        serde_json::from_value(serde_json::json!({
            "resources": ids.iter().map(|id| serde_json::json!({
                "public_id": id,
                "secure_url": format!("https://res.example.com/{}", id),
            })).collect::<Vec<_>>(),
            "next_cursor": next_cursor,
        }))
        .unwrap()
    }

    fn rate_limit_err() -> ApiError {
        ApiError::Status {
            status: 420,
            endpoint: "resources/image/upload".into(),
            detail: "Rate Limit Exceeded".into(),
        }
    }

    fn server_err() -> ApiError {
        ApiError::Status {
            status: 500,
            endpoint: "resources/image/upload".into(),
            detail: "internal error".into(),
        }
    }

    fn lister(api: Arc<dyn MediaApi>, dir: &tempfile::TempDir) -> ResourceLister {
        ResourceLister::new(api, dir.path().join("resource_cache.json"), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_full_fetch_caches_complete_listing() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(&["media/a", "media/b"], Some("cursor-1"))),
            Ok(page(&["media/c"], None)),
        ]));
        let lister = lister(api.clone(), &dir);

        let resources = lister.list("media").await;
        assert_eq!(resources.len(), 3);
        assert_eq!(api.calls(), 2);

        let cached: CachedListing = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("resource_cache.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(cached.folder_prefix, "media");
        assert!(!cached.partial);
        assert_eq!(cached.fetch_count, 2);
        assert_eq!(cached.resources.len(), 3);
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CachedListing {
            folder_prefix: "media".into(),
            resources: vec![resource("media/a"), resource("media/b")],
            timestamp: Utc::now(),
            partial: false,
            fetch_count: 1,
        };
        std::fs::write(
            dir.path().join("resource_cache.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        let api = Arc::new(ScriptedApi::new(vec![]));
        let lister = lister(api.clone(), &dir);

        let resources = lister.list("media").await;
        assert_eq!(resources.len(), 2);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_cache_is_still_used() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CachedListing {
            folder_prefix: "media".into(),
            resources: vec![resource("media/a")],
            timestamp: Utc::now(),
            partial: true,
            fetch_count: 3,
        };
        std::fs::write(
            dir.path().join("resource_cache.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        let api = Arc::new(ScriptedApi::new(vec![]));
        let resources = lister(api.clone(), &dir).list("media").await;
        assert_eq!(resources.len(), 1);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_prefix_mismatch_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CachedListing {
            folder_prefix: "media/old-scope".into(),
            resources: vec![resource("media/old-scope/a")],
            timestamp: Utc::now(),
            partial: false,
            fetch_count: 1,
        };
        std::fs::write(
            dir.path().join("resource_cache.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        let api = Arc::new(ScriptedApi::new(vec![Ok(page(&["media/new-scope/x"], None))]));
        let lister = lister(api.clone(), &dir);

        let resources = lister.list("media/new-scope").await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].public_id, "media/new-scope/x");
        assert_eq!(api.calls(), 1);

        // The slot now holds the new prefix.
        let cached: CachedListing = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("resource_cache.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(cached.folder_prefix, "media/new-scope");
    }

    #[tokio::test]
    async fn test_rate_limit_persists_partial_cache() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(&["media/a", "media/b", "media/c"], Some("cursor-1"))),
            Err(rate_limit_err()),
        ]));
        let lister = lister(api.clone(), &dir);

        let resources = lister.list("media").await;
        assert_eq!(resources.len(), 3);

        let cached: CachedListing = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("resource_cache.json")).unwrap(),
        )
        .unwrap();
        assert!(cached.partial);
        assert_eq!(cached.resources.len(), 3);

        // A later call for the same prefix bootstraps from the partial cache.
        let again = lister.list("media").await;
        assert_eq!(again.len(), 3);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_with_nothing_accumulated_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new(vec![Err(rate_limit_err())]));
        let lister = lister(api, &dir);

        assert!(lister.list("media").await.is_empty());
        assert!(!dir.path().join("resource_cache.json").exists());
    }

    #[tokio::test]
    async fn test_other_error_returns_accumulated_without_caching() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(&["media/a"], Some("cursor-1"))),
            Err(server_err()),
        ]));
        let lister = lister(api, &dir);

        let resources = lister.list("media").await;
        assert_eq!(resources.len(), 1);
        assert!(!dir.path().join("resource_cache.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_fetch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resource_cache.json"), "{not json").unwrap();

        let api = Arc::new(ScriptedApi::new(vec![Ok(page(&["media/a"], None))]));
        let lister = lister(api.clone(), &dir);

        let resources = lister.list("media").await;
        assert_eq!(resources.len(), 1);
        assert_eq!(api.calls(), 1);
    }
}
