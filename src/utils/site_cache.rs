use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{post::Post, site::Site};
use crate::store::Store;

/// A post together with the site whose geofence and threshold apply to it.
#[derive(Debug, Clone)]
pub struct PostSite {
    pub post: Post,
    pub site: Site,
}

/// TTL cache of post id => geofence context.
#[derive(Clone)]
pub struct SiteCache {
    store: Arc<dyn Store>,
    entries: Cache<Uuid, PostSite>,
}

impl SiteCache {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            store,
            entries: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Loads on miss; concurrent misses for one post share a single lookup.
    pub async fn for_post(&self, post_id: Uuid) -> AppResult<PostSite> {
        let store = self.store.clone();
        self.entries
            .try_get_with(post_id, async move {
                let post = store
                    .post_by_id(post_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Post", post_id))?;
                let site = store
                    .site_by_id(post.site_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Site", post.site_id))?;
                Ok::<_, AppError>(PostSite { post, site })
            })
            .await
            .map_err(|e: Arc<AppError>| (*e).clone())
    }
}
