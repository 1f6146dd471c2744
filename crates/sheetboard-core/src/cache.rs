//! In-memory cache of the visible post list, backed by moka.
//!
//! The board keeps exactly one entry: every visible post, newest first, as
//! read at fill time. Pagination is applied on top of the cached list, so a
//! single entry serves every page and page size.
//!
//! The entry expires after [`POSTS_TTL`] and is dropped as a whole on any
//! successful write. There is no partial invalidation.
//!
//! Every invalidation bumps a generation counter. A reader takes the
//! generation before reading the table and passes it to [`PostCache::fill`],
//! which refuses to store a listing read before a later invalidation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

use crate::post::Post;

/// How long a filled listing is served before the table is read again.
pub const POSTS_TTL: Duration = Duration::from_secs(5 * 60);

const LISTING_KEY: &str = "visible_posts";

/// Cached listing with metadata.
#[derive(Clone, Debug)]
pub struct CachedListing {
    /// Visible posts, newest first.
    pub posts: Arc<Vec<Post>>,
    /// When this entry was filled.
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

/// Time-boxed cache of the visible post list.
#[derive(Clone)]
pub struct PostCache {
    inner: Cache<&'static str, CachedListing>,
    /// Held across the compare-and-insert in `fill` and the bump in `invalidate`.
    generation: Arc<Mutex<u64>>,
}

impl PostCache {
    /// Create a cache with the default five-minute TTL.
    pub fn new() -> Self {
        Self::with_ttl(POSTS_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Return the cached listing if it is still within its TTL.
    pub async fn get(&self) -> Option<CachedListing> {
        let entry = self.inner.get(LISTING_KEY).await;
        match &entry {
            Some(listing) => {
                metrics::counter!("board_cache_hits_total").increment(1);
                tracing::debug!(cached_at = %listing.cached_at, posts = listing.posts.len(), "listing cache hit");
            }
            None => {
                metrics::counter!("board_cache_misses_total").increment(1);
                tracing::debug!("listing cache miss");
            }
        }
        entry
    }

    /// Current invalidation generation. Take it before reading the table.
    pub async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// Store a listing read at `generation`.
    ///
    /// The listing is still returned when an invalidation happened since, but
    /// it is not cached.
    pub async fn fill(&self, posts: Vec<Post>, generation: u64) -> Arc<Vec<Post>> {
        let posts = Arc::new(posts);
        let current = self.generation.lock().await;
        if *current != generation {
            tracing::debug!(read_at = generation, current = *current, "skipping stale listing fill");
            return posts;
        }
        let entry = CachedListing {
            posts: posts.clone(),
            cached_at: chrono::Utc::now(),
        };
        self.inner.insert(LISTING_KEY, entry).await;
        posts
    }

    /// Drop the listing so the next read goes to the table.
    pub async fn invalidate(&self) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.inner.invalidate(LISTING_KEY).await;
        tracing::debug!(generation = *generation, "listing cache invalidated");
    }
}

impl Default for PostCache {
    fn default() -> Self {
        Self::new()
    }
}
