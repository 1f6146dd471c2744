//! Post and settings services.
//!
//! [`Board`] owns the settings loaded at startup, the listing cache and the
//! write lock. Every mutation follows the same shape:
//!
//! 1. Check the shared password (before touching the lock).
//! 2. Acquire the write lock, waiting at most [`WRITE_LOCK_WAIT`].
//! 3. Re-read whatever the write depends on from the table.
//! 4. Write, then drop the cached listing.
//!
//! The lock only serializes writers that go through this board. Writers that
//! bypass it can still race on ID assignment.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::cache::PostCache;
use crate::lock::{TimedLock, WRITE_LOCK_WAIT};
use crate::post::{Post, PostDraft, PostPage, paginate};
use crate::settings::{PageSize, Settings, SettingsStore};
use crate::store::{PostTable, RowNumber};
use crate::{Error, Result};

/// Display settings safe to hand to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub posts_per_page: PageSize,
}

/// Bulletin-board service over a post table and settings store.
pub struct Board {
    table: Arc<dyn PostTable>,
    settings_store: Arc<dyn SettingsStore>,
    settings: RwLock<Settings>,
    cache: PostCache,
    write_lock: TimedLock,
}

impl Board {
    /// Load settings and build the board.
    pub fn open(table: Arc<dyn PostTable>, settings_store: Arc<dyn SettingsStore>) -> Result<Self> {
        Self::with_options(table, settings_store, PostCache::new(), WRITE_LOCK_WAIT)
    }

    /// Build the board with an explicit cache and lock wait.
    pub fn with_options(
        table: Arc<dyn PostTable>,
        settings_store: Arc<dyn SettingsStore>,
        cache: PostCache,
        lock_wait: Duration,
    ) -> Result<Self> {
        let settings = settings_store.load()?;

        tracing::info!(
            storage_folder = %settings.storage_folder,
            page_size = settings.page_size.get(),
            "board settings loaded"
        );

        Ok(Self {
            table,
            settings_store,
            settings: RwLock::new(settings),
            cache,
            write_lock: TimedLock::new("post table", lock_wait),
        })
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            posts_per_page: self.settings.read().page_size,
        }
    }

    /// Whether `password` matches the shared board password.
    pub fn verify_password(&self, password: &str) -> bool {
        self.settings.read().password == password
    }

    fn authorize(&self, password: &str) -> Result<()> {
        if self.verify_password(password) {
            Ok(())
        } else {
            tracing::debug!("rejected mutation with wrong password");
            Err(Error::Auth)
        }
    }

    /// List visible posts, newest first.
    ///
    /// `page` defaults to 1 and `page_size` to the configured page size.
    pub async fn list(&self, page: Option<u32>, page_size: Option<u32>) -> Result<PostPage> {
        let page_size = match page_size {
            Some(0) => {
                return Err(Error::Validation("page size must be at least 1".to_string()));
            }
            Some(n) => n,
            None => self.settings.read().page_size.get(),
        };
        let page = page.unwrap_or(1);

        let posts = match self.cache.get().await {
            Some(listing) => listing.posts,
            None => {
                let generation = self.cache.generation().await;
                let mut visible: Vec<Post> = self
                    .table
                    .read_rows()?
                    .into_iter()
                    .filter(|post| post.visible)
                    .collect();
                // Table is append order; listings are newest first.
                visible.reverse();
                self.cache.fill(visible, generation).await
            }
        };

        Ok(paginate(&posts, page, page_size))
    }

    /// Create a post and return it as stored.
    pub async fn create(&self, draft: PostDraft, password: &str) -> Result<Post> {
        self.authorize(password)?;
        draft.validate()?;
        let _guard = self.write_lock.acquire().await?;

        let next_id = self
            .table
            .read_id_column()?
            .iter()
            .map(|cell| cell.id)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let post = Post {
            id: next_id,
            name: draft.name,
            text: draft.text,
            created_at: now,
            updated_at: now,
            visible: true,
        };
        self.table.append_row(&post)?;
        self.cache.invalidate().await;

        metrics::counter!("board_posts_created_total").increment(1);
        tracing::info!(id = post.id, "post created");

        Ok(post)
    }

    /// Replace a post's name and text, keeping its creation time.
    pub async fn update(&self, id: i64, draft: PostDraft, password: &str) -> Result<Post> {
        self.authorize(password)?;
        draft.validate()?;
        let _guard = self.write_lock.acquire().await?;

        let row = self.find_row(id)?;
        self.table
            .write_content(row, &draft.name, &draft.text, Utc::now())?;
        self.cache.invalidate().await;

        metrics::counter!("board_posts_updated_total").increment(1);
        tracing::info!(id, "post updated");

        self.table.read_row(row)
    }

    /// Hide a post from listings. The row is kept.
    pub async fn soft_delete(&self, id: i64, password: &str) -> Result<()> {
        self.authorize(password)?;
        let _guard = self.write_lock.acquire().await?;

        let row = self.find_row(id)?;
        self.table.write_visible(row, false)?;
        self.cache.invalidate().await;

        metrics::counter!("board_posts_hidden_total").increment(1);
        tracing::info!(id, "post hidden");

        Ok(())
    }

    /// Change the default page size.
    pub async fn set_page_size(&self, n: u32) -> Result<PageSize> {
        let page_size = PageSize::try_from(n)?;
        let _guard = self.write_lock.acquire().await?;

        self.settings_store.write_page_size(page_size)?;
        self.settings.write().page_size = page_size;
        self.cache.invalidate().await;

        tracing::info!(page_size = page_size.get(), "page size updated");

        Ok(page_size)
    }

    /// Linear scan of the ID column. Must be called with the write lock held.
    fn find_row(&self, id: i64) -> Result<RowNumber> {
        self.table
            .read_id_column()?
            .into_iter()
            .find(|cell| cell.id == id)
            .map(|cell| cell.row)
            .ok_or(Error::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_PASSWORD;
    use crate::store::Workbook;
    use std::sync::mpsc;

    const PW: &str = DEFAULT_PASSWORD;

    fn board() -> (Board, Workbook) {
        let workbook = Workbook::open_in_memory().unwrap();
        let board = Board::open(
            Arc::new(workbook.posts()),
            Arc::new(workbook.settings()),
        )
        .unwrap();
        (board, workbook)
    }

    fn draft(name: &str) -> PostDraft {
        PostDraft::new(name, format!("<p>{name}</p>"))
    }

    fn ids(page: &PostPage) -> Vec<i64> {
        page.posts.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_ids_increase_across_deletes() {
        let (board, _wb) = board();

        let a = board.create(draft("a"), PW).await.unwrap();
        let b = board.create(draft("b"), PW).await.unwrap();
        board.soft_delete(b.id, PW).await.unwrap();
        let c = board.create(draft("c"), PW).await.unwrap();
        board.soft_delete(c.id, PW).await.unwrap();
        let d = board.create(draft("d"), PW).await.unwrap();

        assert_eq!([a.id, b.id, c.id, d.id], [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_deleted_post_hidden_but_retained() {
        let (board, wb) = board();
        for name in ["first", "second", "third"] {
            board.create(draft(name), PW).await.unwrap();
        }

        board.soft_delete(2, PW).await.unwrap();

        let page = board.list(Some(1), None).await.unwrap();
        assert_eq!(ids(&page), vec![3, 1]);
        assert_eq!(page.pagination.total_posts, 2);

        let rows = wb.posts().read_rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!rows[1].visible);
    }

    #[tokio::test]
    async fn test_pagination_over_five_posts() {
        let (board, _wb) = board();
        for i in 1..=5 {
            board.create(draft(&format!("post {i}")), PW).await.unwrap();
        }

        let first = board.list(Some(1), Some(2)).await.unwrap();
        assert_eq!(ids(&first), vec![5, 4]);

        let third = board.list(Some(3), Some(2)).await.unwrap();
        assert_eq!(ids(&third), vec![1]);

        let fourth = board.list(Some(4), Some(2)).await.unwrap();
        assert!(fourth.posts.is_empty());
        assert_eq!(fourth.pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let (board, _wb) = board();
        let original = board.create(draft("before"), PW).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = board
            .update(original.id, PostDraft::new("after", "changed"), PW)
            .await
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.name, "after");
        assert_eq!(updated.text, "changed");
        assert!(updated.visible);
    }

    #[tokio::test]
    async fn test_write_visible_within_ttl() {
        let (board, _wb) = board();
        board.create(draft("one"), PW).await.unwrap();

        let before = board.list(None, None).await.unwrap();
        assert_eq!(before.pagination.total_posts, 1);

        board.create(draft("two"), PW).await.unwrap();
        let after = board.list(None, None).await.unwrap();
        assert_eq!(after.pagination.total_posts, 2);
        assert_eq!(after.posts[0].name, "two");
    }

    #[tokio::test]
    async fn test_listing_served_from_cache_within_ttl() {
        let (board, wb) = board();
        board.create(draft("one"), PW).await.unwrap();
        board.list(None, None).await.unwrap();

        // A write that bypasses the board does not invalidate the cache.
        let now = Utc::now();
        wb.posts()
            .append_row(&Post {
                id: 99,
                name: "external".to_string(),
                text: String::new(),
                created_at: now,
                updated_at: now,
                visible: true,
            })
            .unwrap();

        let page = board.list(None, None).await.unwrap();
        assert_eq!(ids(&page), vec![1]);
    }

    #[tokio::test]
    async fn test_set_page_size_validation_and_default() {
        let (board, wb) = board();

        let err = board.set_page_size(7).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        for i in 1..=12 {
            board.create(draft(&format!("p{i}")), PW).await.unwrap();
        }
        assert_eq!(board.list(None, None).await.unwrap().posts.len(), 5);

        board.set_page_size(10).await.unwrap();
        assert_eq!(board.display_settings().posts_per_page.get(), 10);

        let page = board.list(None, None).await.unwrap();
        assert_eq!(page.posts.len(), 10);
        assert_eq!(page.pagination.total_pages, 2);

        assert_eq!(wb.settings().load().unwrap().page_size.get(), 10);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let (board, wb) = board();

        let err = board.create(draft("x"), "nope").await.unwrap_err();
        assert!(matches!(err, Error::Auth));
        assert!(wb.posts().read_rows().unwrap().is_empty());

        board.create(draft("x"), PW).await.unwrap();
        assert!(matches!(
            board.update(1, draft("y"), "nope").await.unwrap_err(),
            Error::Auth
        ));
        assert!(matches!(
            board.soft_delete(1, "nope").await.unwrap_err(),
            Error::Auth
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let (board, _wb) = board();
        board.create(draft("x"), PW).await.unwrap();

        assert!(matches!(
            board.update(42, draft("y"), PW).await.unwrap_err(),
            Error::NotFound(42)
        ));
        assert!(matches!(
            board.soft_delete(42, PW).await.unwrap_err(),
            Error::NotFound(42)
        ));

        // The failed writes released the lock.
        board.create(draft("z"), PW).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_on_empty_table_not_found() {
        let (board, _wb) = board();
        assert!(matches!(
            board.update(1, draft("y"), PW).await.unwrap_err(),
            Error::NotFound(1)
        ));
    }

    #[tokio::test]
    async fn test_busy_when_lock_held() {
        let workbook = Workbook::open_in_memory().unwrap();
        let board = Board::with_options(
            Arc::new(workbook.posts()),
            Arc::new(workbook.settings()),
            PostCache::new(),
            Duration::from_millis(20),
        )
        .unwrap();

        let _held = board.write_lock.acquire().await.unwrap();
        let err = board.create(draft("x"), PW).await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));

        let err = board.set_page_size(10).await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let (board, _wb) = board();
        assert!(matches!(
            board.list(Some(1), Some(0)).await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let (board, _wb) = board();
        assert!(board.verify_password(PW));
        assert!(!board.verify_password(""));
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_unique_ids() {
        let (board, _wb) = board();
        let board = Arc::new(board);

        let mut handles = Vec::new();
        for i in 0..10 {
            let board = board.clone();
            handles.push(tokio::spawn(async move {
                board.create(draft(&format!("c{i}")), PW).await.map(|p| p.id)
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    /// Post table that can pause one `read_rows` call after it has read.
    struct PausingTable {
        inner: crate::store::SqlitePostTable,
        pause: parking_lot::Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl PostTable for PausingTable {
        fn read_rows(&self) -> Result<Vec<Post>> {
            let rows = self.inner.read_rows()?;
            if let Some((read_done, resume)) = self.pause.lock().take() {
                read_done.send(()).unwrap();
                resume.recv().unwrap();
            }
            Ok(rows)
        }

        fn read_id_column(&self) -> Result<Vec<crate::store::IdCell>> {
            self.inner.read_id_column()
        }

        fn read_row(&self, row: RowNumber) -> Result<Post> {
            self.inner.read_row(row)
        }

        fn append_row(&self, post: &Post) -> Result<RowNumber> {
            self.inner.append_row(post)
        }

        fn write_content(
            &self,
            row: RowNumber,
            name: &str,
            text: &str,
            updated_at: chrono::DateTime<Utc>,
        ) -> Result<()> {
            self.inner.write_content(row, name, text, updated_at)
        }

        fn write_visible(&self, row: RowNumber, visible: bool) -> Result<()> {
            self.inner.write_visible(row, visible)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_write_during_listing_read_stays_visible() {
        let workbook = Workbook::open_in_memory().unwrap();
        let (read_done_tx, read_done_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let table = Arc::new(PausingTable {
            inner: workbook.posts(),
            pause: parking_lot::Mutex::new(None),
        });
        let board = Arc::new(Board::open(table.clone(), Arc::new(workbook.settings())).unwrap());
        board.create(draft("one"), PW).await.unwrap();
        *table.pause.lock() = Some((read_done_tx, resume_rx));

        let reader = {
            let board = board.clone();
            tokio::spawn(async move { board.list(None, None).await.map(|p| p.pagination.total_posts) })
        };

        // The reader has its snapshot; a write completes before it fills the cache.
        tokio::task::spawn_blocking(move || read_done_rx.recv())
            .await
            .unwrap()
            .unwrap();
        board.create(draft("two"), PW).await.unwrap();
        resume_tx.send(()).unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), 1);
        let after = board.list(None, None).await.unwrap();
        assert_eq!(after.pagination.total_posts, 2);
    }
}
