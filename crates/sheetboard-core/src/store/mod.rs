//! Row-oriented post table and settings cells.
//!
//! The board only ever talks to storage through [`PostTable`] and
//! [`SettingsStore`](crate::settings::SettingsStore): whole-column reads,
//! appends and single-row writes, with no transactions spanning calls. The
//! [`Workbook`] backs both with one SQLite file.

mod posts;
pub mod schema;
mod settings;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

pub use self::posts::SqlitePostTable;
pub use self::settings::SqliteSettingsStore;
use crate::Result;
use crate::post::Post;

/// 1-based position of a row in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowNumber(pub i64);

/// One cell of the ID column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCell {
    pub row: RowNumber,
    pub id: i64,
}

/// Append-only post table.
pub trait PostTable: Send + Sync {
    /// Read every data row, oldest first.
    fn read_rows(&self) -> Result<Vec<Post>>;

    /// Read the ID column, oldest first.
    fn read_id_column(&self) -> Result<Vec<IdCell>>;

    /// Read a single row.
    fn read_row(&self, row: RowNumber) -> Result<Post>;

    /// Append a row after the last one.
    fn append_row(&self, post: &Post) -> Result<RowNumber>;

    /// Overwrite the name, text and updated-at cells of a row.
    fn write_content(
        &self,
        row: RowNumber,
        name: &str,
        text: &str,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;

    /// Overwrite the visibility cell of a row.
    fn write_visible(&self, row: RowNumber, visible: bool) -> Result<()>;
}

/// SQLite file holding both the post table and the settings cells.
#[derive(Clone)]
pub struct Workbook {
    conn: Arc<Mutex<Connection>>,
}

impl Workbook {
    /// Open or create the workbook at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    crate::Error::Storage(format!(
                        "failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        schema::init_schema(&conn)?;

        tracing::info!(path = %path.display(), "workbook opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory workbook (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The post table.
    pub fn posts(&self) -> SqlitePostTable {
        SqlitePostTable::new(self.conn.clone())
    }

    /// The settings cells.
    pub fn settings(&self) -> SqliteSettingsStore {
        SqliteSettingsStore::new(self.conn.clone())
    }
}
