//! SQLite-backed settings cells.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::Result;
use crate::settings::{
    DEFAULT_PASSWORD, DEFAULT_STORAGE_FOLDER, PageSize, Settings, SettingsStore,
};

const PASSWORD_CELL: &str = "B1";
const FOLDER_CELL: &str = "B2";
const PAGE_SIZE_CELL: &str = "B3";

/// Settings stored as three labeled cells in the `settings` table.
pub struct SqliteSettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSettingsStore {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn read_cell(conn: &Connection, cell: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row("SELECT value FROM settings WHERE cell = ?", [cell], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn write_cell(conn: &Connection, cell: &str, label: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (cell, label, value) VALUES (?, ?, ?)
             ON CONFLICT(cell) DO UPDATE SET value = excluded.value",
            params![cell, label, value],
        )?;
        Ok(())
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<Settings> {
        let conn = self.conn.lock();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        if count == 0 {
            Self::write_cell(&conn, PASSWORD_CELL, "Password", DEFAULT_PASSWORD)?;
            Self::write_cell(&conn, FOLDER_CELL, "Storage folder", DEFAULT_STORAGE_FOLDER)?;
            Self::write_cell(
                &conn,
                PAGE_SIZE_CELL,
                "Posts per page",
                &PageSize::DEFAULT.to_string(),
            )?;
            tracing::info!("settings table created with defaults");
        }

        let password = Self::read_cell(&conn, PASSWORD_CELL)?
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
        let storage_folder = Self::read_cell(&conn, FOLDER_CELL)?
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_FOLDER.to_string());
        let page_size = Self::read_cell(&conn, PAGE_SIZE_CELL)?
            .map(|value| PageSize::from_cell(&value))
            .unwrap_or_default();

        Ok(Settings {
            password,
            storage_folder,
            page_size,
        })
    }

    fn write_page_size(&self, page_size: PageSize) -> Result<()> {
        let conn = self.conn.lock();
        Self::write_cell(&conn, PAGE_SIZE_CELL, "Posts per page", &page_size.to_string())
    }
}
