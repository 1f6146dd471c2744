//! SQLite-backed post table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{IdCell, PostTable, RowNumber};
use crate::post::Post;
use crate::{Error, Result};

const SELECT_ROW: &str =
    "SELECT row_number, id, name, text, created_at, updated_at, visible FROM post_rows";

/// Post table stored in the `post_rows` table of a [`Workbook`](super::Workbook).
pub struct SqlitePostTable {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePostTable {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

/// Raw cells of one row, before timestamp parsing.
struct RawRow {
    row_number: i64,
    id: i64,
    name: String,
    text: String,
    created_at: String,
    updated_at: String,
    visible: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            row_number: row.get(0)?,
            id: row.get(1)?,
            name: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            visible: row.get(6)?,
        })
    }

    fn into_post(self) -> Result<Post> {
        let row = self.row_number;
        Ok(Post {
            id: self.id,
            name: self.name,
            text: self.text,
            created_at: parse_timestamp(row, &self.created_at)?,
            updated_at: parse_timestamp(row, &self.updated_at)?,
            visible: self.visible == 1,
        })
    }
}

fn parse_timestamp(row: i64, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::CorruptRow {
            row,
            reason: format!("invalid timestamp '{value}': {e}"),
        })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

impl PostTable for SqlitePostTable {
    fn read_rows(&self) -> Result<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_ROW} ORDER BY row_number ASC"))?;
        let raw: Vec<RawRow> = stmt
            .query_map([], RawRow::from_row)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        raw.into_iter().map(RawRow::into_post).collect()
    }

    fn read_id_column(&self) -> Result<Vec<IdCell>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT row_number, id FROM post_rows ORDER BY row_number ASC")?;
        let cells = stmt
            .query_map([], |row| {
                Ok(IdCell {
                    row: RowNumber(row.get(0)?),
                    id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    fn read_row(&self, row: RowNumber) -> Result<Post> {
        let raw = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("{SELECT_ROW} WHERE row_number = ?"),
                [row.0],
                RawRow::from_row,
            )
            .optional()?
        };

        raw.ok_or_else(|| Error::CorruptRow {
            row: row.0,
            reason: "row does not exist".to_string(),
        })?
        .into_post()
    }

    fn append_row(&self, post: &Post) -> Result<RowNumber> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO post_rows (id, name, text, created_at, updated_at, visible)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                post.id,
                post.name,
                post.text,
                format_timestamp(post.created_at),
                format_timestamp(post.updated_at),
                i64::from(post.visible),
            ],
        )?;
        Ok(RowNumber(conn.last_insert_rowid()))
    }

    fn write_content(
        &self,
        row: RowNumber,
        name: &str,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE post_rows SET name = ?, text = ?, updated_at = ? WHERE row_number = ?",
            params![name, text, format_timestamp(updated_at), row.0],
        )?;
        ensure_written(row, changed)
    }

    fn write_visible(&self, row: RowNumber, visible: bool) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE post_rows SET visible = ? WHERE row_number = ?",
            params![i64::from(visible), row.0],
        )?;
        ensure_written(row, changed)
    }
}

fn ensure_written(row: RowNumber, changed: usize) -> Result<()> {
    if changed == 0 {
        return Err(Error::CorruptRow {
            row: row.0,
            reason: "row does not exist".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Workbook;

    fn post(id: i64, name: &str) -> Post {
        let now = Utc::now();
        Post {
            id,
            name: name.to_string(),
            text: format!("<p>{name}</p>"),
            created_at: now,
            updated_at: now,
            visible: true,
        }
    }

    #[test]
    fn test_append_keeps_order() {
        let table = Workbook::open_in_memory().unwrap().posts();
        let first = table.append_row(&post(1, "a")).unwrap();
        let second = table.append_row(&post(2, "b")).unwrap();
        assert!(first < second);

        let rows = table.read_rows().unwrap();
        assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_id_column_maps_rows() {
        let table = Workbook::open_in_memory().unwrap().posts();
        let row = table.append_row(&post(7, "seven")).unwrap();

        let ids = table.read_id_column().unwrap();
        assert_eq!(ids, vec![IdCell { row, id: 7 }]);
    }

    #[test]
    fn test_write_content_leaves_created_at() {
        let table = Workbook::open_in_memory().unwrap().posts();
        let original = post(1, "before");
        let row = table.append_row(&original).unwrap();

        let later = original.created_at + chrono::Duration::seconds(30);
        table.write_content(row, "after", "new body", later).unwrap();

        let stored = table.read_row(row).unwrap();
        assert_eq!(stored.name, "after");
        assert_eq!(stored.text, "new body");
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.updated_at, later);
    }

    #[test]
    fn test_write_visible_round_trips_flag() {
        let table = Workbook::open_in_memory().unwrap().posts();
        let row = table.append_row(&post(1, "x")).unwrap();

        table.write_visible(row, false).unwrap();
        assert!(!table.read_row(row).unwrap().visible);
        assert_eq!(table.read_rows().unwrap().len(), 1);
    }

    #[test]
    fn test_write_to_missing_row_fails() {
        let table = Workbook::open_in_memory().unwrap().posts();
        let err = table.write_visible(RowNumber(99), false).unwrap_err();
        assert!(matches!(err, Error::CorruptRow { row: 99, .. }));
    }

    #[test]
    fn test_corrupt_timestamp_is_reported() {
        let workbook = Workbook::open_in_memory().unwrap();
        let table = workbook.posts();
        table
            .conn
            .lock()
            .execute(
                "INSERT INTO post_rows (id, name, text, created_at, updated_at, visible)
                 VALUES (1, 'x', '', 'yesterday', 'yesterday', 1)",
                [],
            )
            .unwrap();

        let err = table.read_rows().unwrap_err();
        assert!(matches!(err, Error::CorruptRow { row: 1, .. }));
    }
}
