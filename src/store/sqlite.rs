// 🗄️ SQLite Store - Local stand-in for the spreadsheet
// One shared table keyed by category; rows are JSON cell arrays in insertion order.
// No uniqueness constraint: duplicate detection belongs to the recorder.

use super::{ColumnRange, TabularStore};
use crate::entry::Row;
use crate::error::StoreError;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file with WAL journaling
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_schema(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of data rows stored for a category
    pub fn row_count(&self, category: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE category = ?1",
            [category],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))
    }

    /// Run a closure against the connection off the async executor
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {}", e)))?
    }
}

fn setup_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sheet_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            cells TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheet_rows_category ON sheet_rows(category, id)",
        [],
    )?;

    Ok(())
}

#[async_trait]
impl TabularStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_rows(
        &self,
        category: &str,
        columns: ColumnRange,
    ) -> Result<Vec<Row>, StoreError> {
        let category = category.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cells FROM sheet_rows
                 WHERE category = ?1
                 ORDER BY id ASC",
            )?;

            let raw = stmt
                .query_map(params![category], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            raw.iter()
                .map(|json| -> Result<Row, StoreError> {
                    let cells: Row = serde_json::from_str(json)
                        .map_err(|e| StoreError::Backend(format!("corrupt row: {}", e)))?;
                    Ok(columns.project(&cells))
                })
                .collect()
        })
        .await
    }

    async fn append_row(&self, category: &str, row: Row) -> Result<(), StoreError> {
        let category = category.to_string();
        let cells = serde_json::to_string(&row)
            .map_err(|e| StoreError::Backend(format!("row encoding failed: {}", e)))?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sheet_rows (category, cells) VALUES (?1, ?2)",
                params![category, cells],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Cell;

    #[tokio::test]
    async fn test_append_and_fetch_preserves_order() {
        let store = SqliteStore::open_in_memory().unwrap();

        for day in 1..=3 {
            let row = vec![
                Cell::from(format!("2024-01-0{}", day)),
                Cell::from("AM"),
                Cell::from(120 + day),
                Cell::from("80"),
            ];
            store.append_row("dad", row).await.unwrap();
        }

        let rows = store.fetch_rows("dad", ColumnRange::new(1, 4)).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Cell::from("2024-01-01"));
        assert_eq!(rows[2][2], Cell::from(123));
        assert_eq!(rows[2][3], Cell::from("80"));

        println!("✅ SQLite ordering test PASSED");
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append_row("dad", vec![Cell::from("2024-01-01"), Cell::from("AM")])
            .await
            .unwrap();

        assert!(store.fetch_rows("mom", ColumnRange::new(1, 4)).await.unwrap().is_empty());
        assert_eq!(store.row_count("dad").unwrap(), 1);
        assert_eq!(store.row_count("mom").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_projection_and_short_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append_row("dad", vec![Cell::from("2024-01-01")])
            .await
            .unwrap();
        store
            .append_row(
                "dad",
                vec![Cell::from("2024-01-02"), Cell::from("PM"), Cell::from(118), Cell::from(79)],
            )
            .await
            .unwrap();

        let pairs = store.fetch_rows("dad", ColumnRange::new(1, 2)).await.unwrap();
        assert_eq!(pairs[0], vec![Cell::from("2024-01-01")]);
        assert_eq!(pairs[1], vec![Cell::from("2024-01-02"), Cell::from("PM")]);
    }

    #[tokio::test]
    async fn test_no_uniqueness_constraint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let row = vec![Cell::from("2024-01-01"), Cell::from("AM"), Cell::from(120), Cell::from(80)];

        store.append_row("dad", row.clone()).await.unwrap();
        store.append_row("dad", row).await.unwrap();

        assert_eq!(store.row_count("dad").unwrap(), 2);
    }
}
