// 📒 Tabular Store Adapters - Append-only per-category sheets
// The trait is the only thing the recorder knows about a backend

pub mod memory;
pub mod sheets;
pub mod sqlite;

use crate::entry::Row;
use crate::error::StoreError;
use async_trait::async_trait;
use std::fmt;

pub use memory::InMemoryStore;
pub use sheets::{ServiceAccountKey, SheetsStore, ValueInputOption};
pub use sqlite::SqliteStore;

/// Number of header rows at the top of every table. Never returned by reads.
pub const HEADER_ROWS: u32 = 1;

// ============================================================================
// COLUMN RANGE
// ============================================================================

/// Inclusive, 1-based column span. `last: None` reads to the final column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub first: u32,
    pub last: Option<u32>,
}

impl ColumnRange {
    pub fn new(first: u32, last: u32) -> Self {
        ColumnRange {
            first,
            last: Some(last),
        }
    }

    pub fn starting_at(first: u32) -> Self {
        ColumnRange { first, last: None }
    }

    /// Slice one stored row down to this span. Short rows stay short.
    pub fn project(&self, row: &[crate::entry::Cell]) -> Row {
        let start = (self.first as usize).saturating_sub(1).min(row.len());
        let end = match self.last {
            Some(last) => (last as usize).min(row.len()).max(start),
            None => row.len(),
        };
        row[start..end].to_vec()
    }

    /// A1 notation with an optional starting row, e.g. `A2:D` or `A:B`
    pub fn to_a1(&self, start_row: Option<u32>) -> String {
        let row = start_row.map(|r| r.to_string()).unwrap_or_default();
        let first = column_letters(self.first);
        match self.last {
            Some(last) => format!("{}{}:{}", first, row, column_letters(last)),
            None => format!("{}{}:ZZZ", first, row),
        }
    }
}

impl fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1(None))
    }
}

/// 1 → A, 26 → Z, 27 → AA
pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// External append-only table store, one table per category.
///
/// Implementations hold no business logic, do not cache, and do not retry.
/// Every failure is returned as-is.
#[async_trait]
pub trait TabularStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Data rows (header excluded) in insertion order, projected to `columns`.
    async fn fetch_rows(&self, category: &str, columns: ColumnRange)
        -> Result<Vec<Row>, StoreError>;

    /// Append one row at the end of the category's table.
    async fn append_row(&self, category: &str, row: Row) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: TabularStore + ?Sized> TabularStore for std::sync::Arc<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn fetch_rows(
        &self,
        category: &str,
        columns: ColumnRange,
    ) -> Result<Vec<Row>, StoreError> {
        (**self).fetch_rows(category, columns).await
    }

    async fn append_row(&self, category: &str, row: Row) -> Result<(), StoreError> {
        (**self).append_row(category, row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Cell;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(4), "D");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
    }

    #[test]
    fn test_a1_rendering() {
        assert_eq!(ColumnRange::new(1, 4).to_a1(Some(2)), "A2:D");
        assert_eq!(ColumnRange::new(1, 2).to_a1(None), "A:B");
        assert_eq!(ColumnRange::starting_at(3).to_a1(Some(2)), "C2:ZZZ");
    }

    #[test]
    fn test_project_keeps_short_rows_short() {
        let row: Vec<Cell> = vec!["2024-01-01".into(), "AM".into(), 120.into()];

        assert_eq!(ColumnRange::new(1, 2).project(&row).len(), 2);
        assert_eq!(ColumnRange::new(1, 4).project(&row).len(), 3);
        assert_eq!(ColumnRange::new(3, 4).project(&row), vec![Cell::from(120)]);
        assert!(ColumnRange::new(5, 6).project(&row).is_empty());
        assert_eq!(ColumnRange::starting_at(2).project(&row).len(), 2);
    }
}
