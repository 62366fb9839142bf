// 🔁 Idempotent Recorder - Check-then-append over an append-only store
//
// Write path: read the category's (date, time) columns, reject an exact match,
// otherwise append. The two calls are independent backend requests with no
// conditional-write primitive between them, so two concurrent writers for the
// same (category, date, time) can both pass the check and both append.
// `serialize_writes` closes that race inside one process only.

use crate::entry::{Cell, Entry, NewEntry, Row, DATE_COLUMN, DIA_COLUMN, TIME_COLUMN};
use crate::error::{RecordError, StoreError};
use crate::store::{ColumnRange, TabularStore};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default table when a read names no category
pub const DEFAULT_CATEGORY: &str = "爸爸";

/// Default number of trailing rows returned by a read
pub const DEFAULT_LIMIT: usize = 10;

/// Default bound on every backend call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// LIMIT
// ============================================================================

/// How many rows a read returns: the last N, or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Last(usize),
    All,
}

impl Limit {
    /// Keep the tail of `items` in original order
    pub fn apply<T>(&self, mut items: Vec<T>) -> Vec<T> {
        match *self {
            Limit::All => items,
            Limit::Last(n) => {
                let skip = items.len().saturating_sub(n);
                items.drain(..skip);
                items
            }
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::Last(DEFAULT_LIMIT)
    }
}

impl FromStr for Limit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "unbounded" => Ok(Limit::All),
            other => other
                .parse::<usize>()
                .map(Limit::Last)
                .map_err(|_| format!("expected a row count or \"all\", got {:?}", s)),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Last(n) => write!(f, "{}", n),
            Limit::All => f.write_str("all"),
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Category substituted when a read names none
    pub default_category: String,

    /// Limit used when a read does not specify one
    pub default_limit: Limit,

    /// Upper bound on each backend call; expiry is a `StoreError::Timeout`
    pub store_timeout: Duration,

    /// Serialize the read+append pair per category within this process
    pub serialize_writes: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            default_category: DEFAULT_CATEGORY.to_string(),
            default_limit: Limit::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            serialize_writes: false,
        }
    }
}

// ============================================================================
// DUPLICATE PREDICATE
// ============================================================================

/// A stored (date, time) pair conflicts iff both cells equal the input exactly.
///
/// No trimming, case folding or date canonicalization: "2024-1-1" and
/// "2024-01-01" are different dates here. A missing time cell reads as empty,
/// since the backend drops trailing blank cells.
///
/// The comparison sees whatever text the backend reads back. Sheets parses
/// `USER_ENTERED` input and returns the formatted value, so a token it
/// reformats (`08:00` → `8:00:00`) no longer matches its own input. Use
/// `ValueInputOption::Raw` on that backend when inputs must round-trip.
pub fn is_duplicate(existing: &[Cell], date: &str, time: &str) -> bool {
    let text = |column: u32| {
        existing
            .get(column as usize - 1)
            .map(|cell| cell.as_text().into_owned())
            .unwrap_or_default()
    };
    text(DATE_COLUMN) == date && text(TIME_COLUMN) == time
}

// ============================================================================
// RECORDER
// ============================================================================

/// A write that passed validation
#[derive(Debug, Clone)]
struct ValidEntry {
    category: String,
    date: Cell,
    time: Cell,
    sys: Cell,
    dia: Cell,
}

impl ValidEntry {
    fn parse(input: NewEntry) -> Result<Self, RecordError> {
        fn present(value: Option<String>, field: &'static str) -> Result<String, RecordError> {
            value
                .filter(|v| !v.is_empty())
                .ok_or(RecordError::Validation { field })
        }
        fn present_cell(value: Option<Cell>, field: &'static str) -> Result<Cell, RecordError> {
            value
                .filter(|v| !v.is_blank())
                .ok_or(RecordError::Validation { field })
        }

        Ok(ValidEntry {
            category: present(input.category, "name")?,
            date: present_cell(input.date, "date")?,
            time: input.time.unwrap_or_else(|| Cell::from("")),
            sys: present_cell(input.sys, "sys")?,
            dia: present_cell(input.dia, "dia")?,
        })
    }

    fn into_row(self) -> Row {
        vec![self.date, self.time, self.sys, self.dia]
    }
}

type WriteLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one category's write lock; drops the map entry once nobody else wants it.
struct CategoryGuard<'a> {
    locks: &'a WriteLocks,
    category: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for CategoryGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts
        drop(self.held.take());
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks
            .get(&self.category)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.category);
        }
    }
}

pub struct Recorder<S> {
    store: S,
    config: RecorderConfig,
    write_locks: WriteLocks,
}

impl<S: TabularStore> Recorder<S> {
    pub fn new(store: S, config: RecorderConfig) -> Self {
        Recorder {
            store,
            config,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Blank or absent names fall back to the configured default
    pub fn resolve_category<'a>(&'a self, category: Option<&'a str>) -> &'a str {
        match category {
            Some(name) if !name.is_empty() => name,
            _ => &self.config.default_category,
        }
    }

    /// Most recent entries for a category, oldest first.
    ///
    /// Row order from the store is the only ordering used; dates are never
    /// parsed or re-sorted.
    pub async fn list_recent(
        &self,
        category: Option<&str>,
        limit: Option<Limit>,
    ) -> Result<Vec<Entry>, RecordError> {
        let category = self.resolve_category(category);
        let limit = limit.unwrap_or(self.config.default_limit);

        let rows = self
            .bounded(self.store.fetch_rows(category, ColumnRange::new(DATE_COLUMN, DIA_COLUMN)))
            .await
            .map_err(RecordError::Read)?;

        debug!(category, rows = rows.len(), %limit, backend = self.store.backend_name(), "listed entries");

        let rows = limit.apply(rows);
        Ok(rows.iter().map(|row| Entry::from_row(row)).collect())
    }

    /// Append a new entry unless one already exists for its (date, time).
    ///
    /// Validation happens before any store access. A `Duplicate` result
    /// means nothing was written.
    pub async fn record_entry(&self, input: NewEntry) -> Result<(), RecordError> {
        let entry = ValidEntry::parse(input)?;

        let _guard = self.lock_category(&entry.category).await;
        let (date, time) = (entry.date.as_text().into_owned(), entry.time.as_text().into_owned());

        let existing = self
            .bounded(
                self.store
                    .fetch_rows(&entry.category, ColumnRange::new(DATE_COLUMN, TIME_COLUMN)),
            )
            .await
            .map_err(RecordError::Read)?;

        if existing.iter().any(|row| is_duplicate(row, &date, &time)) {
            warn!(
                category = %entry.category,
                date = %date,
                time = %time,
                "duplicate entry rejected"
            );
            return Err(RecordError::Duplicate {
                category: entry.category,
                date,
                time,
            });
        }

        let category = entry.category.clone();
        self.bounded(self.store.append_row(&category, entry.into_row()))
            .await
            .map_err(RecordError::Write)?;

        info!(category = %category, date = %date, time = %time, "entry recorded");
        Ok(())
    }

    /// Per-category lock when `serialize_writes` is on.
    ///
    /// Entries live only while a writer holds or waits on them. Entries left
    /// behind by cancelled waiters are swept on the next acquisition.
    async fn lock_category(&self, category: &str) -> Option<CategoryGuard<'_>> {
        if !self.config.serialize_writes {
            return None;
        }
        let lock = {
            let mut locks = self
                .write_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(category.to_string()).or_default())
        };

        let mut guard = CategoryGuard {
            locks: &self.write_locks,
            category: category.to_string(),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        Some(guard)
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.write_locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}

// ============================================================================
// TESTS
// ============================================================================
