// In-memory store: the test double for every recorder and API test.
// Tables hold data rows only; the header row is implicit.

use super::{ColumnRange, TabularStore};
use crate::entry::Row;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    /// Unknown categories fail with UnknownTable instead of reading empty
    strict_tables: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicUsize,
    fetch_calls: AtomicUsize,
    append_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the spreadsheet: only pre-created tables exist
    pub fn strict() -> Self {
        let store = Self::default();
        store.inner.strict_tables.store(true, Ordering::SeqCst);
        store
    }

    /// Create (or replace) a table with the given data rows
    pub fn with_table(self, category: &str, rows: Vec<Row>) -> Self {
        self.write_tables().insert(category.to_string(), rows);
        self
    }

    pub fn create_table(&self, category: &str) {
        self.write_tables().entry(category.to_string()).or_default();
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every call, for exercising timeouts
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.inner.append_calls.load(Ordering::SeqCst)
    }

    /// Total store calls of any kind
    pub fn calls(&self) -> usize {
        self.fetch_calls() + self.append_calls()
    }

    pub fn row_count(&self, category: &str) -> usize {
        self.read_tables().get(category).map_or(0, Vec::len)
    }

    pub fn rows(&self, category: &str) -> Vec<Row> {
        self.read_tables().get(category).cloned().unwrap_or_default()
    }

    // A poisoned lock only means a test thread panicked mid-write; the map is still usable.
    fn read_tables(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Row>>> {
        self.inner
            .tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_tables(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Row>>> {
        self.inner
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency_ms = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms as u64)).await;
        }
    }
}

#[async_trait]
impl TabularStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_rows(
        &self,
        category: &str,
        columns: ColumnRange,
    ) -> Result<Vec<Row>, StoreError> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Network("injected read failure".to_string()));
        }

        let tables = self.read_tables();
        match tables.get(category) {
            Some(rows) => Ok(rows.iter().map(|row| columns.project(row)).collect()),
            None if self.inner.strict_tables.load(Ordering::SeqCst) => {
                Err(StoreError::UnknownTable(category.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn append_row(&self, category: &str, row: Row) -> Result<(), StoreError> {
        self.inner.append_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Network("injected write failure".to_string()));
        }

        let mut tables = self.write_tables();
        if !tables.contains_key(category) && self.inner.strict_tables.load(Ordering::SeqCst) {
            return Err(StoreError::UnknownTable(category.to_string()));
        }
        tables.entry(category.to_string()).or_default().push(row);
        Ok(())
    }
}
