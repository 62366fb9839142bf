// Vitals Sheet - Core Library
// Blood-pressure readings per family member, kept in an append-only sheet per person.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod config;
pub mod entry;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{Backend, RecorderSettings, ServerSettings, StoreSettings};
pub use entry::{Cell, Entry, NewEntry, Row};
pub use error::{ConfigError, RecordError, StoreError};
pub use logging::{LogFormat, LogSettings};
pub use recorder::{
    is_duplicate, Limit, Recorder, RecorderConfig, DEFAULT_CATEGORY, DEFAULT_LIMIT,
};
pub use store::{
    ColumnRange, InMemoryStore, SheetsStore, SqliteStore, TabularStore, ValueInputOption,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
