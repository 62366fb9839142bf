// ⚙️ Configuration - Flags with environment fallbacks
// Missing backend settings are fatal at startup, never per-request errors.

use crate::error::ConfigError;
use crate::logging::LogSettings;
use crate::recorder::{Limit, RecorderConfig, DEFAULT_CATEGORY};
use crate::store::{
    InMemoryStore, ServiceAccountKey, SheetsStore, SqliteStore, TabularStore, ValueInputOption,
};
use clap::{Args, Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Google Sheets, one worksheet per category
    Sheets,
    /// Local SQLite file
    Sqlite,
    /// Process memory (lost on exit)
    Memory,
}

// ============================================================================
// STORE SETTINGS
// ============================================================================

#[derive(Debug, Clone, Args)]
pub struct StoreSettings {
    /// Which backend holds the category tables
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = Backend::Sheets)]
    pub backend: Backend,

    /// Spreadsheet identifier (sheets backend)
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Service-account key JSON (sheets backend)
    #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true)]
    pub google_credentials: Option<String>,

    /// How appended cells are interpreted (sheets backend)
    #[arg(long, env = "SHEETS_VALUE_INPUT", value_enum, default_value_t = ValueInputOption::UserEntered)]
    pub sheets_value_input: ValueInputOption,

    /// Database file (sqlite backend)
    #[arg(long, env = "SQLITE_PATH", default_value = "vitals.db")]
    pub sqlite_path: PathBuf,

    /// Upper bound on every backend call, in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 10)]
    pub store_timeout_secs: u64,
}

impl StoreSettings {
    /// A zero timeout would fail every call, so it is refused at startup
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        if self.store_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "STORE_TIMEOUT_SECS",
                message: "must be at least 1 second".to_string(),
            });
        }
        Ok(Duration::from_secs(self.store_timeout_secs))
    }

    /// Open the configured backend
    pub fn build(&self) -> Result<Arc<dyn TabularStore>, ConfigError> {
        let timeout = self.timeout()?;
        match self.backend {
            Backend::Sheets => {
                let spreadsheet_id = non_blank(self.spreadsheet_id.as_deref())
                    .ok_or(ConfigError::Missing("SPREADSHEET_ID"))?;
                let credentials = non_blank(self.google_credentials.as_deref())
                    .ok_or(ConfigError::Missing("GOOGLE_CREDENTIALS"))?;

                let key = ServiceAccountKey::from_json(credentials).map_err(|e| {
                    ConfigError::Invalid {
                        name: "GOOGLE_CREDENTIALS",
                        message: e.to_string(),
                    }
                })?;
                let store = SheetsStore::new(spreadsheet_id, key, timeout)
                    .map_err(|e| ConfigError::Invalid {
                        name: "GOOGLE_CREDENTIALS",
                        message: e.to_string(),
                    })?
                    .with_value_input(self.sheets_value_input);
                Ok(Arc::new(store))
            }
            Backend::Sqlite => {
                let store = SqliteStore::open(&self.sqlite_path).map_err(|e| ConfigError::Invalid {
                    name: "SQLITE_PATH",
                    message: e.to_string(),
                })?;
                Ok(Arc::new(store))
            }
            Backend::Memory => Ok(Arc::new(InMemoryStore::new())),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// RECORDER SETTINGS
// ============================================================================

#[derive(Debug, Clone, Args)]
pub struct RecorderSettings {
    /// Category read when a request names none
    #[arg(long, env = "DEFAULT_CATEGORY", default_value = DEFAULT_CATEGORY)]
    pub default_category: String,

    /// Rows returned by a read: a count, or "all"
    #[arg(long, env = "READ_LIMIT", default_value = "10")]
    pub read_limit: Limit,

    /// Serialize check-then-append per category inside this process
    #[arg(long, env = "SERIALIZE_WRITES")]
    pub serialize_writes: bool,
}

impl RecorderSettings {
    pub fn to_config(&self, store_timeout: Duration) -> RecorderConfig {
        RecorderConfig {
            default_category: self.default_category.clone(),
            default_limit: self.read_limit,
            store_timeout,
            serialize_writes: self.serialize_writes,
        }
    }
}

// ============================================================================
// SERVER SETTINGS
// ============================================================================

#[derive(Debug, Clone, Parser)]
#[command(name = "vitals-server", version, about = "HTTP service for blood-pressure records")]
pub struct ServerSettings {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[command(flatten)]
    pub store: StoreSettings,

    #[command(flatten)]
    pub recorder: RecorderSettings,

    #[command(flatten)]
    pub log: LogSettings,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn recorder_config(&self) -> Result<RecorderConfig, ConfigError> {
        Ok(self.recorder.to_config(self.store.timeout()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_settings(backend: Backend) -> StoreSettings {
        StoreSettings {
            backend,
            spreadsheet_id: None,
            google_credentials: None,
            sheets_value_input: ValueInputOption::UserEntered,
            sqlite_path: PathBuf::from("vitals.db"),
            store_timeout_secs: 10,
        }
    }

    #[test]
    fn test_sheets_requires_spreadsheet_id() {
        let settings = store_settings(Backend::Sheets);
        assert!(matches!(
            settings.build(),
            Err(ConfigError::Missing("SPREADSHEET_ID"))
        ));
    }

    #[test]
    fn test_sheets_requires_credentials() {
        let mut settings = store_settings(Backend::Sheets);
        settings.spreadsheet_id = Some("sheet-id".to_string());
        settings.google_credentials = Some("   ".to_string());
        assert!(matches!(
            settings.build(),
            Err(ConfigError::Missing("GOOGLE_CREDENTIALS"))
        ));
    }

    #[test]
    fn test_sheets_rejects_malformed_credentials() {
        let mut settings = store_settings(Backend::Sheets);
        settings.spreadsheet_id = Some("sheet-id".to_string());
        settings.google_credentials = Some("{not json".to_string());
        assert!(matches!(
            settings.build(),
            Err(ConfigError::Invalid { name: "GOOGLE_CREDENTIALS", .. })
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut settings = store_settings(Backend::Memory);
        settings.store_timeout_secs = 0;

        assert!(matches!(
            settings.build(),
            Err(ConfigError::Invalid { name: "STORE_TIMEOUT_SECS", .. })
        ));
        assert!(settings.timeout().is_err());

        let parsed = ServerSettings::try_parse_from(["vitals-server", "--store-timeout-secs", "0"])
            .unwrap();
        assert!(parsed.recorder_config().is_err());
    }

    #[test]
    fn test_memory_backend_builds() {
        let store = store_settings(Backend::Memory).build().unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_sqlite_backend_builds() {
        let path = std::env::temp_dir().join(format!("vitals-config-{}.db", std::process::id()));
        let mut settings = store_settings(Backend::Sqlite);
        settings.sqlite_path = path.clone();

        let store = settings.build().unwrap();
        assert_eq!(store.backend_name(), "sqlite");

        drop(store);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_server_flags() {
        let settings = ServerSettings::try_parse_from([
            "vitals-server",
            "--port",
            "8080",
            "--backend",
            "memory",
            "--read-limit",
            "all",
            "--default-category",
            "媽媽",
            "--serialize-writes",
            "--store-timeout-secs",
            "3",
            "--sheets-value-input",
            "raw",
        ])
        .unwrap();

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.store.backend, Backend::Memory);
        assert_eq!(settings.store.sheets_value_input, ValueInputOption::Raw);

        let config = settings.recorder_config().unwrap();
        assert_eq!(config.default_limit, Limit::All);
        assert_eq!(config.default_category, "媽媽");
        assert!(config.serialize_writes);
        assert_eq!(config.store_timeout, Duration::from_secs(3));
    }
}
