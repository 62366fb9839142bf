// 📊 Google Sheets Store - One worksheet per category
// Reads `<sheet>!A2:D`, appends to `<sheet>!A:D` (USER_ENTERED unless configured RAW).
// Authenticates as a service account (RS256 JWT exchanged for a bearer token).

use super::{ColumnRange, TabularStore, HEADER_ROWS};
use crate::entry::{Cell, Row};
use crate::error::StoreError;
use async_trait::async_trait;
use clap::ValueEnum;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Tokens are refreshed this long before Google says they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// ============================================================================
// CREDENTIALS
// ============================================================================

/// The subset of a Google service-account JSON key we need.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| StoreError::Credentials(format!("invalid service account key: {}", e)))?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(StoreError::Credentials(
                "service account key is missing client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }
}

// Never print the private key
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// How Sheets interprets appended cells.
///
/// Reads always return formatted values. With `UserEntered` Sheets may
/// reformat a date or time token it recognizes, so the text read back can
/// differ from the text written. `Raw` keeps every cell verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ValueInputOption {
    #[default]
    UserEntered,
    Raw,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::UserEntered => "USER_ENTERED",
            ValueInputOption::Raw => "RAW",
        }
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: [&'a Row; 1],
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// Formatted values arrive as strings; anything else is kept as text or number
fn cell_from_json(value: serde_json::Value) -> Cell {
    match value {
        serde_json::Value::String(s) => Cell::Text(s),
        serde_json::Value::Number(n) => Cell::Number(n),
        serde_json::Value::Null => Cell::Text(String::new()),
        other => Cell::Text(other.to_string()),
    }
}

/// `Sheet1` stays bare; names with spaces or punctuation get single-quoted
pub fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Map a non-success HTTP response onto the store error taxonomy
pub fn error_for_status(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        401 | 403 => StoreError::Unauthorized(message),
        404 => StoreError::UnknownTable(message),
        400 if message.contains("Unable to parse range") => StoreError::UnknownTable(message),
        429 => StoreError::RateLimited(message),
        _ => StoreError::Rejected { status, message },
    }
}

// ============================================================================
// SHEETS STORE
// ============================================================================

pub struct SheetsStore {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    timeout: Duration,
    value_input: ValueInputOption,
    token: Mutex<Option<AccessToken>>,
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        key: ServiceAccountKey,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(format!("invalid private key: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(format!("http client setup failed: {}", e)))?;

        Ok(SheetsStore {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            key,
            encoding_key,
            timeout,
            value_input: ValueInputOption::default(),
            token: Mutex::new(None),
        })
    }

    /// Point at a different API host (emulators, proxies)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_value_input(mut self, value_input: ValueInputOption) -> Self {
        self.value_input = value_input;
        self
    }

    fn values_url(&self, category: &str, a1: &str) -> String {
        values_url(&self.api_base, &self.spreadsheet_id, category, a1)
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Network(err.to_string())
        }
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + 3600,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| StoreError::Credentials(format!("jwt signing failed: {}", e)))?;

        debug!(client_email = %self.key.client_email, "requesting sheets access token");
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(StoreError::Unauthorized(format!(
                "token exchange failed ({}): {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Unauthorized(format!("malformed token response: {}", e)))?;
        let fresh = AccessToken {
            value: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        };
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(error_for_status(status.as_u16(), &body))
        }
    }
}

/// `{base}/v4/spreadsheets/{id}/values/{sheet}!{range}` with the range path-encoded
pub fn values_url(api_base: &str, spreadsheet_id: &str, category: &str, a1: &str) -> String {
    let range = format!("{}!{}", quote_sheet_name(category), a1);
    format!(
        "{}/v4/spreadsheets/{}/values/{}",
        api_base,
        spreadsheet_id,
        urlencoding::encode(&range)
    )
}

#[async_trait]
impl TabularStore for SheetsStore {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }

    async fn fetch_rows(
        &self,
        category: &str,
        columns: ColumnRange,
    ) -> Result<Vec<Row>, StoreError> {
        let token = self.access_token().await?;
        let url = self.values_url(category, &columns.to_a1(Some(HEADER_ROWS + 1)));
        debug!(category, %columns, "fetching sheet rows");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.read_body(response).await?;
        let range: ValueRange = serde_json::from_str(&body)
            .map_err(|e| StoreError::Rejected {
                status: 200,
                message: format!("malformed values response: {}", e),
            })?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_from_json).collect())
            .collect())
    }

    async fn append_row(&self, category: &str, row: Row) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let columns = ColumnRange::new(1, row.len().max(1) as u32);
        let url = format!("{}:append", self.values_url(category, &columns.to_a1(None)));
        debug!(category, cells = row.len(), "appending sheet row");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", self.value_input.as_str()),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody { values: [&row] })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read_body(response).await.map(|_| ())
    }
}
