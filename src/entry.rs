// 🩺 Entry Model - One blood-pressure reading per (date, time slot)
// Cells are opaque: dates and slots compare as text, readings are stored verbatim

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ============================================================================
// COLUMN LAYOUT
// ============================================================================

/// Column 1: date token (e.g. "2024-01-01")
pub const DATE_COLUMN: u32 = 1;

/// Column 2: time slot token (e.g. "AM", "早上")
pub const TIME_COLUMN: u32 = 2;

/// Column 3: systolic reading
pub const SYS_COLUMN: u32 = 3;

/// Column 4: diastolic reading
pub const DIA_COLUMN: u32 = 4;

// ============================================================================
// CELL
// ============================================================================

/// A single opaque cell value as the backend hands it over.
///
/// Numbers stay numbers and text stays text; nothing is parsed or
/// normalized on the way in or out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    /// Textual rendering used for equality checks
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Number(n) => Cow::Owned(n.to_string()),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Empty text counts as blank; zero is a real reading
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(value.into())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value.into())
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(value.into())
    }
}

/// One raw backend row. May be shorter than the four documented columns.
pub type Row = Vec<Cell>;

// ============================================================================
// ENTRY (read side)
// ============================================================================

/// A stored reading, shaped for display.
///
/// Short rows leave trailing fields as `None`, and those are omitted from
/// the JSON object entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Cell>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Cell>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys: Option<Cell>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dia: Option<Cell>,
}

impl Entry {
    pub fn new(
        date: impl Into<Cell>,
        time: impl Into<Cell>,
        sys: impl Into<Cell>,
        dia: impl Into<Cell>,
    ) -> Self {
        Entry {
            date: Some(date.into()),
            time: Some(time.into()),
            sys: Some(sys.into()),
            dia: Some(dia.into()),
        }
    }

    /// Shape a raw row positionally; extra cells beyond column 4 are ignored
    pub fn from_row(row: &[Cell]) -> Self {
        let cell = |column: u32| row.get(column as usize - 1).cloned();
        Entry {
            date: cell(DATE_COLUMN),
            time: cell(TIME_COLUMN),
            sys: cell(SYS_COLUMN),
            dia: cell(DIA_COLUMN),
        }
    }
}

// ============================================================================
// NEW ENTRY (write side)
// ============================================================================

/// Caller input for a write, before validation.
///
/// Every field is optional here so that a missing field is reported as a
/// validation failure instead of a decoding error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    #[serde(default, rename = "name")]
    pub category: Option<String>,

    #[serde(default)]
    pub date: Option<Cell>,

    #[serde(default)]
    pub time: Option<Cell>,

    #[serde(default)]
    pub sys: Option<Cell>,

    #[serde(default)]
    pub dia: Option<Cell>,
}

impl NewEntry {
    pub fn new(
        category: impl Into<String>,
        date: impl Into<Cell>,
        time: impl Into<Cell>,
        sys: impl Into<Cell>,
        dia: impl Into<Cell>,
    ) -> Self {
        NewEntry {
            category: Some(category.into()),
            date: Some(date.into()),
            time: Some(time.into()),
            sys: Some(sys.into()),
            dia: Some(dia.into()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
