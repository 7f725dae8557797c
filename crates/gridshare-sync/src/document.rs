//! The grid document as the sync layer sees it: an opaque JSON value.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Workbook title of a fresh document.
pub const BLANK_TITLE: &str = "My Spreadsheet";
/// Name of the single sheet in a fresh document.
pub const BLANK_SHEET_NAME: &str = "Sheet1";
pub const BLANK_ROWS: u32 = 84;
pub const BLANK_COLUMNS: u32 = 60;
pub const DEFAULT_ROW_HEIGHT: u32 = 19;
pub const DEFAULT_COLUMN_WIDTH: u32 = 73;

/// Grid content produced and consumed by the editing surface.
///
/// The sync layer never looks inside: whatever the surface hands over is
/// what gets stored, and whatever the store returns is handed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A workbook with one empty sheet.
    pub fn blank() -> Self {
        Self(json!({
            "title": BLANK_TITLE,
            "lang": "en",
            "data": [{
                "name": BLANK_SHEET_NAME,
                "color": "",
                "status": 1,
                "order": 0,
                "index": 0,
                "data": [],
                "config": {},
                "scrollLeft": 0,
                "scrollTop": 0,
                "defaultRowHeight": DEFAULT_ROW_HEIGHT,
                "defaultColWidth": DEFAULT_COLUMN_WIDTH,
                "showGridLines": 1,
                "column": BLANK_COLUMNS,
                "row": BLANK_ROWS,
                "celldata": [],
            }],
        }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::blank()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::blank()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.0
    }
}
