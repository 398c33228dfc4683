//! YouTube Analytics API `reports.query` types.

use serde::{Deserialize, Serialize};

/// A `resultTable` as returned by `reports.query`.
///
/// Cells are kept as raw JSON values since their type depends on the column.
///
/// See: <https://developers.google.com/youtube/analytics/reference/reports/query>
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultTable {
    #[serde(rename = "columnHeaders", default)]
    pub column_headers: Vec<ColumnHeader>,
    /// Omitted by the API when the query matched nothing.
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultTable {
    /// Position of the column called `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_headers.iter().position(|h| h.name == name)
    }
}

/// Describes one column of a [`ResultTable`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    /// `DIMENSION` or `METRIC`.
    #[serde(rename = "columnType")]
    pub column_type: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
}

/// Query parameters for a `reports.query` call.
#[derive(Debug, Clone)]
pub struct ReportQuery<'a> {
    /// E.g. `channel==MINE`.
    pub ids: &'a str,
    pub start_date: jiff::civil::Date,
    pub end_date: jiff::civil::Date,
    pub metrics: &'a [&'a str],
    pub dimensions: &'a str,
    pub filters: Option<String>,
}
