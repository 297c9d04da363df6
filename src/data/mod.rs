//! Data-access adapter used by SQL steps
//!
//! The runtime only needs "open a named connection and run text against
//! it". Drivers implement [`Connector`]; the bundled one is backed by sqlx.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqlxConnector;

use crate::core::ConnectionDefinition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Error types for data-access operations
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Unsupported connection string for '{name}': {connection_string}")]
    Unsupported {
        name: String,
        connection_string: String,
    },

    #[error("Failed to open connection '{name}': {message}")]
    Connect { name: String, message: String },

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Connection is closed")]
    Closed,

    #[error("Failed to start data-access runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A single bound parameter or result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Render a cell the way the TSV dump does: strings quoted and escaped,
    /// nulls as `NULL`
    fn to_tsv_cell(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => v.to_string(),
            SqlValue::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            SqlValue::Blob(bytes) => to_hex(bytes),
        }
    }

    fn to_plain(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => v.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(bytes) => to_hex(bytes),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Rows returned by a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab-separated dump with an underlined header. Empty result sets
    /// render as an empty string.
    pub fn to_tsv(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        let header = self.columns.join("\t");
        let underline = "-".repeat(header.len() + self.columns.len() * 3);

        let mut out = String::new();
        out.push_str(&underline);
        out.push('\n');
        out.push_str(&header);
        out.push('\n');
        out.push_str(&underline);
        out.push('\n');

        for row in &self.rows {
            for value in row {
                out.push_str(&value.to_tsv_cell());
                out.push('\t');
            }
            out.push('\n');
        }
        out
    }

    /// JSON dump: `{"column_names": [...], "rows": [{column: value}]}`
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), serde_json::Value::String(value.to_plain())))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();

        serde_json::json!({
            "column_names": self.columns,
            "rows": rows,
        })
    }
}

/// An open connection to a data store. Closed when dropped.
pub trait DataConnection {
    /// Run a command with no result set; returns the affected row count
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataError>;

    /// Run a query and collect its rows
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DataError>;
}

/// Opens connections from their settings definitions
pub trait Connector: Send + Sync {
    fn open(&self, definition: &ConnectionDefinition) -> Result<Box<dyn DataConnection>, DataError>;
}

/// Connector used when no driver is compiled in; every open fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableConnector;

impl Connector for UnavailableConnector {
    fn open(&self, definition: &ConnectionDefinition) -> Result<Box<dyn DataConnection>, DataError> {
        Err(DataError::Unsupported {
            name: definition.name.clone(),
            connection_string: definition.connection_string.clone(),
        })
    }
}

/// The connector the CLI uses
#[cfg(feature = "sqlite")]
pub fn default_connector() -> Result<Arc<dyn Connector>, DataError> {
    Ok(Arc::new(SqlxConnector::new()?))
}

/// The connector the CLI uses
#[cfg(not(feature = "sqlite"))]
pub fn default_connector() -> Result<Arc<dyn Connector>, DataError> {
    Ok(Arc::new(UnavailableConnector))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![SqlValue::Integer(1), SqlValue::Text("Ada \"the\" first".to_string())],
                vec![SqlValue::Integer(2), SqlValue::Null],
            ],
        }
    }

    #[test]
    fn test_tsv_dump() {
        let tsv = sample().to_tsv();
        let lines: Vec<&str> = tsv.lines().collect();

        assert_eq!(lines[0], "-".repeat("id\tname".len() + 6));
        assert_eq!(lines[1], "id\tname");
        assert_eq!(lines[3], "1\t\"Ada \\\"the\\\" first\"\t");
        assert_eq!(lines[4], "2\tNULL\t");
    }

    #[test]
    fn test_tsv_dump_empty() {
        assert_eq!(ResultSet::default().to_tsv(), "");
    }

    #[test]
    fn test_json_dump() {
        let json = sample().to_json();
        assert_eq!(json["column_names"][1], "name");
        assert_eq!(json["rows"][0]["id"], "1");
        assert_eq!(json["rows"][1]["name"], "");
    }

    #[test]
    fn test_unavailable_connector() {
        let definition = ConnectionDefinition {
            name: "warehouse".to_string(),
            connection_string: "postgres://localhost".to_string(),
        };
        let err = UnavailableConnector.open(&definition).err().unwrap();
        assert!(matches!(err, DataError::Unsupported { .. }));
    }
}
