//! SQLite connections via sqlx
//!
//! The engine runs steps synchronously, so each connection drives its sqlx
//! futures on a shared current-thread tokio runtime.

use crate::core::ConnectionDefinition;
use crate::data::{Connector, DataConnection, DataError, ResultSet, SqlValue};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Opens sqlx SQLite connections for `sqlite:` connection strings
pub struct SqlxConnector {
    runtime: Arc<Runtime>,
}

impl SqlxConnector {
    pub fn new() -> Result<Self, DataError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Connector for SqlxConnector {
    fn open(&self, definition: &ConnectionDefinition) -> Result<Box<dyn DataConnection>, DataError> {
        if !definition.connection_string.starts_with("sqlite:") {
            return Err(DataError::Unsupported {
                name: definition.name.clone(),
                connection_string: definition.connection_string.clone(),
            });
        }

        let conn = self
            .runtime
            .block_on(SqliteConnection::connect(&definition.connection_string))
            .map_err(|e| DataError::Connect {
                name: definition.name.clone(),
                message: e.to_string(),
            })?;

        debug!(connection = %definition.name, "Opened connection");

        Ok(Box::new(SqlxConnection {
            name: definition.name.clone(),
            runtime: Arc::clone(&self.runtime),
            conn: Some(conn),
        }))
    }
}

struct SqlxConnection {
    name: String,
    runtime: Arc<Runtime>,
    conn: Option<SqliteConnection>,
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Blob(v) => query.bind(v.clone()),
        };
    }
    query
}

fn decode_value(row: &SqliteRow, index: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Integer);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Real);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Text);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(SqlValue::Null, SqlValue::Blob);
    }
    SqlValue::Null
}

impl DataConnection for SqlxConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataError> {
        let conn = self.conn.as_mut().ok_or(DataError::Closed)?;

        let result = if params.is_empty() {
            // raw_sql runs every statement in the text, not just the first
            self.runtime.block_on(sqlx::raw_sql(sql).execute(&mut *conn))
        } else {
            let query = bind_params(sqlx::query(sql), params);
            self.runtime.block_on(query.execute(&mut *conn))
        };

        result
            .map(|r| r.rows_affected())
            .map_err(|e| DataError::Command(e.to_string()))
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DataError> {
        let conn = self.conn.as_mut().ok_or(DataError::Closed)?;

        let query = bind_params(sqlx::query(sql), params);
        let rows = self
            .runtime
            .block_on(query.fetch_all(&mut *conn))
            .map_err(|e| DataError::Command(e.to_string()))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_value(row, i)).collect())
            .collect();

        Ok(ResultSet { columns, rows })
    }
}

impl Drop for SqlxConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.close()) {
                debug!(connection = %self.name, "Error closing connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ConnectionDefinition {
        ConnectionDefinition {
            name: "scratch".to_string(),
            connection_string: "sqlite::memory:".to_string(),
        }
    }

    #[test]
    fn test_execute_and_query() {
        let connector = SqlxConnector::new().unwrap();
        let mut conn = connector.open(&memory()).unwrap();

        conn.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL);\
             INSERT INTO users (id, name, score) VALUES (1, 'ada', 1.5);",
            &[],
        )
        .unwrap();

        let affected = conn
            .execute(
                "INSERT INTO users (id, name, score) VALUES (?, ?, ?)",
                &[SqlValue::Integer(2), SqlValue::Text("grace".to_string()), SqlValue::Null],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let result = conn
            .query("SELECT id, name, score FROM users ORDER BY id", &[])
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][1], SqlValue::Text("ada".to_string()));
        assert_eq!(result.rows[0][2], SqlValue::Real(1.5));
        assert_eq!(result.rows[1][2], SqlValue::Null);
    }

    #[test]
    fn test_bad_sql_is_a_command_error() {
        let connector = SqlxConnector::new().unwrap();
        let mut conn = connector.open(&memory()).unwrap();

        let err = conn.execute("SELEC nonsense", &[]).unwrap_err();
        assert!(matches!(err, DataError::Command(_)));
    }

    #[test]
    fn test_non_sqlite_rejected() {
        let connector = SqlxConnector::new().unwrap();
        let definition = ConnectionDefinition {
            name: "warehouse".to_string(),
            connection_string: "mssql://server/db".to_string(),
        };
        assert!(matches!(
            connector.open(&definition).err().unwrap(),
            DataError::Unsupported { .. }
        ));
    }
}
