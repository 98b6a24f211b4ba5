//! SQLite datastore on `rusqlite`
//!
//! One connection guarded by a mutex. Statements run synchronously and
//! malformed SQL surfaces as `OrmError::Grammar`.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use tessera_core::SqliteConfig;
use tracing::debug;

use super::core::{ColumnValue, ResultRow, StatementExecutor};
use crate::error::{OrmError, OrmResult};

pub struct SqliteDatastore {
    connection: Mutex<Connection>,
    name: String,
}

fn map_error(sql: &str, error: rusqlite::Error) -> OrmError {
    match error {
        rusqlite::Error::SqliteFailure(failure, message) if failure.code == ErrorCode::Unknown => {
            OrmError::Grammar {
                sql: sql.to_string(),
                message: message.unwrap_or_else(|| failure.to_string()),
            }
        }
        other => OrmError::Storage(other),
    }
}

impl SqliteDatastore {
    /// Open the database a configuration names
    pub fn open(config: &SqliteConfig) -> OrmResult<Self> {
        if config.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open_path(&config.db_name)
        }
    }

    pub fn open_path(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let connection = Connection::open(path)?;
        debug!("Opened SQLite database {}", path.display());
        Ok(Self::from_connection(connection, path.display().to_string()))
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        let connection = Connection::open_in_memory()?;
        debug!("Opened in-memory SQLite database");
        Ok(Self::from_connection(connection, ":memory:".to_string()))
    }

    fn from_connection(connection: Connection, name: String) -> Self {
        Self {
            connection: Mutex::new(connection),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version stored in the database header
    pub fn user_version(&self) -> OrmResult<u32> {
        let version: i64 = self
            .connection
            .lock()
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(u32::try_from(version).unwrap_or_default())
    }

    pub fn set_user_version(&self, version: u32) -> OrmResult<()> {
        self.connection
            .lock()
            .pragma_update(None, "user_version", i64::from(version))?;
        Ok(())
    }

    /// Whether the connection is inside an explicit transaction
    pub fn in_transaction(&self) -> bool {
        !self.connection.lock().is_autocommit()
    }

    pub fn into_shared(self) -> Arc<dyn StatementExecutor> {
        Arc::new(self)
    }
}

impl StatementExecutor for SqliteDatastore {
    fn execute(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<usize> {
        debug!(sql, "execute");
        self.connection
            .lock()
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| map_error(sql, e))
    }

    fn insert(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<i64> {
        debug!(sql, "insert");
        let connection = self.connection.lock();
        connection
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| map_error(sql, e))?;
        Ok(connection.last_insert_rowid())
    }

    fn query(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<Vec<ResultRow>> {
        debug!(sql, "query");
        let connection = self.connection.lock();
        let mut statement = connection.prepare(sql).map_err(|e| map_error(sql, e))?;
        let columns: Arc<[String]> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let count = columns.len();

        let mut rows = statement
            .query(params_from_iter(params.iter()))
            .map_err(|e| map_error(sql, e))?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(count);
            for index in 0..count {
                values.push(ColumnValue::from(row.get_ref(index)?));
            }
            results.push(ResultRow::new(columns.clone(), values));
        }
        Ok(results)
    }

    fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        debug!(sql, "execute batch");
        self.connection
            .lock()
            .execute_batch(sql)
            .map_err(|e| map_error(sql, e))
    }
}

impl std::fmt::Debug for SqliteDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatastore")
            .field("name", &self.name)
            .finish()
    }
}
