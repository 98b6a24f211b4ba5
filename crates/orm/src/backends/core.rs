//! Core Database Backend Traits
//!
//! The ORM talks to storage through two narrow seams: a statement executor
//! that runs SQL text and a row reader with positional getters.

use std::fmt;
use std::sync::Arc;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

use crate::error::{OrmError, OrmResult};

/// The small set of storage classes a column can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Integer,
    Real,
    Text,
    Blob,
    Null,
}

impl StorageType {
    /// Column type used in DDL
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob | Self::Null => "BLOB",
        }
    }
}

/// A value as stored in a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::Null => StorageType::Null,
            Self::Integer(_) => StorageType::Integer,
            Self::Real(_) => StorageType::Real,
            Self::Text(_) => StorageType::Text,
            Self::Blob(_) => StorageType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Real(f) => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Real(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for ColumnValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(n) => Self::Integer(n),
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            Self::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Real(r) => write!(f, "{}", r),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Positional access to one result row
pub trait RowReader {
    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> Option<&str>;

    fn column_index(&self, name: &str) -> Option<usize>;

    fn value(&self, index: usize) -> OrmResult<&ColumnValue>;

    fn is_null(&self, index: usize) -> OrmResult<bool> {
        Ok(self.value(index)?.is_null())
    }

    fn get_long(&self, index: usize) -> OrmResult<i64> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .as_i64()
            .ok_or_else(|| OrmError::conversion(format!("column {} is not an integer", index)))
    }

    fn get_int(&self, index: usize) -> OrmResult<i32> {
        let n = self.get_long(index)?;
        i32::try_from(n)
            .map_err(|_| OrmError::conversion(format!("{} does not fit in an int", n)))
    }

    fn get_short(&self, index: usize) -> OrmResult<i16> {
        let n = self.get_long(index)?;
        i16::try_from(n)
            .map_err(|_| OrmError::conversion(format!("{} does not fit in a short", n)))
    }

    fn get_double(&self, index: usize) -> OrmResult<f64> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(0.0);
        }
        value
            .as_f64()
            .ok_or_else(|| OrmError::conversion(format!("column {} is not numeric", index)))
    }

    fn get_float(&self, index: usize) -> OrmResult<f32> {
        Ok(self.get_double(index)? as f32)
    }

    fn get_string(&self, index: usize) -> OrmResult<Option<String>> {
        Ok(match self.value(index)? {
            ColumnValue::Null => None,
            ColumnValue::Text(s) => Some(s.clone()),
            ColumnValue::Integer(n) => Some(n.to_string()),
            ColumnValue::Real(f) => Some(f.to_string()),
            ColumnValue::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        })
    }

    fn get_blob(&self, index: usize) -> OrmResult<Option<Vec<u8>>> {
        Ok(match self.value(index)? {
            ColumnValue::Null => None,
            ColumnValue::Blob(b) => Some(b.clone()),
            ColumnValue::Text(s) => Some(s.as_bytes().to_vec()),
            other => {
                return Err(OrmError::conversion(format!(
                    "column {} holds {:?}, not a blob",
                    index,
                    other.storage_type()
                )))
            }
        })
    }
}

/// A materialised result row
#[derive(Debug, Clone)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<ColumnValue>,
}

impl ResultRow {
    pub fn new(columns: Arc<[String]>, values: Vec<ColumnValue>) -> Self {
        Self { columns, values }
    }

    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.column_index(name).and_then(|i| self.values.get(i))
    }
}

impl RowReader for ResultRow {
    fn column_count(&self) -> usize {
        self.values.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    fn value(&self, index: usize) -> OrmResult<&ColumnValue> {
        self.values
            .get(index)
            .ok_or_else(|| OrmError::invalid_argument(format!("no column at index {}", index)))
    }
}

/// Runs SQL against a storage engine
pub trait StatementExecutor: Send + Sync {
    /// Execute a mutation and return the affected row count
    fn execute(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<usize>;

    /// Execute an insert and return the generated row id
    fn insert(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<i64>;

    /// Execute a query and materialise every row
    fn query(&self, sql: &str, params: &[ColumnValue]) -> OrmResult<Vec<ResultRow>>;

    /// Execute several semicolon-separated statements without results
    fn execute_batch(&self, sql: &str) -> OrmResult<()>;
}
