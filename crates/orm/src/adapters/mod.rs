//! Type adapters - conversions between field values, storage columns and
//! REST payload values.
//!
//! Every field type has a built-in adapter. Callers may register their own
//! adapter for a type; the most recent registration wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::backends::{ColumnValue, RowReader, StorageType};
use crate::error::{OrmError, OrmResult};
use crate::model::{FieldType, Value};

/// Bidirectional converter for one field type
pub trait TypeAdapter: Send + Sync {
    /// Column storage class
    fn storage_type(&self) -> StorageType;

    fn to_column(&self, value: &Value) -> OrmResult<ColumnValue>;

    /// Read a value from a result row
    fn read(&self, row: &dyn RowReader, index: usize) -> OrmResult<Value>;

    fn to_rest(&self, value: &Value) -> OrmResult<JsonValue>;

    fn from_rest(&self, value: &JsonValue) -> OrmResult<Value>;
}

/// Adapter for the fixed set of field types
#[derive(Debug, Clone, Copy)]
pub struct BuiltinAdapter {
    field_type: FieldType,
}

impl BuiltinAdapter {
    pub fn new(field_type: FieldType) -> Self {
        Self { field_type }
    }

    fn mismatch(&self, value: &dyn std::fmt::Display) -> OrmError {
        OrmError::conversion(format!("cannot convert {} to {:?}", value, self.field_type))
    }

    fn parse_date(&self, text: &str) -> OrmResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| OrmError::conversion(format!("invalid date '{}': {}", text, e)))
    }

    fn date_from_millis(&self, millis: i64) -> OrmResult<DateTime<Utc>> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| self.mismatch(&millis))
    }
}

impl TypeAdapter for BuiltinAdapter {
    fn storage_type(&self) -> StorageType {
        match self.field_type {
            FieldType::Int
            | FieldType::Long
            | FieldType::Short
            | FieldType::Bool
            | FieldType::Byte => StorageType::Integer,
            FieldType::Float | FieldType::Double => StorageType::Real,
            FieldType::Text | FieldType::Char | FieldType::Date => StorageType::Text,
            FieldType::Bytes => StorageType::Blob,
        }
    }

    fn to_column(&self, value: &Value) -> OrmResult<ColumnValue> {
        let value = self.field_type.coerce(value.clone())?;
        Ok(match value {
            Value::Null => ColumnValue::Null,
            Value::Bool(b) => ColumnValue::Integer(i64::from(b)),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                ColumnValue::Integer(value.as_i64().unwrap_or_default())
            }
            Value::Float(f) => ColumnValue::Real(f64::from(f)),
            Value::Double(f) => ColumnValue::Real(f),
            Value::Char(c) => ColumnValue::Text(c.to_string()),
            Value::Text(s) => ColumnValue::Text(s),
            Value::Bytes(b) => ColumnValue::Blob(b),
            Value::Date(d) => ColumnValue::Text(d.to_rfc3339()),
        })
    }

    fn read(&self, row: &dyn RowReader, index: usize) -> OrmResult<Value> {
        if row.is_null(index)? {
            return Ok(Value::Null);
        }
        Ok(match self.field_type {
            FieldType::Int => Value::Int(row.get_int(index)?),
            FieldType::Long => Value::Long(row.get_long(index)?),
            FieldType::Short => Value::Short(row.get_short(index)?),
            FieldType::Byte => {
                let n = row.get_long(index)?;
                Value::Byte(i8::try_from(n).map_err(|_| self.mismatch(&n))?)
            }
            FieldType::Bool => Value::Bool(row.get_long(index)? != 0),
            FieldType::Float => Value::Float(row.get_float(index)?),
            FieldType::Double => Value::Double(row.get_double(index)?),
            FieldType::Text => Value::Text(row.get_string(index)?.unwrap_or_default()),
            FieldType::Char => {
                let text = row.get_string(index)?.unwrap_or_default();
                match text.chars().next() {
                    Some(c) => Value::Char(c),
                    None => Value::Null,
                }
            }
            FieldType::Bytes => Value::Bytes(row.get_blob(index)?.unwrap_or_default()),
            FieldType::Date => match row.value(index)? {
                ColumnValue::Integer(millis) => Value::Date(self.date_from_millis(*millis)?),
                ColumnValue::Text(text) => Value::Date(self.parse_date(text)?),
                other => return Err(self.mismatch(other)),
            },
        })
    }

    fn to_rest(&self, value: &Value) -> OrmResult<JsonValue> {
        let value = self.field_type.coerce(value.clone())?;
        Ok(match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                JsonValue::from(value.as_i64().unwrap_or_default())
            }
            Value::Float(f) => JsonValue::from(f64::from(f)),
            Value::Double(f) => JsonValue::from(f),
            Value::Char(c) => JsonValue::String(c.to_string()),
            Value::Text(s) => JsonValue::String(s),
            Value::Bytes(b) => JsonValue::String(hex::encode(b)),
            Value::Date(d) => JsonValue::String(d.to_rfc3339()),
        })
    }

    fn from_rest(&self, value: &JsonValue) -> OrmResult<Value> {
        let raw = match value {
            JsonValue::Null => return Ok(Value::Null),
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Long(i),
                None => Value::Double(n.as_f64().ok_or_else(|| self.mismatch(n))?),
            },
            JsonValue::String(s) => match self.field_type {
                FieldType::Text | FieldType::Char => Value::Text(s.clone()),
                FieldType::Date => Value::Date(self.parse_date(s)?),
                FieldType::Bytes => Value::Bytes(
                    hex::decode(s).map_err(|e| OrmError::conversion(e.to_string()))?,
                ),
                FieldType::Bool => Value::Bool(matches!(s.as_str(), "true" | "1")),
                FieldType::Float | FieldType::Double => {
                    Value::Double(s.trim().parse().map_err(|_| self.mismatch(s))?)
                }
                _ => Value::Long(s.trim().parse().map_err(|_| self.mismatch(s))?),
            },
            other => return Err(self.mismatch(other)),
        };
        self.field_type.coerce(raw)
    }
}

/// Adapters keyed by field type
pub struct TypeAdapterRegistry {
    builtin: HashMap<FieldType, Arc<dyn TypeAdapter>>,
    custom: RwLock<HashMap<FieldType, Arc<dyn TypeAdapter>>>,
}

const ALL_FIELD_TYPES: [FieldType; 11] = [
    FieldType::Text,
    FieldType::Int,
    FieldType::Long,
    FieldType::Float,
    FieldType::Double,
    FieldType::Short,
    FieldType::Bool,
    FieldType::Byte,
    FieldType::Bytes,
    FieldType::Char,
    FieldType::Date,
];

impl Default for TypeAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeAdapterRegistry {
    pub fn new() -> Self {
        let builtin = ALL_FIELD_TYPES
            .iter()
            .map(|t| (*t, Arc::new(BuiltinAdapter::new(*t)) as Arc<dyn TypeAdapter>))
            .collect();
        Self {
            builtin,
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Register an adapter, replacing any earlier one for the same type
    pub fn register(&self, field_type: FieldType, adapter: Arc<dyn TypeAdapter>) {
        debug!("Registering custom type adapter for {:?}", field_type);
        self.custom.write().insert(field_type, adapter);
    }

    /// Adapter in effect for a type
    pub fn adapter(&self, field_type: FieldType) -> OrmResult<Arc<dyn TypeAdapter>> {
        if let Some(adapter) = self.custom.read().get(&field_type) {
            return Ok(adapter.clone());
        }
        self.builtin
            .get(&field_type)
            .cloned()
            .ok_or_else(|| OrmError::conversion(format!("no adapter for {:?}", field_type)))
    }

    pub fn has_custom(&self, field_type: FieldType) -> bool {
        self.custom.read().contains_key(&field_type)
    }
}

impl std::fmt::Debug for TypeAdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeAdapterRegistry")
            .field("custom", &self.custom.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
