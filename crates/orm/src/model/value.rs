//! In-memory field values and the fixed set of field types the ORM maps.

use std::fmt;
use std::hash::Hasher;

use chrono::{DateTime, Utc};

use crate::error::{OrmError, OrmResult};

/// The field types a model may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Int,
    Long,
    Float,
    Double,
    Short,
    Bool,
    Byte,
    Bytes,
    Char,
    Date,
}

impl FieldType {
    /// Integral types can back an autoincrement key
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Short | Self::Byte)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral() || matches!(self, Self::Float | Self::Double)
    }

    /// Convert a value into this type, widening or narrowing numbers where
    /// the value fits.
    pub fn coerce(self, value: Value) -> OrmResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = |value: &Value| {
            OrmError::conversion(format!("cannot convert {} to {:?}", value, self))
        };
        let converted = match self {
            Self::Text => match value {
                Value::Text(s) => Value::Text(s),
                Value::Char(c) => Value::Text(c.to_string()),
                other => return Err(mismatch(&other)),
            },
            Self::Int => Value::Int(narrow(&value, mismatch)?),
            Self::Long => Value::Long(value.as_i64().ok_or_else(|| mismatch(&value))?),
            Self::Short => Value::Short(narrow(&value, mismatch)?),
            Self::Byte => Value::Byte(narrow(&value, mismatch)?),
            Self::Float => Value::Float(value.as_f64().ok_or_else(|| mismatch(&value))? as f32),
            Self::Double => Value::Double(value.as_f64().ok_or_else(|| mismatch(&value))?),
            Self::Bool => match value {
                Value::Bool(b) => Value::Bool(b),
                ref other => Value::Bool(other.as_i64().ok_or_else(|| mismatch(other))? != 0),
            },
            Self::Bytes => match value {
                Value::Bytes(b) => Value::Bytes(b),
                other => return Err(mismatch(&other)),
            },
            Self::Char => match value {
                Value::Char(c) => Value::Char(c),
                Value::Text(ref s) if s.chars().count() == 1 => {
                    Value::Char(s.chars().next().unwrap_or_default())
                }
                other => return Err(mismatch(&other)),
            },
            Self::Date => match value {
                Value::Date(d) => Value::Date(d),
                other => return Err(mismatch(&other)),
            },
        };
        Ok(converted)
    }
}

fn narrow<T, F>(value: &Value, mismatch: F) -> OrmResult<T>
where
    T: TryFrom<i64>,
    F: Fn(&Value) -> OrmError,
{
    value
        .as_i64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| mismatch(value))
}

/// A typed in-memory field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Text(String),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The field type this value naturally belongs to
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => FieldType::Bool,
            Value::Byte(_) => FieldType::Byte,
            Value::Short(_) => FieldType::Short,
            Value::Int(_) => FieldType::Int,
            Value::Long(_) => FieldType::Long,
            Value::Float(_) => FieldType::Float,
            Value::Double(_) => FieldType::Double,
            Value::Char(_) => FieldType::Char,
            Value::Text(_) => FieldType::Text,
            Value::Bytes(_) => FieldType::Bytes,
            Value::Date(_) => FieldType::Date,
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(f) => Some(*f),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Null or a numeric zero
    pub fn is_null_or_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => *f == 0.0,
            Value::Double(f) => *f == 0.0,
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                self.as_i64() == Some(0)
            }
            _ => false,
        }
    }

    /// Feed a stable representation of the value into a hasher
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                state.write_u8(u8::from(*b));
            }
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                state.write_u8(2);
                state.write_i64(self.as_i64().unwrap_or_default());
            }
            Value::Float(_) | Value::Double(_) => {
                let f = self.as_f64().unwrap_or_default();
                state.write_u8(3);
                // -0.0 and 0.0 compare equal and must hash equal
                state.write_u64(if f == 0.0 { 0 } else { f.to_bits() });
            }
            Value::Char(c) => {
                state.write_u8(4);
                state.write_u32(*c as u32);
            }
            Value::Text(s) => {
                state.write_u8(5);
                state.write(s.as_bytes());
                state.write_u8(0xff);
            }
            Value::Bytes(b) => {
                state.write_u8(6);
                state.write_usize(b.len());
                state.write(b);
            }
            Value::Date(d) => {
                state.write_u8(7);
                state.write_i64(d.timestamp_nanos_opt().unwrap_or_else(|| d.timestamp()));
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Short(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => Text,
    Vec<u8> => Bytes,
    DateTime<Utc> => Date,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A Rust type that can back a persistent scalar field
pub trait FieldValue: Clone + Send + Sync + 'static {
    /// Declared field type
    const TYPE: FieldType;

    /// Whether the Rust type itself can represent NULL
    const OPTIONAL: bool = false;

    fn to_value(&self) -> Value;

    /// Build the field from a value. NULL yields the type's default for
    /// non-optional fields.
    fn from_value(value: Value) -> OrmResult<Self>;
}

macro_rules! field_value {
    ($($ty:ty => $kind:ident, $variant:ident);* $(;)?) => {
        $(
            impl FieldValue for $ty {
                const TYPE: FieldType = FieldType::$kind;

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> OrmResult<Self> {
                    match FieldType::$kind.coerce(value)? {
                        Value::$variant(v) => Ok(v),
                        _ => Ok(<$ty>::default()),
                    }
                }
            }
        )*
    };
}

field_value! {
    String => Text, Text;
    i32 => Int, Int;
    i64 => Long, Long;
    f32 => Float, Float;
    f64 => Double, Double;
    i16 => Short, Short;
    bool => Bool, Bool;
    i8 => Byte, Byte;
    Vec<u8> => Bytes, Bytes;
    char => Char, Char;
    DateTime<Utc> => Date, Date;
}

impl<T: FieldValue> FieldValue for Option<T> {
    const TYPE: FieldType = T::TYPE;
    const OPTIONAL: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> OrmResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
