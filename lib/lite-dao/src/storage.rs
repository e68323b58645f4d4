//! Declared storage types and the coercion applied at the row and statement boundaries.

use std::str::FromStr;

use chrono::NaiveTime;

use crate::value::{parse_date, parse_timestamp};
use crate::{DaoError, Value};

/// Storage type declared for an entity field.
///
/// The derive macro infers it from the Rust field type; `#[column(storage = "...")]`
/// overrides it (e.g. a `NaiveDateTime` field stored in a DATE column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// No declared type: values pass through untouched.
    #[default]
    Any,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    Timestamp,
    Bytes,
    Json,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Any => "any",
            StorageType::Text => "text",
            StorageType::Integer => "integer",
            StorageType::Float => "float",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
            StorageType::Time => "time",
            StorageType::Timestamp => "timestamp",
            StorageType::Bytes => "bytes",
            StorageType::Json => "json",
        }
    }

    /// Convert `value` into the representation this storage type expects.
    ///
    /// Null always stays null. Temporal values are narrowed or widened (a timestamp
    /// bound to a DATE column loses its time part, a date read into a timestamp field
    /// becomes midnight).
    pub fn coerce(&self, value: Value) -> Result<Value, DaoError> {
        if value.is_null() {
            return Ok(value);
        }

        let coerced = match (self, value) {
            (StorageType::Any, v) => v,

            (StorageType::Date, Value::Timestamp(dt)) => Value::Date(dt.date()),
            (StorageType::Date, Value::Text(s)) => {
                Value::Date(parse_date(&s).ok_or_else(|| invalid(&s, "date"))?)
            }

            (StorageType::Timestamp, Value::Date(d)) => {
                Value::Timestamp(d.and_time(NaiveTime::MIN))
            }
            (StorageType::Timestamp, Value::Text(s)) => {
                Value::Timestamp(parse_timestamp(&s).ok_or_else(|| invalid(&s, "timestamp"))?)
            }

            (StorageType::Time, Value::Timestamp(dt)) => Value::Time(dt.time()),
            (StorageType::Time, Value::Text(s)) => Value::Time(
                NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .map_err(|_| invalid(&s, "time"))?,
            ),

            (StorageType::Integer, Value::Bool(b)) => Value::Int(b as i64),
            (StorageType::Integer, Value::Float(n)) if n.fract() == 0.0 => Value::Int(n as i64),
            (StorageType::Integer, Value::Text(s)) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Value::Int(n)
                } else {
                    Value::UInt(trimmed.parse::<u64>().map_err(|_| invalid(&s, "integer"))?)
                }
            }

            (StorageType::Float, Value::Int(n)) => Value::Float(n as f64),
            (StorageType::Float, Value::UInt(n)) => Value::Float(n as f64),
            (StorageType::Float, Value::Text(s)) => {
                Value::Float(s.trim().parse::<f64>().map_err(|_| invalid(&s, "float"))?)
            }

            (StorageType::Boolean, Value::Int(n)) => Value::Bool(n != 0),
            (StorageType::Boolean, Value::UInt(n)) => Value::Bool(n != 0),
            (StorageType::Boolean, Value::Text(s)) => {
                Value::Bool(s == "1" || s.eq_ignore_ascii_case("true"))
            }

            (StorageType::Text, Value::Bytes(b)) => {
                Value::Text(String::from_utf8(b).map_err(|e| {
                    DaoError::Conversion(format!("Invalid UTF-8 text: {}", e))
                })?)
            }
            (
                StorageType::Text,
                v @ (Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Bool(_)),
            ) => Value::Text(v.to_string()),

            (StorageType::Bytes, Value::Text(s)) => Value::Bytes(s.into_bytes()),

            (StorageType::Json, Value::Text(s)) => Value::Json(serde_json::from_str(&s)?),

            (_, v) => v,
        };

        Ok(coerced)
    }

    /// Parse a declared default (`#[column(default = "...")]`) into a value.
    pub fn parse_default(&self, raw: &str) -> Result<Value, DaoError> {
        match self {
            StorageType::Any | StorageType::Text => Ok(Value::Text(raw.to_string())),
            _ => self.coerce(Value::Text(raw.to_string())),
        }
    }
}

impl FromStr for StorageType {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(StorageType::Any),
            "text" => Ok(StorageType::Text),
            "integer" => Ok(StorageType::Integer),
            "float" => Ok(StorageType::Float),
            "boolean" => Ok(StorageType::Boolean),
            "date" => Ok(StorageType::Date),
            "time" => Ok(StorageType::Time),
            "timestamp" => Ok(StorageType::Timestamp),
            "bytes" => Ok(StorageType::Bytes),
            "json" => Ok(StorageType::Json),
            other => Err(DaoError::Configuration(format!("Unknown storage type: {}", other))),
        }
    }
}

fn invalid(raw: &str, target: &str) -> DaoError {
    DaoError::Conversion(format!("Invalid {} value: {}", target, raw))
}
