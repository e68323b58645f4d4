//! Conversion between `lite_dao::Value` and MySQL arguments and rows.

use lite_dao::{DaoError, Row, Value};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::{Arguments, Column, Row as _, TypeInfo};

/// Decoding family of a MySQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Boolean,
    Signed,
    Unsigned,
    Float,
    Date,
    Time,
    Timestamp,
    Json,
    Bytes,
    Text,
}

/// Classify a MySQL type name as reported by sqlx.
pub(crate) fn column_kind(type_name: &str) -> ColumnKind {
    let upper = type_name.to_ascii_uppercase();
    match upper.as_str() {
        "BOOLEAN" => ColumnKind::Boolean,
        s if s.ends_with("UNSIGNED") => ColumnKind::Unsigned,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => ColumnKind::Signed,
        "FLOAT" | "DOUBLE" => ColumnKind::Float,
        "DATE" => ColumnKind::Date,
        "TIME" => ColumnKind::Time,
        "DATETIME" | "TIMESTAMP" => ColumnKind::Timestamp,
        "JSON" => ColumnKind::Json,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            ColumnKind::Bytes
        }
        // VARCHAR, CHAR, TEXT, DECIMAL, ENUM, SET and everything else
        _ => ColumnKind::Text,
    }
}

fn executor_error(e: impl std::fmt::Display) -> DaoError {
    DaoError::Executor(e.to_string())
}

/// Bind a Value to MySqlArguments.
pub(crate) fn bind_value(args: &mut MySqlArguments, value: &Value) -> Result<(), DaoError> {
    match value {
        Value::Null => args.add(None::<String>),
        Value::Bool(b) => args.add(*b),
        Value::Int(n) => args.add(*n),
        Value::UInt(n) => args.add(*n),
        Value::Float(n) => args.add(*n),
        Value::Text(s) => args.add(s.as_str()),
        Value::Bytes(b) => args.add(b.as_slice()),
        Value::Date(d) => args.add(*d),
        Value::Time(t) => args.add(*t),
        Value::Timestamp(dt) => args.add(*dt),
        Value::Json(json) => args.add(sqlx::types::Json(json)),
    }
    .map_err(executor_error)
}

pub(crate) fn bind_all(params: &[Value]) -> Result<MySqlArguments, DaoError> {
    let mut args = MySqlArguments::default();
    for value in params {
        bind_value(&mut args, value)?;
    }
    Ok(args)
}

/// Extract a column value from a row by position.
fn extract_column_value(row: &MySqlRow, idx: usize) -> Result<Value, DaoError> {
    let kind = column_kind(row.columns()[idx].type_info().name());

    let value = match kind {
        ColumnKind::Boolean => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Signed => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Unsigned => row
            .try_get::<Option<u64>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Float => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Time => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Json => row
            .try_get::<Option<serde_json::Value>, _>(idx)
            .map_err(executor_error)?
            .into(),
        ColumnKind::Bytes => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map_err(executor_error)?
            .into(),
        // DECIMAL and friends arrive as strings on the wire
        ColumnKind::Text => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .map_err(executor_error)?
            .into(),
    };

    Ok(value)
}

/// Convert a MySQL row into a toolkit row, keeping column labels and order.
pub(crate) fn convert_row(row: &MySqlRow) -> Result<Row, DaoError> {
    let mut converted = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), extract_column_value(row, idx)?);
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mysql_type_names() {
        assert_eq!(column_kind("BOOLEAN"), ColumnKind::Boolean);
        assert_eq!(column_kind("INT"), ColumnKind::Signed);
        assert_eq!(column_kind("BIGINT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("double"), ColumnKind::Float);
        assert_eq!(column_kind("DATE"), ColumnKind::Date);
        assert_eq!(column_kind("TIMESTAMP"), ColumnKind::Timestamp);
        assert_eq!(column_kind("DATETIME"), ColumnKind::Timestamp);
        assert_eq!(column_kind("JSON"), ColumnKind::Json);
        assert_eq!(column_kind("VARBINARY"), ColumnKind::Bytes);
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("DECIMAL"), ColumnKind::Text);
    }

    #[test]
    fn binds_every_value_kind() {
        let params = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-1),
            Value::UInt(1),
            Value::Float(1.5),
            Value::Text("kim".into()),
            Value::Bytes(vec![1, 2]),
            Value::Json(serde_json::json!({"a": 1})),
        ];
        let args = bind_all(&params).unwrap();
        assert_eq!(args.len(), params.len());
    }
}
