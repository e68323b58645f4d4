//! Statement execution contract and row materialization.
//!
//! The toolkit never talks to a database itself. A [`StatementExecutor`] runs the SQL
//! the accessor builds and hands back [`Row`]s; a [`RowMapper`] turns each row into a
//! value of the caller's choosing.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{DaoError, Entity, EntityModel, FromValue, Operation, Value};

/// One result row: column labels and their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `column`, compared case-insensitively.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.index_of(column).map(|idx| &self.values[idx])
    }

    pub fn at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed read of `column`; a missing column reads as null.
    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T, DaoError> {
        T::from_value(self.get(column).cloned().unwrap_or(Value::Null))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

/// Runs SQL with positional `?` parameters.
///
/// Implementations are assumed safe for concurrent use; the toolkit adds no locking,
/// pooling or transactions on top.
pub trait StatementExecutor: Send + Sync {
    /// Run a statement and return the affected row count.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError>;

    /// Run an insert and return the key the database generated for it.
    fn insert_returning_key(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError>;

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DaoError>;

    /// First row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DaoError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// First column of the first row; null when there is none.
    fn scalar(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError> {
        Ok(self
            .query_one(sql, params)?
            .and_then(|row| row.values.into_iter().next())
            .unwrap_or(Value::Null))
    }
}

impl<X: StatementExecutor + ?Sized> StatementExecutor for Arc<X> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        (**self).execute(sql, params)
    }

    fn insert_returning_key(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError> {
        (**self).insert_returning_key(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DaoError> {
        (**self).query(sql, params)
    }
}

impl<X: StatementExecutor + ?Sized> StatementExecutor for &X {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        (**self).execute(sql, params)
    }

    fn insert_returning_key(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError> {
        (**self).insert_returning_key(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DaoError> {
        (**self).query(sql, params)
    }
}

/// Converts one row into a `T`.
pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T, DaoError>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row) -> Result<T, DaoError>,
{
    fn map_row(&self, row: &Row) -> Result<T, DaoError> {
        self(row)
    }
}

type RowHook<T> = Arc<dyn Fn(&mut T, &Row) -> Result<(), DaoError> + Send + Sync>;

/// Materializes entities: a fresh `T::default()` per row, every mapped column present
/// in the row and not ignored for query is coerced and written through its setter.
/// Null values are skipped, leaving the field at its default.
pub struct EntityRowMapper<T> {
    model: Arc<EntityModel<T>>,
    hook: Option<RowHook<T>>,
}

impl<T: Entity> EntityRowMapper<T> {
    pub fn new(model: Arc<EntityModel<T>>) -> Self {
        Self { model, hook: None }
    }

    /// Run `hook` on each entity after its columns are written.
    pub fn with_hook(
        mut self,
        hook: impl Fn(&mut T, &Row) -> Result<(), DaoError> + Send + Sync + 'static,
    ) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }
}

impl<T> Clone for EntityRowMapper<T> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<T: Entity> RowMapper<T> for EntityRowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T, DaoError> {
        let mut entity = T::default();

        for field in self.model.metadata().fields() {
            let readable = !field.ignore.contains(Operation::Query);
            if !readable || !self.model.is_writable(&field.property) {
                continue;
            }
            let Some(value) = row.get(&field.column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            self.model.write(&mut entity, &field.property, value.clone())?;
        }

        if let Some(hook) = &self.hook {
            hook(&mut entity, row)?;
        }

        Ok(entity)
    }
}

/// Maps rows into any `DeserializeOwned` type through a JSON object keyed by column
/// label. Null columns are left out so `#[serde(default)]` fields keep their defaults.
pub struct SerdeRowMapper<D> {
    _marker: PhantomData<fn() -> D>,
}

impl<D> SerdeRowMapper<D> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<D> Default for SerdeRowMapper<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeserializeOwned> RowMapper<D> for SerdeRowMapper<D> {
    fn map_row(&self, row: &Row) -> Result<D, DaoError> {
        let object: serde_json::Map<String, serde_json::Value> = row
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(column, value)| (column.to_string(), value.to_json()))
            .collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityDescriptor, FieldDescriptor, IgnoreSet, StorageType};
    use chrono::NaiveDate;
    use serde::Deserialize;

    #[derive(Debug, Default)]
    struct Event {
        id: Option<i64>,
        title: Option<String>,
        day: Option<NaiveDate>,
        secret: Option<String>,
        note: String,
    }

    impl Entity for Event {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::new()
                .table("t_event")
                .field(
                    FieldDescriptor::new("id", StorageType::Integer)
                        .primary_key(Some("auto_increment"))
                        .getter(|e: &Event| e.id.into())
                        .setter(|e: &mut Event, v| {
                            e.id = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                .field(
                    FieldDescriptor::new("title", StorageType::Text)
                        .getter(|e: &Event| e.title.clone().into())
                        .setter(|e: &mut Event, v| {
                            e.title = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                .field(
                    FieldDescriptor::new("day", StorageType::Date)
                        .getter(|e: &Event| e.day.into())
                        .setter(|e: &mut Event, v| {
                            e.day = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                .field(
                    FieldDescriptor::new("secret", StorageType::Text)
                        .ignore(IgnoreSet::of(&[Operation::Query]))
                        .getter(|e: &Event| e.secret.clone().into())
                        .setter(|e: &mut Event, v| {
                            e.secret = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
        }
    }

    #[test]
    fn row_lookup_is_case_insensitive() {
        let row = Row::new().with("ID", 7).with("title", "launch");
        assert_eq!(row.index_of("id"), Some(0));
        assert!(row.has_column("TITLE"));
        assert_eq!(row.get_as::<Option<i64>>("id").unwrap(), Some(7));
        assert_eq!(row.get_as::<Option<String>>("missing").unwrap(), None);
    }

    #[test]
    fn entity_mapper_coerces_and_skips_nulls_and_query_ignored() {
        let mapper = EntityRowMapper::new(Event::model().unwrap());
        let row = Row::new()
            .with("id", 3u64)
            .with("title", Value::Null)
            .with(
                "day",
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
            )
            .with("secret", "s3cr3t")
            .with("unmapped", "x");

        let event = mapper.map_row(&row).unwrap();
        assert_eq!(event.id, Some(3));
        assert_eq!(event.title, None);
        assert_eq!(event.day, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(event.secret, None);
    }

    #[test]
    fn entity_mapper_runs_hook_after_columns() {
        let mapper =
            EntityRowMapper::new(Event::model().unwrap()).with_hook(|e: &mut Event, row| {
                e.note = format!("{} columns", row.len());
                Ok(())
            });
        let event = mapper.map_row(&Row::new().with("id", 1)).unwrap();
        assert_eq!(event.note, "1 columns");
    }

    #[test]
    fn serde_mapper_reads_by_column_label() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Summary {
            name: String,
            #[serde(default)]
            total: i64,
        }

        let mapper = SerdeRowMapper::<Summary>::new();
        let summary = mapper
            .map_row(&Row::new().with("name", "kim").with("total", Value::Null))
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                name: "kim".into(),
                total: 0
            }
        );
    }

    #[test]
    fn closures_are_row_mappers() {
        let mapper = |row: &Row| row.get_as::<i64>("n");
        assert_eq!(mapper.map_row(&Row::new().with("n", 5)).unwrap(), 5);
    }
}
