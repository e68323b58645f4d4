//! Generic data accessor: typed CRUD and paged queries over a [`StatementExecutor`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::executor::{EntityRowMapper, RowMapper, StatementExecutor};
use crate::metadata::UUID_SIMPLE_LENGTH;
use crate::template::{counted, paged};
use crate::{
    DaoError, Entity, EntityMetadata, EntityModel, FromValue, IdStrategy, Operation,
    PageRequest, PagedResult, Row, Template, Value,
};

/// Random lowercase hex identifier: the last `length` characters of a v4 UUID in
/// simple form.
pub fn generate_uuid(length: usize) -> Result<String, DaoError> {
    if length == 0 || length > UUID_SIMPLE_LENGTH {
        return Err(DaoError::Operation(format!(
            "UUID length must be between 1 and {}, got {}",
            UUID_SIMPLE_LENGTH, length
        )));
    }
    let simple = uuid::Uuid::new_v4().simple().to_string();
    Ok(simple[UUID_SIMPLE_LENGTH - length..].to_string())
}

/// Data accessor for entity type `T`.
///
/// Statements are built from the entity metadata and run through `X`. Lookups that
/// find nothing return `None`; they never fail for that reason.
pub struct Dao<T, X> {
    executor: X,
    model: Arc<EntityModel<T>>,
}

impl<T, X: Clone> Clone for Dao<T, X> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            model: self.model.clone(),
        }
    }
}

impl<T: Entity, X: StatementExecutor> Dao<T, X> {
    /// Fails with the configuration error of `T` if its metadata is invalid.
    pub fn new(executor: X) -> Result<Self, DaoError> {
        Ok(Self {
            executor,
            model: T::model()?,
        })
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn model(&self) -> &Arc<EntityModel<T>> {
        &self.model
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        self.model.metadata()
    }

    pub fn properties_mapper(&self) -> HashMap<String, String> {
        self.metadata().properties_mapper()
    }

    pub fn columns_mapper(&self) -> HashMap<String, String> {
        self.metadata().columns_mapper()
    }

    pub fn column(&self, property: &str) -> Option<&str> {
        self.metadata().column(property)
    }

    /// property → column plus `tableName`, for `Template::add_grouped_vars`.
    pub fn grouped_vars(&self) -> HashMap<String, String> {
        let mut vars = self.properties_mapper();
        vars.insert(
            "tableName".to_string(),
            self.metadata().table_name().to_string(),
        );
        vars
    }

    /// A template preloaded with `@property` for every field and `@tableName`.
    pub fn template(&self) -> Template {
        Template::with_vars(self.grouped_vars())
    }

    /// [`Dao::template`] in auto-alias mode, starting with `text`.
    pub fn sql(&self, text: &str) -> Template {
        self.template().auto_alias(true).sql(text)
    }

    pub fn row_mapper(&self) -> EntityRowMapper<T> {
        EntityRowMapper::new(self.model.clone())
    }

    /// Entity mapper running `hook` after the mapped columns are written.
    pub fn row_mapper_with(
        &self,
        hook: impl Fn(&mut T, &Row) -> Result<(), DaoError> + Send + Sync + 'static,
    ) -> EntityRowMapper<T> {
        self.row_mapper().with_hook(hook)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        debug!(sql = %sql, params = params.len(), "execute");
        self.executor.execute(sql, params)
    }

    fn fetch<R>(
        &self,
        sql: &str,
        mapper: &impl RowMapper<R>,
        params: &[Value],
    ) -> Result<Vec<R>, DaoError> {
        debug!(sql = %sql, params = params.len(), "query");
        self.executor
            .query(sql, params)?
            .iter()
            .map(|row| mapper.map_row(row))
            .collect()
    }

    fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        debug!(sql = %sql, params = params.len(), "count");
        let total: Option<u64> = FromValue::from_value(self.executor.scalar(sql, params)?)?;
        Ok(total.unwrap_or(0))
    }

    pub fn get_by_id(&self, id: impl Into<Value>) -> Result<Option<T>, DaoError> {
        let meta = self.metadata();
        let sql = format!(
            "select * from {} where {} = ?",
            meta.table_name(),
            meta.primary_column()
        );
        Ok(self
            .fetch(&sql, &self.row_mapper(), &[id.into()])?
            .into_iter()
            .next())
    }

    /// Insert `entity`, generating its key according to the id strategy.
    ///
    /// Returns the key the entity ended up with; for `uuid` and `auto_increment` it
    /// has also been written back onto the entity.
    pub fn insert(&self, entity: &mut T) -> Result<Value, DaoError> {
        let meta = self.metadata().clone();
        let primary = meta.primary_key();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, value) in self
            .model
            .value_map(entity, primary.strategy == IdStrategy::Assigned)?
        {
            let ignored = meta
                .property(&column)
                .map(|p| meta.is_ignored(p, Operation::Insert))
                .unwrap_or(false);
            if !ignored {
                columns.push(column);
                values.push(value);
            }
        }

        match primary.strategy {
            IdStrategy::Assigned => {
                let id = self
                    .model
                    .read(entity, &primary.property)?
                    .unwrap_or(Value::Null);
                if id.is_null() {
                    return Err(DaoError::Operation(format!(
                        "Assigned primary key {} of {} is null",
                        primary.property,
                        meta.table_name()
                    )));
                }
                self.execute(&insert_sql(meta.table_name(), &columns), &values)?;
                Ok(id)
            }
            IdStrategy::AutoIncrement => {
                let sql = insert_sql(meta.table_name(), &columns);
                debug!(sql = %sql, params = values.len(), "insert returning key");
                let key = self.executor.insert_returning_key(&sql, &values)?;
                self.model.write(entity, &primary.property, key.clone())?;
                Ok(key)
            }
            IdStrategy::Uuid => {
                let id = Value::Text(generate_uuid(primary.uuid_length)?);
                columns.insert(0, primary.column.clone());
                values.insert(0, id.clone());
                self.execute(&insert_sql(meta.table_name(), &columns), &values)?;
                self.model.write(entity, &primary.property, id.clone())?;
                Ok(id)
            }
        }
    }

    /// `update(entity)` skipping null values.
    pub fn update(&self, entity: &T) -> Result<u64, DaoError> {
        self.update_with(entity, false, &[])
    }

    /// `update(entity)` writing null values too.
    pub fn update_include_nulls(&self, entity: &T) -> Result<u64, DaoError> {
        self.update_with(entity, true, &[])
    }

    /// Update the row keyed by the entity's primary key.
    ///
    /// Columns ignored for update and properties listed in `exclude` are left out, as
    /// are null values unless `include_nulls` is set.
    pub fn update_with(
        &self,
        entity: &T,
        include_nulls: bool,
        exclude: &[&str],
    ) -> Result<u64, DaoError> {
        let meta = self.metadata();
        let primary = meta.primary_key();

        let id = self
            .model
            .read(entity, &primary.property)?
            .unwrap_or(Value::Null);
        if id.is_null() {
            return Err(DaoError::Operation(format!(
                "Cannot update {} with a null {}",
                meta.table_name(),
                primary.property
            )));
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (column, value) in self.model.value_map(entity, false)? {
            let Some(property) = meta.property(&column) else {
                continue;
            };
            if meta.is_ignored(property, Operation::Update)
                || exclude.contains(&property)
                || (!include_nulls && value.is_null())
            {
                continue;
            }
            assignments.push(format!("{} = ?", column));
            values.push(value);
        }

        if assignments.is_empty() {
            return Err(DaoError::Operation(format!(
                "Nothing to update on {} for {} = {}",
                meta.table_name(),
                primary.column,
                id
            )));
        }

        values.push(id);
        let sql = format!(
            "update {} set {} where {} = ?",
            meta.table_name(),
            assignments.join(", "),
            primary.column
        );
        self.execute(&sql, &values)
    }

    pub fn delete(&self, id: impl Into<Value>) -> Result<u64, DaoError> {
        let meta = self.metadata();
        let sql = format!(
            "delete from {} where {} = ?",
            meta.table_name(),
            meta.primary_column()
        );
        self.execute(&sql, &[id.into()])
    }

    pub fn query<R>(
        &self,
        sql: &str,
        mapper: &impl RowMapper<R>,
        params: &[Value],
    ) -> Result<Vec<R>, DaoError> {
        self.fetch(sql, mapper, params)
    }

    pub fn query_one<R>(
        &self,
        sql: &str,
        mapper: &impl RowMapper<R>,
        params: &[Value],
    ) -> Result<Option<R>, DaoError> {
        Ok(self.fetch(sql, mapper, params)?.into_iter().next())
    }

    /// At most `max` rows: `sql` goes through a template and gets `limit 0,max`.
    pub fn query_top<R>(
        &self,
        max: u64,
        sql: &str,
        mapper: &impl RowMapper<R>,
        params: &[Value],
    ) -> Result<Vec<R>, DaoError> {
        let sql = Template::new().sql(sql).resolve_paged(0, max)?;
        self.fetch(&sql, mapper, params)
    }

    /// Entities selected by `template`, with its positional and named parameters.
    pub fn query_template(&self, template: &Template) -> Result<Vec<T>, DaoError> {
        let (sql, params) = template.resolve_named()?;
        self.fetch(&sql, &self.row_mapper(), &params)
    }

    pub fn query_all(&self) -> Result<Vec<T>, DaoError> {
        let sql = format!("select * from {}", self.metadata().table_name());
        self.fetch(&sql, &self.row_mapper(), &[])
    }

    /// Run a count statement and read its single value.
    pub fn count(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        self.fetch_count(sql, params)
    }

    /// Count the unpaged statement first; when it is zero the row query is skipped.
    pub fn query_page<R>(
        &self,
        page: PageRequest,
        mapper: &impl RowMapper<R>,
        template: &Template,
        params: &[Value],
    ) -> Result<PagedResult<R>, DaoError> {
        let sql = template.resolve()?;
        let total = self.fetch_count(&counted(&sql), params)?;
        if total == 0 {
            return Ok(PagedResult::empty(page));
        }

        let data = self.fetch(&paged(&sql, page.start, page.limit), mapper, params)?;
        Ok(PagedResult {
            start: page.start,
            limit: page.limit,
            total,
            data,
        })
    }

    /// [`Dao::query_page`] for templates whose conditions use `:name` parameters.
    pub fn query_page_named<R>(
        &self,
        page: PageRequest,
        mapper: &impl RowMapper<R>,
        template: &Template,
    ) -> Result<PagedResult<R>, DaoError> {
        let (count_sql, count_params) = template.resolve_named_count()?;
        let total = self.fetch_count(&count_sql, &count_params)?;
        if total == 0 {
            return Ok(PagedResult::empty(page));
        }

        let (sql, params) = template.resolve_named_paged(page.start, page.limit)?;
        let data = self.fetch(&sql, mapper, &params)?;
        Ok(PagedResult {
            start: page.start,
            limit: page.limit,
            total,
            data,
        })
    }

    fn field_column(&self, property: &str) -> Result<&str, DaoError> {
        self.column(property).ok_or_else(|| {
            DaoError::Operation(format!(
                "Unknown property {} on {}",
                property,
                self.metadata().table_name()
            ))
        })
    }

    /// Read one column of the row keyed by `id`. `None` when the row is missing or
    /// the value is null.
    pub fn get_property_value<P: FromValue>(
        &self,
        id: impl Into<Value>,
        property: &str,
    ) -> Result<Option<P>, DaoError> {
        let column = self.field_column(property)?;
        let sql = format!(
            "select {} from {} where {} = ?",
            column,
            self.metadata().table_name(),
            self.metadata().primary_column()
        );
        debug!(sql = %sql, params = 1, "query");

        let Some(row) = self.executor.query_one(&sql, &[id.into()])? else {
            return Ok(None);
        };
        let storage = self
            .metadata()
            .field(property)
            .map(|f| f.storage)
            .unwrap_or_default();
        let value = storage.coerce(row.at(0).cloned().unwrap_or(Value::Null))?;
        if value.is_null() {
            return Ok(None);
        }
        P::from_value(value).map(Some)
    }

    /// Set one column of the row keyed by `id`.
    pub fn update_property(
        &self,
        id: impl Into<Value>,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<u64, DaoError> {
        let column = self.field_column(property)?;
        let storage = self
            .metadata()
            .field(property)
            .map(|f| f.storage)
            .unwrap_or_default();
        let sql = format!(
            "update {} set {} = ? where {} = ?",
            self.metadata().table_name(),
            column,
            self.metadata().primary_column()
        );
        self.execute(&sql, &[storage.coerce(value.into())?, id.into()])
    }
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let placeholders = vec!["?"; columns.len()];
    format!(
        "insert into {} ({}) values ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}
