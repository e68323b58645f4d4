//! SQL templates with symbolic placeholders.
//!
//! A [`Template`] accumulates SQL fragments and resolves, at the end, the small macro
//! language embedded in them:
//!
//! | Token             | Resolves to                                                  |
//! |-------------------|--------------------------------------------------------------|
//! | `@name`           | value registered with [`Template::add_var`]                  |
//! | `@ns!name`        | value `name` of the group registered with `add_grouped_vars` |
//! | `$alias`          | table of the entity bound under `alias`                      |
//! | `$alias.property` | column of `property` on that entity (`$alias.*` is `*`)      |
//! | `:name`           | named parameter, captured by `where`/`and`/`or`              |
//!
//! ```
//! use lite_dao::Template;
//!
//! let sql = Template::new()
//!     .add_var("tableName", "t_user")
//!     .sql("select * from @tableName")
//!     .resolve()
//!     .unwrap();
//! assert_eq!(sql, "select * from t_user");
//! ```

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::trace;

use crate::{DaoError, Entity, EntityMetadata, Value};

const MACRO_PATTERN: &str = r"@[A-Za-z_][A-Za-z0-9_]*(?:![A-Za-z_][A-Za-z0-9_]*)?";
const ENTITY_PATTERN: &str = r"\$[A-Za-z_][A-Za-z0-9_]*(?:\.(?:[A-Za-z_][A-Za-z0-9_]*|\*))?";
const NAMED_PATTERN: &str = r":([A-Za-z_][A-Za-z0-9_]*)";
const BIND_PATTERN: &str = r"\?|:([A-Za-z_][A-Za-z0-9_]*)";

static MACRO_RE: OnceLock<Regex> = OnceLock::new();
static ENTITY_RE: OnceLock<Regex> = OnceLock::new();
static NAMED_RE: OnceLock<Regex> = OnceLock::new();
static BIND_RE: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> Result<&'static Regex, DaoError> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(source).map_err(|e| DaoError::Template(e.to_string()))?;
    Ok(cell.get_or_init(|| re))
}

/// Byte ranges of `'...'` and `"..."` literals. A doubled quote inside a literal is an
/// escaped quote; an unterminated literal runs to the end of `text`.
fn quoted_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        loop {
            match bytes.get(i) {
                None => break,
                Some(&b) if b == quote && bytes.get(i + 1) == Some(&quote) => i += 2,
                Some(&b) if b == quote => {
                    i += 1;
                    break;
                }
                Some(_) => i += 1,
            }
        }
        spans.push(start..i);
    }
    spans
}

/// A match at `start` is a placeholder unless it sits in a literal or follows a `:`.
fn is_placeholder(text: &str, literals: &[Range<usize>], start: usize) -> bool {
    if start > 0 && text.as_bytes()[start - 1] == b':' {
        return false;
    }
    !literals.iter().any(|span| span.contains(&start))
}

/// `:name` matches in `text`, skipping `::` casts and quoted literals.
fn named_tokens<'t>(re: &Regex, text: &'t str) -> Vec<(usize, usize, &'t str)> {
    let literals = quoted_spans(text);
    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            if !is_placeholder(text, &literals, whole.start()) {
                return None;
            }
            Some((whole.start(), whole.end(), name.as_str()))
        })
        .collect()
}

/// Single-use SQL builder. Every method consumes and returns the template.
#[derive(Debug, Clone, Default)]
pub struct Template {
    text: String,
    vars: HashMap<String, String>,
    grouped: HashMap<String, HashMap<String, String>>,
    entities: HashMap<String, Arc<EntityMetadata>>,
    auto_alias: bool,
    has_where: bool,
    values: Vec<Value>,
    named: HashMap<String, Value>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a macro mapping (`name` → replacement for `@name`).
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new().add_vars(vars)
    }

    /// When on, `$alias` becomes `<table> alias` and `$alias.property` becomes
    /// `alias.<column>`.
    pub fn auto_alias(mut self, enabled: bool) -> Self {
        self.auto_alias = enabled;
        self
    }

    fn push(&mut self, fragment: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    /// Append raw SQL, trimmed, separated from what came before by one space.
    pub fn sql(mut self, text: &str) -> Self {
        self.push(text.trim());
        self
    }

    /// Same as [`Template::sql`].
    pub fn append(self, text: &str) -> Self {
        self.sql(text)
    }

    /// Append a table reference with an optional SQL alias.
    pub fn table(mut self, table: &str, alias: Option<&str>) -> Self {
        let fragment = match alias.map(str::trim).filter(|a| !a.is_empty()) {
            Some(alias) => format!("{} {}", table.trim(), alias),
            None => table.trim().to_string(),
        };
        self.push(&fragment);
        self
    }

    /// Append the table of entity `T`.
    pub fn entity_table<T: Entity>(self, alias: Option<&str>) -> Result<Self, DaoError> {
        let metadata = T::metadata()?;
        Ok(self.table(metadata.table_name(), alias))
    }

    pub fn add_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn add_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Register a mapping reachable only as `@namespace!name`, so that two joined
    /// tables can both expose e.g. `@id`.
    pub fn add_grouped_vars<K, V>(
        mut self,
        namespace: impl Into<String>,
        vars: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let group = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.grouped.insert(namespace.into(), group);
        self
    }

    /// Make `metadata` reachable as `$alias` / `$alias.property`.
    pub fn bind_entity(mut self, alias: impl Into<String>, metadata: Arc<EntityMetadata>) -> Self {
        self.entities.insert(alias.into(), metadata);
        self
    }

    /// [`Template::bind_entity`] with the metadata of `T`.
    pub fn bind<T: Entity>(self, alias: impl Into<String>) -> Result<Self, DaoError> {
        Ok(self.bind_entity(alias, T::metadata()?))
    }

    /// Append `where <text>` when `enabled`.
    ///
    /// The first condition appended to a template always uses `where`, whichever of
    /// `where`/`and`/`or` adds it.
    pub fn r#where(
        self,
        text: &str,
        enabled: bool,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Self, DaoError> {
        self.condition("where", text, enabled, params)
    }

    pub fn and(
        self,
        text: &str,
        enabled: bool,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Self, DaoError> {
        self.condition("and", text, enabled, params)
    }

    pub fn or(
        self,
        text: &str,
        enabled: bool,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Self, DaoError> {
        self.condition("or", text, enabled, params)
    }

    fn condition(
        mut self,
        keyword: &str,
        text: &str,
        enabled: bool,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Self, DaoError> {
        if !enabled {
            return Ok(self);
        }

        self.capture_params(text, params.into_iter().collect())?;

        let keyword = if self.has_where {
            keyword
        } else {
            self.has_where = true;
            "where"
        };
        self.push(&format!("{} {}", keyword, text.trim()));
        Ok(self)
    }

    // Positional when the fragment has no `:name`, otherwise one value per occurrence.
    fn capture_params(&mut self, text: &str, params: Vec<Value>) -> Result<(), DaoError> {
        let tokens = named_tokens(pattern(&NAMED_RE, NAMED_PATTERN)?, text);
        if tokens.is_empty() {
            self.values.extend(params);
            return Ok(());
        }
        if tokens.len() != params.len() {
            return Err(DaoError::Template(format!(
                "`{}` has {} named parameters but {} values were supplied",
                text.trim(),
                tokens.len(),
                params.len()
            )));
        }
        for ((_, _, name), value) in tokens.into_iter().zip(params) {
            self.named.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Append `order by`. `-field` sorts descending; `@field` goes through the macro
    /// mapping and falls back to the bare name.
    pub fn order(mut self, fields: &[&str]) -> Self {
        if fields.is_empty() {
            return self;
        }

        let orders: Vec<String> = fields
            .iter()
            .map(|field| {
                let (field, direction) = match field.strip_prefix('-') {
                    Some(rest) => (rest, "desc"),
                    None => (*field, "asc"),
                };
                let field = match field.strip_prefix('@') {
                    Some(name) => self.vars.get(name).map(String::as_str).unwrap_or(name),
                    None => field,
                };
                format!("{} {}", field, direction)
            })
            .collect();

        self.push(&format!("order by {}", orders.join(", ")));
        self
    }

    /// Add positional parameters.
    pub fn value(mut self, params: impl IntoIterator<Item = Value>) -> Self {
        self.values.extend(params);
        self
    }

    /// Add a named parameter directly.
    pub fn named_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Positional parameters in the order they were captured.
    pub fn params(&self) -> &[Value] {
        &self.values
    }

    pub fn named_params(&self) -> &HashMap<String, Value> {
        &self.named
    }

    /// Resolve every `@` and `$` token and return the final SQL.
    pub fn resolve(&self) -> Result<String, DaoError> {
        let macro_re = pattern(&MACRO_RE, MACRO_PATTERN)?;
        let entity_re = pattern(&ENTITY_RE, ENTITY_PATTERN)?;

        let mut seen = HashSet::new();
        let mut tokens: Vec<&str> = macro_re
            .find_iter(&self.text)
            .chain(entity_re.find_iter(&self.text))
            .map(|m| m.as_str())
            .filter(|token| seen.insert(*token))
            .collect();

        // Longest first: `@userId` must be replaced before `@user` can eat its prefix.
        tokens.sort_by_key(|token| Reverse(token.len()));

        let mut sql = self.text.clone();
        for token in tokens {
            let replacement = if token.starts_with('$') {
                self.resolve_entity(token)?
            } else {
                self.resolve_macro(token)?
            };
            sql = sql.replace(token, &replacement);
        }

        let sql = sql.trim().to_string();
        trace!(sql = %sql, "template resolved");
        Ok(sql)
    }

    fn resolve_macro(&self, token: &str) -> Result<String, DaoError> {
        let name = &token[1..];
        let value = match name.split_once('!') {
            Some((namespace, var)) => {
                let group = self.grouped.get(namespace).ok_or_else(|| {
                    DaoError::Template(format!(
                        "Cannot find var group '{}' near {}",
                        namespace, token
                    ))
                })?;
                group.get(var)
            }
            None => self.vars.get(name),
        };

        value.cloned().ok_or_else(|| {
            DaoError::Template(format!(
                "Cannot find value for {}, register it with add_var",
                token
            ))
        })
    }

    fn resolve_entity(&self, token: &str) -> Result<String, DaoError> {
        let reference = &token[1..];
        let (alias, property) = match reference.split_once('.') {
            Some((alias, property)) => (alias, Some(property)),
            None => (reference, None),
        };

        let metadata = self.entities.get(alias).ok_or_else(|| {
            DaoError::Template(format!("Cannot find entity bound as '{}' near {}", alias, token))
        })?;

        let resolved = match property {
            Some("*") => "*".to_string(),
            Some(property) => metadata
                .column(property)
                .map(str::to_string)
                .ok_or_else(|| {
                    DaoError::Template(format!(
                        "Entity '{}' has no property '{}' near {}",
                        alias, property, token
                    ))
                })?,
            None if self.auto_alias => format!("{} {}", metadata.table_name(), alias),
            None => metadata.table_name().to_string(),
        };

        Ok(match property {
            Some(_) if self.auto_alias => format!("{}.{}", alias, resolved),
            _ => resolved,
        })
    }

    /// Resolved SQL with `limit start,limit` appended.
    pub fn resolve_paged(&self, start: u64, limit: u64) -> Result<String, DaoError> {
        Ok(paged(&self.resolve()?, start, limit))
    }

    /// Row count of the resolved statement, wrapping it as a subselect.
    pub fn resolve_count(&self) -> Result<String, DaoError> {
        Ok(counted(&self.resolve()?))
    }

    /// Resolve and expand `:name` placeholders to `?`.
    ///
    /// Returns the SQL and the parameters in placeholder order: `?` takes the next
    /// positional value, `:name` the named value registered under `name`.
    pub fn resolve_named(&self) -> Result<(String, Vec<Value>), DaoError> {
        self.expand_named(&self.resolve()?)
    }

    pub fn resolve_named_paged(
        &self,
        start: u64,
        limit: u64,
    ) -> Result<(String, Vec<Value>), DaoError> {
        self.expand_named(&paged(&self.resolve()?, start, limit))
    }

    pub fn resolve_named_count(&self) -> Result<(String, Vec<Value>), DaoError> {
        self.expand_named(&counted(&self.resolve()?))
    }

    fn expand_named(&self, sql: &str) -> Result<(String, Vec<Value>), DaoError> {
        let re = pattern(&BIND_RE, BIND_PATTERN)?;
        let mut expanded = String::with_capacity(sql.len());
        let mut params = Vec::new();
        let mut positional = self.values.iter();
        let mut last = 0;
        let literals = quoted_spans(sql);

        for caps in re.captures_iter(sql) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if !is_placeholder(sql, &literals, whole.start()) {
                continue;
            }

            let value = match caps.get(1) {
                Some(name) => self.named.get(name.as_str()).ok_or_else(|| {
                    DaoError::Template(format!("No value for named parameter :{}", name.as_str()))
                })?,
                None => positional.next().ok_or_else(|| {
                    DaoError::Template(format!(
                        "More positional placeholders than the {} values supplied",
                        self.values.len()
                    ))
                })?,
            };

            expanded.push_str(&sql[last..whole.start()]);
            expanded.push('?');
            params.push(value.clone());
            last = whole.end();
        }
        expanded.push_str(&sql[last..]);

        Ok((expanded, params))
    }
}

pub(crate) fn paged(sql: &str, start: u64, limit: u64) -> String {
    format!("{} limit {},{}", sql, start, limit)
}

pub(crate) fn counted(sql: &str) -> String {
    format!("select count(0) from ({}) count_tmp_table", sql)
}

/// The unresolved text.
impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityDescriptor, EntityModel, FieldDescriptor, FromValue, StorageType, params};

    #[derive(Default)]
    struct Book {
        id: Option<String>,
        user_id: Option<String>,
        title: Option<String>,
    }

    impl Entity for Book {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::new()
                .table("t_book")
                .field(
                    FieldDescriptor::new("id", StorageType::Text)
                        .primary_key(None)
                        .getter(|b: &Book| b.id.clone().into())
                        .setter(|b: &mut Book, v| {
                            b.id = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                .field(
                    FieldDescriptor::new("userId", StorageType::Text)
                        .getter(|b: &Book| b.user_id.clone().into()),
                )
                .field(
                    FieldDescriptor::new("title", StorageType::Text)
                        .column("book_title")
                        .getter(|b: &Book| b.title.clone().into()),
                )
        }
    }

    fn book_metadata() -> Arc<EntityMetadata> {
        EntityModel::extract(Book::describe())
            .unwrap()
            .metadata()
            .clone()
    }

    #[test]
    fn resolves_simple_macro() {
        let sql = Template::new()
            .add_var("tableName", "t_user")
            .sql("select * from @tableName")
            .resolve()
            .unwrap();
        assert_eq!(sql, "select * from t_user");
    }

    #[test]
    fn longer_macros_win_over_their_prefixes() {
        let sql = Template::new()
            .add_var("id", "t_id")
            .add_var("idGenerator", "t_idgen")
            .sql("select @id, @idGenerator from t where @id = ?")
            .resolve()
            .unwrap();
        assert_eq!(sql, "select t_id, t_idgen from t where t_id = ?");
    }

    #[test]
    fn grouped_vars_disambiguate_joined_columns() {
        let sql = Template::new()
            .add_var("tableName", "t_product")
            .add_var("id", "id")
            .add_grouped_vars("c", [("tableName", "t_category"), ("id", "category_pk")])
            .sql("select * from @tableName t1 left join @c!tableName t2 on t1.@id = t2.@c!id")
            .resolve()
            .unwrap();
        assert_eq!(
            sql,
            "select * from t_product t1 left join t_category t2 on t1.id = t2.category_pk"
        );
    }

    #[test]
    fn unknown_macro_or_group_is_an_error() {
        let err = Template::new().sql("select @missing").resolve().unwrap_err();
        assert!(matches!(err, DaoError::Template(msg) if msg.contains("@missing")));

        let err = Template::new()
            .sql("select @g!name")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, DaoError::Template(_)));
    }

    #[test]
    fn entity_shorthand_without_alias_mode() {
        let sql = Template::new()
            .bind_entity("b", book_metadata())
            .sql("select $b.* from $b where $b.userId = ? and $b.title like ?")
            .resolve()
            .unwrap();
        assert_eq!(
            sql,
            "select * from t_book where user_id = ? and book_title like ?"
        );
    }

    #[test]
    fn entity_shorthand_with_alias_mode() {
        let sql = Template::new()
            .auto_alias(true)
            .bind_entity("b", book_metadata())
            .sql("select $b.* from $b where $b.userId = ?")
            .resolve()
            .unwrap();
        assert_eq!(sql, "select b.* from t_book b where b.user_id = ?");
    }

    #[test]
    fn unknown_entity_alias_or_property_is_an_error() {
        assert!(Template::new().sql("select * from $x").resolve().is_err());
        assert!(
            Template::new()
                .bind_entity("b", book_metadata())
                .sql("select $b.isbn from $b")
                .resolve()
                .is_err()
        );
    }

    #[test]
    fn first_condition_always_uses_where() {
        let template = Template::new()
            .sql("select * from t_user")
            .r#where("name like :n", true, params!["Ko%"])
            .unwrap()
            .and("age = :a", true, params![15])
            .unwrap();

        assert_eq!(
            template.resolve().unwrap(),
            "select * from t_user where name like :n and age = :a"
        );
        assert_eq!(template.named_params().len(), 2);
        assert_eq!(template.named_params()["n"], Value::Text("Ko%".into()));
        assert_eq!(template.named_params()["a"], Value::Int(15));
        assert!(template.params().is_empty());
    }

    #[test]
    fn conditions_on_an_empty_template() {
        let template = Template::new()
            .r#where("name like :n", true, params!["Ko%"])
            .unwrap()
            .and("age = :a", true, params![15])
            .unwrap();
        assert_eq!(template.to_string(), "where name like :n and age = :a");
    }

    #[test]
    fn disabled_conditions_are_skipped() {
        let template = Template::new()
            .sql("select * from t_user")
            .r#where("deleted = 0", false, params![])
            .unwrap()
            .or("age > ?", true, params![18])
            .unwrap()
            .and("name = ?", true, params!["kim"])
            .unwrap();

        assert_eq!(
            template.resolve().unwrap(),
            "select * from t_user where age > ? and name = ?"
        );
        assert_eq!(
            template.params(),
            &[Value::Int(18), Value::Text("kim".into())]
        );
    }

    #[test]
    fn named_parameter_count_must_match() {
        let err = Template::new()
            .sql("select * from t_user")
            .r#where("age = :age and a = :ff", true, params![15])
            .unwrap_err();
        assert!(matches!(err, DaoError::Template(_)));
    }

    #[test]
    fn casts_are_not_named_parameters() {
        let template = Template::new()
            .sql("select created::date from t")
            .r#where("id = ?", true, params![1])
            .unwrap();
        assert!(template.named_params().is_empty());
        assert_eq!(template.params(), &[Value::Int(1)]);
    }

    #[test]
    fn order_handles_direction_and_macros() {
        let sql = Template::new()
            .add_var("age", "user_age")
            .sql("select * from t_user")
            .order(&["name", "-@age", "@unknown"])
            .resolve()
            .unwrap();
        assert_eq!(
            sql,
            "select * from t_user order by name asc, user_age desc, unknown asc"
        );
    }

    #[test]
    fn paged_and_count_variants() {
        let template = Template::new()
            .add_var("tableName", "t_user")
            .sql("select * from @tableName")
            .r#where("age > ?", true, params![18])
            .unwrap();

        assert_eq!(
            template.resolve_paged(20, 10).unwrap(),
            "select * from t_user where age > ? limit 20,10"
        );
        assert_eq!(
            template.resolve_count().unwrap(),
            "select count(0) from (select * from t_user where age > ?) count_tmp_table"
        );
    }

    #[test]
    fn named_expansion_orders_values_by_placeholder() {
        let template = Template::new()
            .sql("select * from t_user")
            .r#where("name like :n", true, params!["Ko%"])
            .unwrap()
            .and("dept = ?", true, params![3])
            .unwrap()
            .and("age = :a", true, params![15])
            .unwrap();

        let (sql, params) = template.resolve_named().unwrap();
        assert_eq!(
            sql,
            "select * from t_user where name like ? and dept = ? and age = ?"
        );
        assert_eq!(
            params,
            vec![Value::Text("Ko%".into()), Value::Int(3), Value::Int(15)]
        );

        let (count_sql, count_params) = template.resolve_named_count().unwrap();
        assert!(
            count_sql.starts_with("select count(0) from (select * from t_user where name like ?")
        );
        assert_eq!(count_params.len(), 3);
    }

    #[test]
    fn named_expansion_reports_missing_values() {
        let template = Template::new().sql("select * from t where a = :a");
        assert!(matches!(
            template.resolve_named(),
            Err(DaoError::Template(_))
        ));
        let template = template.named_value("a", 1);
        assert_eq!(template.resolve_named().unwrap().1, vec![Value::Int(1)]);
    }

    #[test]
    fn quoted_literals_hold_no_placeholders() {
        let template = Template::new()
            .sql("select * from t")
            .r#where("note = 'ratio 1:x'", true, params![])
            .unwrap()
            .and("id = :id", true, params![7])
            .unwrap();
        let (sql, params) = template.resolve_named().unwrap();
        assert_eq!(sql, "select * from t where note = 'ratio 1:x' and id = ?");
        assert_eq!(params, vec![Value::Int(7)]);

        let template = Template::new()
            .sql(r#"select * from t where title = 'why?' and label = "a:b" and age > ?"#)
            .value(params![18]);
        let (sql, params) = template.resolve_named().unwrap();
        assert_eq!(
            sql,
            r#"select * from t where title = 'why?' and label = "a:b" and age > ?"#
        );
        assert_eq!(params, vec![Value::Int(18)]);
    }

    #[test]
    fn doubled_quotes_stay_inside_the_literal() {
        let template = Template::new()
            .sql("select * from t")
            .r#where("note = 'it''s :x' and id = :id", true, params![3])
            .unwrap();
        assert_eq!(template.named_params().len(), 1);

        let (sql, params) = template.resolve_named().unwrap();
        assert_eq!(sql, "select * from t where note = 'it''s :x' and id = ?");
        assert_eq!(params, vec![Value::Int(3)]);
    }

    #[test]
    fn quoted_spans_handle_escapes_and_unterminated_text() {
        assert_eq!(quoted_spans("a 'b''c' d"), vec![2..8]);
        assert_eq!(quoted_spans(r#""x" 'y"#), vec![0..3, 4..6]);
        assert!(quoted_spans("no literals").is_empty());
    }

    #[test]
    fn table_references() {
        let template = Template::new()
            .sql("select * from")
            .table(" t_user ", Some("u"))
            .sql("join")
            .entity_table::<Book>(Some("b"))
            .unwrap()
            .sql("on b.user_id = u.id");
        assert_eq!(
            template.to_string(),
            "select * from t_user u join t_book b on b.user_id = u.id"
        );
    }
}
