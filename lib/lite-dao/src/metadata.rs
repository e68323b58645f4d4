//! Entity metadata: the per-type description of table, columns, primary key and
//! ignore rules, and its extraction from an [`EntityDescriptor`].
//!
//! A descriptor is what a type declares (usually generated by `#[derive(Entity)]`).
//! Extraction validates it once and produces an immutable [`EntityModel`]: the
//! type-erased [`EntityMetadata`] plus the typed getter/setter table used to move
//! values between entities and rows.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::{DaoError, Entity, StorageType, Value};

/// Length of a generated UUID in its simple (undashed) form.
pub const UUID_SIMPLE_LENGTH: usize = 32;

/// Default declared length for uuid primary keys.
pub const DEFAULT_UUID_LENGTH: usize = UUID_SIMPLE_LENGTH;

/// Operations a field can be suppressed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Query,
}

impl Operation {
    fn bit(self) -> u8 {
        match self {
            Operation::Insert => 0b001,
            Operation::Update => 0b010,
            Operation::Query => 0b100,
        }
    }
}

/// Set of operations a field is ignored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IgnoreSet(u8);

impl IgnoreSet {
    pub const NONE: IgnoreSet = IgnoreSet(0);
    pub const ALL: IgnoreSet = IgnoreSet(0b111);

    pub fn of(operations: &[Operation]) -> Self {
        operations
            .iter()
            .fold(IgnoreSet::NONE, |set, op| set.with(*op))
    }

    pub fn with(self, operation: Operation) -> Self {
        IgnoreSet(self.0 | operation.bit())
    }

    pub fn contains(&self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// How a new entity gets its primary key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// The caller sets the key before insert.
    Assigned,
    /// The database generates the key; it is written back after insert.
    AutoIncrement,
    /// A random lowercase hex identifier is generated on insert.
    #[default]
    Uuid,
}

impl IdStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdStrategy::Assigned => "assigned",
            IdStrategy::AutoIncrement => "auto_increment",
            IdStrategy::Uuid => "uuid",
        }
    }
}

impl FromStr for IdStrategy {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(IdStrategy::Assigned),
            "auto_increment" => Ok(IdStrategy::AutoIncrement),
            "uuid" => Ok(IdStrategy::Uuid),
            other => Err(DaoError::Configuration(format!(
                "Unknown id strategy: {}",
                other
            ))),
        }
    }
}

/// Derive a column name from a property name: `_` before each upper-case letter,
/// which is lower-cased. Already snake-cased names come back unchanged.
pub fn to_column_name(property: &str) -> String {
    let mut column = String::with_capacity(property.len() + 4);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            column.push('_');
            column.push(c.to_ascii_lowercase());
        } else {
            column.push(c);
        }
    }
    column
}

/// One persistent field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub property: String,
    pub column: String,
    pub storage: StorageType,
    pub ignore: IgnoreSet,
    pub default: Option<String>,
}

/// The primary key of an entity and its id generation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    pub property: String,
    pub column: String,
    pub strategy: IdStrategy,
    /// Only meaningful for [`IdStrategy::Uuid`].
    pub uuid_length: usize,
}

/// Immutable, type-erased mapping between an entity and its table.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    table_name: String,
    primary: PrimaryKey,
    fields: Vec<FieldBinding>,
    by_property: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
}

impl EntityMetadata {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary
    }

    pub fn primary_property(&self) -> &str {
        &self.primary.property
    }

    pub fn primary_column(&self) -> &str {
        &self.primary.column
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.primary.strategy
    }

    pub fn uuid_length(&self) -> usize {
        self.primary.uuid_length
    }

    /// Persistent fields in declaration order (own fields first, then embedded bases).
    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    pub fn field(&self, property: &str) -> Option<&FieldBinding> {
        self.by_property.get(property).map(|idx| &self.fields[*idx])
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldBinding> {
        self.by_column.get(column).map(|idx| &self.fields[*idx])
    }

    /// Column mapped to `property`.
    pub fn column(&self, property: &str) -> Option<&str> {
        self.field(property).map(|f| f.column.as_str())
    }

    /// Property mapped to `column`.
    pub fn property(&self, column: &str) -> Option<&str> {
        self.field_by_column(column).map(|f| f.property.as_str())
    }

    /// Whether `property` is suppressed for `operation`. Unknown properties are not.
    pub fn is_ignored(&self, property: &str, operation: Operation) -> bool {
        self.field(property)
            .map(|f| f.ignore.contains(operation))
            .unwrap_or(false)
    }

    /// property → column
    pub fn properties_mapper(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.property.clone(), f.column.clone()))
            .collect()
    }

    /// column → property
    pub fn columns_mapper(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.column.clone(), f.property.clone()))
            .collect()
    }
}

pub type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), DaoError> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct PrimaryKeyMarker {
    strategy: Option<String>,
    uuid_length: Option<usize>,
}

/// Declared markers and accessors of a single field.
pub struct FieldDescriptor<T> {
    property: String,
    column: Option<String>,
    storage: StorageType,
    primary_key: Option<PrimaryKeyMarker>,
    ignore: IgnoreSet,
    default: Option<String>,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
}

impl<T: 'static> FieldDescriptor<T> {
    pub fn new(property: impl Into<String>, storage: StorageType) -> Self {
        Self {
            property: property.into(),
            column: None,
            storage,
            primary_key: None,
            ignore: IgnoreSet::NONE,
            default: None,
            getter: None,
            setter: None,
        }
    }

    /// Explicit column name. Blank names fall back to the derived one.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Mark the primary key. `strategy` is one of `assigned`, `auto_increment`,
    /// `uuid`; `None` means `uuid`.
    pub fn primary_key(mut self, strategy: Option<&str>) -> Self {
        let marker = self.primary_key.get_or_insert_with(PrimaryKeyMarker::default);
        marker.strategy = strategy.map(str::to_string);
        self
    }

    pub fn uuid_length(mut self, length: usize) -> Self {
        let marker = self.primary_key.get_or_insert_with(PrimaryKeyMarker::default);
        marker.uuid_length = Some(length);
        self
    }

    pub fn ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn default_value(mut self, raw: impl Into<String>) -> Self {
        self.default = Some(raw.into());
        self
    }

    pub fn getter(mut self, getter: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter(
        mut self,
        setter: impl Fn(&mut T, Value) -> Result<(), DaoError> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Re-target this descriptor at an outer type embedding `T`.
    fn lift<O: 'static>(
        self,
        project: fn(&O) -> &T,
        project_mut: fn(&mut O) -> &mut T,
    ) -> FieldDescriptor<O> {
        let getter = self.getter.map(|inner| {
            Arc::new(move |outer: &O| inner(project(outer))) as Getter<O>
        });
        let setter = self.setter.map(|inner| {
            Arc::new(move |outer: &mut O, value: Value| inner(project_mut(outer), value))
                as Setter<O>
        });

        FieldDescriptor {
            property: self.property,
            column: self.column,
            storage: self.storage,
            primary_key: self.primary_key,
            ignore: self.ignore,
            default: self.default,
            getter,
            setter,
        }
    }
}

/// Everything a type declares about its persistence: the table marker and its fields.
pub struct EntityDescriptor<T> {
    table: Option<String>,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> EntityDescriptor<T> {
    pub fn new() -> Self {
        Self {
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    /// Include the fields of an embedded base entity, reached through `project`.
    pub fn inherit<B: Entity>(
        mut self,
        project: fn(&T) -> &B,
        project_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        for field in B::describe().fields {
            self.fields.push(field.lift(project, project_mut));
        }
        self
    }
}

impl<T: 'static> Default for EntityDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct FieldAccessor<T> {
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

/// Validated metadata plus the typed accessor table, aligned index for index with
/// [`EntityMetadata::fields`].
pub struct EntityModel<T> {
    metadata: Arc<EntityMetadata>,
    accessors: Vec<FieldAccessor<T>>,
}

impl<T: 'static> EntityModel<T> {
    /// Validate a descriptor and build the model.
    pub fn extract(descriptor: EntityDescriptor<T>) -> Result<Self, DaoError> {
        let type_name = std::any::type_name::<T>();

        let table_name = descriptor
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                DaoError::Configuration(format!("Table name not found on {}", type_name))
            })?;

        let mut fields = Vec::new();
        let mut accessors = Vec::new();
        let mut by_property = HashMap::new();
        let mut by_column = HashMap::new();
        let mut primary: Option<PrimaryKey> = None;

        for descriptor in descriptor.fields {
            // No readable accessor, not a persistence field.
            let Some(getter) = descriptor.getter else {
                continue;
            };

            let column = descriptor
                .column
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| to_column_name(&descriptor.property));

            if by_property.contains_key(&descriptor.property) {
                return Err(DaoError::Configuration(format!(
                    "Duplicate property {} on {}",
                    descriptor.property, type_name
                )));
            }
            if by_column.contains_key(&column) {
                return Err(DaoError::Configuration(format!(
                    "Duplicate column {} on {}",
                    column, type_name
                )));
            }

            if let Some(marker) = descriptor.primary_key {
                if let Some(existing) = &primary {
                    return Err(DaoError::Configuration(format!(
                        "Multiple primary keys on {}: {} and {}",
                        type_name, existing.property, descriptor.property
                    )));
                }

                let strategy = match marker.strategy.as_deref() {
                    Some(s) => s.parse::<IdStrategy>()?,
                    None => IdStrategy::Uuid,
                };
                let uuid_length = match strategy {
                    IdStrategy::Uuid => marker.uuid_length.unwrap_or(DEFAULT_UUID_LENGTH),
                    _ => DEFAULT_UUID_LENGTH,
                };
                if uuid_length == 0 || uuid_length > UUID_SIMPLE_LENGTH {
                    return Err(DaoError::Configuration(format!(
                        "UUID length of {} must be between 1 and {}, got {}",
                        type_name, UUID_SIMPLE_LENGTH, uuid_length
                    )));
                }

                primary = Some(PrimaryKey {
                    property: descriptor.property.clone(),
                    column: column.clone(),
                    strategy,
                    uuid_length,
                });
            }

            by_property.insert(descriptor.property.clone(), fields.len());
            by_column.insert(column.clone(), fields.len());
            fields.push(FieldBinding {
                property: descriptor.property,
                column,
                storage: descriptor.storage,
                ignore: descriptor.ignore,
                default: descriptor.default,
            });
            accessors.push(FieldAccessor {
                getter,
                setter: descriptor.setter,
            });
        }

        let primary = primary.ok_or_else(|| {
            DaoError::Configuration(format!("Primary key not found on {}", type_name))
        })?;

        Ok(Self {
            metadata: Arc::new(EntityMetadata {
                table_name,
                primary,
                fields,
                by_property,
                by_column,
            }),
            accessors,
        })
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Current value of `property`, coerced to its storage type.
    pub fn read(&self, entity: &T, property: &str) -> Result<Option<Value>, DaoError> {
        let Some(idx) = self.metadata.by_property.get(property).copied() else {
            return Ok(None);
        };
        let field = &self.metadata.fields[idx];
        let value = (self.accessors[idx].getter)(entity);
        field.storage.coerce(value).map(Some)
    }

    /// Whether `property` is mapped and has a setter.
    pub fn is_writable(&self, property: &str) -> bool {
        self.metadata
            .by_property
            .get(property)
            .map(|idx| self.accessors[*idx].setter.is_some())
            .unwrap_or(false)
    }

    /// Write `value` onto `property` after coercing it to the field's storage type.
    pub fn write(&self, entity: &mut T, property: &str, value: Value) -> Result<(), DaoError> {
        let idx = self
            .metadata
            .by_property
            .get(property)
            .copied()
            .ok_or_else(|| {
                DaoError::Operation(format!(
                    "Unknown property {} on {}",
                    property,
                    std::any::type_name::<T>()
                ))
            })?;
        self.write_at(entity, idx, value)
    }

    fn write_at(&self, entity: &mut T, idx: usize, value: Value) -> Result<(), DaoError> {
        let field = &self.metadata.fields[idx];
        let setter = self.accessors[idx].setter.as_ref().ok_or_else(|| {
            DaoError::Operation(format!(
                "No setter for {}.{}",
                std::any::type_name::<T>(),
                field.property
            ))
        })?;
        let value = field.storage.coerce(value)?;
        setter(entity, value)
    }

    /// Column/value pairs in field order, coerced to storage types.
    ///
    /// The primary key is left out unless `include_primary` is set.
    pub fn value_map(
        &self,
        entity: &T,
        include_primary: bool,
    ) -> Result<Vec<(String, Value)>, DaoError> {
        let primary = self.metadata.primary_property();
        let mut values = Vec::with_capacity(self.metadata.fields.len());

        for (field, accessor) in self.metadata.fields.iter().zip(&self.accessors) {
            if !include_primary && field.property == primary {
                continue;
            }
            let value = field.storage.coerce((accessor.getter)(entity))?;
            values.push((field.column.clone(), value));
        }

        Ok(values)
    }

    /// Fill null fields that declare a default value.
    pub fn apply_defaults(&self, entity: &mut T) -> Result<(), DaoError> {
        for (idx, field) in self.metadata.fields.iter().enumerate() {
            let Some(raw) = &field.default else {
                continue;
            };
            if !(self.accessors[idx].getter)(entity).is_null() {
                continue;
            }
            let value = field.storage.parse_default(raw)?;
            self.write_at(entity, idx, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FromValue;

    #[derive(Debug, Default)]
    struct Account {
        account_id: Option<String>,
        display_name: Option<String>,
        hidden: u32,
    }

    impl Entity for Account {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::new()
                .table("t_account")
                .field(
                    FieldDescriptor::new("accountId", StorageType::Text)
                        .primary_key(Some("uuid"))
                        .uuid_length(12)
                        .getter(|a: &Account| a.account_id.clone().into())
                        .setter(|a: &mut Account, v| {
                            a.account_id = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                .field(
                    FieldDescriptor::new("displayName", StorageType::Text)
                        .column("name")
                        .ignore(IgnoreSet::of(&[Operation::Update]))
                        .default_value("anonymous")
                        .getter(|a: &Account| a.display_name.clone().into())
                        .setter(|a: &mut Account, v| {
                            a.display_name = FromValue::from_value(v)?;
                            Ok(())
                        }),
                )
                // write-only, never mapped
                .field(FieldDescriptor::new("hidden", StorageType::Integer).setter(
                    |a: &mut Account, v| {
                        a.hidden = FromValue::from_value(v)?;
                        Ok(())
                    },
                ))
        }
    }

    #[test]
    fn snake_case_derivation() {
        assert_eq!(to_column_name("userName"), "user_name");
        assert_eq!(to_column_name("createdAtUtc"), "created_at_utc");
        assert_eq!(to_column_name("name"), "name");
        assert_eq!(to_column_name("user_name"), "user_name");
        assert_eq!(
            to_column_name(&to_column_name("userName")),
            to_column_name("userName")
        );
    }

    #[test]
    fn extracts_columns_primary_key_and_ignore_rules() {
        let model = EntityModel::extract(Account::describe()).unwrap();
        let meta = model.metadata();

        assert_eq!(meta.table_name(), "t_account");
        assert_eq!(meta.primary_property(), "accountId");
        assert_eq!(meta.primary_column(), "account_id");
        assert_eq!(meta.id_strategy(), IdStrategy::Uuid);
        assert_eq!(meta.uuid_length(), 12);
        assert_eq!(meta.column("displayName"), Some("name"));
        assert_eq!(meta.property("name"), Some("displayName"));
        assert!(meta.is_ignored("displayName", Operation::Update));
        assert!(!meta.is_ignored("displayName", Operation::Insert));
        assert!(!meta.is_ignored("accountId", Operation::Query));
    }

    #[test]
    fn fields_without_getter_are_excluded() {
        let model = EntityModel::extract(Account::describe()).unwrap();
        assert!(model.metadata().field("hidden").is_none());
        assert_eq!(model.metadata().fields().len(), 2);
    }

    #[test]
    fn missing_table_is_a_configuration_error() {
        let descriptor = EntityDescriptor::<Account>::new().field(
            FieldDescriptor::new("accountId", StorageType::Text)
                .primary_key(None)
                .getter(|a: &Account| a.account_id.clone().into()),
        );
        assert!(matches!(
            EntityModel::extract(descriptor),
            Err(DaoError::Configuration(_))
        ));

        let blank = EntityDescriptor::<Account>::new().table("  ");
        assert!(matches!(
            EntityModel::extract(blank),
            Err(DaoError::Configuration(_))
        ));
    }

    #[test]
    fn primary_key_must_be_unique_and_present() {
        let none = EntityDescriptor::<Account>::new().table("t_account").field(
            FieldDescriptor::new("displayName", StorageType::Text)
                .getter(|a: &Account| a.display_name.clone().into()),
        );
        assert!(matches!(
            EntityModel::extract(none),
            Err(DaoError::Configuration(msg)) if msg.contains("Primary key not found")
        ));

        let two = EntityDescriptor::<Account>::new()
            .table("t_account")
            .field(
                FieldDescriptor::new("accountId", StorageType::Text)
                    .primary_key(None)
                    .getter(|a: &Account| a.account_id.clone().into()),
            )
            .field(
                FieldDescriptor::new("displayName", StorageType::Text)
                    .primary_key(None)
                    .getter(|a: &Account| a.display_name.clone().into()),
            );
        assert!(matches!(
            EntityModel::extract(two),
            Err(DaoError::Configuration(msg)) if msg.contains("Multiple primary keys")
        ));
    }

    #[test]
    fn rejects_unknown_strategy_and_oversized_uuid() {
        let unknown = EntityDescriptor::<Account>::new().table("t_account").field(
            FieldDescriptor::new("accountId", StorageType::Text)
                .primary_key(Some("sequence"))
                .getter(|a: &Account| a.account_id.clone().into()),
        );
        assert!(matches!(
            EntityModel::extract(unknown),
            Err(DaoError::Configuration(_))
        ));

        let oversized = EntityDescriptor::<Account>::new().table("t_account").field(
            FieldDescriptor::new("accountId", StorageType::Text)
                .primary_key(None)
                .uuid_length(33)
                .getter(|a: &Account| a.account_id.clone().into()),
        );
        assert!(matches!(
            EntityModel::extract(oversized),
            Err(DaoError::Configuration(_))
        ));
    }

    #[test]
    fn defaults_fill_only_null_fields() {
        let model = EntityModel::extract(Account::describe()).unwrap();

        let mut blank = Account::default();
        model.apply_defaults(&mut blank).unwrap();
        assert_eq!(blank.display_name.as_deref(), Some("anonymous"));

        let mut named = Account {
            display_name: Some("kim".into()),
            ..Default::default()
        };
        model.apply_defaults(&mut named).unwrap();
        assert_eq!(named.display_name.as_deref(), Some("kim"));
    }

    #[test]
    fn value_map_skips_primary_key_on_request() {
        let model = EntityModel::extract(Account::describe()).unwrap();
        let account = Account {
            account_id: Some("abc".into()),
            display_name: None,
            hidden: 0,
        };

        let without = model.value_map(&account, false).unwrap();
        assert_eq!(without, vec![("name".to_string(), Value::Null)]);

        let with = model.value_map(&account, true).unwrap();
        assert_eq!(with[0], ("account_id".to_string(), Value::Text("abc".into())));
    }
}
