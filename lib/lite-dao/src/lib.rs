//! lite-dao - typed entity mapping and templated SQL over a pluggable executor.
//!
//! Application code addresses tables through entity types for the common operations
//! (lookup, insert, update, delete, paged query) and drops down to symbolically
//! templated SQL for everything else.
//!
//! # Core Concepts
//!
//! - **Entity metadata**: the field ↔ column mapping, primary key, id strategy and
//!   per-operation ignore rules of a type, extracted once and shared.
//! - **Template**: SQL text with `@name`, `@ns!name`, `$alias`, `$alias.property` and
//!   `:name` tokens, resolved against registered variables and entity metadata.
//! - **Dao**: the generic accessor composing the two on top of a
//!   [`StatementExecutor`].
//!
//! # Example
//!
//! ```text
//! use lite_dao::{Dao, Entity, PageRequest, params};
//!
//! #[derive(Entity, Default)]
//! #[entity(table = "t_user")]
//! pub struct User {
//!     #[column(primary_key, id = "uuid", uuid_length = 8)]
//!     pub id: Option<String>,
//!     pub name: Option<String>,
//!     pub age: Option<i32>,
//! }
//!
//! let dao = Dao::<User, _>::new(executor)?;
//! let mut user = User { name: Some("kim".into()), ..Default::default() };
//! dao.insert(&mut user)?;
//!
//! let template = dao
//!     .sql("select * from @tableName")
//!     .r#where("@age > ?", true, params![18])?;
//! let page = dao.query_page(PageRequest::new(0, 20), &dao.row_mapper(), &template, template.params())?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod dao;
mod entity;
mod error;
mod executor;
mod metadata;
mod page;
mod storage;
mod template;
mod value;

pub use dao::{Dao, generate_uuid};
pub use entity::Entity;
pub use error::DaoError;
pub use executor::{EntityRowMapper, Row, RowMapper, SerdeRowMapper, StatementExecutor};
pub use metadata::{
    DEFAULT_UUID_LENGTH, EntityDescriptor, EntityMetadata, EntityModel, FieldBinding,
    FieldDescriptor, Getter, IdStrategy, IgnoreSet, Operation, PrimaryKey, Setter,
    UUID_SIMPLE_LENGTH, to_column_name,
};
pub use page::{PageRequest, PagedResult};
pub use storage::StorageType;
pub use template::Template;
pub use value::{FromValue, ToValue, Value};

// Re-export derive macro
pub use lite_dao_derive::Entity;
