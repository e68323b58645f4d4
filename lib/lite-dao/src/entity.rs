//! Entity trait for types mapped to a table.
//!
//! Types implementing `Entity` declare their table, columns and primary key through
//! an [`EntityDescriptor`]. Add `#[derive(Entity)]` with `#[entity(table = "...")]`
//! to generate the implementation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::warn;

use crate::{DaoError, EntityDescriptor, EntityMetadata, EntityModel};

/// Trait for types stored one-to-one as table rows.
///
/// # Example
///
/// ```text
/// #[derive(Entity, Default)]
/// #[entity(table = "t_user")]
/// pub struct User {
///     #[column(primary_key, id = "uuid", uuid_length = 8)]
///     pub id: Option<String>,
///     #[column(ignore(insert))]
///     pub username: Option<String>,
///     pub password: Option<String>,
///     pub name: Option<String>,
///     #[column(ignore(update))]
///     pub age: Option<i32>,
/// }
/// ```
///
/// # Column Naming
///
/// The derive names each property after the camelCase of its field (`user_name`
/// becomes `userName`). Columns default to the property name with `_` inserted before
/// each upper-case letter, so they come back to the field name.
///
/// Use `#[column(skip)]` to exclude a field from the mapping.
/// Use `#[column(name = "custom_name")]` to override the column name.
/// Use `#[column(flatten)]` on a field whose type is itself an `Entity` to include
/// its fields, the way a base type contributes to its subtypes.
pub trait Entity: Default + 'static {
    /// Declared markers and accessors for this type.
    fn describe() -> EntityDescriptor<Self>;

    /// The validated model for this type, built on first use and shared afterwards.
    ///
    /// A configuration error is cached too: every later call fails the same way.
    fn model() -> Result<Arc<EntityModel<Self>>, DaoError> {
        model_of::<Self>()
    }

    /// Shortcut for `model()?.metadata()`.
    fn metadata() -> Result<Arc<EntityMetadata>, DaoError> {
        Ok(Self::model()?.metadata().clone())
    }
}

type Slot = Result<Arc<dyn Any + Send + Sync>, String>;

static MODELS: OnceLock<Mutex<HashMap<TypeId, Slot>>> = OnceLock::new();

// `describe()` must not call back into `model()`: the registry lock is held while a
// model is extracted. A `describe()` that panics poisons the lock before anything is
// inserted, so the map is still consistent and the poison is cleared.
fn model_of<T: Entity>() -> Result<Arc<EntityModel<T>>, DaoError> {
    let models = MODELS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = models.lock().unwrap_or_else(PoisonError::into_inner);

    let slot = guard
        .entry(TypeId::of::<T>())
        .or_insert_with(|| match EntityModel::<T>::extract(T::describe()) {
            Ok(model) => Ok(Arc::new(model) as Arc<dyn Any + Send + Sync>),
            Err(e) => {
                warn!(
                    entity = std::any::type_name::<T>(),
                    error = %e,
                    "entity metadata rejected"
                );
                Err(match e {
                    DaoError::Configuration(message) => message,
                    other => other.to_string(),
                })
            }
        });

    match slot {
        Ok(model) => model.clone().downcast::<EntityModel<T>>().map_err(|_| {
            DaoError::Configuration(format!(
                "Registry entry for {} has the wrong type",
                std::any::type_name::<T>()
            ))
        }),
        Err(message) => Err(DaoError::Configuration(message.clone())),
    }
}
