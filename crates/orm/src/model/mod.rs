//! Model System - entity trait, typed field registration and lazy relations
//!
//! - `value`: field values and the fixed set of field types
//! - `mapping`: registration-time accessor tables built by `Model::map`
//! - `lazy`: deferred relationship wrapper
//! - `registry`: the domain-model registry

pub mod lazy;
pub mod mapping;
pub mod registry;
pub mod value;

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use lazy::{Lazy, Related};
pub use mapping::{FieldOptions, FieldSlot, ModelMapping, RelationOptions};
pub use registry::{DomainRegistry, EntityMapping};
pub use value::{FieldType, FieldValue, Value};

/// Type-erased model instance
pub type AnyModel = dyn Any + Send + Sync;

/// A persistable domain model.
///
/// Implementors describe their fields once through `map`; the resulting
/// accessor table replaces any per-row reflection.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Foo {
///     id: i32,
///     name: String,
/// }
///
/// impl Model for Foo {
///     const NAME: &'static str = "Foo";
///
///     fn map(m: &mut ModelMapping<Self>) {
///         m.field("id", |f| &f.id, |f| &mut f.id).primary_key().autoincrement();
///         m.field("name", |f| &f.name, |f| &mut f.name);
///     }
/// }
/// ```
pub trait Model: Clone + Default + Send + Sync + 'static {
    /// Simple name of the model type, used for registry lookup and defaults
    const NAME: &'static str;

    /// Register fields and annotation metadata
    fn map(mapping: &mut ModelMapping<Self>);

    fn entity_type() -> EntityType {
        EntityType::of::<Self>()
    }
}

/// Runtime identity of a model type
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    pub fn of<M: Model>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: M::NAME,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Whether the erased instance is of this type
    pub fn is_instance(&self, model: &AnyModel) -> bool {
        model.type_id() == self.id
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
