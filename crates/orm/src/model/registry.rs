//! Domain-model registry - the list of model types the ORM knows about

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::mapping::{FieldSlot, ModelMapping};
use super::{AnyModel, EntityType, Model};
use crate::error::{OrmError, OrmResult};
use crate::policy::declaration::EntityDeclaration;

/// Suffix that marks a generated proxy type name
pub const PROXY_SUFFIX: &str = "_Proxy";

/// Everything registration captured about one model type
pub struct EntityMapping {
    pub entity: EntityType,
    /// Metadata declared alongside the accessors
    pub annotations: EntityDeclaration,
    slots: Vec<(String, FieldSlot)>,
    instantiate: fn() -> Box<AnyModel>,
    duplicate: fn(&AnyModel) -> Option<Box<AnyModel>>,
}

impl EntityMapping {
    fn of<M: Model>() -> Self {
        let mut mapping = ModelMapping::<M>::new();
        M::map(&mut mapping);
        let (annotations, slots) = mapping.into_parts();
        Self {
            entity: EntityType::of::<M>(),
            annotations,
            slots,
            instantiate: || Box::new(M::default()) as Box<AnyModel>,
            duplicate: |model| {
                model
                    .downcast_ref::<M>()
                    .map(|model| Box::new(model.clone()) as Box<AnyModel>)
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.entity.name()
    }

    pub fn slot(&self, field: &str) -> Option<&FieldSlot> {
        self.slots
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, slot)| slot)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &FieldSlot)> {
        self.slots.iter().map(|(name, slot)| (name.as_str(), slot))
    }

    /// A default-initialised instance
    pub fn instantiate(&self) -> Box<AnyModel> {
        (self.instantiate)()
    }

    /// Clone an erased instance of this type
    pub fn duplicate(&self, model: &AnyModel) -> OrmResult<Box<AnyModel>> {
        (self.duplicate)(model).ok_or_else(|| {
            OrmError::invalid_argument(format!("model is not an instance of {}", self.name()))
        })
    }
}

impl std::fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMapping")
            .field("entity", &self.entity)
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Thread-safe registry of model mappings
#[derive(Debug, Default)]
pub struct DomainRegistry {
    mappings: DashMap<EntityType, Arc<EntityMapping>>,
    names: DashMap<String, EntityType>,
    /// Registration order
    order: RwLock<Vec<EntityType>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model type. Names must be unique across the registry.
    pub fn register<M: Model>(&self) -> OrmResult<()> {
        let entity = EntityType::of::<M>();
        if self.mappings.contains_key(&entity) {
            return Ok(());
        }
        if self.names.contains_key(M::NAME) {
            return Err(OrmError::model_configuration(format!(
                "a different model is already registered as '{}'",
                M::NAME
            )));
        }

        let mapping = EntityMapping::of::<M>();
        debug!(
            "Registered model {} with {} fields",
            M::NAME,
            mapping.slots.len()
        );
        self.names.insert(M::NAME.to_string(), entity);
        self.mappings.insert(entity, Arc::new(mapping));
        self.order.write().push(entity);
        Ok(())
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.mappings.contains_key(entity)
    }

    pub fn mapping(&self, entity: &EntityType) -> Option<Arc<EntityMapping>> {
        self.mappings.get(entity).map(|m| m.value().clone())
    }

    pub fn by_name(&self, name: &str) -> Option<EntityType> {
        self.names.get(name).map(|e| *e.value())
    }

    /// Registered types in registration order
    pub fn entities(&self) -> Vec<EntityType> {
        self.order.read().clone()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Whether a type name denotes a proxy of a registered model
    pub fn is_proxy_name(&self, name: &str) -> bool {
        name.strip_suffix(PROXY_SUFFIX)
            .map(|base| self.names.contains_key(base))
            .unwrap_or(false)
    }
}
