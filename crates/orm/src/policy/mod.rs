//! Persistence policy - resolves how model types map onto tables, columns
//! and relationships.
//!
//! Metadata comes from a `MetadataProvider` (annotations or mapping
//! documents); the policy validates it, infers what was left implicit and
//! caches the resulting descriptors for the life of the policy. First-time
//! resolution runs under a single-writer guard; `warm_up` resolves every
//! registered model eagerly so configuration errors surface at startup.

pub mod annotations;
pub mod declaration;
pub mod descriptor;
pub mod mapped;
pub mod types;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tessera_core::ConfigurationMode;
use tracing::{debug, warn};

pub use annotations::AnnotationProvider;
pub use declaration::{Cascade, EntityDeclaration, FieldDeclaration, RelationDeclaration};
pub use descriptor::{ColumnDef, EntityDescriptor, FieldDescriptor, FieldKind};
pub use mapped::{MappedProvider, MappingDocument, ModelMap};
pub use types::TypeResolutionPolicy;

use crate::error::{OrmError, OrmResult};
use crate::model::mapping::FieldSlot;
use crate::model::{AnyModel, DomainRegistry, EntityMapping, EntityType, FieldType, Model, Value};
use crate::relationships::{
    default_join_table, ManyToMany, ManyToOne, OneToMany, OneToOne, Relationship,
};
use crate::security::validate_identifier;

/// Source of declared entity metadata
pub trait MetadataProvider: Send + Sync {
    fn mode(&self) -> ConfigurationMode;

    fn is_persistent(&self, mapping: &EntityMapping) -> bool;

    /// Declared metadata of the persistent fields, in declaration order
    fn declare(&self, mapping: &EntityMapping) -> OrmResult<EntityDeclaration>;
}

/// Table, scalar columns and key of an entity, without its relationships
struct EntityShape {
    table: String,
    scalars: Vec<FieldDescriptor>,
    primary_key: usize,
    declaration: EntityDeclaration,
    mapping: Arc<EntityMapping>,
}

impl EntityShape {
    fn primary_key(&self) -> &FieldDescriptor {
        &self.scalars[self.primary_key]
    }

    /// Column name other tables use to reference this entity
    fn reference_column(&self) -> String {
        format!("{}_{}", self.table, self.primary_key().column)
    }
}

pub struct PersistencePolicy {
    registry: Arc<DomainRegistry>,
    provider: Box<dyn MetadataProvider>,
    shapes: DashMap<EntityType, Arc<EntityShape>>,
    descriptors: DashMap<EntityType, Arc<EntityDescriptor>>,
    columns: DashMap<EntityType, Arc<Vec<ColumnDef>>>,
    guard: Mutex<()>,
}

impl PersistencePolicy {
    pub fn new(registry: Arc<DomainRegistry>, provider: Box<dyn MetadataProvider>) -> Self {
        Self {
            registry,
            provider,
            shapes: DashMap::new(),
            descriptors: DashMap::new(),
            columns: DashMap::new(),
            guard: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> ConfigurationMode {
        self.provider.mode()
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    /// Resolve every persistent model up front
    pub fn warm_up(&self) -> OrmResult<usize> {
        let entities = self.persistent_entities();
        for entity in &entities {
            self.descriptor(*entity)?;
        }
        for entity in &entities {
            self.table_columns(*entity)?;
        }
        debug!(
            "Resolved {} persistent models using the {} strategy",
            entities.len(),
            self.mode()
        );
        Ok(entities.len())
    }

    pub fn is_persistent(&self, entity: EntityType) -> bool {
        self.registry
            .mapping(&entity)
            .map(|mapping| self.provider.is_persistent(&mapping))
            .unwrap_or(false)
    }

    /// Persistent models in registration order
    pub fn persistent_entities(&self) -> Vec<EntityType> {
        self.registry
            .entities()
            .into_iter()
            .filter(|entity| self.is_persistent(*entity))
            .collect()
    }

    /// Resolved descriptor of a persistent model
    pub fn descriptor(&self, entity: EntityType) -> OrmResult<Arc<EntityDescriptor>> {
        if let Some(descriptor) = self.descriptors.get(&entity) {
            return Ok(descriptor.value().clone());
        }

        let _guard = self.guard.lock();
        if let Some(descriptor) = self.descriptors.get(&entity) {
            return Ok(descriptor.value().clone());
        }
        let descriptor = Arc::new(self.resolve(entity).map_err(|e| {
            if e.is_configuration() {
                warn!("Failed to resolve metadata for {}: {}", entity, e);
            }
            e
        })?);
        self.descriptors.insert(entity, descriptor.clone());
        Ok(descriptor)
    }

    pub fn descriptor_of<M: Model>(&self) -> OrmResult<Arc<EntityDescriptor>> {
        self.descriptor(M::entity_type())
    }

    pub fn persistent_fields(&self, entity: EntityType) -> OrmResult<Vec<FieldDescriptor>> {
        Ok(self.descriptor(entity)?.fields().to_vec())
    }

    pub fn primary_key_field(&self, entity: EntityType) -> OrmResult<FieldDescriptor> {
        Ok(self.descriptor(entity)?.primary_key().clone())
    }

    pub fn is_primary_key_autoincrement(&self, entity: EntityType) -> OrmResult<bool> {
        Ok(self.descriptor(entity)?.primary_key().autoincrement)
    }

    pub fn table_name(&self, entity: EntityType) -> OrmResult<String> {
        Ok(self.descriptor(entity)?.table.clone())
    }

    pub fn field_column_name(&self, entity: EntityType, field: &str) -> OrmResult<String> {
        Ok(self.descriptor(entity)?.require_field(field)?.column.clone())
    }

    pub fn is_field_nullable(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(self.descriptor(entity)?.require_field(field)?.nullable)
    }

    pub fn is_field_unique(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(self.descriptor(entity)?.require_field(field)?.unique)
    }

    pub fn cascade(&self, entity: EntityType) -> OrmResult<Cascade> {
        Ok(self.descriptor(entity)?.cascade)
    }

    pub fn is_lazy(&self, entity: EntityType) -> OrmResult<bool> {
        Ok(self.descriptor(entity)?.lazy)
    }

    pub fn rest_endpoint(&self, entity: EntityType) -> OrmResult<String> {
        Ok(self.descriptor(entity)?.endpoint.clone())
    }

    pub fn relationship(&self, entity: EntityType, field: &str) -> OrmResult<Option<Relationship>> {
        Ok(self
            .descriptor(entity)?
            .require_field(field)?
            .relationship()
            .cloned())
    }

    pub fn is_relationship(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(self.relationship(entity, field)?.is_some())
    }

    pub fn is_many_to_many_relationship(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(matches!(
            self.relationship(entity, field)?,
            Some(Relationship::ManyToMany(_))
        ))
    }

    pub fn is_one_to_one_relationship(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(matches!(
            self.relationship(entity, field)?,
            Some(Relationship::OneToOne(_))
        ))
    }

    /// Many-to-one or one-to-one
    pub fn is_to_one_relationship(&self, entity: EntityType, field: &str) -> OrmResult<bool> {
        Ok(self
            .relationship(entity, field)?
            .map(|r| r.kind().is_to_one())
            .unwrap_or(false))
    }

    pub fn many_to_many_relationships(&self, entity: EntityType) -> OrmResult<Vec<ManyToMany>> {
        Ok(self
            .descriptor(entity)?
            .relationship_fields()
            .filter_map(|f| match f.relationship() {
                Some(Relationship::ManyToMany(r)) => Some(r.clone()),
                _ => None,
            })
            .collect())
    }

    /// Field of `entity` that declares `relationship` or its mirror
    pub fn find_relationship_field(
        &self,
        entity: EntityType,
        relationship: &Relationship,
    ) -> OrmResult<Option<FieldDescriptor>> {
        Ok(self
            .descriptor(entity)?
            .relationship_fields()
            .find(|f| f.relationship().map_or(false, |r| r.mirrors(relationship)))
            .cloned())
    }

    /// Session-cache key of an entity instance with the given key
    pub fn compute_hash(&self, entity: EntityType, key: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        entity.name().hash(&mut hasher);
        key.hash_into(&mut hasher);
        hasher.finish()
    }

    pub fn compute_model_hash<M: Model>(&self, model: &M) -> OrmResult<u64> {
        self.model_hash(M::entity_type(), model)
    }

    pub fn model_hash(&self, entity: EntityType, model: &AnyModel) -> OrmResult<u64> {
        let key = self.descriptor(entity)?.primary_key_value(model)?;
        Ok(self.compute_hash(entity, &key))
    }

    pub fn primary_key<M: Model>(&self, model: &M) -> OrmResult<Value> {
        self.descriptor_of::<M>()?.primary_key_value(model)
    }

    pub fn is_pk_null_or_zero<M: Model>(&self, model: &M) -> OrmResult<bool> {
        self.descriptor_of::<M>()?.is_pk_null_or_zero(model)
    }

    /// Every column of an entity table, including foreign keys that other
    /// models' relationships place on it
    pub fn table_columns(&self, entity: EntityType) -> OrmResult<Arc<Vec<ColumnDef>>> {
        if let Some(columns) = self.columns.get(&entity) {
            return Ok(columns.value().clone());
        }

        let descriptor = self.descriptor(entity)?;
        let mut columns: Vec<ColumnDef> = descriptor
            .scalar_fields()
            .map(|f| ColumnDef {
                name: f.column.clone(),
                field_type: f.field_type().unwrap_or(FieldType::Long),
                primary_key: f.primary_key,
                autoincrement: f.autoincrement,
                nullable: f.nullable,
                unique: f.unique,
                field: Some(f.name.clone()),
            })
            .collect();

        for other in self.persistent_entities() {
            let other_descriptor = self.descriptor(other)?;
            for field in other_descriptor.relationship_fields() {
                let Some(relationship) = field.relationship() else {
                    continue;
                };
                if relationship.key_holder() != Some(entity) {
                    continue;
                }
                let Some(column) = relationship.foreign_key_column() else {
                    continue;
                };
                if columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
                    continue;
                }
                let referenced = match relationship {
                    Relationship::ManyToOne(r) => r.one,
                    Relationship::OneToMany(r) => r.one,
                    Relationship::OneToOne(r) => r.owned(),
                    Relationship::ManyToMany(_) => continue,
                };
                columns.push(ColumnDef {
                    name: column.to_string(),
                    field_type: self.descriptor(referenced)?.primary_key_type(),
                    primary_key: false,
                    autoincrement: false,
                    nullable: true,
                    unique: false,
                    field: None,
                });
            }
        }

        let columns = Arc::new(columns);
        self.columns.insert(entity, columns.clone());
        Ok(columns)
    }

    fn shape(&self, entity: EntityType) -> OrmResult<Arc<EntityShape>> {
        if let Some(shape) = self.shapes.get(&entity) {
            return Ok(shape.value().clone());
        }
        let shape = Arc::new(self.resolve_shape(entity)?);
        self.shapes.insert(entity, shape.clone());
        Ok(shape)
    }

    fn resolve_shape(&self, entity: EntityType) -> OrmResult<EntityShape> {
        let mapping = self.registry.mapping(&entity).ok_or_else(|| {
            OrmError::invalid_argument(format!("{} is not a registered model", entity))
        })?;
        if !self.provider.is_persistent(&mapping) {
            return Err(OrmError::invalid_argument(format!(
                "{} is not persistent",
                entity
            )));
        }

        let declaration = self.provider.declare(&mapping)?;
        let table = declaration
            .table
            .clone()
            .unwrap_or_else(|| entity.name().to_lowercase());
        validate_identifier(&table)?;

        let mut scalars = Vec::new();
        for field in &declaration.fields {
            let slot = mapping.slot(&field.name).ok_or_else(|| {
                OrmError::model_configuration(format!("{} has no field '{}'", entity, field.name))
            })?;
            match (slot, &field.relation) {
                (FieldSlot::Scalar(slot), None) => {
                    let column = field.column.clone().unwrap_or_else(|| field.name.clone());
                    validate_identifier(&column)?;
                    scalars.push(FieldDescriptor {
                        name: field.name.clone(),
                        column,
                        primary_key: field.primary_key,
                        autoincrement: field.autoincrement,
                        nullable: field.nullable,
                        unique: field.unique,
                        kind: FieldKind::Scalar {
                            field_type: slot.field_type(),
                            slot: slot.clone(),
                        },
                    });
                }
                (FieldSlot::Relation(_), Some(_)) => {}
                (FieldSlot::Scalar(_), Some(_)) => {
                    return Err(OrmError::model_configuration(format!(
                        "{}.{} is a scalar field but is declared as a relationship",
                        entity, field.name
                    )))
                }
                (FieldSlot::Relation(_), None) => {
                    return Err(OrmError::model_configuration(format!(
                        "{}.{} is a relationship field but is declared as a property",
                        entity, field.name
                    )))
                }
            }
        }

        if scalars.is_empty() {
            return Err(OrmError::model_configuration(format!(
                "{} has no persistent fields",
                entity
            )));
        }
        let primary_key = resolve_primary_key(entity, &mut scalars)?;

        Ok(EntityShape {
            table,
            scalars,
            primary_key,
            declaration,
            mapping,
        })
    }

    fn resolve(&self, entity: EntityType) -> OrmResult<EntityDescriptor> {
        let shape = self.shape(entity)?;
        let mut fields = Vec::with_capacity(shape.declaration.fields.len());
        let mut primary_key = 0;

        for field in &shape.declaration.fields {
            let Some(relation) = &field.relation else {
                if let Some(scalar) = shape.scalars.iter().find(|s| s.name == field.name) {
                    if scalar.primary_key {
                        primary_key = fields.len();
                    }
                    fields.push(scalar.clone());
                }
                continue;
            };

            let slot = match shape.mapping.slot(&field.name) {
                Some(FieldSlot::Relation(slot)) => slot.clone(),
                _ => {
                    return Err(OrmError::model_configuration(format!(
                        "{}.{} is not a relationship field",
                        entity, field.name
                    )))
                }
            };
            let target = slot.target();
            let target_shape = self.shape(target).map_err(|e| {
                OrmError::model_configuration(format!("{}.{}: {}", entity, field.name, e))
            })?;

            let collection = matches!(
                relation,
                RelationDeclaration::ManyToMany { .. } | RelationDeclaration::OneToMany { .. }
            );
            if collection != slot.is_collection() {
                return Err(OrmError::model_configuration(format!(
                    "{}.{} has the wrong container for a {:?} relationship",
                    entity, field.name, relation
                )));
            }

            let relationship = build_relationship(entity, &shape, target, &target_shape, relation)?;
            let column = match &relationship {
                Relationship::ManyToMany(r) => r
                    .columns_from(entity)
                    .map(|(own, _)| own.to_string())
                    .unwrap_or_default(),
                other => other.foreign_key_column().unwrap_or_default().to_string(),
            };
            fields.push(FieldDescriptor {
                name: field.name.clone(),
                column,
                primary_key: false,
                autoincrement: false,
                nullable: true,
                unique: false,
                kind: FieldKind::Relation { relationship, slot },
            });
        }

        let declaration = &shape.declaration;
        Ok(EntityDescriptor {
            entity,
            table: shape.table.clone(),
            cascade: declaration.cascade,
            lazy: declaration.lazy,
            endpoint: declaration
                .endpoint
                .clone()
                .unwrap_or_else(|| shape.table.clone()),
            fields,
            primary_key,
            mapping: shape.mapping.clone(),
        })
    }
}

impl std::fmt::Debug for PersistencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistencePolicy")
            .field("mode", &self.mode())
            .field("resolved", &self.descriptors.len())
            .finish()
    }
}

/// Pick the single primary key, inferring `id` when none is marked
fn resolve_primary_key(entity: EntityType, scalars: &mut [FieldDescriptor]) -> OrmResult<usize> {
    let explicit: Vec<usize> = scalars
        .iter()
        .enumerate()
        .filter(|(_, f)| f.primary_key)
        .map(|(i, _)| i)
        .collect();

    let index = match explicit.as_slice() {
        [] => {
            let index = scalars
                .iter()
                .position(|f| f.name.eq_ignore_ascii_case("id"))
                .ok_or_else(|| {
                    OrmError::model_configuration(format!("{} has no primary key", entity))
                })?;
            let field = &mut scalars[index];
            field.primary_key = true;
            field.autoincrement = field.field_type().map_or(false, FieldType::is_integral);
            index
        }
        [index] => {
            let field = &scalars[*index];
            let integral = field.field_type().map_or(false, FieldType::is_integral);
            if field.autoincrement && !integral {
                return Err(OrmError::model_configuration(format!(
                    "{}.{} is marked autoincrement but is not an integral type",
                    entity, field.name
                )));
            }
            *index
        }
        many => {
            return Err(OrmError::model_configuration(format!(
                "{} declares {} primary keys; composite keys are not supported",
                entity,
                many.len()
            )))
        }
    };

    scalars[index].nullable = false;
    Ok(index)
}

fn build_relationship(
    entity: EntityType,
    shape: &EntityShape,
    target: EntityType,
    target_shape: &EntityShape,
    declaration: &RelationDeclaration,
) -> OrmResult<Relationship> {
    let relationship = match declaration {
        RelationDeclaration::ManyToMany { join_table } => {
            let join_table = join_table
                .clone()
                .unwrap_or_else(|| default_join_table(entity, target));
            validate_identifier(&join_table)?;
            let first_column = shape.reference_column();
            let mut second_column = target_shape.reference_column();
            if second_column == first_column {
                second_column = format!("related_{}", second_column);
            }
            Relationship::ManyToMany(ManyToMany {
                name: join_table.clone(),
                join_table,
                first: entity,
                second: target,
                first_field: shape.primary_key().name.clone(),
                second_field: target_shape.primary_key().name.clone(),
                first_column,
                second_column,
            })
        }
        RelationDeclaration::ManyToOne { column } => Relationship::ManyToOne(ManyToOne {
            name: format!("{} -> {}", entity, target),
            many: entity,
            one: target,
            column: column
                .clone()
                .unwrap_or_else(|| target_shape.reference_column()),
        }),
        RelationDeclaration::OneToMany { column } => Relationship::OneToMany(OneToMany {
            name: format!("{} -> {}", target, entity),
            one: entity,
            many: target,
            column: column.clone().unwrap_or_else(|| shape.reference_column()),
        }),
        RelationDeclaration::OneToOne { owner, column } => {
            let (owner, owned_shape) = if *owner {
                (entity, target_shape)
            } else {
                (target, shape)
            };
            let mut pair = [entity, target];
            pair.sort_by_key(|e| e.name());
            Relationship::OneToOne(OneToOne {
                name: format!("{} <-> {}", pair[0], pair[1]),
                first: entity,
                second: target,
                owner,
                column: column
                    .clone()
                    .unwrap_or_else(|| owned_shape.reference_column()),
            })
        }
    };

    if let Some(column) = relationship.foreign_key_column() {
        validate_identifier(column)?;
    }
    Ok(relationship)
}
