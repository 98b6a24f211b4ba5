//! Resolved, validated entity metadata

use std::fmt;
use std::sync::Arc;

use super::declaration::Cascade;
use crate::error::{OrmError, OrmResult};
use crate::model::mapping::{RelationSlot, ScalarSlot};
use crate::model::{AnyModel, EntityMapping, EntityType, FieldType, Value};
use crate::relationships::Relationship;

/// Accessor and type information of a persistent field
#[derive(Clone)]
pub enum FieldKind {
    Scalar {
        field_type: FieldType,
        slot: Arc<dyn ScalarSlot>,
    },
    Relation {
        relationship: Relationship,
        slot: Arc<dyn RelationSlot>,
    },
}

#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    /// Column for scalars; foreign-key or join column for relationships
    pub column: String,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub nullable: bool,
    pub unique: bool,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn field_type(&self) -> Option<FieldType> {
        match &self.kind {
            FieldKind::Scalar { field_type, .. } => Some(*field_type),
            FieldKind::Relation { .. } => None,
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, FieldKind::Relation { .. })
    }

    pub fn relationship(&self) -> Option<&Relationship> {
        match &self.kind {
            FieldKind::Relation { relationship, .. } => Some(relationship),
            FieldKind::Scalar { .. } => None,
        }
    }

    pub fn relation_slot(&self) -> Option<&Arc<dyn RelationSlot>> {
        match &self.kind {
            FieldKind::Relation { slot, .. } => Some(slot),
            FieldKind::Scalar { .. } => None,
        }
    }

    /// Read a scalar field
    pub fn get(&self, model: &AnyModel) -> OrmResult<Value> {
        match &self.kind {
            FieldKind::Scalar { slot, .. } => slot.get(model),
            FieldKind::Relation { .. } => Err(self.not_scalar()),
        }
    }

    /// Write a scalar field
    pub fn set(&self, model: &mut AnyModel, value: Value) -> OrmResult<()> {
        match &self.kind {
            FieldKind::Scalar { slot, .. } => slot.set(model, value),
            FieldKind::Relation { .. } => Err(self.not_scalar()),
        }
    }

    fn not_scalar(&self) -> OrmError {
        OrmError::invalid_argument(format!("field '{}' is a relationship", self.name))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FieldDescriptor");
        debug
            .field("name", &self.name)
            .field("column", &self.column)
            .field("primary_key", &self.primary_key)
            .field("autoincrement", &self.autoincrement)
            .field("nullable", &self.nullable)
            .field("unique", &self.unique);
        match &self.kind {
            FieldKind::Scalar { field_type, .. } => debug.field("type", field_type),
            FieldKind::Relation { relationship, .. } => debug.field("relationship", relationship),
        };
        debug.finish()
    }
}

/// A column of an entity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub field_type: FieldType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub nullable: bool,
    pub unique: bool,
    /// Backing scalar field; `None` for foreign-key columns
    pub field: Option<String>,
}

/// Everything the ORM needs to persist one entity type
pub struct EntityDescriptor {
    pub entity: EntityType,
    pub table: String,
    pub cascade: Cascade,
    pub lazy: bool,
    pub endpoint: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) primary_key: usize,
    pub(crate) mapping: Arc<EntityMapping>,
}

impl EntityDescriptor {
    /// Persistent fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field by name, as a caller error when missing
    pub fn require_field(&self, name: &str) -> OrmResult<&FieldDescriptor> {
        self.field(name).ok_or_else(|| {
            OrmError::invalid_argument(format!(
                "{} has no persistent field '{}'",
                self.entity, name
            ))
        })
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_relationship())
    }

    pub fn relationship_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_relationship())
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }

    /// Declared type of the primary key
    pub fn primary_key_type(&self) -> FieldType {
        self.primary_key().field_type().unwrap_or(FieldType::Long)
    }

    pub fn primary_key_value(&self, model: &AnyModel) -> OrmResult<Value> {
        self.primary_key().get(model)
    }

    /// Whether a key is null or numerically zero, i.e. not yet assigned
    pub fn is_pk_null_or_zero(&self, model: &AnyModel) -> OrmResult<bool> {
        Ok(self.primary_key_value(model)?.is_null_or_zero())
    }

    pub fn instantiate(&self) -> Box<AnyModel> {
        self.mapping.instantiate()
    }

    pub fn duplicate(&self, model: &AnyModel) -> OrmResult<Box<AnyModel>> {
        self.mapping.duplicate(model)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("entity", &self.entity)
            .field("table", &self.table)
            .field("cascade", &self.cascade)
            .field("lazy", &self.lazy)
            .field("endpoint", &self.endpoint)
            .field("fields", &self.fields)
            .finish()
    }
}
