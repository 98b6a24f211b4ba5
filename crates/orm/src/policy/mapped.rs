//! Mapped strategy: metadata read from mapping documents.
//!
//! A document lists models by name. Only registered models that a document
//! describes are persistent, and only the fields it lists are persisted.
//!
//! ```yaml
//! models:
//!   - name: Foo
//!     table: foo
//!     cascade: keys
//!     primary_key: { field: id, autoincrement: true }
//!     properties:
//!       - { field: name, not_null: true }
//!     many_to_many:
//!       - { field: bars, table: foo_bar }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tessera_core::ConfigurationMode;
use tracing::debug;

use super::declaration::{Cascade, EntityDeclaration, FieldDeclaration, RelationDeclaration};
use super::MetadataProvider;
use crate::error::{OrmError, OrmResult};
use crate::model::EntityMapping;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub models: Vec<ModelMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelMap {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub cascade: Option<Cascade>,
    #[serde(default)]
    pub lazy: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub primary_key: Option<PrimaryKeyMap>,
    #[serde(default)]
    pub properties: Vec<PropertyMap>,
    #[serde(default)]
    pub many_to_many: Vec<ManyToManyMap>,
    #[serde(default)]
    pub many_to_one: Vec<ForeignKeyMap>,
    #[serde(default)]
    pub one_to_many: Vec<ForeignKeyMap>,
    #[serde(default)]
    pub one_to_one: Vec<OneToOneMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyMap {
    pub field: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub autoincrement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyMap {
    pub field: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManyToManyMap {
    pub field: String,
    #[serde(default)]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyMap {
    pub field: String,
    #[serde(default)]
    pub column: Option<String>,
}

fn default_owner() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneToOneMap {
    pub field: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default = "default_owner")]
    pub owner: bool,
}

impl ModelMap {
    fn to_declaration(&self) -> EntityDeclaration {
        let mut fields = Vec::new();

        if let Some(pk) = &self.primary_key {
            let mut field = FieldDeclaration::new(&pk.field);
            field.column = pk.column.clone();
            field.primary_key = true;
            field.autoincrement = pk.autoincrement;
            fields.push(field);
        }

        for property in &self.properties {
            let mut field = FieldDeclaration::new(&property.field);
            field.column = property.column.clone();
            field.nullable = !property.not_null;
            field.unique = property.unique;
            fields.push(field);
        }

        let relation = |name: &str, relation: RelationDeclaration| {
            let mut field = FieldDeclaration::new(name);
            field.relation = Some(relation);
            field
        };
        for m2m in &self.many_to_many {
            fields.push(relation(
                &m2m.field,
                RelationDeclaration::ManyToMany {
                    join_table: m2m.table.clone(),
                },
            ));
        }
        for m2o in &self.many_to_one {
            fields.push(relation(
                &m2o.field,
                RelationDeclaration::ManyToOne {
                    column: m2o.column.clone(),
                },
            ));
        }
        for o2m in &self.one_to_many {
            fields.push(relation(
                &o2m.field,
                RelationDeclaration::OneToMany {
                    column: o2m.column.clone(),
                },
            ));
        }
        for o2o in &self.one_to_one {
            fields.push(relation(
                &o2o.field,
                RelationDeclaration::OneToOne {
                    owner: o2o.owner,
                    column: o2o.column.clone(),
                },
            ));
        }

        EntityDeclaration {
            table: self.table.clone(),
            transient: false,
            cascade: self.cascade.unwrap_or_default(),
            lazy: self.lazy,
            endpoint: self.endpoint.clone(),
            fields,
        }
    }
}

/// Persistent models are those a loaded document describes
#[derive(Debug, Clone, Default)]
pub struct MappedProvider {
    maps: HashMap<String, ModelMap>,
}

impl MappedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML or JSON mapping document and merge its models
    pub fn add_document(&mut self, text: &str) -> OrmResult<()> {
        let document: MappingDocument = serde_yaml::from_str(text)?;
        self.add(document)
    }

    pub fn add(&mut self, document: MappingDocument) -> OrmResult<()> {
        for map in document.models {
            if self.maps.contains_key(&map.name) {
                return Err(OrmError::model_configuration(format!(
                    "model '{}' is mapped more than once",
                    map.name
                )));
            }
            debug!("Loaded mapping for model {}", map.name);
            self.maps.insert(map.name.clone(), map);
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&ModelMap> {
        self.maps.get(name)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl MetadataProvider for MappedProvider {
    fn mode(&self) -> ConfigurationMode {
        ConfigurationMode::Mapped
    }

    fn is_persistent(&self, mapping: &EntityMapping) -> bool {
        self.maps.contains_key(mapping.name())
    }

    fn declare(&self, mapping: &EntityMapping) -> OrmResult<EntityDeclaration> {
        self.maps
            .get(mapping.name())
            .map(ModelMap::to_declaration)
            .ok_or_else(|| {
                OrmError::invalid_argument(format!("{} is not mapped", mapping.name()))
            })
    }
}
