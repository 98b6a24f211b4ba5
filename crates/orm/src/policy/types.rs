//! Type resolution policy - storage classification and key compatibility

use std::sync::Arc;

use crate::adapters::TypeAdapterRegistry;
use crate::backends::StorageType;
use crate::error::OrmResult;
use crate::model::registry::PROXY_SUFFIX;
use crate::model::{DomainRegistry, EntityType, FieldType, Value};

#[derive(Debug, Clone)]
pub struct TypeResolutionPolicy {
    registry: Arc<DomainRegistry>,
    adapters: Arc<TypeAdapterRegistry>,
}

impl TypeResolutionPolicy {
    pub fn new(registry: Arc<DomainRegistry>, adapters: Arc<TypeAdapterRegistry>) -> Self {
        Self { registry, adapters }
    }

    /// Storage class of a declared field type, honouring custom adapters
    pub fn storage_type(&self, field_type: FieldType) -> OrmResult<StorageType> {
        Ok(self.adapters.adapter(field_type)?.storage_type())
    }

    /// Storage class a runtime value would naturally occupy
    pub fn classify(&self, value: &Value) -> StorageType {
        match value {
            Value::Null => StorageType::Null,
            Value::Bool(_) | Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                StorageType::Integer
            }
            Value::Float(_) | Value::Double(_) => StorageType::Real,
            Value::Char(_) | Value::Text(_) | Value::Date(_) => StorageType::Text,
            Value::Bytes(_) => StorageType::Blob,
        }
    }

    /// Whether `candidate` can identify a row keyed by a field of `key_type`.
    ///
    /// Types must match exactly, except that a plain int is accepted for
    /// keys declared long, double or float.
    pub fn is_valid_primary_key(&self, key_type: FieldType, candidate: &Value) -> bool {
        match candidate.field_type() {
            None => false,
            Some(actual) if actual == key_type => true,
            Some(FieldType::Int) => matches!(
                key_type,
                FieldType::Long | FieldType::Double | FieldType::Float
            ),
            Some(_) => false,
        }
    }

    pub fn is_domain_model(&self, entity: &EntityType) -> bool {
        self.registry.contains(entity)
    }

    /// Whether a type name is the proxy of a registered model
    pub fn is_domain_proxy(&self, type_name: &str) -> bool {
        type_name.ends_with(PROXY_SUFFIX) && self.registry.is_proxy_name(type_name)
    }
}
