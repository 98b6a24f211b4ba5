//! Field-name to payload-value view of a model

use serde_json::{Map, Value as JsonValue};

use crate::adapters::TypeAdapterRegistry;
use crate::error::{OrmError, OrmResult};
use crate::model::{AnyModel, Value};
use crate::policy::{EntityDescriptor, PersistencePolicy};

/// Ordered field-name to JSON value pairs built from a model's persistent
/// fields. Only scalars and the keys of owned to-one relatives are carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestfulModelMap {
    entries: Vec<(String, JsonValue)>,
}

impl RestfulModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value
    pub fn insert(&mut self, name: impl Into<String>, value: JsonValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_model(
        policy: &PersistencePolicy,
        adapters: &TypeAdapterRegistry,
        descriptor: &EntityDescriptor,
        model: &AnyModel,
    ) -> OrmResult<Self> {
        let mut map = Self::new();
        for field in descriptor.fields() {
            if let Some(field_type) = field.field_type() {
                let value = adapters.adapter(field_type)?.to_rest(&field.get(model)?)?;
                map.insert(field.name.clone(), value);
                continue;
            }

            let (Some(relationship), Some(slot)) = (field.relationship(), field.relation_slot())
            else {
                continue;
            };
            if !relationship.is_owning_side() || !slot.is_loaded(model)? {
                continue;
            }
            let target = relationship
                .opposite(descriptor.entity)
                .unwrap_or(descriptor.entity);
            let target = policy.descriptor(target)?;
            let mut key = Value::Null;
            slot.visit(model, &mut |related| {
                key = target.primary_key_value(related)?;
                Ok(())
            })?;
            let value = adapters.adapter(target.primary_key_type())?.to_rest(&key)?;
            map.insert(field.name.clone(), value);
        }
        Ok(map)
    }

    /// Copy the scalar entries onto a model; absent fields keep their value
    pub fn apply(
        &self,
        adapters: &TypeAdapterRegistry,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
    ) -> OrmResult<()> {
        for field in descriptor.scalar_fields() {
            let (Some(value), Some(field_type)) = (self.get(&field.name), field.field_type())
            else {
                continue;
            };
            field.set(model, adapters.adapter(field_type)?.from_rest(value)?)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.entries.iter().cloned().collect::<Map<_, _>>())
    }

    pub fn from_json(value: JsonValue) -> OrmResult<Self> {
        match value {
            JsonValue::Object(object) => Ok(Self {
                entries: object.into_iter().collect(),
            }),
            other => Err(OrmError::Rest(format!(
                "expected an object payload, got {}",
                other
            ))),
        }
    }
}

impl FromIterator<(String, JsonValue)> for RestfulModelMap {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::model::{DomainRegistry, Lazy, Model, ModelMapping};
    use crate::policy::AnnotationProvider;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct City {
        id: i64,
        name: String,
    }

    impl Model for City {
        const NAME: &'static str = "City";

        fn map(m: &mut ModelMapping<Self>) {
            m.field("id", |c| &c.id, |c| &mut c.id).primary_key();
            m.field("name", |c| &c.name, |c| &mut c.name);
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Street {
        id: i64,
        name: String,
        blob: Vec<u8>,
        city: Lazy<Option<City>>,
    }

    impl Model for Street {
        const NAME: &'static str = "Street";

        fn map(m: &mut ModelMapping<Self>) {
            m.field("id", |s| &s.id, |s| &mut s.id).primary_key();
            m.field("name", |s| &s.name, |s| &mut s.name);
            m.field("blob", |s| &s.blob, |s| &mut s.blob);
            m.relation("city", |s| &s.city, |s| &mut s.city);
        }
    }

    fn policy() -> PersistencePolicy {
        let registry = Arc::new(DomainRegistry::new());
        registry.register::<City>().unwrap();
        registry.register::<Street>().unwrap();
        PersistencePolicy::new(registry, Box::new(AnnotationProvider))
    }

    #[test]
    fn test_map_carries_scalars_and_owned_keys() {
        let policy = policy();
        let adapters = TypeAdapterRegistry::new();
        let descriptor = policy.descriptor_of::<Street>().unwrap();
        let street = Street {
            id: 3,
            name: "Main".into(),
            blob: vec![0xab, 0x01],
            city: Lazy::loaded(Some(City {
                id: 9,
                name: "Springfield".into(),
            })),
        };

        let map = RestfulModelMap::from_model(&policy, &adapters, &descriptor, &street).unwrap();
        let names: Vec<_> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "name", "blob", "city"]);
        assert_eq!(map.get("blob"), Some(&json!("ab01")));
        assert_eq!(map.get("city"), Some(&json!(9)));
    }

    #[test]
    fn test_apply_converts_payload_values() {
        let policy = policy();
        let adapters = TypeAdapterRegistry::new();
        let descriptor = policy.descriptor_of::<Street>().unwrap();
        let map = RestfulModelMap::from_json(json!({"id": "12", "name": "Elm"})).unwrap();

        let mut street = Street {
            blob: vec![1],
            ..Default::default()
        };
        map.apply(&adapters, &descriptor, &mut street).unwrap();
        assert_eq!(street.id, 12);
        assert_eq!(street.name, "Elm");
        assert_eq!(street.blob, vec![1]);

        assert!(RestfulModelMap::from_json(json!([1, 2])).is_err());
    }
}
