//! Annotation strategy: metadata declared alongside the field accessors

use tessera_core::ConfigurationMode;

use super::declaration::EntityDeclaration;
use super::MetadataProvider;
use crate::error::OrmResult;
use crate::model::EntityMapping;

/// Every registered model is persistent unless marked transient
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationProvider;

impl MetadataProvider for AnnotationProvider {
    fn mode(&self) -> ConfigurationMode {
        ConfigurationMode::Annotations
    }

    fn is_persistent(&self, mapping: &EntityMapping) -> bool {
        !mapping.annotations.transient
    }

    fn declare(&self, mapping: &EntityMapping) -> OrmResult<EntityDeclaration> {
        let mut declaration = mapping.annotations.clone();
        declaration.fields.retain(|field| !field.transient);
        Ok(declaration)
    }
}
