//! Materialisation of result rows into models.
//!
//! Scalar fields are read through the type adapters. Relationship fields
//! are resolved immediately unless the entity is lazy or the related type
//! is already being materialised further up the object graph; those get a
//! deferred loader that runs on first access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::backends::{ResultRow, RowReader, StatementExecutor};
use crate::context::OrmContext;
use crate::error::{OrmError, OrmResult};
use crate::model::mapping::RelationFill;
use crate::model::{AnyModel, EntityType, FieldType, Value};
use crate::policy::EntityDescriptor;
use crate::relationships::Relationship;

#[derive(Clone)]
pub struct ModelLoader {
    context: Arc<OrmContext>,
    executor: Arc<dyn StatementExecutor>,
    /// Cleared when the owning session closes; deferred loaders check it
    live: Arc<AtomicBool>,
    /// Types being materialised, outermost first
    in_progress: Vec<EntityType>,
}

impl ModelLoader {
    pub fn new(
        context: Arc<OrmContext>,
        executor: Arc<dyn StatementExecutor>,
        live: Arc<AtomicBool>,
    ) -> Self {
        Self {
            context,
            executor,
            live,
            in_progress: Vec::new(),
        }
    }

    fn ensure_open(&self) -> OrmResult<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(OrmError::SessionNotOpen)
        }
    }

    /// Load one row by primary key
    pub fn load(&mut self, entity: EntityType, key: &Value) -> OrmResult<Option<Box<AnyModel>>> {
        self.ensure_open()?;
        let descriptor = self.context.policy().descriptor(entity)?;
        let statement = self
            .context
            .sql()
            .create_select_by_key_query(&descriptor, key)?;
        let rows = self.executor.query(&statement.sql, &statement.params)?;
        match rows.first() {
            Some(row) => self.materialize(&descriptor, row).map(Some),
            None => Ok(None),
        }
    }

    /// Run a SELECT over `entity`'s table and materialise every row
    pub fn query(&mut self, entity: EntityType, sql: &str) -> OrmResult<Vec<Box<AnyModel>>> {
        self.ensure_open()?;
        let descriptor = self.context.policy().descriptor(entity)?;
        let rows = self.executor.query(sql, &[])?;
        rows.iter()
            .map(|row| self.materialize(&descriptor, row))
            .collect()
    }

    pub fn materialize(
        &mut self,
        descriptor: &EntityDescriptor,
        row: &ResultRow,
    ) -> OrmResult<Box<AnyModel>> {
        let mut model = descriptor.instantiate();
        for field in descriptor.scalar_fields() {
            let index = row.column_index(&field.column).ok_or_else(|| {
                OrmError::conversion(format!(
                    "result has no column '{}' for {}.{}",
                    field.column, descriptor.entity, field.name
                ))
            })?;
            let adapter = self
                .context
                .adapters()
                .adapter(field.field_type().unwrap_or(FieldType::Long))?;
            field.set(model.as_mut(), adapter.read(row, index)?)?;
        }

        let key = descriptor.primary_key_value(model.as_ref())?;
        self.in_progress.push(descriptor.entity);
        let filled = self.fill_relationships(descriptor, &key, row, model.as_mut());
        self.in_progress.pop();
        filled?;
        Ok(model)
    }

    fn fill_relationships(
        &mut self,
        descriptor: &EntityDescriptor,
        key: &Value,
        row: &ResultRow,
        model: &mut AnyModel,
    ) -> OrmResult<()> {
        for field in descriptor.relationship_fields() {
            let (Some(relationship), Some(slot)) = (field.relationship(), field.relation_slot())
            else {
                continue;
            };
            let Some((target, sql)) = self.related_query(descriptor.entity, relationship, key, row)?
            else {
                slot.fill(model, RelationFill::Loaded(Vec::new()))?;
                continue;
            };

            let fill = if descriptor.lazy || self.in_progress.contains(&target) {
                trace!(field = %field.name, "Deferring relationship of {}", descriptor.entity);
                let loader = ModelLoader::new(
                    self.context.clone(),
                    self.executor.clone(),
                    self.live.clone(),
                );
                RelationFill::Deferred(Arc::new(move || loader.clone().query(target, &sql)))
            } else {
                RelationFill::Loaded(self.query(target, &sql)?)
            };
            slot.fill(model, fill)?;
        }
        Ok(())
    }

    /// The related type and the SELECT that finds the related rows, or
    /// `None` when the row references nothing
    fn related_query(
        &self,
        entity: EntityType,
        relationship: &Relationship,
        key: &Value,
        row: &ResultRow,
    ) -> OrmResult<Option<(EntityType, String)>> {
        let sql = self.context.sql();
        let target = relationship.opposite(entity).unwrap_or(entity);
        if let Relationship::ManyToMany(r) = relationship {
            return Ok(Some((
                target,
                sql.create_many_to_many_join_query(r, key, entity)?,
            )));
        }

        let column = relationship.foreign_key_column().unwrap_or_default();
        if !relationship.is_owning_side() {
            return Ok(Some((
                target,
                sql.create_select_by_column_query(target, column, entity, key)?,
            )));
        }

        let target_descriptor = self.context.policy().descriptor(target)?;
        let Some(index) = row.column_index(column) else {
            return Ok(None);
        };
        let reference = self
            .context
            .adapters()
            .adapter(target_descriptor.primary_key_type())?
            .read(row, index)?;
        if reference.is_null() {
            return Ok(None);
        }
        Ok(Some((
            target,
            sql.create_select_by_column_query(
                target,
                &target_descriptor.primary_key().column,
                target,
                &reference,
            )?,
        )))
    }
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("live", &self.live.load(Ordering::Relaxed))
            .field("in_progress", &self.in_progress)
            .finish()
    }
}
