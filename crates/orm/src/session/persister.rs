//! Writes a model and, depending on its cascade policy, its relatives.
//!
//! Owning-side to-one relatives are persisted before the row so their keys
//! can be written into it. Collections and inverse one-to-one relatives
//! are handled after the row exists, because their rows or join rows need
//! its key. A relationship is never followed back the way it was reached,
//! and each instance is written at most once per top-level call.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use super::SaveOutcome;
use crate::backends::{ColumnValue, StatementExecutor};
use crate::context::OrmContext;
use crate::error::OrmResult;
use crate::model::{AnyModel, Value};
use crate::policy::{Cascade, EntityDescriptor, FieldDescriptor};
use crate::relationships::Relationship;

pub struct Persister {
    context: Arc<OrmContext>,
    executor: Arc<dyn StatementExecutor>,
    visited: HashSet<u64>,
}

impl Persister {
    pub fn new(context: Arc<OrmContext>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            context,
            executor,
            visited: HashSet::new(),
        }
    }

    /// Insert a new row; returns the generated row id
    pub fn save(&mut self, descriptor: &EntityDescriptor, model: &mut AnyModel) -> OrmResult<i64> {
        self.visited.clear();
        self.insert(descriptor, model, None)
    }

    /// Update the existing row; false when no row has the model's key
    pub fn update(&mut self, descriptor: &EntityDescriptor, model: &mut AnyModel) -> OrmResult<bool> {
        self.visited.clear();
        self.update_row(descriptor, model, None)
    }

    pub fn save_or_update(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
    ) -> OrmResult<SaveOutcome> {
        self.visited.clear();
        self.upsert(descriptor, model, None)
    }

    /// Delete the row, detaching relatives unless the cascade is `None`.
    /// Related rows themselves are kept.
    pub fn delete(&mut self, descriptor: &EntityDescriptor, model: &AnyModel) -> OrmResult<bool> {
        let key = descriptor.primary_key_value(model)?;
        let sql = self.context.sql();
        if descriptor.cascade != Cascade::None {
            for field in descriptor.relationship_fields() {
                let Some(relationship) = field.relationship() else {
                    continue;
                };
                let detach = match relationship {
                    Relationship::ManyToMany(r) => {
                        sql.create_many_to_many_delete_query(r, descriptor.entity, &key)?
                    }
                    other if !other.is_owning_side() => sql
                        .create_delete_stale_relationship_query(
                            other,
                            descriptor.entity,
                            &key,
                            &[],
                        )?,
                    _ => continue,
                };
                self.executor.execute(&detach, &[])?;
            }
        }
        let statement = sql.create_delete_query(descriptor, &key)?;
        let deleted = self.executor.execute(&statement.sql, &statement.params)? > 0;
        debug!(entity = %descriptor.entity, deleted, "Deleted row");
        Ok(deleted)
    }

    fn hash(&self, descriptor: &EntityDescriptor, key: &Value) -> u64 {
        self.context.policy().compute_hash(descriptor.entity, key)
    }

    /// Whether this instance was already written during the current call
    fn seen(&self, descriptor: &EntityDescriptor, model: &AnyModel) -> OrmResult<bool> {
        let key = descriptor.primary_key_value(model)?;
        Ok(!key.is_null_or_zero() && self.visited.contains(&self.hash(descriptor, &key)))
    }

    fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
        via: Option<&Relationship>,
    ) -> OrmResult<SaveOutcome> {
        if self.seen(descriptor, model)? {
            return Ok(SaveOutcome::Updated);
        }
        let unassigned =
            descriptor.primary_key().autoincrement && descriptor.is_pk_null_or_zero(model)?;
        if !unassigned && self.update_row(descriptor, model, via)? {
            return Ok(SaveOutcome::Updated);
        }
        self.insert(descriptor, model, via).map(SaveOutcome::Inserted)
    }

    fn insert(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
        via: Option<&Relationship>,
    ) -> OrmResult<i64> {
        self.persist_owned(descriptor, model, via)?;

        let pk = descriptor.primary_key();
        let generate = pk.autoincrement && descriptor.is_pk_null_or_zero(model)?;
        let mut columns = self.scalar_columns(descriptor, model, generate)?;
        columns.extend(self.foreign_key_columns(descriptor, model)?);

        let statement = self.context.sql().create_insert_query(descriptor, columns);
        let id = self.executor.insert(&statement.sql, &statement.params)?;
        if generate {
            let key = descriptor.primary_key_type().coerce(Value::Long(id))?;
            pk.set(model, key)?;
        }
        trace!(entity = %descriptor.entity, id, "Inserted row");

        let key = descriptor.primary_key_value(model)?;
        let hash = self.hash(descriptor, &key);
        self.visited.insert(hash);
        self.persist_dependents(descriptor, model, &key, via, false)?;
        Ok(id)
    }

    fn update_row(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
        via: Option<&Relationship>,
    ) -> OrmResult<bool> {
        self.persist_owned(descriptor, model, via)?;

        let key = descriptor.primary_key_value(model)?;
        let mut columns = self.scalar_columns(descriptor, model, true)?;
        columns.extend(self.foreign_key_columns(descriptor, model)?);

        let statement = self
            .context
            .sql()
            .create_update_query(descriptor, columns, &key)?;
        if self.executor.execute(&statement.sql, &statement.params)? == 0 {
            trace!(entity = %descriptor.entity, key = %key, "No row to update");
            return Ok(false);
        }

        let hash = self.hash(descriptor, &key);
        self.visited.insert(hash);
        self.persist_dependents(descriptor, model, &key, via, true)?;
        Ok(true)
    }

    /// Scalar columns, without the key when it is left to the database
    fn scalar_columns(
        &self,
        descriptor: &EntityDescriptor,
        model: &AnyModel,
        skip_key: bool,
    ) -> OrmResult<Vec<(String, ColumnValue)>> {
        let sql = self.context.sql();
        descriptor
            .scalar_fields()
            .filter(|f| !(skip_key && f.primary_key))
            .map(|f| {
                let field_type = f.field_type().unwrap_or(descriptor.primary_key_type());
                Ok((f.column.clone(), sql.column_value(field_type, &f.get(model)?)?))
            })
            .collect()
    }

    /// Foreign keys this row stores for its resolved to-one relatives. An
    /// unresolved relationship leaves its column untouched.
    fn foreign_key_columns(
        &self,
        descriptor: &EntityDescriptor,
        model: &AnyModel,
    ) -> OrmResult<Vec<(String, ColumnValue)>> {
        if descriptor.cascade == Cascade::None {
            return Ok(Vec::new());
        }
        let mut columns = Vec::new();
        for field in owning_fields(descriptor) {
            let (Some(relationship), Some(slot)) = (field.relationship(), field.relation_slot())
            else {
                continue;
            };
            if !slot.is_loaded(model)? {
                continue;
            }
            let target = self.target_descriptor(descriptor, relationship)?;
            let mut reference = Value::Null;
            slot.visit(model, &mut |related| {
                reference = target.primary_key_value(related)?;
                Ok(())
            })?;
            let column = relationship.foreign_key_column().unwrap_or(field.column.as_str());
            let value = self
                .context
                .sql()
                .column_value(target.primary_key_type(), &reference)?;
            columns.push((column.to_string(), value));
        }
        Ok(columns)
    }

    fn target_descriptor(
        &self,
        descriptor: &EntityDescriptor,
        relationship: &Relationship,
    ) -> OrmResult<Arc<EntityDescriptor>> {
        let target = relationship
            .opposite(descriptor.entity)
            .unwrap_or(descriptor.entity);
        self.context.policy().descriptor(target)
    }

    /// Save or update the to-one relatives whose keys this row stores
    fn persist_owned(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
        via: Option<&Relationship>,
    ) -> OrmResult<()> {
        if descriptor.cascade != Cascade::All {
            return Ok(());
        }
        for field in owning_fields(descriptor) {
            let (Some(relationship), Some(slot)) = (field.relationship(), field.relation_slot())
            else {
                continue;
            };
            if via.is_some_and(|v| v.mirrors(relationship)) {
                continue;
            }
            let target = self.target_descriptor(descriptor, relationship)?;
            slot.visit_mut(model, &mut |related| {
                self.upsert(&target, related, Some(relationship)).map(|_| ())
            })?;
        }
        Ok(())
    }

    /// Relatives that store this row's key: collection members, the other
    /// side of an inverse one-to-one, and many-to-many join rows
    fn persist_dependents(
        &mut self,
        descriptor: &EntityDescriptor,
        model: &mut AnyModel,
        key: &Value,
        via: Option<&Relationship>,
        detach_stale: bool,
    ) -> OrmResult<()> {
        if descriptor.cascade == Cascade::None {
            return Ok(());
        }
        for field in descriptor.relationship_fields() {
            let (Some(relationship), Some(slot)) = (field.relationship(), field.relation_slot())
            else {
                continue;
            };
            if relationship.is_owning_side()
                || via.is_some_and(|v| v.mirrors(relationship))
                || !slot.is_loaded(model)?
            {
                continue;
            }

            let target = self.target_descriptor(descriptor, relationship)?;
            let mut keys = Vec::new();
            let cascade = descriptor.cascade;
            slot.visit_mut(model, &mut |related| {
                if cascade == Cascade::All {
                    self.upsert(&target, related, Some(relationship))?;
                }
                let related_key = target.primary_key_value(related)?;
                if related_key.is_null_or_zero() && target.primary_key().autoincrement {
                    debug!(entity = %target.entity, "Skipping unsaved relative");
                } else {
                    keys.push(related_key);
                }
                Ok(())
            })?;

            self.link(descriptor, relationship, key, &keys, detach_stale)?;
        }
        Ok(())
    }

    fn link(
        &self,
        descriptor: &EntityDescriptor,
        relationship: &Relationship,
        key: &Value,
        related: &[Value],
        detach_stale: bool,
    ) -> OrmResult<()> {
        let sql = self.context.sql();
        let entity = descriptor.entity;
        let mut statements = Vec::with_capacity(related.len() + 1);

        if let Relationship::OneToOne(r) = relationship {
            // The holder's previous partner loses its key first
            statements.push(sql.create_delete_stale_relationship_query(
                relationship,
                entity,
                key,
                &[],
            )?);
            if let Some(owner_key) = related.first() {
                statements.push(sql.create_update_one_to_one_foreign_key_query(
                    r, owner_key, key,
                )?);
            }
        } else {
            if detach_stale {
                statements.push(
                    sql.create_delete_stale_relationship_query(relationship, entity, key, related)?,
                );
            }
            for other in related {
                statements.push(match relationship {
                    Relationship::ManyToMany(r) => {
                        sql.create_many_to_many_insert_query(r, entity, key, other)?
                    }
                    _ => sql.create_update_foreign_key_query(relationship, key, other)?,
                });
            }
        }

        for statement in &statements {
            self.executor.execute(statement, &[])?;
        }
        trace!(
            relationship = %relationship,
            statements = statements.len(),
            "Maintained relationship"
        );
        Ok(())
    }
}

fn owning_fields(descriptor: &EntityDescriptor) -> impl Iterator<Item = &FieldDescriptor> {
    descriptor
        .relationship_fields()
        .filter(|f| f.relationship().is_some_and(Relationship::is_owning_side))
}
