//! Registration-time accessor tables.
//!
//! `Model::map` fills a `ModelMapping` with one typed accessor pair per
//! field plus the annotation-style metadata the annotation strategy reads.
//! Accessors are plain function pointers, erased behind `ScalarSlot` and
//! `RelationSlot` so the rest of the ORM works on `AnyModel`.

use std::marker::PhantomData;
use std::sync::Arc;

use super::lazy::{Lazy, Related};
use super::value::{FieldType, FieldValue, Value};
use super::{AnyModel, EntityType, Model};
use crate::error::{OrmError, OrmResult};
use crate::policy::declaration::{
    Cascade, EntityDeclaration, FieldDeclaration, RelationDeclaration,
};

fn type_mismatch(expected: &str) -> OrmError {
    OrmError::invalid_argument(format!("model is not an instance of {}", expected))
}

/// Erased access to a scalar field
pub trait ScalarSlot: Send + Sync {
    fn field_type(&self) -> FieldType;

    /// Whether the Rust field can hold NULL
    fn optional(&self) -> bool;

    fn get(&self, model: &AnyModel) -> OrmResult<Value>;

    fn set(&self, model: &mut AnyModel, value: Value) -> OrmResult<()>;
}

struct TypedScalar<M, V> {
    get: fn(&M) -> &V,
    get_mut: fn(&mut M) -> &mut V,
}

impl<M: Model, V: FieldValue> ScalarSlot for TypedScalar<M, V> {
    fn field_type(&self) -> FieldType {
        V::TYPE
    }

    fn optional(&self) -> bool {
        V::OPTIONAL
    }

    fn get(&self, model: &AnyModel) -> OrmResult<Value> {
        let model = model
            .downcast_ref::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        Ok((self.get)(model).to_value())
    }

    fn set(&self, model: &mut AnyModel, value: Value) -> OrmResult<()> {
        let model = model
            .downcast_mut::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        *(self.get_mut)(model) = V::from_value(value)?;
        Ok(())
    }
}

/// Deferred loader for erased related instances
pub type RelationLoader = Arc<dyn Fn() -> OrmResult<Vec<Box<AnyModel>>> + Send + Sync>;

/// How a relationship field is populated when its owner is materialised
pub enum RelationFill {
    Loaded(Vec<Box<AnyModel>>),
    Deferred(RelationLoader),
}

/// Erased access to a relationship field
pub trait RelationSlot: Send + Sync {
    fn target(&self) -> EntityType;

    fn is_collection(&self) -> bool;

    /// Whether the field currently holds a resolved value
    fn is_loaded(&self, model: &AnyModel) -> OrmResult<bool>;

    /// Visit resolved related instances. Unresolved fields are skipped.
    fn visit(
        &self,
        model: &AnyModel,
        visitor: &mut dyn FnMut(&AnyModel) -> OrmResult<()>,
    ) -> OrmResult<()>;

    fn visit_mut(
        &self,
        model: &mut AnyModel,
        visitor: &mut dyn FnMut(&mut AnyModel) -> OrmResult<()>,
    ) -> OrmResult<()>;

    fn fill(&self, model: &mut AnyModel, fill: RelationFill) -> OrmResult<()>;
}

struct TypedRelation<M, R> {
    get: fn(&M) -> &Lazy<R>,
    get_mut: fn(&mut M) -> &mut Lazy<R>,
}

fn downcast_members<T: Model>(members: Vec<Box<AnyModel>>) -> OrmResult<Vec<T>> {
    members
        .into_iter()
        .map(|member| {
            member
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| type_mismatch(T::NAME))
        })
        .collect()
}

impl<M: Model, R: Related> RelationSlot for TypedRelation<M, R> {
    fn target(&self) -> EntityType {
        EntityType::of::<R::Target>()
    }

    fn is_collection(&self) -> bool {
        R::COLLECTION
    }

    fn is_loaded(&self, model: &AnyModel) -> OrmResult<bool> {
        let model = model
            .downcast_ref::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        Ok((self.get)(model).is_loaded())
    }

    fn visit(
        &self,
        model: &AnyModel,
        visitor: &mut dyn FnMut(&AnyModel) -> OrmResult<()>,
    ) -> OrmResult<()> {
        let model = model
            .downcast_ref::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        if let Some(related) = (self.get)(model).peek() {
            for member in related.members() {
                visitor(member)?;
            }
        }
        Ok(())
    }

    fn visit_mut(
        &self,
        model: &mut AnyModel,
        visitor: &mut dyn FnMut(&mut AnyModel) -> OrmResult<()>,
    ) -> OrmResult<()> {
        let model = model
            .downcast_mut::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        if let Some(related) = (self.get_mut)(model).get_mut() {
            for member in related.members_mut() {
                visitor(member)?;
            }
        }
        Ok(())
    }

    fn fill(&self, model: &mut AnyModel, fill: RelationFill) -> OrmResult<()> {
        let model = model
            .downcast_mut::<M>()
            .ok_or_else(|| type_mismatch(M::NAME))?;
        let lazy = match fill {
            RelationFill::Loaded(members) => {
                Lazy::loaded(R::from_members(downcast_members::<R::Target>(members)?))
            }
            RelationFill::Deferred(loader) => Lazy::deferred(move || {
                loader()
                    .and_then(downcast_members::<R::Target>)
                    .map(R::from_members)
            }),
        };
        *(self.get_mut)(model) = lazy;
        Ok(())
    }
}

/// Erased accessor of one registered field
#[derive(Clone)]
pub enum FieldSlot {
    Scalar(Arc<dyn ScalarSlot>),
    Relation(Arc<dyn RelationSlot>),
}

impl FieldSlot {
    pub fn is_relation(&self) -> bool {
        matches!(self, FieldSlot::Relation(_))
    }
}

impl std::fmt::Debug for FieldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSlot::Scalar(slot) => write!(f, "Scalar({:?})", slot.field_type()),
            FieldSlot::Relation(slot) => write!(f, "Relation({})", slot.target()),
        }
    }
}

/// Builder handed to `Model::map`
pub struct ModelMapping<M> {
    declaration: EntityDeclaration,
    slots: Vec<(String, FieldSlot)>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelMapping<M> {
    pub(crate) fn new() -> Self {
        Self {
            declaration: EntityDeclaration::default(),
            slots: Vec::new(),
            _model: PhantomData,
        }
    }

    pub(crate) fn into_parts(self) -> (EntityDeclaration, Vec<(String, FieldSlot)>) {
        (self.declaration, self.slots)
    }

    /// Override the table name (defaults to the lowercased model name)
    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.declaration.table = Some(name.into());
        self
    }

    /// Mark the whole model as non-persistent
    pub fn transient(&mut self) -> &mut Self {
        self.declaration.transient = true;
        self
    }

    pub fn cascade(&mut self, cascade: Cascade) -> &mut Self {
        self.declaration.cascade = cascade;
        self
    }

    /// Defer every relationship until first access
    pub fn lazy(&mut self) -> &mut Self {
        self.declaration.lazy = true;
        self
    }

    /// REST resource name (defaults to the table name)
    pub fn endpoint(&mut self, name: impl Into<String>) -> &mut Self {
        self.declaration.endpoint = Some(name.into());
        self
    }

    /// Register a scalar field
    pub fn field<V: FieldValue>(
        &mut self,
        name: &'static str,
        get: fn(&M) -> &V,
        get_mut: fn(&mut M) -> &mut V,
    ) -> FieldOptions<'_> {
        let slot: Arc<dyn ScalarSlot> = Arc::new(TypedScalar { get, get_mut });
        self.slots.push((name.to_string(), FieldSlot::Scalar(slot)));
        self.declaration.fields.push(FieldDeclaration::new(name));
        FieldOptions {
            declaration: self.last_declaration(),
        }
    }

    /// Register a relationship field. Without an explicit kind, collections
    /// are one-to-many and single values many-to-one.
    pub fn relation<R: Related>(
        &mut self,
        name: &'static str,
        get: fn(&M) -> &Lazy<R>,
        get_mut: fn(&mut M) -> &mut Lazy<R>,
    ) -> RelationOptions<'_> {
        let slot: Arc<dyn RelationSlot> = Arc::new(TypedRelation { get, get_mut });
        self.slots.push((name.to_string(), FieldSlot::Relation(slot)));

        let mut declaration = FieldDeclaration::new(name);
        declaration.relation = Some(if R::COLLECTION {
            RelationDeclaration::OneToMany { column: None }
        } else {
            RelationDeclaration::ManyToOne { column: None }
        });
        self.declaration.fields.push(declaration);
        RelationOptions {
            declaration: self.last_declaration(),
        }
    }

    fn last_declaration(&mut self) -> &mut FieldDeclaration {
        let index = self.declaration.fields.len() - 1;
        &mut self.declaration.fields[index]
    }
}

/// Annotation options for a scalar field
pub struct FieldOptions<'a> {
    declaration: &'a mut FieldDeclaration,
}

impl<'a> FieldOptions<'a> {
    pub fn column(self, column: impl Into<String>) -> Self {
        self.declaration.column = Some(column.into());
        self
    }

    pub fn primary_key(self) -> Self {
        self.declaration.primary_key = true;
        self
    }

    pub fn autoincrement(self) -> Self {
        self.declaration.autoincrement = true;
        self
    }

    pub fn not_null(self) -> Self {
        self.declaration.nullable = false;
        self
    }

    pub fn unique(self) -> Self {
        self.declaration.unique = true;
        self
    }

    pub fn transient(self) -> Self {
        self.declaration.transient = true;
        self
    }
}

/// Annotation options for a relationship field
pub struct RelationOptions<'a> {
    declaration: &'a mut FieldDeclaration,
}

impl<'a> RelationOptions<'a> {
    pub fn many_to_many(self) -> Self {
        self.declaration.relation = Some(RelationDeclaration::ManyToMany { join_table: None });
        self
    }

    pub fn many_to_one(self) -> Self {
        self.declaration.relation = Some(RelationDeclaration::ManyToOne { column: None });
        self
    }

    pub fn one_to_many(self) -> Self {
        self.declaration.relation = Some(RelationDeclaration::OneToMany { column: None });
        self
    }

    /// One-to-one with the foreign key on this model's table
    pub fn one_to_one(self) -> Self {
        self.declaration.relation = Some(RelationDeclaration::OneToOne {
            owner: true,
            column: None,
        });
        self
    }

    /// Move a one-to-one foreign key to the related model's table
    pub fn inverse(self) -> Self {
        if let Some(RelationDeclaration::OneToOne { owner, .. }) = &mut self.declaration.relation {
            *owner = false;
        }
        self
    }

    /// Join table of a many-to-many relationship
    pub fn join_table(self, table: impl Into<String>) -> Self {
        if let Some(RelationDeclaration::ManyToMany { join_table }) = &mut self.declaration.relation {
            *join_table = Some(table.into());
        }
        self
    }

    /// Foreign-key column of a to-one or one-to-many relationship
    pub fn column(self, name: impl Into<String>) -> Self {
        let name = name.into();
        match &mut self.declaration.relation {
            Some(RelationDeclaration::ManyToOne { column })
            | Some(RelationDeclaration::OneToMany { column })
            | Some(RelationDeclaration::OneToOne { column, .. }) => *column = Some(name),
            _ => {}
        }
        self
    }

    pub fn transient(self) -> Self {
        self.declaration.transient = true;
        self
    }
}
