//! Criteria Engine - fluent queries over one entity type
//!
//! A [`Criteria`] collects criterions, sort orders, paging and nested
//! association criteria, and is rendered to SQL only when a terminal
//! operation (`list`, `unique`, `count`) runs.
//!
//! ```ignore
//! use tessera_orm::criteria::{eq, gt, Order};
//!
//! let foos = session
//!     .criteria::<Foo>()
//!     .add(eq("name", "x"))
//!     .add(gt("id", 0))
//!     .order_by(Order::desc("id"))
//!     .limit(5)
//!     .list()?;
//! ```

pub mod criterion;
pub mod order;

use std::marker::PhantomData;

pub use self::criterion::{
    and, between, eq, gt, gte, is_in, is_not_null, is_null, like, lt, lte, ne, not, or,
    Criterion, Operator,
};
pub use order::{Direction, Order};

use crate::backends::RowReader;
use crate::error::{OrmError, OrmResult};
use crate::model::{EntityType, Model};
use crate::session::SqliteSession;

/// Restrictions on the entities reachable through one relationship field
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationCriteria {
    pub field: String,
    pub criterions: Vec<Criterion>,
    pub associations: Vec<AssociationCriteria>,
}

impl AssociationCriteria {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            criterions: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn add(mut self, criterion: Criterion) -> Self {
        self.criterions.push(criterion);
        self
    }

    /// Restrict a relationship of the associated entity in turn
    pub fn create_criteria<F>(mut self, field: &str, build: F) -> Self
    where
        F: FnOnce(AssociationCriteria) -> AssociationCriteria,
    {
        self.associations.push(build(AssociationCriteria::new(field)));
        self
    }
}

/// The state a criteria query renders from
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaSpec {
    pub entity: EntityType,
    pub criterions: Vec<Criterion>,
    pub orders: Vec<Order>,
    /// `None` is unbounded
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub associations: Vec<AssociationCriteria>,
}

impl CriteriaSpec {
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            criterions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            associations: Vec::new(),
        }
    }

    pub fn of<M: Model>() -> Self {
        Self::new(M::entity_type())
    }

    pub fn add(mut self, criterion: Criterion) -> Self {
        self.criterions.push(criterion);
        self
    }

    /// Negative limits are unbounded
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = u64::try_from(limit).ok();
        self
    }

    /// Negative offsets are ignored
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = u64::try_from(offset).ok().filter(|n| *n > 0);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn create_criteria<F>(mut self, field: &str, build: F) -> Self
    where
        F: FnOnce(AssociationCriteria) -> AssociationCriteria,
    {
        self.associations.push(build(AssociationCriteria::new(field)));
        self
    }

    /// Whether the rendered query would have a WHERE clause
    pub fn is_restricted(&self) -> bool {
        !self.criterions.is_empty() || !self.associations.is_empty()
    }
}

/// Criteria query bound to a session
pub struct Criteria<'s, M: Model> {
    session: &'s mut SqliteSession,
    spec: CriteriaSpec,
    _model: PhantomData<fn() -> M>,
}

impl<'s, M: Model> Criteria<'s, M> {
    pub(crate) fn new(session: &'s mut SqliteSession) -> Self {
        Self {
            session,
            spec: CriteriaSpec::of::<M>(),
            _model: PhantomData,
        }
    }

    pub fn add(mut self, criterion: Criterion) -> Self {
        self.spec = self.spec.add(criterion);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.spec = self.spec.limit(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.spec = self.spec.offset(offset);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.spec = self.spec.order_by(order);
        self
    }

    /// Filter on a relationship field without writing the join by hand
    pub fn create_criteria<F>(mut self, field: &str, build: F) -> Self
    where
        F: FnOnce(AssociationCriteria) -> AssociationCriteria,
    {
        self.spec = self.spec.create_criteria(field, build);
        self
    }

    pub fn spec(&self) -> &CriteriaSpec {
        &self.spec
    }

    /// The SELECT this criteria would run
    pub fn to_sql(&self) -> OrmResult<String> {
        self.session.context().sql().create_query(&self.spec)
    }

    /// Every matching model
    pub fn list(self) -> OrmResult<Vec<M>> {
        let sql = self.session.context().sql().create_query(&self.spec)?;
        self.session.query_models::<M>(&sql)
    }

    /// The single matching model, `None` when nothing matches
    pub fn unique(self) -> OrmResult<Option<M>> {
        let mut models = self.list()?;
        match models.len() {
            0 | 1 => Ok(models.pop()),
            n => Err(OrmError::NonUniqueResult(n)),
        }
    }

    /// Number of matching rows, ignoring order and paging
    pub fn count(self) -> OrmResult<i64> {
        let sql = self.session.context().sql().create_count_query(&self.spec)?;
        let rows = self.session.query_rows(&sql)?;
        match rows.first() {
            Some(row) => row.get_long(0),
            None => Ok(0),
        }
    }
}
