//! # tessera-orm: object-relational mapping for embedded SQLite
//!
//! Models describe their fields once through [`Model::map`]. A persistence
//! policy resolves that metadata (or a mapping document) into tables,
//! columns and relationships, and sessions load, save and query instances
//! through a bounded identity cache.
//!
//! ```ignore
//! let context = OrmContext::builder()
//!     .config(OrmConfig::in_memory())
//!     .register::<Foo>()
//!     .build()?;
//! let mut session = context.session()?;
//! session.open()?;
//! ```

pub mod adapters;
pub mod backends;
pub mod context;
pub mod criteria;
pub mod error;
pub mod model;
pub mod policy;
pub mod relationships;
pub mod rest;
pub mod security;
pub mod session;
pub mod sql;

// Re-export the types most callers need
pub use adapters::{TypeAdapter, TypeAdapterRegistry};
pub use backends::{ColumnValue, ResultRow, RowReader, SqliteDatastore, StatementExecutor};
pub use context::{OrmContext, OrmContextBuilder};
pub use criteria::{Criteria, CriteriaSpec, Criterion, Order};
pub use error::{OrmError, OrmResult};
pub use model::{EntityType, FieldType, Lazy, Model, ModelMapping, Value};
pub use policy::{Cascade, PersistencePolicy, TypeResolutionPolicy};
pub use relationships::{Relationship, RelationshipKind};
pub use rest::{RestSession, RestTransport};
pub use session::{outcome_code, SaveOutcome, Session, SqliteSession};
pub use sql::SqlBuilder;
pub use tessera_core::{ConfigurationMode, MessageType, OrmConfig};
