//! Sessions - units of work over one datastore
//!
//! A session must be opened before use and holds a bounded identity
//! cache of loaded and saved instances. [`SqliteSession`] works against the
//! SQL datastore; the REST session implements the same surface over HTTP.
//!
//! ```ignore
//! let mut session = context.session()?;
//! session.open()?;
//! let mut foo = Foo { name: "x".into(), ..Default::default() };
//! let id = session.save(&mut foo)?;
//! let loaded: Option<Foo> = session.load(id)?;
//! session.close();
//! ```

pub mod cache;
pub mod loader;
pub mod persister;
pub mod sqlite;
pub mod transaction;

pub use cache::SessionCache;
pub use loader::ModelLoader;
pub use persister::Persister;
pub use sqlite::SqliteSession;
pub use transaction::TransactionState;

use tracing::warn;

use crate::error::OrmResult;
use crate::model::{Model, Value};

/// Result of `save_or_update`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was written; carries the generated row id
    Inserted(i64),
    Updated,
}

impl SaveOutcome {
    /// Compact status code: the row id after an insert, 0 after an update
    pub fn code(self) -> i64 {
        match self {
            SaveOutcome::Inserted(id) => id,
            SaveOutcome::Updated => 0,
        }
    }
}

/// Status code of a `save_or_update` call, with -1 standing for failure
pub fn outcome_code(result: &OrmResult<SaveOutcome>) -> i64 {
    result.as_ref().map_or(-1, |outcome| outcome.code())
}

/// Operations shared by every session variant
pub trait Session {
    fn open(&mut self) -> OrmResult<()>;

    /// Release the datastore and forget cached instances
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn begin_transaction(&mut self) -> OrmResult<()>;

    fn commit(&mut self) -> OrmResult<()>;

    fn rollback(&mut self) -> OrmResult<()>;

    /// Persist a new instance and return its row id
    fn save<M: Model>(&mut self, model: &mut M) -> OrmResult<i64>;

    /// Write an existing instance; false when no stored row has its key
    fn update<M: Model>(&mut self, model: &mut M) -> OrmResult<bool>;

    fn delete<M: Model>(&mut self, model: &M) -> OrmResult<bool>;

    fn save_or_update<M: Model>(&mut self, model: &mut M) -> OrmResult<SaveOutcome>;

    fn load<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>>;

    /// Put an instance into the session cache
    fn cache<M: Model>(&mut self, model: &M) -> OrmResult<()>;

    /// Whether an instance with this key is cached
    fn check_cache<M: Model, K: Into<Value>>(&self, key: K) -> OrmResult<bool>;

    /// The cached instance with this key, marked most recently used
    fn search_cache<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>>;

    /// Empty the session cache
    fn recycle_cache(&mut self);

    fn set_cache_size(&mut self, size: usize) -> OrmResult<()>;

    /// Save each instance, continuing past failures; returns how many
    /// succeeded
    fn save_all<M: Model>(&mut self, models: &mut [M]) -> usize {
        let mut saved = 0;
        for model in models.iter_mut() {
            match self.save(model) {
                Ok(_) => saved += 1,
                Err(e) => warn!(model = M::NAME, error = %e, "save failed"),
            }
        }
        saved
    }

    fn update_all<M: Model>(&mut self, models: &mut [M]) -> usize {
        let mut updated = 0;
        for model in models.iter_mut() {
            match self.update(model) {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => warn!(model = M::NAME, error = %e, "update failed"),
            }
        }
        updated
    }

    fn delete_all<M: Model>(&mut self, models: &[M]) -> usize {
        let mut deleted = 0;
        for model in models {
            match self.delete(model) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(model = M::NAME, error = %e, "delete failed"),
            }
        }
        deleted
    }

    fn save_or_update_all<M: Model>(&mut self, models: &mut [M]) -> usize {
        let mut written = 0;
        for model in models.iter_mut() {
            match self.save_or_update(model) {
                Ok(_) => written += 1,
                Err(e) => warn!(model = M::NAME, error = %e, "save or update failed"),
            }
        }
        written
    }
}
