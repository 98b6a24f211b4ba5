//! Session over the SQLite datastore

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::{ModelLoader, Persister, SaveOutcome, Session, SessionCache, TransactionState};
use crate::backends::{ResultRow, StatementExecutor};
use crate::context::OrmContext;
use crate::criteria::Criteria;
use crate::error::{OrmError, OrmResult};
use crate::model::{AnyModel, Model, Value};
use crate::policy::EntityDescriptor;

pub struct SqliteSession {
    context: Arc<OrmContext>,
    /// Executor supplied by the caller instead of the configured datastore
    source: Option<Arc<dyn StatementExecutor>>,
    executor: Option<Arc<dyn StatementExecutor>>,
    /// Shared with deferred loaders; replaced on every open
    live: Arc<AtomicBool>,
    cache: SessionCache,
    transaction: TransactionState,
}

fn downcast<M: Model>(model: Box<AnyModel>) -> OrmResult<M> {
    model.downcast::<M>().map(|boxed| *boxed).map_err(|_| {
        OrmError::conversion(format!("materialised row is not a {}", M::NAME))
    })
}

impl SqliteSession {
    pub fn new(context: Arc<OrmContext>) -> OrmResult<Self> {
        let cache = SessionCache::new(context.config().session.cache_size)?;
        let transaction = TransactionState::new(context.config().autocommit());
        Ok(Self {
            context,
            source: None,
            executor: None,
            live: Arc::new(AtomicBool::new(false)),
            cache,
            transaction,
        })
    }

    pub fn with_executor(
        context: Arc<OrmContext>,
        executor: Arc<dyn StatementExecutor>,
    ) -> OrmResult<Self> {
        let mut session = Self::new(context)?;
        session.source = Some(executor);
        Ok(session)
    }

    pub fn context(&self) -> &Arc<OrmContext> {
        &self.context
    }

    fn executor(&self) -> OrmResult<Arc<dyn StatementExecutor>> {
        self.executor.clone().ok_or(OrmError::SessionNotOpen)
    }

    fn loader(&self) -> OrmResult<ModelLoader> {
        let executor = self.executor()?;
        Ok(ModelLoader::new(
            self.context.clone(),
            executor,
            self.live.clone(),
        ))
    }

    fn descriptor<M: Model>(&self) -> OrmResult<Arc<EntityDescriptor>> {
        self.context.policy().descriptor_of::<M>()
    }

    /// Executor for a mutating call, after the open and transaction checks
    fn mutation(&self, operation: &str) -> OrmResult<Arc<dyn StatementExecutor>> {
        let executor = self.executor()?;
        self.transaction.check_for_transaction(operation)?;
        Ok(executor)
    }

    fn refresh_cache<M: Model>(&mut self, model: &M) -> OrmResult<()> {
        let hash = self.context.policy().compute_model_hash(model)?;
        self.cache.put(hash, Arc::new(model.clone()));
        Ok(())
    }

    fn key_hash<M: Model>(&self, key: Value) -> OrmResult<u64> {
        let descriptor = self.descriptor::<M>()?;
        let key_type = descriptor.primary_key_type();
        if !self.context.types().is_valid_primary_key(key_type, &key) {
            return Err(OrmError::invalid_argument(format!(
                "{} is not a valid key for {}; expected {:?}",
                key,
                M::NAME,
                key_type
            )));
        }
        let key = key_type.coerce(key)?;
        Ok(self.context.policy().compute_hash(descriptor.entity, &key))
    }

    /// Start a criteria query over `M`
    pub fn criteria<M: Model>(&mut self) -> Criteria<'_, M> {
        Criteria::new(self)
    }

    /// Run raw SQL; returns the affected row count
    pub fn execute(&mut self, sql: &str) -> OrmResult<usize> {
        self.mutation("execute")?.execute(sql, &[])
    }

    /// Materialise every row a SELECT over `M`'s table returns
    pub fn query_models<M: Model>(&mut self, sql: &str) -> OrmResult<Vec<M>> {
        self.loader()?
            .query(M::entity_type(), sql)?
            .into_iter()
            .map(downcast::<M>)
            .collect()
    }

    pub fn query_rows(&mut self, sql: &str) -> OrmResult<Vec<ResultRow>> {
        self.executor()?.query(sql, &[])
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_open()
    }
}

impl Session for SqliteSession {
    fn open(&mut self) -> OrmResult<()> {
        if self.executor.is_some() {
            return Ok(());
        }
        let executor = match &self.source {
            Some(executor) => executor.clone(),
            None => self.context.datastore()? as Arc<dyn StatementExecutor>,
        };
        self.executor = Some(executor);
        self.live = Arc::new(AtomicBool::new(true));
        info!("Session opened");
        Ok(())
    }

    fn close(&mut self) {
        if self.executor.take().is_some() {
            self.live.store(false, Ordering::Release);
            self.cache.clear();
            self.transaction.reset();
            info!("Session closed");
        }
    }

    fn is_open(&self) -> bool {
        self.executor.is_some()
    }

    fn begin_transaction(&mut self) -> OrmResult<()> {
        let executor = self.executor()?;
        self.transaction.begin(executor.as_ref())
    }

    fn commit(&mut self) -> OrmResult<()> {
        let executor = self.executor()?;
        self.transaction.commit(executor.as_ref())
    }

    /// Roll back and empty the cache, which may hold rolled-back writes
    fn rollback(&mut self) -> OrmResult<()> {
        let executor = self.executor()?;
        let result = self.transaction.rollback(executor.as_ref());
        self.cache.clear();
        result
    }

    fn save<M: Model>(&mut self, model: &mut M) -> OrmResult<i64> {
        let executor = self.mutation("save")?;
        let descriptor = self.descriptor::<M>()?;
        let id = Persister::new(self.context.clone(), executor).save(&descriptor, model)?;
        self.refresh_cache(model)?;
        debug!(model = M::NAME, id, "Saved");
        Ok(id)
    }

    fn update<M: Model>(&mut self, model: &mut M) -> OrmResult<bool> {
        let executor = self.mutation("update")?;
        let descriptor = self.descriptor::<M>()?;
        let updated = Persister::new(self.context.clone(), executor).update(&descriptor, model)?;
        if updated {
            self.refresh_cache(model)?;
        }
        Ok(updated)
    }

    fn delete<M: Model>(&mut self, model: &M) -> OrmResult<bool> {
        let executor = self.mutation("delete")?;
        let descriptor = self.descriptor::<M>()?;
        let deleted = Persister::new(self.context.clone(), executor).delete(&descriptor, model)?;
        let hash = self.context.policy().compute_model_hash(model)?;
        self.cache.remove(hash);
        Ok(deleted)
    }

    fn save_or_update<M: Model>(&mut self, model: &mut M) -> OrmResult<SaveOutcome> {
        let executor = self.mutation("save_or_update")?;
        let descriptor = self.descriptor::<M>()?;
        let outcome =
            Persister::new(self.context.clone(), executor).save_or_update(&descriptor, model)?;
        self.refresh_cache(model)?;
        Ok(outcome)
    }

    fn load<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>> {
        let mut loader = self.loader()?;
        let key = key.into();
        let hash = self.key_hash::<M>(key.clone())?;
        if let Some(cached) = self.cache.get(hash) {
            if let Some(model) = cached.downcast_ref::<M>() {
                debug!(model = M::NAME, "Loaded from session cache");
                return Ok(Some(model.clone()));
            }
        }

        let key = self.descriptor::<M>()?.primary_key_type().coerce(key)?;
        let loaded = loader.load(M::entity_type(), &key)?;
        match loaded {
            Some(model) => {
                let model = downcast::<M>(model)?;
                self.cache.put(hash, Arc::new(model.clone()));
                Ok(Some(model))
            }
            None => Ok(None),
        }
    }

    fn cache<M: Model>(&mut self, model: &M) -> OrmResult<()> {
        self.executor()?;
        self.refresh_cache(model)
    }

    fn check_cache<M: Model, K: Into<Value>>(&self, key: K) -> OrmResult<bool> {
        self.executor()?;
        Ok(self.cache.contains(self.key_hash::<M>(key.into())?))
    }

    fn search_cache<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>> {
        self.executor()?;
        let hash = self.key_hash::<M>(key.into())?;
        Ok(self
            .cache
            .get(hash)
            .and_then(|cached| cached.downcast_ref::<M>().cloned()))
    }

    fn recycle_cache(&mut self) {
        self.cache.clear();
    }

    fn set_cache_size(&mut self, size: usize) -> OrmResult<()> {
        self.cache.resize(size)
    }
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("open", &self.is_open())
            .field("cache", &self.cache)
            .field("transaction", &self.transaction)
            .finish()
    }
}
