//! The ORM context: one explicitly built owner of every registry, policy
//! and shared datastore. Sessions borrow it through an `Arc`.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tessera_core::{ConfigError, ConfigurationMode, OrmConfig};
use tracing::{debug, info};

use crate::adapters::{TypeAdapter, TypeAdapterRegistry};
use crate::backends::{SqliteDatastore, StatementExecutor};
use crate::error::OrmResult;
use crate::model::{DomainRegistry, FieldType, Model};
use crate::policy::{
    AnnotationProvider, MappedProvider, MetadataProvider, PersistencePolicy, TypeResolutionPolicy,
};
use crate::rest::{RestSession, RestTransport};
use crate::session::SqliteSession;
use crate::sql::SqlBuilder;

type Registration = fn(&DomainRegistry) -> OrmResult<()>;

pub struct OrmContext {
    config: OrmConfig,
    registry: Arc<DomainRegistry>,
    adapters: Arc<TypeAdapterRegistry>,
    policy: Arc<PersistencePolicy>,
    types: TypeResolutionPolicy,
    sql: SqlBuilder,
    datastore: OnceCell<Arc<SqliteDatastore>>,
}

impl OrmContext {
    pub fn builder() -> OrmContextBuilder {
        OrmContextBuilder::default()
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    pub fn adapters(&self) -> &Arc<TypeAdapterRegistry> {
        &self.adapters
    }

    pub fn policy(&self) -> &Arc<PersistencePolicy> {
        &self.policy
    }

    pub fn types(&self) -> &TypeResolutionPolicy {
        &self.types
    }

    pub fn sql(&self) -> &SqlBuilder {
        &self.sql
    }

    /// The configured SQLite datastore, opened on first use.
    ///
    /// With schema generation enabled, a fresh database gets every table
    /// created; a database stamped with a different version has its tables
    /// dropped and recreated.
    pub fn datastore(&self) -> OrmResult<Arc<SqliteDatastore>> {
        self.datastore
            .get_or_try_init(|| -> OrmResult<Arc<SqliteDatastore>> {
                let config = self.config.sqlite.as_ref().ok_or_else(|| {
                    ConfigError::missing_required(
                        "sqlite.db_name",
                        "configure a SQLite datastore to open SQL sessions",
                    )
                })?;
                let datastore = SqliteDatastore::open(config)?;
                if config.generate_schema {
                    self.migrate(&datastore, config.db_version)?;
                }
                Ok(Arc::new(datastore))
            })
            .cloned()
    }

    fn migrate(&self, datastore: &SqliteDatastore, version: u32) -> OrmResult<()> {
        // 0 is the stamp of a database that has never been migrated
        if version == 0 {
            return Err(ConfigError::invalid_value(
                "sqlite.db_version",
                "0",
                "positive schema version",
            )
            .into());
        }
        let stored = datastore.user_version()?;
        if stored == version {
            debug!(version, "Schema is current");
            return Ok(());
        }
        if stored != 0 {
            info!(stored, version, "Database version changed; recreating schema");
            self.sql.drop_tables(datastore)?;
        }
        self.sql.create_tables(datastore)?;
        datastore.set_user_version(version)
    }

    /// A session over the configured SQLite datastore
    pub fn session(self: &Arc<Self>) -> OrmResult<SqliteSession> {
        SqliteSession::new(self.clone())
    }

    /// A session over a caller-supplied executor
    pub fn session_with(
        self: &Arc<Self>,
        executor: Arc<dyn StatementExecutor>,
    ) -> OrmResult<SqliteSession> {
        SqliteSession::with_executor(self.clone(), executor)
    }

    /// A session over the configured REST datastore
    pub fn rest_session(self: &Arc<Self>, transport: Arc<dyn RestTransport>) -> OrmResult<RestSession> {
        RestSession::new(self.clone(), transport)
    }
}

impl std::fmt::Debug for OrmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmContext")
            .field("mode", &self.config.mode)
            .field("models", &self.registry.len())
            .field("datastore_open", &self.datastore.get().is_some())
            .finish()
    }
}

/// Collects configuration, models, mapping documents and custom adapters
#[derive(Default)]
pub struct OrmContextBuilder {
    config: OrmConfig,
    registrations: Vec<Registration>,
    documents: Vec<String>,
    adapters: Vec<(FieldType, Arc<dyn TypeAdapter>)>,
}

impl OrmContextBuilder {
    pub fn config(mut self, config: OrmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register<M: Model>(mut self) -> Self {
        self.registrations.push(DomainRegistry::register::<M>);
        self
    }

    /// A YAML or JSON mapping document, read in mapped mode
    pub fn mapping_document(mut self, text: impl Into<String>) -> Self {
        self.documents.push(text.into());
        self
    }

    pub fn adapter(mut self, field_type: FieldType, adapter: Arc<dyn TypeAdapter>) -> Self {
        self.adapters.push((field_type, adapter));
        self
    }

    /// Register everything and resolve all metadata, so configuration
    /// errors surface here rather than on first use
    pub fn build(self) -> OrmResult<Arc<OrmContext>> {
        let registry = Arc::new(DomainRegistry::new());
        for register in &self.registrations {
            register(&registry)?;
        }

        let adapters = Arc::new(TypeAdapterRegistry::new());
        for (field_type, adapter) in self.adapters {
            adapters.register(field_type, adapter);
        }

        let provider: Box<dyn MetadataProvider> = match self.config.mode {
            ConfigurationMode::Annotations => Box::new(AnnotationProvider),
            ConfigurationMode::Mapped => {
                let mut provider = MappedProvider::new();
                for document in &self.documents {
                    provider.add_document(document)?;
                }
                Box::new(provider)
            }
        };

        let policy = Arc::new(PersistencePolicy::new(registry.clone(), provider));
        let models = policy.warm_up()?;
        let types = TypeResolutionPolicy::new(registry.clone(), adapters.clone());
        let sql = SqlBuilder::new(policy.clone(), types.clone(), adapters.clone());
        info!(models, mode = %self.config.mode, "ORM context ready");

        Ok(Arc::new(OrmContext {
            config: self.config,
            registry,
            adapters,
            policy,
            types,
            sql,
            datastore: OnceCell::new(),
        }))
    }
}
