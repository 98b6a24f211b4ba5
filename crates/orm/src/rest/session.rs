//! Session over a REST datastore
//!
//! Each model maps to the resource `{host}/{endpoint}`; single instances
//! live at `{host}/{endpoint}/{id}`. Relationships are not cascaded and
//! there is no transaction or query support.

use std::sync::Arc;

use tessera_core::{ConfigError, RestConfig};
use tracing::{debug, info};
use url::Url;

use super::converter::{converter_for, MessageConverter};
use super::model_map::RestfulModelMap;
use super::transport::{RestMethod, RestRequest, RestResponse, RestTransport};
use crate::context::OrmContext;
use crate::criteria::CriteriaSpec;
use crate::error::{OrmError, OrmResult};
use crate::model::{Model, Value};
use crate::policy::EntityDescriptor;
use crate::session::{SaveOutcome, Session, SessionCache};

pub struct RestSession {
    context: Arc<OrmContext>,
    transport: Arc<dyn RestTransport>,
    config: RestConfig,
    converter: Box<dyn MessageConverter>,
    cache: SessionCache,
    open: bool,
}

impl RestSession {
    pub fn new(context: Arc<OrmContext>, transport: Arc<dyn RestTransport>) -> OrmResult<Self> {
        let config = context.config().rest.clone().ok_or_else(|| {
            ConfigError::missing_required("rest.host", "configure a REST datastore")
        })?;
        let cache = SessionCache::new(context.config().session.cache_size)?;
        Ok(Self {
            converter: converter_for(config.message_type),
            context,
            transport,
            config,
            cache,
            open: false,
        })
    }

    pub fn context(&self) -> &Arc<OrmContext> {
        &self.context
    }

    /// Raw SQL has no meaning over REST
    pub fn execute(&mut self, _sql: &str) -> OrmResult<usize> {
        Err(OrmError::unsupported("the REST session cannot execute SQL"))
    }

    /// Criteria queries have no meaning over REST
    pub fn list<M: Model>(&mut self, _criteria: &CriteriaSpec) -> OrmResult<Vec<M>> {
        Err(OrmError::unsupported("the REST session does not support criteria"))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    fn ensure_open(&self) -> OrmResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(OrmError::SessionNotOpen)
        }
    }

    fn descriptor<M: Model>(&self) -> OrmResult<Arc<EntityDescriptor>> {
        self.context.policy().descriptor_of::<M>()
    }

    fn url(&self, descriptor: &EntityDescriptor, key: Option<&Value>) -> OrmResult<Url> {
        let mut url = Url::parse(&self.config.host)
            .map_err(|e| OrmError::Rest(format!("invalid host '{}': {}", self.config.host, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| OrmError::Rest(format!("'{}' cannot be a base URL", self.config.host)))?;
            segments.pop_if_empty().push(&descriptor.endpoint);
            if let Some(key) = key {
                segments.push(&key.to_string());
            }
        }
        Ok(url)
    }

    fn send(&self, method: RestMethod, url: Url, body: Option<String>) -> OrmResult<RestResponse> {
        debug!(%method, %url, "REST request");
        let response = self.transport.send(RestRequest {
            method,
            url: url.clone(),
            connection_timeout: self.config.connection_timeout,
            response_timeout: self.config.response_timeout,
            content_type: self.converter.content_type(),
            body,
        })?;
        if response.is_success() || response.is_not_found() {
            Ok(response)
        } else {
            Err(OrmError::Rest(format!(
                "{} {} returned status {}",
                method, url, response.status
            )))
        }
    }

    fn encode<M: Model>(&self, descriptor: &EntityDescriptor, model: &M) -> OrmResult<String> {
        let map = RestfulModelMap::from_model(
            self.context.policy(),
            self.context.adapters(),
            descriptor,
            model,
        )?;
        self.converter.encode(&map)
    }

    /// Copy a response body onto the model; an empty body changes nothing
    fn absorb<M: Model>(
        &self,
        descriptor: &EntityDescriptor,
        response: &RestResponse,
        model: &mut M,
    ) -> OrmResult<()> {
        if response.body.trim().is_empty() {
            return Ok(());
        }
        self.converter
            .decode(&response.body)?
            .apply(self.context.adapters(), descriptor, model)
    }

    fn refresh_cache<M: Model>(&mut self, model: &M) -> OrmResult<()> {
        let hash = self.context.policy().compute_model_hash(model)?;
        self.cache.put(hash, Arc::new(model.clone()));
        Ok(())
    }

    fn key_hash<M: Model>(&self, key: &Value) -> OrmResult<(Value, u64)> {
        let descriptor = self.descriptor::<M>()?;
        let key_type = descriptor.primary_key_type();
        if !self.context.types().is_valid_primary_key(key_type, key) {
            return Err(OrmError::invalid_argument(format!(
                "{} is not a valid key for {}; expected {:?}",
                key,
                M::NAME,
                key_type
            )));
        }
        let key = key_type.coerce(key.clone())?;
        let hash = self.context.policy().compute_hash(descriptor.entity, &key);
        Ok((key, hash))
    }
}

impl Session for RestSession {
    fn open(&mut self) -> OrmResult<()> {
        if !self.open {
            self.open = true;
            info!(host = %self.config.host, "REST session opened");
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.cache.clear();
            info!("REST session closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn begin_transaction(&mut self) -> OrmResult<()> {
        Err(OrmError::unsupported("the REST session has no transactions"))
    }

    fn commit(&mut self) -> OrmResult<()> {
        Err(OrmError::unsupported("the REST session has no transactions"))
    }

    fn rollback(&mut self) -> OrmResult<()> {
        Err(OrmError::unsupported("the REST session has no transactions"))
    }

    /// POST the model; a key in the response body is copied back
    fn save<M: Model>(&mut self, model: &mut M) -> OrmResult<i64> {
        self.ensure_open()?;
        let descriptor = self.descriptor::<M>()?;
        let body = self.encode(&descriptor, model)?;
        let response = self.send(RestMethod::Post, self.url(&descriptor, None)?, Some(body))?;
        if response.is_not_found() {
            return Err(OrmError::Rest(format!(
                "no resource for {} at {}",
                M::NAME,
                descriptor.endpoint
            )));
        }
        self.absorb(&descriptor, &response, model)?;
        self.refresh_cache(model)?;
        Ok(descriptor
            .primary_key_value(model)?
            .as_i64()
            .unwrap_or_default())
    }

    fn update<M: Model>(&mut self, model: &mut M) -> OrmResult<bool> {
        self.ensure_open()?;
        let descriptor = self.descriptor::<M>()?;
        let key = descriptor.primary_key_value(model)?;
        let body = self.encode(&descriptor, model)?;
        let response = self.send(RestMethod::Put, self.url(&descriptor, Some(&key))?, Some(body))?;
        if response.is_not_found() {
            return Ok(false);
        }
        self.absorb(&descriptor, &response, model)?;
        self.refresh_cache(model)?;
        Ok(true)
    }

    fn delete<M: Model>(&mut self, model: &M) -> OrmResult<bool> {
        self.ensure_open()?;
        let descriptor = self.descriptor::<M>()?;
        let key = descriptor.primary_key_value(model)?;
        let response = self.send(RestMethod::Delete, self.url(&descriptor, Some(&key))?, None)?;
        self.cache
            .remove(self.context.policy().compute_hash(descriptor.entity, &key));
        Ok(!response.is_not_found())
    }

    fn save_or_update<M: Model>(&mut self, model: &mut M) -> OrmResult<SaveOutcome> {
        self.ensure_open()?;
        let descriptor = self.descriptor::<M>()?;
        if !descriptor.is_pk_null_or_zero(model)? && self.update(model)? {
            return Ok(SaveOutcome::Updated);
        }
        self.save(model).map(SaveOutcome::Inserted)
    }

    fn load<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>> {
        self.ensure_open()?;
        let (key, hash) = self.key_hash::<M>(&key.into())?;
        if let Some(model) = self.cache.get(hash).and_then(|c| c.downcast_ref::<M>().cloned()) {
            return Ok(Some(model));
        }

        let descriptor = self.descriptor::<M>()?;
        let response = self.send(RestMethod::Get, self.url(&descriptor, Some(&key))?, None)?;
        if response.is_not_found() {
            return Ok(None);
        }
        let mut model = M::default();
        self.absorb(&descriptor, &response, &mut model)?;
        self.cache.put(hash, Arc::new(model.clone()));
        Ok(Some(model))
    }

    fn cache<M: Model>(&mut self, model: &M) -> OrmResult<()> {
        self.ensure_open()?;
        self.refresh_cache(model)
    }

    fn check_cache<M: Model, K: Into<Value>>(&self, key: K) -> OrmResult<bool> {
        self.ensure_open()?;
        let (_, hash) = self.key_hash::<M>(&key.into())?;
        Ok(self.cache.contains(hash))
    }

    fn search_cache<M: Model, K: Into<Value>>(&mut self, key: K) -> OrmResult<Option<M>> {
        self.ensure_open()?;
        let (_, hash) = self.key_hash::<M>(&key.into())?;
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

impl std::fmt::Debug for RestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSession")
            .field("host", &self.config.host)
            .field("open", &self.open)
            .field("cache", &self.cache)
            .finish()
    }
}
