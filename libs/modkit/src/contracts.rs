use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::declaration::{ModuleDeclaration, ModuleResources};
use crate::definitions::ModuleDefinition;
use crate::deps::{InjectedDependencies, PG_CONNECTION};
use crate::joiner::JoinerConfig;

/// Read request issued by the remote query engine against one service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    /// Equality filters; an array value means "one of".
    pub filters: Map<String, Value>,
    /// Requested fields; empty means all.
    pub fields: Vec<String>,
    /// Nested data the service should embed itself.
    pub relations: Vec<String>,
    pub take: Option<usize>,
    pub skip: Option<usize>,
}

impl ListRequest {
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// A loaded module instance.
#[async_trait]
pub trait ModuleService: Send + Sync + 'static {
    /// Downcast hook for callers that know the concrete service type.
    fn as_any(&self) -> &dyn Any;

    /// Schema and relationship metadata published by this service.
    fn joiner_config(&self) -> Option<JoinerConfig> {
        None
    }

    async fn list(&self, request: &ListRequest) -> anyhow::Result<Vec<Value>>;

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a bootstrap gets to build one module instance.
#[derive(Clone)]
pub struct BootstrapRequest {
    pub module_name: String,
    pub path: String,
    /// Normalized declaration (scope and resources defaults applied).
    pub declaration: ModuleDeclaration,
    pub dependencies: Arc<InjectedDependencies>,
    pub definition: Option<ModuleDefinition>,
}

impl BootstrapRequest {
    /// The shared pool, for modules declared with shared resources.
    pub fn shared_connection(&self) -> Option<Arc<modkit_db::DbHandle>> {
        if self.declaration.resources != Some(ModuleResources::Shared) {
            return None;
        }
        self.dependencies
            .get::<modkit_db::DbHandle>(PG_CONNECTION)
            .ok()
    }

    /// Typed view of the declaration's free-form `options`. Missing options
    /// deserialize from an empty object.
    pub fn options<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.declaration.options {
            Value::Null => serde_json::from_value(Value::Object(Map::new())),
            v => serde_json::from_value(v.clone()),
        }
    }
}

/// Builds module instances for one resolution path.
#[async_trait]
pub trait ModuleBootstrap: Send + Sync {
    async fn bootstrap(&self, request: BootstrapRequest) -> anyhow::Result<Arc<dyn ModuleService>>;
}

#[async_trait]
impl<F, Fut> ModuleBootstrap for F
where
    F: Fn(BootstrapRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Arc<dyn ModuleService>>> + Send + 'static,
{
    async fn bootstrap(&self, request: BootstrapRequest) -> anyhow::Result<Arc<dyn ModuleService>> {
        (self)(request).await
    }
}
