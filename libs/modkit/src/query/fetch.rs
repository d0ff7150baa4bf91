use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::contracts::ListRequest;
use crate::registry::ModuleRegistry;

/// Data source for the join engine. Replace it to mock or proxy remote calls.
#[async_trait]
pub trait RemoteFetchData: Send + Sync {
    async fn fetch(&self, service_name: &str, request: &ListRequest) -> anyhow::Result<Vec<Value>>;
}

/// Default fetcher: calls [`ModuleService::list`](crate::ModuleService::list)
/// on the service registered under the requested name.
#[derive(Debug, Clone)]
pub struct ServiceFetcher {
    registry: Arc<ModuleRegistry>,
}

impl ServiceFetcher {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RemoteFetchData for ServiceFetcher {
    async fn fetch(&self, service_name: &str, request: &ListRequest) -> anyhow::Result<Vec<Value>> {
        let service = self
            .registry
            .service(service_name)
            .ok_or_else(|| anyhow::anyhow!("service '{service_name}' is not loaded"))?;
        service.list(request).await
    }
}
