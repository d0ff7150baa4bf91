use std::sync::Arc;

use crate::deps::InjectedDependencies;
use crate::link::{LinkCapability, LinkDefinition, RemoteLink};
use crate::registry::ModuleRegistry;

/// Initialize link modules, if the capability is present.
///
/// Never fails: an absent capability or an initializer error is logged at
/// warn and yields `None`. On success every link service is registered
/// (joiner config and queryable service) before the handle is returned.
pub async fn initialize_links(
    capability: &LinkCapability,
    definitions: &[LinkDefinition],
    registry: &ModuleRegistry,
    deps: Arc<InjectedDependencies>,
) -> Option<RemoteLink> {
    let initializer = match capability {
        LinkCapability::Present(init) => init,
        LinkCapability::Absent => {
            tracing::warn!("Link modules are not available; continuing without remote links");
            return None;
        }
    };

    let links = match initializer.initialize(definitions, registry, deps).await {
        Ok(links) => links,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "Error initializing link modules");
            return None;
        }
    };

    for link in &links {
        let name = link.definition().service_name();
        let service = Arc::clone(link).as_service();
        if let Some(cfg) = service.joiner_config() {
            registry.set_joiner_config(name.clone(), cfg);
        }
        registry.register_service(name.clone(), service);
        tracing::debug!(link = %name, "Link service registered");
    }

    tracing::info!(count = links.len(), "Link modules initialized");
    Some(RemoteLink::new(links))
}
