use std::sync::Arc;

use async_trait::async_trait;
use modkit::{
    InjectedDependencies, LinkDefinition, LinkEnd, LinkModulesInitializer,
    LinkModulesRegistration, LinkService, ModuleRegistry, PG_CONNECTION,
};
use tracing::{debug, info, warn};

use crate::domain::InMemoryLink;

pub const LINK_MODULES_PACKAGE: &str = "@commerce/link-modules";

/// Links every composition gets without configuring them.
pub fn builtin_definitions() -> Vec<LinkDefinition> {
    vec![LinkDefinition::between(
        LinkEnd::new("cart"),
        LinkEnd::new("product"),
    )]
}

/// Builds one in-memory link service per definition whose two modules are
/// loaded. Configured definitions replace built-in ones joining the same pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkModules;

impl LinkModules {
    fn effective_definitions(configured: &[LinkDefinition]) -> Vec<LinkDefinition> {
        let mut defs: Vec<LinkDefinition> = builtin_definitions()
            .into_iter()
            .filter(|b| {
                !configured
                    .iter()
                    .any(|c| c.joins(&b.left.service_name, &b.right.service_name))
            })
            .collect();

        for def in configured {
            if defs.iter().any(|d| d.service_name() == def.service_name()) {
                warn!(link = %def.service_name(), "Duplicate link definition ignored");
                continue;
            }
            defs.push(def.clone());
        }
        defs
    }
}

#[async_trait]
impl LinkModulesInitializer for LinkModules {
    async fn initialize(
        &self,
        definitions: &[LinkDefinition],
        registry: &ModuleRegistry,
        deps: Arc<InjectedDependencies>,
    ) -> anyhow::Result<Vec<Arc<dyn LinkService>>> {
        if deps.contains(PG_CONNECTION) {
            debug!("Shared connection available; links are still kept in memory");
        }

        let mut links: Vec<Arc<dyn LinkService>> = Vec::new();
        for def in Self::effective_definitions(definitions) {
            let missing: Vec<&str> = [&def.left, &def.right]
                .into_iter()
                .map(|end| end.service_name.as_str())
                .filter(|name| !registry.has_service(name))
                .collect();
            if !missing.is_empty() {
                warn!(
                    link = %def.service_name(),
                    missing = ?missing,
                    "Skipping link: module not loaded"
                );
                continue;
            }

            let link = InMemoryLink::new(def);
            info!(link = %link.service_name(), "Link module ready");
            links.push(Arc::new(link));
        }
        Ok(links)
    }
}

fn factory() -> Arc<dyn LinkModulesInitializer> {
    Arc::new(LinkModules)
}

inventory::submit! {
    LinkModulesRegistration { name: LINK_MODULES_PACKAGE, factory }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modkit::{ListRequest, ModuleService};
    use serde_json::Value;

    struct Empty;

    #[async_trait]
    impl ModuleService for Empty {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        async fn list(&self, _request: &ListRequest) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    fn registry(services: &[&str]) -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        for name in services {
            registry.register_service(*name, Arc::new(Empty));
        }
        registry
    }

    #[tokio::test]
    async fn builtin_link_needs_both_modules() {
        let deps = Arc::new(InjectedDependencies::new());

        let links = LinkModules
            .initialize(&[], &registry(&["cart"]), Arc::clone(&deps))
            .await
            .unwrap();
        assert!(links.is_empty());

        let links = LinkModules
            .initialize(&[], &registry(&["cart", "product"]), deps)
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].definition().service_name(), "cart_product_link");
    }

    #[test]
    fn configured_pair_replaces_builtin() {
        let mut custom = LinkDefinition::between(LinkEnd::new("product"), LinkEnd::new("cart"));
        custom.service_name = Some("product_cart".into());
        let pricing = LinkDefinition::between(LinkEnd::new("product"), LinkEnd::new("pricing"));

        let defs = LinkModules::effective_definitions(&[custom, pricing.clone(), pricing]);
        let names: Vec<_> = defs.iter().map(LinkDefinition::service_name).collect();
        assert_eq!(names, ["product_cart", "product_pricing_link"]);
    }

    #[test]
    fn discoverable_through_inventory() {
        assert!(modkit::LinkCapability::discover().is_present());
    }
}
