//! Well-known module definitions and their default packages.

use crate::declaration::{ModuleDeclaration, ModuleResources, ModuleScope};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Static description of a module kind. Passed to the bootstrap so the
/// module knows its registration name and what it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDefinition {
    pub key: String,
    pub registration_name: String,
    pub default_package: String,
    pub label: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub is_queryable: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub default_module_declaration: ModuleDeclaration,
}

fn default_true() -> bool {
    true
}

// key, registration name, label, dependencies
const WELL_KNOWN: &[(&str, &str, &str, &[&str])] = &[
    ("cart", "cartModuleService", "CartModuleService", &[]),
    ("product", "productModuleService", "ProductModuleService", &["eventBusModuleService"]),
    ("inventory", "inventoryService", "InventoryService", &["eventBusService"]),
    ("stock-location", "stockLocationService", "StockLocationService", &["eventBusService"]),
    ("pricing", "pricingModuleService", "PricingModuleService", &[]),
    ("promotion", "promotionModuleService", "PromotionModuleService", &[]),
    ("sales-channel", "salesChannelModuleService", "SalesChannelModuleService", &[]),
    ("customer", "customerModuleService", "CustomerModuleService", &[]),
    ("event-bus", "eventBusModuleService", "EventBusModuleService", &[]),
    ("cache", "cacheService", "CacheService", &[]),
];

fn infrastructure(key: &str) -> bool {
    matches!(key, "event-bus" | "cache")
}

fn table() -> &'static IndexMap<&'static str, ModuleDefinition> {
    static TABLE: OnceLock<IndexMap<&'static str, ModuleDefinition>> = OnceLock::new();
    TABLE.get_or_init(|| {
        WELL_KNOWN
            .iter()
            .map(|(key, registration, label, deps)| {
                let def = ModuleDefinition {
                    key: (*key).to_owned(),
                    registration_name: (*registration).to_owned(),
                    default_package: format!("@commerce/{key}"),
                    label: (*label).to_owned(),
                    is_required: infrastructure(key),
                    is_queryable: !infrastructure(key),
                    dependencies: deps.iter().map(|d| (*d).to_owned()).collect(),
                    default_module_declaration: ModuleDeclaration {
                        scope: Some(ModuleScope::Internal),
                        resources: Some(if infrastructure(key) {
                            ModuleResources::Isolated
                        } else {
                            ModuleResources::Shared
                        }),
                        ..Default::default()
                    },
                };
                (*key, def)
            })
            .collect()
    })
}

/// Definition of a well-known module, if `key` is one.
pub fn module_definition(key: &str) -> Option<&'static ModuleDefinition> {
    table().get(key)
}

/// Default package (resolution path) for a well-known module key.
pub fn module_package_name(key: &str) -> Option<&'static str> {
    module_definition(key).map(|d| d.default_package.as_str())
}

/// All well-known definitions in table order.
pub fn module_definitions() -> impl Iterator<Item = &'static ModuleDefinition> {
    table().values()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_follow_keys() {
        assert_eq!(module_package_name("cart"), Some("@commerce/cart"));
        assert_eq!(
            module_package_name("stock-location"),
            Some("@commerce/stock-location")
        );
        assert_eq!(module_package_name("wishlist"), None);
    }

    #[test]
    fn infrastructure_modules_are_isolated_and_not_queryable() {
        let bus = module_definition("event-bus").unwrap();
        assert!(bus.is_required);
        assert!(!bus.is_queryable);
        assert_eq!(
            bus.default_module_declaration.resources,
            Some(ModuleResources::Isolated)
        );

        let product = module_definition("product").unwrap();
        assert!(product.is_queryable);
        assert_eq!(product.dependencies, vec!["eventBusModuleService"]);
    }

    #[test]
    fn table_keeps_declaration_order() {
        let keys: Vec<_> = module_definitions().map(|d| d.key.as_str()).collect();
        assert_eq!(keys.first(), Some(&"cart"));
        assert_eq!(keys.len(), 10);
    }
}
