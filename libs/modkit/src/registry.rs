//! Per-composition registry of joiner configs and queryable services.
//!
//! One registry belongs to one composed app; two apps in the same process do
//! not share entries. Iteration follows registration order, which keeps
//! schema building deterministic.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::contracts::ModuleService;
use crate::joiner::JoinerConfig;

#[derive(Default)]
pub struct ModuleRegistry {
    joiner_configs: RwLock<IndexMap<String, JoinerConfig>>,
    services: RwLock<IndexMap<String, Arc<dyn ModuleService>>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let configs: Vec<String> = self.joiner_configs.read().keys().cloned().collect();
        let services: Vec<String> = self.services.read().keys().cloned().collect();
        f.debug_struct("ModuleRegistry")
            .field("joiner_configs", &configs)
            .field("services", &services)
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the config stored under `service_name`. An
    /// overwritten entry keeps its original position.
    pub fn set_joiner_config(&self, service_name: impl Into<String>, config: JoinerConfig) {
        let service_name = service_name.into();
        tracing::trace!(service = %service_name, "Registering joiner config");
        self.joiner_configs.write().insert(service_name, config);
    }

    /// Register one config under its own service name. Configs without a
    /// service name or marked as read-only links are skipped; returns whether
    /// the config was stored.
    pub fn register_joiner_config(&self, config: &JoinerConfig) -> bool {
        let Some(service_name) = config.service_name.as_deref() else {
            tracing::debug!("Skipping joiner config without service name");
            return false;
        };
        if config.is_read_only_link {
            tracing::debug!(service = service_name, "Skipping read-only link config");
            return false;
        }
        self.set_joiner_config(service_name, config.clone());
        true
    }

    /// Register caller-supplied configs with the same filtering as
    /// [`Self::register_joiner_config`].
    pub fn register_custom_joiner_configs(&self, configs: &[JoinerConfig]) {
        for config in configs {
            self.register_joiner_config(config);
        }
    }

    pub fn joiner_config(&self, service_name: &str) -> Option<JoinerConfig> {
        self.joiner_configs.read().get(service_name).cloned()
    }

    /// Snapshot of all configs in registration order.
    pub fn joiner_configs(&self) -> Vec<JoinerConfig> {
        self.joiner_configs.read().values().cloned().collect()
    }

    /// `(service name, schema fragment)` pairs; a missing schema is empty.
    pub fn schema_fragments(&self) -> Vec<(String, String)> {
        self.joiner_configs
            .read()
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.schema.clone().unwrap_or_default()))
            .collect()
    }

    /// Every registered schema fragment joined into one document.
    pub fn loaded_schema(&self) -> String {
        self.schema_fragments()
            .into_iter()
            .map(|(_, schema)| schema)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Make `service` reachable by the query engine under `service_name`.
    pub fn register_service(&self, service_name: impl Into<String>, service: Arc<dyn ModuleService>) {
        self.services.write().insert(service_name.into(), service);
    }

    pub fn service(&self, service_name: &str) -> Option<Arc<dyn ModuleService>> {
        self.services.read().get(service_name).cloned()
    }

    pub fn has_service(&self, service_name: &str) -> bool {
        self.services.read().contains_key(service_name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_registration_skips_nameless_and_read_only() {
        let reg = ModuleRegistry::new();
        reg.register_custom_joiner_configs(&[
            JoinerConfig::default().with_schema("type Orphan { id: ID }"),
            JoinerConfig::new("linkOnly").read_only_link(),
            JoinerConfig::new("cart").with_schema("type Cart { id: ID }"),
        ]);

        assert!(reg.joiner_config("linkOnly").is_none());
        assert_eq!(reg.joiner_configs().len(), 1);
        assert_eq!(reg.loaded_schema(), "type Cart { id: ID }");
    }

    #[test]
    fn latest_config_wins_and_keeps_position() {
        let reg = ModuleRegistry::new();
        reg.register_custom_joiner_configs(&[
            JoinerConfig::new("cart").with_schema("type Cart { id: ID }"),
            JoinerConfig::new("product").with_schema("type Product { id: ID }"),
            JoinerConfig::new("cart").with_schema("type Cart { id: ID total: Int }"),
        ]);

        let cart = reg.joiner_config("cart").unwrap();
        assert_eq!(cart.schema.as_deref(), Some("type Cart { id: ID total: Int }"));
        let names: Vec<_> = reg.schema_fragments().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["cart", "product"]);
    }

    #[test]
    fn missing_schema_joins_as_empty_line() {
        let reg = ModuleRegistry::new();
        reg.set_joiner_config("a", JoinerConfig::new("a"));
        reg.set_joiner_config("b", JoinerConfig::new("b").with_schema("scalar JSON"));
        assert_eq!(reg.loaded_schema(), "\nscalar JSON");
    }

    #[test]
    fn registries_are_independent() {
        let one = ModuleRegistry::new();
        let two = ModuleRegistry::new();
        one.set_joiner_config("cart", JoinerConfig::new("cart"));
        assert!(two.joiner_config("cart").is_none());
    }
}
