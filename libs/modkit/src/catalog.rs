//! Resolution path → bootstrap lookup.
//!
//! Module crates announce themselves at link time:
//!
//! ```rust,ignore
//! fn cart_bootstrap() -> Arc<dyn ModuleBootstrap> {
//!     Arc::new(CartBootstrap)
//! }
//!
//! modkit::inventory::submit! {
//!     modkit::BootstrapRegistration { path: "@commerce/cart", factory: cart_bootstrap }
//! }
//! ```

use dashmap::DashMap;
use std::sync::Arc;

use crate::contracts::ModuleBootstrap;

/// Submitted by module crates via `inventory::submit!`.
pub struct BootstrapRegistration {
    pub path: &'static str,
    pub factory: fn() -> Arc<dyn ModuleBootstrap>,
}

inventory::collect!(BootstrapRegistration);

#[derive(Default)]
pub struct BootstrapCatalog {
    entries: DashMap<String, Arc<dyn ModuleBootstrap>>,
}

impl std::fmt::Debug for BootstrapCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapCatalog")
            .field("paths", &self.paths())
            .finish()
    }
}

impl BootstrapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of every bootstrap submitted through inventory.
    pub fn discover() -> Self {
        let catalog = Self::new();
        for reg in ::inventory::iter::<BootstrapRegistration> {
            tracing::debug!(path = reg.path, "Discovered module bootstrap");
            catalog.register(reg.path, (reg.factory)());
        }
        catalog
    }

    /// Register (or replace) the bootstrap for `path`.
    pub fn register(&self, path: impl Into<String>, bootstrap: Arc<dyn ModuleBootstrap>) {
        let path = path.into();
        if self.entries.insert(path.clone(), bootstrap).is_some() {
            tracing::debug!(path = %path, "Replaced module bootstrap");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(self, path: impl Into<String>, bootstrap: Arc<dyn ModuleBootstrap>) -> Self {
        self.register(path, bootstrap);
        self
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn ModuleBootstrap>> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}
