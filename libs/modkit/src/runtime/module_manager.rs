//! Loaded module instances, grouped by module name.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::contracts::ModuleService;

/// Every loaded instance, keyed by module name in declaration order. A name
/// declared more than once holds its instances in declaration order too.
#[derive(Clone, Default)]
pub struct LoadedModules {
    inner: IndexMap<String, Vec<Arc<dyn ModuleService>>>,
    order: Vec<(String, Arc<dyn ModuleService>)>,
}

impl std::fmt::Debug for LoadedModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

impl LoadedModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instance under `name`.
    pub fn insert(&mut self, name: impl Into<String>, service: Arc<dyn ModuleService>) {
        let name = name.into();
        self.order.push((name.clone(), Arc::clone(&service)));
        self.inner.entry(name).or_default().push(service);
    }

    pub fn get(&self, name: &str) -> Option<&[Arc<dyn ModuleService>]> {
        self.inner.get(name).map(Vec::as_slice)
    }

    /// First instance declared under `name`.
    pub fn first(&self, name: &str) -> Option<&Arc<dyn ModuleService>> {
        self.inner.get(name).and_then(|v| v.first())
    }

    /// Downcast the first instance of `name` to its concrete type.
    pub fn first_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.first(name).and_then(|s| s.as_any().downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<dyn ModuleService>])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// All instances in the order they were inserted, interleaving repeated
    /// names with the others.
    pub fn instances(&self) -> impl DoubleEndedIterator<Item = (&str, &Arc<dyn ModuleService>)> {
        self.order.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// Number of distinct module names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
