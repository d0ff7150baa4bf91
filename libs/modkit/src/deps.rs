//! Dependency bag handed to every module bootstrap.
//!
//! Entries are keyed by registration name (for example [`PG_CONNECTION`]) and
//! hold an `Arc<T>` boxed as `Any`; reads downcast back to `Arc<T>`. `T` may be
//! a trait object. Inserting under an existing name replaces the value, while
//! `Arc`s already handed out stay valid.

use parking_lot::RwLock;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Registration name of the shared Postgres pool ([`modkit_db::DbHandle`]).
pub const PG_CONNECTION: &str = "__pg_connection__";

#[derive(Debug, thiserror::Error)]
pub enum DepsError {
    #[error("dependency '{name}' is not registered")]
    NotFound { name: String },

    #[error("dependency '{name}' is not of type {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

struct Entry {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct InjectedDependencies {
    map: RwLock<HashMap<String, Entry>>,
}

impl fmt::Debug for InjectedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.map.read();
        let mut names: Vec<(&str, &str)> = r
            .iter()
            .map(|(k, v)| (k.as_str(), v.type_name))
            .collect();
        names.sort_unstable();
        f.debug_map().entries(names).finish()
    }
}

impl InjectedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<T>(self, name: impl Into<String>, value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(name, value);
        self
    }

    pub fn insert<T>(&self, name: impl Into<String>, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entry = Entry {
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        };
        self.map.write().insert(name.into(), entry);
    }

    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, DepsError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let r = self.map.read();
        let entry = r.get(name).ok_or_else(|| DepsError::NotFound {
            name: name.to_owned(),
        })?;
        entry
            .value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| DepsError::TypeMismatch {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.map.write().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
