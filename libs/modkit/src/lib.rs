//! # ModKit - Application Composition Root
//!
//! Loads pluggable domain modules, links them, merges their schema fragments
//! and exposes one query façade over all of them.
//!
//! ## Lifecycle
//!
//! `unconfigured → loading_modules → linking → schema_building → ready`
//!
//! - **Loading**: every entry of the modules config is resolved to a
//!   bootstrap (see [`BootstrapCatalog`]) and bootstrapped concurrently. Any
//!   failure aborts composition.
//! - **Linking**: the optional link-modules capability is initialized. When
//!   it is missing or fails, composition continues without a link handle.
//! - **Schema building**: schema fragments of every registered joiner config
//!   are cleaned and merged; unresolved references are reported, not fatal.
//!
//! ## Providing a module
//!
//! ```rust,ignore
//! use modkit::{BootstrapRegistration, BootstrapRequest, ModuleBootstrap, ModuleService};
//! use std::sync::Arc;
//!
//! async fn bootstrap(req: BootstrapRequest) -> anyhow::Result<Arc<dyn ModuleService>> {
//!     Ok(Arc::new(CartService::new(req.options()?)))
//! }
//!
//! fn factory() -> Arc<dyn ModuleBootstrap> {
//!     Arc::new(bootstrap)
//! }
//!
//! modkit::inventory::submit! {
//!     BootstrapRegistration { path: "@commerce/cart", factory }
//! }
//! ```
//!
//! ## Composing an application
//!
//! ```rust,ignore
//! let app = modkit::runtime::compose(AppOptions::new(
//!     ModulesConfig::new().enable("cart").enable("product"),
//! ))
//! .await?;
//! let carts = app.query("{ cart { id items { id } } }", None).await?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for module crates
pub use inventory;

pub mod catalog;
pub mod contracts;
pub mod declaration;
pub mod definitions;
pub mod deps;
pub mod error;
pub mod joiner;
pub mod link;
pub mod query;
pub mod registry;
pub mod runtime;
pub mod schema;

pub use catalog::{BootstrapCatalog, BootstrapRegistration};
pub use contracts::{BootstrapRequest, ListRequest, ModuleBootstrap, ModuleService};
pub use declaration::{ExternalServer, ModuleDeclaration, ModuleResources, ModuleScope, ModulesConfig};
pub use definitions::{module_definition, module_definitions, module_package_name, ModuleDefinition};
pub use deps::{DepsError, InjectedDependencies, PG_CONNECTION};
pub use error::{ComposeError, LoadError};
pub use joiner::{JoinerAlias, JoinerConfig, JoinerExtend, JoinerRelationship};
pub use link::{
    LinkCapability, LinkDefinition, LinkEnd, LinkError, LinkModulesInitializer,
    LinkModulesRegistration, LinkPair, LinkRef, LinkService, LinkSide, RemoteLink,
};
pub use query::{QueryError, RemoteFetchData, RemoteJoinerQuery, RemoteQuery, RemoteQueryInput};
pub use registry::ModuleRegistry;
pub use runtime::{
    compose, run, AppOptions, ComposedApp, HostRuntime, LoadedModules, Phase, RunOptions,
    ShutdownOptions,
};
pub use schema::{build_schema, EntitiesMap, MergedSchema, NotFound, SchemaBuild};

// Shared pool handed to modules declared with shared resources
pub use modkit_db::DbHandle;
