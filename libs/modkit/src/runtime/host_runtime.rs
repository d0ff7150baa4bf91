//! Host runtime: the composition root.
//!
//! Drives one application through its phases:
//! `unconfigured → loading_modules → linking → schema_building → ready`.
//! A module failure while loading ends in `failed`; link and schema problems
//! never do.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use modkit_bootstrap::AppConfig;
use modkit_db::{create_pg_connection, load_database_config, SharedResources};
use serde_json::{Map, Value};

use crate::catalog::BootstrapCatalog;
use crate::declaration::ModulesConfig;
use crate::deps::{InjectedDependencies, PG_CONNECTION};
use crate::error::ComposeError;
use crate::joiner::JoinerConfig;
use crate::link::{LinkCapability, LinkDefinition, RemoteLink};
use crate::query::{QueryError, RemoteFetchData, RemoteQuery, RemoteQueryInput, ServiceFetcher};
use crate::registry::ModuleRegistry;
use crate::runtime::{initialize_links, load_modules, LoadedModules};
use crate::schema::{build_schema, EntitiesMap, MergedSchema, NotFound};

/// Env key prefix used when resolving the shared database config.
const DATABASE_MODULE: &str = "commerce";
const DEFAULT_MODULES_CONFIG_FILE: &str = "modules-config.yaml";

/// Inputs of one composition.
#[derive(Clone, Default)]
pub struct AppOptions {
    /// Modules to load. When unset, the config is read from
    /// `modules_config_path`, or from `modules_config_file_name` (default
    /// `modules-config.yaml`) in the current directory.
    pub modules_config: Option<ModulesConfig>,
    pub modules_config_path: Option<PathBuf>,
    pub modules_config_file_name: Option<String>,
    pub shared_resources: Option<SharedResources>,
    /// Joiner configs registered before any module loads.
    pub services_config: Vec<JoinerConfig>,
    pub link_modules: Vec<LinkDefinition>,
    /// Defaults to whatever provider is linked into the binary.
    pub link_capability: Option<LinkCapability>,
    /// Replaces the default fetcher of the query façade.
    pub remote_fetch_data: Option<Arc<dyn RemoteFetchData>>,
    pub injected_dependencies: Arc<InjectedDependencies>,
    /// Defaults to the bootstraps registered through `inventory`.
    pub catalog: Option<Arc<BootstrapCatalog>>,
}

impl fmt::Debug for AppOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppOptions")
            .field("modules_config", &self.modules_config)
            .field("modules_config_path", &self.modules_config_path)
            .field("modules_config_file_name", &self.modules_config_file_name)
            .field("shared_resources", &self.shared_resources)
            .field("services_config", &self.services_config.len())
            .field("link_modules", &self.link_modules.len())
            .field("link_capability", &self.link_capability)
            .field("remote_fetch_data", &self.remote_fetch_data.is_some())
            .field("injected_dependencies", &self.injected_dependencies)
            .finish_non_exhaustive()
    }
}

impl AppOptions {
    pub fn new(modules_config: ModulesConfig) -> Self {
        Self {
            modules_config: Some(modules_config),
            ..Default::default()
        }
    }

    /// Typed options from the raw composition sections of [`AppConfig`].
    pub fn from_app_config(cfg: &AppConfig) -> Result<Self, ComposeError> {
        let modules_config = match &cfg.modules {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            raw => Some(ModulesConfig::from_value(raw)?),
        };

        let services_config = cfg
            .services
            .iter()
            .map(|v| serde_json::from_value::<JoinerConfig>(v.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ComposeError::InvalidSection {
                section: "services",
                source,
            })?;

        let link_modules = cfg
            .link_modules
            .iter()
            .map(|v| serde_json::from_value::<LinkDefinition>(v.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ComposeError::InvalidSection {
                section: "link_modules",
                source,
            })?;

        Ok(Self {
            modules_config,
            modules_config_path: cfg.modules_config_file(),
            shared_resources: cfg.shared_resources.clone(),
            services_config,
            link_modules,
            ..Default::default()
        })
    }

    pub fn with_catalog(mut self, catalog: Arc<BootstrapCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_link_capability(mut self, capability: LinkCapability) -> Self {
        self.link_capability = Some(capability);
        self
    }

    pub fn with_remote_fetch_data(mut self, fetcher: Arc<dyn RemoteFetchData>) -> Self {
        self.remote_fetch_data = Some(fetcher);
        self
    }

    pub fn with_dependencies(mut self, deps: Arc<InjectedDependencies>) -> Self {
        self.injected_dependencies = deps;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unconfigured,
    LoadingModules,
    Linking,
    SchemaBuilding,
    Ready,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Unconfigured => "unconfigured",
            Phase::LoadingModules => "loading_modules",
            Phase::Linking => "linking",
            Phase::SchemaBuilding => "schema_building",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        })
    }
}

/// The composed application.
#[derive(Debug, Clone)]
pub struct ComposedApp {
    pub modules: LoadedModules,
    /// `None` when link modules are unavailable or failed to initialize.
    pub link: Option<RemoteLink>,
    pub query: RemoteQuery,
    pub schema: MergedSchema,
    pub not_found: NotFound,
    pub registry: Arc<ModuleRegistry>,
}

impl ComposedApp {
    pub fn entities_map(&self) -> &EntitiesMap {
        self.schema.type_map()
    }

    pub async fn query(
        &self,
        input: impl Into<RemoteQueryInput>,
        variables: Option<Map<String, Value>>,
    ) -> Result<Value, QueryError> {
        self.query.query(input, variables).await
    }
}

/// Owns the registry of one composition and walks it through the phases.
pub struct HostRuntime {
    options: AppOptions,
    registry: Arc<ModuleRegistry>,
    phase: Phase,
}

impl HostRuntime {
    pub fn new(options: AppOptions) -> Self {
        Self {
            options,
            registry: Arc::new(ModuleRegistry::new()),
            phase: Phase::Unconfigured,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("Phase: {phase}");
        self.phase = phase;
    }

    fn modules_config(&self) -> Result<ModulesConfig, ComposeError> {
        if let Some(cfg) = &self.options.modules_config {
            return Ok(cfg.clone());
        }

        let path = match &self.options.modules_config_path {
            Some(p) => p.clone(),
            None => {
                let name = self
                    .options
                    .modules_config_file_name
                    .as_deref()
                    .unwrap_or(DEFAULT_MODULES_CONFIG_FILE);
                std::env::current_dir()
                    .map(|cwd| cwd.join(name))
                    .unwrap_or_else(|_| PathBuf::from(name))
            }
        };

        tracing::debug!(path = %path.display(), "Reading modules config");
        let raw = std::fs::read_to_string(&path).map_err(|source| {
            ComposeError::ModulesConfigRead {
                path: path.clone(),
                source,
            }
        })?;
        serde_yaml::from_str::<ModulesConfig>(&raw)
            .map_err(|source| ComposeError::ModulesConfigParse { path, source })
    }

    /// Put the shared pool into the dependency bag unless one is already there.
    fn connect_shared_database(&self) -> Result<(), ComposeError> {
        let deps = &self.options.injected_dependencies;
        if deps.contains(PG_CONNECTION) {
            tracing::debug!("Shared database connection injected by caller");
            return Ok(());
        }

        let shared = self
            .options
            .shared_resources
            .as_ref()
            .and_then(|s| s.database.as_ref());
        let cfg = load_database_config(DATABASE_MODULE, shared, true)?;
        if !cfg.has_client_url() {
            tracing::debug!("No shared database configured");
            return Ok(());
        }

        let handle = create_pg_connection(&cfg.merged_over(shared))?;
        deps.insert(PG_CONNECTION, Arc::new(handle));
        Ok(())
    }

    async fn load_phase(&self) -> Result<LoadedModules, ComposeError> {
        let modules_config = self.modules_config()?;

        self.registry
            .register_custom_joiner_configs(&self.options.services_config);

        self.connect_shared_database()?;

        let catalog = match &self.options.catalog {
            Some(c) => Arc::clone(c),
            None => Arc::new(BootstrapCatalog::discover()),
        };

        let modules = load_modules(
            &modules_config,
            &self.registry,
            &catalog,
            Arc::clone(&self.options.injected_dependencies),
        )
        .await?;
        Ok(modules)
    }

    async fn link_phase(&self) -> Option<RemoteLink> {
        let capability = self
            .options
            .link_capability
            .clone()
            .unwrap_or_else(LinkCapability::discover);
        initialize_links(
            &capability,
            &self.options.link_modules,
            &self.registry,
            Arc::clone(&self.options.injected_dependencies),
        )
        .await
    }

    /// Run every phase once and return the composed application.
    pub async fn compose(&mut self) -> Result<ComposedApp, ComposeError> {
        if self.phase != Phase::Unconfigured {
            return Err(ComposeError::AlreadyComposed { phase: self.phase });
        }

        self.enter(Phase::LoadingModules);
        let modules = match self.load_phase().await {
            Ok(m) => m,
            Err(e) => {
                self.enter(Phase::Failed);
                tracing::error!(error = %e, "Composition failed while loading modules");
                return Err(e);
            }
        };

        self.enter(Phase::Linking);
        let link = self.link_phase().await;

        self.enter(Phase::SchemaBuilding);
        let build = build_schema(&self.registry);

        let fetcher = match &self.options.remote_fetch_data {
            Some(f) => Arc::clone(f),
            None => Arc::new(ServiceFetcher::new(Arc::clone(&self.registry))),
        };
        let query = RemoteQuery::new(self.registry.joiner_configs(), fetcher);

        self.enter(Phase::Ready);
        tracing::info!(
            modules = modules.len(),
            services = self.registry.service_names().len(),
            linked = link.is_some(),
            "Application composed"
        );

        Ok(ComposedApp {
            modules,
            link,
            query,
            schema: build.schema,
            not_found: build.not_found,
            registry: Arc::clone(&self.registry),
        })
    }
}

/// Compose an application from `options` with a fresh runtime.
pub async fn compose(options: AppOptions) -> Result<ComposedApp, ComposeError> {
    HostRuntime::new(options).compose().await
}
