//! Module loading: resolve each declaration, bootstrap all modules
//! concurrently, collect the instances in declaration order.

use futures::future::try_join_all;
use std::sync::Arc;

use crate::catalog::BootstrapCatalog;
use crate::contracts::{BootstrapRequest, ModuleBootstrap, ModuleService};
use crate::declaration::{ModuleDeclaration, ModulesConfig};
use crate::definitions::{module_definition, module_package_name};
use crate::deps::InjectedDependencies;
use crate::error::LoadError;
use crate::registry::ModuleRegistry;
use crate::runtime::LoadedModules;

/// A declaration with its path, definition and bootstrap resolved.
struct PreparedModule {
    bootstrap: Arc<dyn ModuleBootstrap>,
    request: BootstrapRequest,
}

fn prepare(
    name: &str,
    declaration: &ModuleDeclaration,
    catalog: &BootstrapCatalog,
    deps: &Arc<InjectedDependencies>,
) -> Result<PreparedModule, LoadError> {
    let mut declaration = declaration.clone();
    let path = declaration
        .resolve
        .clone()
        .or_else(|| module_package_name(name).map(str::to_owned))
        .ok_or_else(|| LoadError::UnresolvedPath {
            module: name.to_owned(),
        })?;

    // An explicit definition travels separately from the declaration.
    let definition = declaration
        .definition
        .take()
        .map(|d| *d)
        .or_else(|| module_definition(name).cloned());

    let declaration = declaration.normalized();
    declaration.validate(name)?;

    let bootstrap = catalog
        .get(&path)
        .ok_or_else(|| LoadError::BootstrapNotFound {
            module: name.to_owned(),
            path: path.clone(),
        })?;

    Ok(PreparedModule {
        bootstrap,
        request: BootstrapRequest {
            module_name: name.to_owned(),
            path,
            declaration,
            dependencies: Arc::clone(deps),
            definition,
        },
    })
}

async fn bootstrap_one(prepared: PreparedModule) -> Result<Arc<dyn ModuleService>, LoadError> {
    let PreparedModule { bootstrap, request } = prepared;
    let module = request.module_name.clone();
    let path = request.path.clone();

    tracing::debug!(module = %module, path = %path, "Bootstrapping module");
    let service = bootstrap
        .bootstrap(request)
        .await
        .map_err(|source| LoadError::Bootstrap {
            module: module.clone(),
            path: path.clone(),
            source,
        })?;
    tracing::info!(module = %module, path = %path, "Module loaded");
    Ok(service)
}

/// Load every module of `config`.
///
/// All bootstraps run concurrently. Instances are collected by declaration
/// index, so a name declared twice yields its instances in declaration order
/// regardless of which bootstrap finishes first. The first failure aborts the
/// whole load and nothing is returned.
///
/// Once all instances exist, each one's own joiner config is registered (in
/// declaration order, skipping nameless and read-only link configs) and the
/// instance is made queryable under its service name and its module name.
pub async fn load_modules(
    config: &ModulesConfig,
    registry: &ModuleRegistry,
    catalog: &BootstrapCatalog,
    deps: Arc<InjectedDependencies>,
) -> Result<LoadedModules, LoadError> {
    let prepared = config
        .entries()
        .iter()
        .map(|(name, decl)| prepare(name, decl, catalog, &deps))
        .collect::<Result<Vec<_>, _>>()?;

    let services = try_join_all(prepared.into_iter().map(bootstrap_one)).await?;

    let mut loaded = LoadedModules::new();
    for ((name, _), service) in config.entries().iter().zip(services) {
        let joiner = service.joiner_config();
        let service_name = joiner
            .as_ref()
            .and_then(|j| j.service_name.clone())
            .unwrap_or_else(|| name.clone());

        if let Some(joiner) = &joiner {
            registry.register_joiner_config(joiner);
        }
        registry.register_service(service_name.clone(), Arc::clone(&service));
        if &service_name != name {
            registry.register_service(name.clone(), Arc::clone(&service));
        }

        loaded.insert(name.clone(), service);
    }

    tracing::info!(count = loaded.len(), "Modules loaded");
    Ok(loaded)
}
