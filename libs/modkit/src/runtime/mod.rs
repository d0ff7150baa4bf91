mod host_runtime;
mod link;
mod loader;
mod module_manager;
mod runner;

pub use host_runtime::{compose, AppOptions, ComposedApp, HostRuntime, Phase};
pub use link::initialize_links;
pub use loader::load_modules;
pub use module_manager::LoadedModules;
pub use runner::{compose_within, run, stop_modules, RunOptions, ShutdownOptions};
