use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use modkit_db::{DatabaseOptions, PoolCfg, SharedResources};

use crate::paths::home_dir::resolve_home_dir;

/// Main application configuration: strongly typed global sections plus the
/// raw composition sections (`modules`, `services`, `link_modules`) that the
/// composition root parses into its own types.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Core server configuration.
    pub server: ServerConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Shared database settings handed to internal-scope modules.
    #[serde(default)]
    pub shared_resources: Option<SharedResources>,
    /// Modules to load: a map `name -> true | false | declaration`, or a list
    /// of `name` / `{ name, ...declaration }` entries.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub modules: serde_json::Value,
    /// Separate YAML file with the modules config, used when `modules` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_config_path: Option<String>,
    /// Extra joiner configs registered before modules load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<serde_json::Value>,
    /// Link definitions passed to the link-modules capability.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_modules: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String, // will be normalized to absolute path
    /// Upper bound for application composition; 0 disables the limit.
    #[serde(default)]
    pub startup_timeout_sec: u64,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/commerce.log", empty disables the file sink
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // Empty => platform default from resolve_home_dir()
            home_dir: String::new(),
            startup_timeout_sec: 0,
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/commerce.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            shared_resources: None,
            modules: serde_json::Value::Null,
            modules_config_path: None,
            services: Vec::new(),
            link_modules: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → environment variables (`APP__*`).
    /// Normalizes `server.home_dir` into an absolute path and creates it.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provides them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // APP__SHARED_RESOURCES__DATABASE__SCHEMA=store maps to shared_resources.database.schema
            .merge(Env::prefixed("APP__").split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())?;

        normalize_home_dir_inplace(&mut config.server)
            .context("Failed to resolve server.home_dir")?;

        Ok(config)
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.server)
                    .context("Failed to resolve server.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(path) = &args.modules_config {
            self.modules_config_path = Some(path.clone());
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }

    /// Resolve `modules_config_path` against the current directory.
    pub fn modules_config_file(&self) -> Option<PathBuf> {
        self.modules_config_path.as_deref().map(|p| {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                path
            } else {
                std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
            }
        })
    }
}

/// Command line arguments that influence configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub modules_config: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

const DEFAULT_HOME_SUBDIR: &str = ".commerce";

/// Normalize `server.home_dir` and store the absolute path back.
fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    let resolved: PathBuf = resolve_home_dir(
        Some(server.home_dir.clone()),
        DEFAULT_HOME_SUBDIR,
        /*create*/ true,
    )
    .context("home_dir normalization failed")?;

    server.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}
