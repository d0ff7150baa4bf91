//! Serde model for shared database resources.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `shared_resources` section: resources reused by internal-scope modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseOptions>,
}

/// Explicit database options. Every field is optional; unset fields fall back
/// to environment variables and then to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_options: Option<DriverOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolCfg>,
}

/// Connection pool parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolCfg {
    /// Informational pool name, shows up in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_conns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_conns: Option<u32>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub acquire_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_lifetime: Option<Duration>,
    #[serde(default)]
    pub test_before_acquire: bool,
}

/// Driver-level options, kept in the `{ connection: { ssl: ... } }` shape that
/// `POSTGRES_DRIVER_OPTIONS` carries as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    #[serde(default)]
    pub connection: ConnectionOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslOption>,
}

/// `ssl: false | true | { reject_unauthorized: bool }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SslOption {
    Flag(bool),
    Tls {
        #[serde(default = "default_reject_unauthorized", alias = "rejectUnauthorized")]
        reject_unauthorized: bool,
    },
}

fn default_reject_unauthorized() -> bool {
    true
}

impl DriverOptions {
    pub fn with_ssl(ssl: SslOption) -> Self {
        Self {
            connection: ConnectionOptions { ssl: Some(ssl) },
        }
    }
}

/// Fully resolved database configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    /// Empty when nothing was configured (only allowed in silent mode).
    pub client_url: String,
    pub schema: String,
    pub driver_options: DriverOptions,
    pub debug: bool,
    pub pool: PoolCfg,
}

impl DatabaseConfig {
    pub fn has_client_url(&self) -> bool {
        !self.client_url.trim().is_empty()
    }

    /// Overlay this resolved config on top of shared settings: values resolved
    /// here win, pool settings come from `shared` unless set here.
    pub fn merged_over(mut self, shared: Option<&DatabaseOptions>) -> Self {
        if let Some(shared_pool) = shared.and_then(|s| s.pool.as_ref()) {
            if self.pool == PoolCfg::default() {
                self.pool = shared_pool.clone();
            }
        }
        self
    }
}
