//! Database config resolution: env variables first, explicit options on top.

use crate::config::{DatabaseConfig, DatabaseOptions, DriverOptions, SslOption};
use crate::{DbError, Result, PLATFORM_ENV_PREFIX};
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_SCHEMA: &str = "public";

/// Look up `key` as `<MODULE>_<KEY>`, then `<PLATFORM>_<KEY>`, then `<KEY>`.
/// Empty values count as unset.
fn lookup_env(key: &str, module_name: &str) -> Option<String> {
    let module_prefix = module_name.to_ascii_uppercase().replace('-', "_");
    [
        format!("{module_prefix}_{key}"),
        format!("{PLATFORM_ENV_PREFIX}_{key}"),
        key.to_owned(),
    ]
    .iter()
    .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

/// Local databases default to plain connections, remote ones to TLS without
/// certificate verification.
pub fn default_driver_options(client_url: &str) -> DriverOptions {
    if client_url.to_ascii_lowercase().contains("localhost") {
        DriverOptions::with_ssl(SslOption::Flag(false))
    } else {
        DriverOptions::with_ssl(SslOption::Tls {
            reject_unauthorized: false,
        })
    }
}

fn env_placeholder() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Replace `${VAR}` references with environment values.
pub fn expand_env_in_dsn(dsn: &str) -> Result<String> {
    let Some(re) = env_placeholder() else {
        return Ok(dsn.to_owned());
    };
    let mut out = String::with_capacity(dsn.len());
    let mut last = 0;
    for cap in re.captures_iter(dsn) {
        let (Some(whole), Some(var)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = std::env::var(var.as_str()).map_err(|_| DbError::MissingEnvVar {
            var: var.as_str().to_owned(),
        })?;
        out.push_str(&dsn[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&dsn[last..]);
    Ok(out)
}

fn validate_dsn(dsn: &str) -> Result<()> {
    let parsed = url::Url::parse(dsn).map_err(|e| DbError::InvalidDsn {
        dsn: crate::redact_credentials_in_dsn(Some(dsn)),
        message: e.to_string(),
    })?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(DbError::InvalidDsn {
            dsn: crate::redact_credentials_in_dsn(Some(dsn)),
            message: format!("unsupported scheme '{other}', expected postgres"),
        }),
    }
}

fn is_dev_env() -> bool {
    std::env::var("APP_ENV")
        .map(|v| v.to_ascii_lowercase().starts_with("dev"))
        .unwrap_or(false)
}

/// Resolve the database configuration for `module_name`.
///
/// Explicit `options` win over env variables. With `silent` set, a missing
/// client URL yields a config with an empty `client_url` instead of an error.
pub fn load_database_config(
    module_name: &str,
    options: Option<&DatabaseOptions>,
    silent: bool,
) -> Result<DatabaseConfig> {
    let env_url = lookup_env("POSTGRES_URL", module_name);
    let env_schema = lookup_env("POSTGRES_SCHEMA", module_name);
    let env_driver = match lookup_env("POSTGRES_DRIVER_OPTIONS", module_name) {
        Some(raw) => Some(serde_json::from_str::<DriverOptions>(&raw).map_err(|source| {
            DbError::InvalidDriverOptions {
                origin: "POSTGRES_DRIVER_OPTIONS".to_owned(),
                source,
            }
        })?),
        None => None,
    };

    let raw_url = options
        .and_then(|o| o.client_url.clone())
        .filter(|u| !u.trim().is_empty())
        .or(env_url)
        .unwrap_or_default();
    let client_url = if raw_url.is_empty() {
        raw_url
    } else {
        let expanded = expand_env_in_dsn(&raw_url)?;
        validate_dsn(&expanded)?;
        expanded
    };

    if client_url.is_empty() && !silent {
        return Err(DbError::MissingClientUrl {
            module: module_name.to_owned(),
        });
    }

    let schema = options
        .and_then(|o| o.schema.clone())
        .or(env_schema)
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_owned());
    let driver_options = options
        .and_then(|o| o.driver_options.clone())
        .or(env_driver)
        .unwrap_or_else(|| default_driver_options(&client_url));
    let debug = options.and_then(|o| o.debug).unwrap_or_else(is_dev_env);
    let pool = options.and_then(|o| o.pool.clone()).unwrap_or_default();

    tracing::debug!(
        module = module_name,
        dsn = %crate::redact_credentials_in_dsn(Some(&client_url)),
        schema = %schema,
        "Resolved database config"
    );

    Ok(DatabaseConfig {
        client_url,
        schema,
        driver_options,
        debug,
        pool,
    })
}
