//! Process configuration from the environment (`.env` is loaded by the binary via dotenvy).

use crate::error::ConfigError;
use crate::tenant::pool::{DEFAULT_PLAINTEXT_HOST_PATTERN, DEFAULT_RELAXED_TLS_HOST_PATTERN};
use crate::tenant::router::DEFAULT_FALLBACK_SUBDOMAIN;
use crate::tenant::{HostPatterns, PoolSettings, RouterOptions, UnknownTenantPolicy};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ADMIN_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Apex domain stripped from the Host header to find the tenant subdomain.
    pub base_domain: Option<String>,
    pub router: RouterOptions,
    /// JSON array of tenant configs.
    pub tenants_file: Option<PathBuf>,
    /// `sub=uri;sub2=uri2`.
    pub inline_tenants: Option<String>,
    /// Registers the fallback tenant when no other source provides it.
    pub fallback_database_url: Option<String>,
    /// Central tenant directory database.
    pub directory_url: Option<String>,
    pub admin_body_limit: usize,
    /// Bearer token for the admin API. Unset disables the admin API.
    pub admin_token: Option<String>,
    /// Honour `X-Tenant-ID` over the Host subdomain. Only for trusted proxies.
    pub trust_tenant_header: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host_patterns = HostPatterns::new(
            var("DB_PLAINTEXT_HOST_PATTERN").as_deref().unwrap_or(DEFAULT_PLAINTEXT_HOST_PATTERN),
            var("DB_RELAXED_TLS_HOST_PATTERN").as_deref().unwrap_or(DEFAULT_RELAXED_TLS_HOST_PATTERN),
        )?;
        let pool = PoolSettings {
            max_connections: parse_var(&var, "DB_MAX_CONNECTIONS", 10)?,
            idle_timeout: Duration::from_secs(parse_var(&var, "DB_IDLE_TIMEOUT_SECS", 600)?),
            acquire_timeout: Duration::from_secs(parse_var(&var, "DB_ACQUIRE_TIMEOUT_SECS", 30)?),
            create_timeout: Duration::from_secs(parse_var(&var, "DB_CREATE_TIMEOUT_SECS", 10)?),
            host_patterns,
        };
        if pool.max_connections == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "DB_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }

        let router = RouterOptions {
            fallback_subdomain: var("FALLBACK_TENANT").unwrap_or_else(|| DEFAULT_FALLBACK_SUBDOMAIN.into()),
            unknown_policy: parse_var(&var, "UNKNOWN_TENANT_POLICY", UnknownTenantPolicy::Fallback)?,
            reject_inactive: parse_bool(&var, "REJECT_INACTIVE_TENANTS", false)?,
            pool,
        };

        Ok(AppConfig {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            base_domain: var("BASE_DOMAIN").map(|d| d.trim_matches('.').to_ascii_lowercase()),
            router,
            tenants_file: var("TENANTS_FILE").map(PathBuf::from),
            inline_tenants: var("TENANTS"),
            fallback_database_url: var("FALLBACK_DATABASE_URL"),
            directory_url: var("TENANT_DIRECTORY_URL"),
            admin_body_limit: parse_var(&var, "ADMIN_BODY_LIMIT_BYTES", DEFAULT_ADMIN_BODY_LIMIT)?,
            admin_token: var("ADMIN_TOKEN"),
            trust_tenant_header: parse_bool(&var, "TRUST_TENANT_HEADER", false)?,
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

fn parse_bool<F>(var: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::InvalidEnv { name, value }),
    }
}
