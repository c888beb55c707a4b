//! Pool construction for a tenant: limits, TLS policy picked from the host, and the shared handle.

use super::config::TenantConfig;
use crate::error::{ConfigError, TenantError};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Postgres;
use std::str::FromStr;
use std::time::Duration;

/// Hosts reached over the private network; TLS is switched off for them.
pub const DEFAULT_PLAINTEXT_HOST_PATTERN: &str =
    r"^(localhost|127\.0\.0\.1|10\.\d{1,3}\.\d{1,3}\.\d{1,3}|192\.168\.\d{1,3}\.\d{1,3})$";

/// Managed provider whose certificates do not chain to a public root.
pub const DEFAULT_RELAXED_TLS_HOST_PATTERN: &str = r"\.db\.ondigitalocean\.com$";

/// Transport security applied to every connection of a tenant pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    Plaintext,
    /// Encrypted, certificate not verified.
    Relaxed,
    Strict,
}

impl TlsPolicy {
    pub fn ssl_mode(self) -> PgSslMode {
        match self {
            TlsPolicy::Plaintext => PgSslMode::Disable,
            TlsPolicy::Relaxed => PgSslMode::Require,
            TlsPolicy::Strict => PgSslMode::VerifyFull,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HostPatterns {
    plaintext: Regex,
    relaxed: Regex,
}

impl HostPatterns {
    pub fn new(plaintext: &str, relaxed: &str) -> Result<Self, ConfigError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| ConfigError::HostPattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(HostPatterns {
            plaintext: compile(plaintext)?,
            relaxed: compile(relaxed)?,
        })
    }

    pub fn policy_for(&self, host: &str) -> TlsPolicy {
        let host = host.to_ascii_lowercase();
        if self.plaintext.is_match(&host) {
            TlsPolicy::Plaintext
        } else if self.relaxed.is_match(&host) {
            TlsPolicy::Relaxed
        } else {
            TlsPolicy::Strict
        }
    }
}

impl Default for HostPatterns {
    fn default() -> Self {
        HostPatterns::new(DEFAULT_PLAINTEXT_HOST_PATTERN, DEFAULT_RELAXED_TLS_HOST_PATTERN)
            .expect("default host patterns compile")
    }
}

/// Limits applied to each tenant pool.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Idle physical connections are closed by the pool after this long.
    pub idle_timeout: Duration,
    /// How long a query waits for a free pooled connection.
    pub acquire_timeout: Duration,
    /// Upper bound on building a new pool (cache miss path).
    pub create_timeout: Duration,
    pub host_patterns: HostPatterns,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: 10,
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(30),
            create_timeout: Duration::from_secs(10),
            host_patterns: HostPatterns::default(),
        }
    }
}

/// Pooled database handle for one cache key.
#[derive(Debug)]
pub struct TenantDb {
    key: String,
    resolved_from: String,
    pool: PgPool,
    schema: String,
    tls: TlsPolicy,
    host: String,
    database: Option<String>,
}

impl TenantDb {
    pub fn new(
        key: &str,
        config: &TenantConfig,
        pool: PgPool,
        tls: TlsPolicy,
        host: String,
        database: Option<String>,
    ) -> Self {
        TenantDb {
            key: key.to_string(),
            resolved_from: config.subdomain.clone(),
            pool,
            schema: config.schema_or_default().to_string(),
            tls,
            host,
            database,
        }
    }

    /// Key this handle is cached under (the requested subdomain).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Subdomain whose config built the pool. Differs from `key` after a fallback.
    pub fn resolved_from(&self) -> &str {
        &self.resolved_from
    }

    pub fn is_fallback(&self) -> bool {
        self.key != self.resolved_from
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn tls(&self) -> TlsPolicy {
        self.tls
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Schema-qualified, quoted table name (e.g. `"public"."orders"`).
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(table))
    }

    /// Check out a connection; pool exhaustion surfaces as `AcquisitionTimeout`.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, TenantError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| TenantError::from_driver(&self.key, e))
    }

    /// Round-trip `SELECT 1` against the tenant database.
    pub async fn ping(&self) -> Result<(), TenantError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::from_driver(&self.key, e))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Builds the pool behind a `TenantDb`. The router bounds each call with `create_timeout`.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn create(
        &self,
        key: &str,
        config: &TenantConfig,
        settings: &PoolSettings,
    ) -> Result<TenantDb, TenantError>;
}

/// Lazily connecting PostgreSQL pools: no I/O until the first query.
///
/// The host's `TlsPolicy` replaces any `sslmode` given in the tenant URI, so a URI cannot
/// downgrade transport security for a host the patterns classify as strict.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgPoolFactory;

#[async_trait]
impl PoolFactory for PgPoolFactory {
    async fn create(
        &self,
        key: &str,
        config: &TenantConfig,
        settings: &PoolSettings,
    ) -> Result<TenantDb, TenantError> {
        let opts = PgConnectOptions::from_str(&config.connection_uri).map_err(|source| {
            TenantError::InvalidUri {
                subdomain: config.subdomain.clone(),
                source,
            }
        })?;
        let host = opts.get_host().to_string();
        let database = opts.get_database().map(String::from);
        let tls = settings.host_patterns.policy_for(&host);
        let opts = opts
            .ssl_mode(tls.ssl_mode())
            .options([("search_path", config.schema_or_default())]);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(opts);

        Ok(TenantDb::new(key, config, pool, tls, host, database))
    }
}
