//! Subdomain → pooled connection routing with a create-once cache per key.
//!
//! A cache miss inserts an empty `OnceCell` under the write lock; every caller for that key
//! then awaits the same initialisation, so at most one pool per key is ever referenced by the
//! cache. A failed initialisation leaves the cell empty and the next caller tries again.
//! Handles are cached under the requested key even when the fallback tenant's config built them.

use super::config::TenantConfig;
use super::pool::{PgPoolFactory, PoolFactory, PoolSettings, TenantDb, TlsPolicy};
use super::registry::TenantRegistry;
use crate::error::{ConfigError, TenantError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::OnceCell;

/// Subdomain of the demo tenant that serves unrecognised hosts.
pub const DEFAULT_FALLBACK_SUBDOMAIN: &str = "demo";

/// What `get_connection` does with a subdomain that is not registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTenantPolicy {
    /// Serve it from the fallback tenant's database.
    #[default]
    Fallback,
    /// Fail with `TenantError::NotFound`.
    Reject,
}

impl std::str::FromStr for UnknownTenantPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fallback" => Ok(UnknownTenantPolicy::Fallback),
            "reject" => Ok(UnknownTenantPolicy::Reject),
            _ => Err(ConfigError::InvalidEnv {
                name: "UNKNOWN_TENANT_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouterOptions {
    pub fallback_subdomain: String,
    pub unknown_policy: UnknownTenantPolicy,
    /// When set, tenants registered with `is_active = false` are refused.
    pub reject_inactive: bool,
    pub pool: PoolSettings,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            fallback_subdomain: DEFAULT_FALLBACK_SUBDOMAIN.to_string(),
            unknown_policy: UnknownTenantPolicy::default(),
            reject_inactive: false,
            pool: PoolSettings::default(),
        }
    }
}

/// Diagnostic view of one cached handle.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub key: String,
    pub resolved_from: String,
    pub host: String,
    pub database: Option<String>,
    pub schema: String,
    pub tls: TlsPolicy,
    pub size: u32,
    pub idle: usize,
}

type Slot = Arc<OnceCell<Arc<TenantDb>>>;

/// Owns the tenant registry and the per-key connection cache. Build one per process.
pub struct TenantRouter {
    registry: TenantRegistry,
    cache: RwLock<HashMap<String, Slot>>,
    factory: Arc<dyn PoolFactory>,
    options: RouterOptions,
}

impl TenantRouter {
    pub fn new(options: RouterOptions) -> Self {
        Self::with_factory(options, Arc::new(PgPoolFactory))
    }

    pub fn with_factory(options: RouterOptions, factory: Arc<dyn PoolFactory>) -> Self {
        TenantRouter {
            registry: TenantRegistry::new(),
            cache: RwLock::new(HashMap::new()),
            factory,
            options,
        }
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn fallback_subdomain(&self) -> &str {
        &self.options.fallback_subdomain
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a tenant. An already cached handle for this subdomain keeps
    /// serving the old config until `reload_tenant` or `unregister_tenant`.
    pub fn register_tenant(&self, config: TenantConfig) -> Option<TenantConfig> {
        tracing::debug!(tenant = %config.subdomain, "registering tenant");
        self.registry.register(config)
    }

    /// Remove a tenant, drop its cached handle and close that pool.
    pub async fn unregister_tenant(&self, subdomain: &str) -> Option<TenantConfig> {
        let removed = self.registry.unregister(subdomain);
        self.evict(subdomain).await;
        if removed.is_some() {
            tracing::info!(tenant = %subdomain, "tenant unregistered");
        }
        removed
    }

    pub fn lookup_tenant(&self, subdomain: &str) -> Option<TenantConfig> {
        self.registry.lookup(subdomain)
    }

    pub fn list_tenants(&self) -> Vec<TenantConfig> {
        self.registry.list()
    }

    /// Close and drop the cached handle for `subdomain`; the registry entry stays.
    /// Returns whether a handle was cached.
    pub async fn reload_tenant(&self, subdomain: &str) -> bool {
        let evicted = self.evict(subdomain).await;
        if evicted {
            tracing::info!(tenant = %subdomain, "tenant pool evicted for reload");
        }
        evicted
    }

    async fn evict(&self, key: &str) -> bool {
        let slot = self.cache_write().remove(key);
        match slot.and_then(|s| s.get().cloned()) {
            Some(db) => {
                db.close().await;
                true
            }
            None => false,
        }
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache_read()
            .get(key)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.cache_read().get(key) {
            return Arc::clone(slot);
        }
        let mut cache = self.cache_write();
        Arc::clone(cache.entry(key.to_string()).or_default())
    }

    /// Handle for `subdomain`, building and caching its pool on first use.
    pub async fn get_connection(&self, subdomain: &str) -> Result<Arc<TenantDb>, TenantError> {
        if self.options.reject_inactive {
            let config = self.resolve_config(subdomain)?;
            if !config.is_active {
                return Err(TenantError::Inactive(config.subdomain));
            }
        }
        // No slot for unknown keys under Reject, so unrecognised hosts cannot grow the cache.
        if self.options.unknown_policy == UnknownTenantPolicy::Reject
            && !self.registry.contains(subdomain)
        {
            return Err(TenantError::NotFound(subdomain.to_string()));
        }
        let slot = self.slot(subdomain);
        if let Some(db) = slot.get() {
            return Ok(Arc::clone(db));
        }
        let db = slot.get_or_try_init(|| self.build(subdomain)).await?;
        Ok(Arc::clone(db))
    }

    fn resolve_config(&self, subdomain: &str) -> Result<TenantConfig, TenantError> {
        if let Some(config) = self.registry.lookup(subdomain) {
            return Ok(config);
        }
        match self.options.unknown_policy {
            UnknownTenantPolicy::Reject => Err(TenantError::NotFound(subdomain.to_string())),
            UnknownTenantPolicy::Fallback => {
                let fallback = self.fallback_subdomain();
                tracing::debug!(tenant = %subdomain, fallback = %fallback, "unknown tenant, using fallback");
                self.registry.lookup(fallback).ok_or_else(|| {
                    TenantError::Configuration(format!("fallback tenant '{}' is not registered", fallback))
                })
            }
        }
    }

    async fn build(&self, key: &str) -> Result<Arc<TenantDb>, TenantError> {
        let config = self.resolve_config(key)?;
        if config.connection_uri.trim().is_empty() {
            return Err(TenantError::Configuration(format!(
                "tenant '{}' has an empty connection uri",
                config.subdomain
            )));
        }
        let settings = &self.options.pool;
        let db = tokio::time::timeout(settings.create_timeout, self.factory.create(key, &config, settings))
            .await
            .map_err(|_| TenantError::CreateTimeout {
                subdomain: key.to_string(),
                seconds: settings.create_timeout.as_secs(),
            })??;
        tracing::info!(
            tenant = %key,
            resolved_from = %config.subdomain,
            host = %db.host(),
            tls = ?db.tls(),
            "tenant pool created"
        );
        Ok(Arc::new(db))
    }

    /// Startup check: the fallback tenant must be registered with a non-empty URI.
    pub fn ensure_fallback(&self) -> Result<(), TenantError> {
        let fallback = self.fallback_subdomain();
        match self.registry.lookup(fallback) {
            None => Err(TenantError::Configuration(format!(
                "fallback tenant '{}' is not registered",
                fallback
            ))),
            Some(c) if c.connection_uri.trim().is_empty() => Err(TenantError::Configuration(format!(
                "fallback tenant '{}' has an empty connection uri",
                fallback
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn cached_connections(&self) -> Vec<ConnectionSnapshot> {
        let mut out: Vec<ConnectionSnapshot> = self
            .cache_read()
            .values()
            .filter_map(|slot| slot.get())
            .map(|db| ConnectionSnapshot {
                key: db.key().to_string(),
                resolved_from: db.resolved_from().to_string(),
                host: db.host().to_string(),
                database: db.database().map(String::from),
                schema: db.schema().to_string(),
                tls: db.tls(),
                size: db.pool().size(),
                idle: db.pool().num_idle(),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Close every cached pool. Used on process shutdown.
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = self.cache_write().drain().map(|(_, slot)| slot).collect();
        let mut closed = 0usize;
        for db in slots.iter().filter_map(|slot| slot.get()) {
            db.close().await;
            closed += 1;
        }
        tracing::info!(closed, "tenant pools closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with(policy: UnknownTenantPolicy) -> TenantRouter {
        let router = TenantRouter::new(RouterOptions {
            unknown_policy: policy,
            ..RouterOptions::default()
        });
        router.register_tenant(TenantConfig::new("demo", "postgres://localhost/demo_db"));
        router
    }

    #[test]
    fn parses_unknown_policy() {
        assert_eq!("Fallback".parse::<UnknownTenantPolicy>().unwrap(), UnknownTenantPolicy::Fallback);
        assert_eq!(" reject ".parse::<UnknownTenantPolicy>().unwrap(), UnknownTenantPolicy::Reject);
        assert!("deny".parse::<UnknownTenantPolicy>().is_err());
    }

    #[test]
    fn ensure_fallback_requires_registered_non_empty_uri() {
        let router = TenantRouter::new(RouterOptions::default());
        assert!(matches!(router.ensure_fallback(), Err(TenantError::Configuration(_))));
        router.register_tenant(TenantConfig::new("demo", "  "));
        assert!(matches!(router.ensure_fallback(), Err(TenantError::Configuration(_))));
        router.register_tenant(TenantConfig::new("demo", "postgres://localhost/demo_db"));
        assert!(router.ensure_fallback().is_ok());
    }

    #[tokio::test]
    async fn reject_policy_refuses_unknown_subdomain() {
        let router = router_with(UnknownTenantPolicy::Reject);
        let err = router.get_connection("ghost").await.unwrap_err();
        assert!(matches!(err, TenantError::NotFound(ref s) if s == "ghost"));
        assert!(!router.is_cached("ghost"));
        assert!(router.get_connection("demo").await.is_ok());
    }

    #[tokio::test]
    async fn missing_fallback_is_a_configuration_error() {
        let router = TenantRouter::new(RouterOptions::default());
        let err = router.get_connection("ghost").await.unwrap_err();
        assert!(matches!(err, TenantError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn inactive_tenants_served_unless_rejected() {
        let router = router_with(UnknownTenantPolicy::Fallback);
        router.register_tenant(TenantConfig::new("old", "postgres://localhost/old_db").inactive());
        assert!(router.get_connection("old").await.is_ok());

        let strict = TenantRouter::new(RouterOptions {
            reject_inactive: true,
            ..RouterOptions::default()
        });
        strict.register_tenant(TenantConfig::new("demo", "postgres://localhost/demo_db"));
        strict.register_tenant(TenantConfig::new("old", "postgres://localhost/old_db").inactive());
        let err = strict.get_connection("old").await.unwrap_err();
        assert!(matches!(err, TenantError::Inactive(ref s) if s == "old"));
        assert!(strict.get_connection("demo").await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_closes_and_clears_cache() {
        let router = router_with(UnknownTenantPolicy::Fallback);
        let demo = router.get_connection("demo").await.unwrap();
        let ghost = router.get_connection("ghost").await.unwrap();
        assert_eq!(router.cached_connections().len(), 2);

        router.shutdown().await;
        assert!(demo.pool().is_closed());
        assert!(ghost.pool().is_closed());
        assert!(router.cached_connections().is_empty());
    }
}
