//! Shared application state for all routes. The tenant router is built once per process.

use crate::config::{parse_inline_tenants, read_tenants_file, AppConfig};
use crate::error::AppError;
use crate::store::{ensure_tenant_table, load_tenants};
use crate::tenant::{TenantConfig, TenantRouter};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<TenantRouter>,
    /// Tenant directory; admin changes are persisted here when set.
    pub directory: Option<PgPool>,
    pub base_domain: Option<String>,
    /// Bearer token required by the admin API; `None` refuses every admin request.
    pub admin_token: Option<String>,
    /// Let `X-Tenant-ID` override the Host subdomain.
    pub trust_tenant_header: bool,
}

impl AppState {
    pub fn new(router: TenantRouter) -> Self {
        AppState {
            router: Arc::new(router),
            directory: None,
            base_domain: None,
            admin_token: None,
            trust_tenant_header: false,
        }
    }

    pub fn with_base_domain(mut self, base_domain: Option<String>) -> Self {
        self.base_domain = base_domain;
        self
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    pub fn with_trusted_tenant_header(mut self, trusted: bool) -> Self {
        self.trust_tenant_header = trusted;
        self
    }

    pub fn with_directory(mut self, directory: Option<PgPool>) -> Self {
        self.directory = directory;
        self
    }

    /// Build the router and register tenants from every configured source.
    /// Later sources overwrite earlier ones: directory, file, inline, fallback url.
    /// Fails when the fallback tenant does not resolve.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let router = TenantRouter::new(config.router.clone());

        let directory = match &config.directory_url {
            Some(url) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(2)
                    .connect(url)
                    .await?;
                ensure_tenant_table(&pool).await?;
                for tenant in load_tenants(&pool).await? {
                    router.register_tenant(tenant);
                }
                Some(pool)
            }
            None => None,
        };
        if let Some(path) = &config.tenants_file {
            for tenant in read_tenants_file(path).await? {
                router.register_tenant(tenant);
            }
        }
        if let Some(inline) = &config.inline_tenants {
            for tenant in parse_inline_tenants(inline)? {
                router.register_tenant(tenant);
            }
        }
        if let Some(url) = &config.fallback_database_url {
            let fallback = router.fallback_subdomain().to_string();
            if router.lookup_tenant(&fallback).is_none() {
                router.register_tenant(TenantConfig::new(fallback, url.as_str()).with_display_name("Demo"));
            }
        }

        router.ensure_fallback()?;
        tracing::info!(
            tenants = router.list_tenants().len(),
            fallback = %router.fallback_subdomain(),
            directory = directory.is_some(),
            admin = config.admin_token.is_some(),
            "tenant registry loaded"
        );

        Ok(AppState::new(router)
            .with_directory(directory)
            .with_base_domain(config.base_domain.clone())
            .with_admin_token(config.admin_token.clone())
            .with_trusted_tenant_header(config.trust_tenant_header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenantError;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[tokio::test]
    async fn registers_inline_tenants_and_fallback_url() {
        let config = config_from(&[
            ("TENANTS", "acme=postgres://localhost/acme;beta=postgres://localhost/beta"),
            ("FALLBACK_DATABASE_URL", "postgres://localhost/demo"),
            ("BASE_DOMAIN", "pos.example.com"),
        ]);
        let state = AppState::from_config(&config).await.unwrap();
        let subs: Vec<_> = state.router.list_tenants().into_iter().map(|t| t.subdomain).collect();
        assert_eq!(subs, ["acme", "beta", "demo"]);
        assert_eq!(state.base_domain.as_deref(), Some("pos.example.com"));
        assert!(state.directory.is_none());
        assert!(state.admin_token.is_none());
        assert!(!state.trust_tenant_header);
    }

    #[tokio::test]
    async fn inline_fallback_wins_over_fallback_url() {
        let config = config_from(&[
            ("TENANTS", "demo=postgres://localhost/demo_inline"),
            ("FALLBACK_DATABASE_URL", "postgres://localhost/demo_url"),
        ]);
        let state = AppState::from_config(&config).await.unwrap();
        let demo = state.router.lookup_tenant("demo").unwrap();
        assert_eq!(demo.connection_uri, "postgres://localhost/demo_inline");
    }

    #[tokio::test]
    async fn missing_fallback_aborts_startup() {
        let config = config_from(&[("TENANTS", "acme=postgres://localhost/acme")]);
        let err = AppState::from_config(&config).await.err().unwrap();
        assert!(matches!(err, AppError::Tenant(TenantError::Configuration(_))));
    }
}
