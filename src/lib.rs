//! POS tenant router: maps a storefront subdomain to a lazily created, cached PostgreSQL pool.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod tenant;

pub use config::AppConfig;
pub use error::{AppError, ConfigError, TenantError};
pub use extractors::{AdminAuth, TenantConn, TenantId};
pub use response::{success_many, success_one};
pub use routes::{admin_routes, app, common_routes, common_routes_with_ready};
pub use state::AppState;
pub use store::{ensure_tenant_table, load_tenants};
pub use tenant::{
    PgPoolFactory, PoolFactory, PoolSettings, RouterOptions, TenantConfig, TenantDb, TenantRouter,
    TlsPolicy, UnknownTenantPolicy,
};
