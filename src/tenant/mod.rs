//! Multi-tenant routing: registry of tenant configs and a per-subdomain cache of pooled connections.

mod config;
pub mod pool;
mod registry;
pub mod router;

pub use config::{redact_uri, TenantConfig, DEFAULT_SCHEMA};
pub use pool::{HostPatterns, PgPoolFactory, PoolFactory, PoolSettings, TenantDb, TlsPolicy};
pub use registry::TenantRegistry;
pub use router::{ConnectionSnapshot, RouterOptions, TenantRouter, UnknownTenantPolicy};
