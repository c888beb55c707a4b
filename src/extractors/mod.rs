//! Request extractors.

pub mod admin;
pub mod tenant;
pub use admin::AdminAuth;
pub use tenant::{subdomain_from_host, TenantConn, TenantId, TENANT_ID_HEADER};
