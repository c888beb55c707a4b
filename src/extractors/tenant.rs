//! Extract the request's tenant (Host subdomain, or X-Tenant-ID behind a trusted proxy) and its connection.

use crate::error::AppError;
use crate::state::AppState;
use crate::tenant::TenantDb;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::HOST, request::Parts},
};
use std::net::IpAddr;
use std::sync::Arc;

/// Header that overrides Host-based resolution when `AppState::trust_tenant_header` is set.
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Subdomain of a Host header value, lowercased and without port.
///
/// With `base_domain`, the label directly left of it is taken (`www.acme.pos.example.com` → `acme`).
/// Without, the first label of a host with at least three labels. IP literals yield nothing.
pub fn subdomain_from_host(host: &str, base_domain: Option<&str>) -> Option<String> {
    let host = host.trim();
    if host.starts_with('[') {
        return None;
    }
    let host = host
        .rsplit_once(':')
        .map(|(h, _)| h)
        .unwrap_or(host)
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let label = match base_domain {
        Some(base) => host
            .strip_suffix(base)?
            .strip_suffix('.')?
            .rsplit('.')
            .next()?
            .to_string(),
        None => {
            let labels: Vec<&str> = host.split('.').collect();
            if labels.len() < 3 {
                return None;
            }
            labels[0].to_string()
        }
    };
    Some(label).filter(|l| !l.is_empty())
}

/// Tenant id of the request, if one could be determined.
#[derive(Clone, Debug)]
pub struct TenantId(pub Option<String>);

impl TenantId {
    /// Cache key to route with: the tenant id, or `fallback` when none was found.
    pub fn key_or(&self, fallback: &str) -> String {
        self.0.clone().unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v: &axum::http::HeaderValue| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let app = AppState::from_ref(state);
        if app.trust_tenant_header {
            if let Some(id) = header(TENANT_ID_HEADER) {
                return Ok(TenantId(Some(id.to_ascii_lowercase())));
            }
        }
        let from_host = header(HOST.as_str())
            .or_else(|| parts.uri.host())
            .and_then(|h| subdomain_from_host(h, app.base_domain.as_deref()));
        Ok(TenantId(from_host))
    }
}

/// Connection handle for the request's tenant, resolved through the router.
pub struct TenantConn(pub Arc<TenantDb>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantConn
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tenant = TenantId::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let app = AppState::from_ref(state);
        let key = tenant.key_or(app.router.fallback_subdomain());
        let db = app.router.get_connection(&key).await?;
        Ok(TenantConn(db))
    }
}
