//! Tenant administration: list, register, look up, unregister, reload, and cached pools.

use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok, success_one_with_meta};
use crate::state::AppState;
use crate::store::{delete_tenant as delete_directory_row, tenant_updated_at, upsert_tenant};
use crate::tenant::{redact_uri, TenantConfig};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Tenant as returned by the admin API. The connection password is redacted.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantView {
    pub subdomain: String,
    pub connection_uri: String,
    pub display_name: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// A pool is cached under this subdomain.
    pub cached: bool,
    pub fallback: bool,
}

fn view(state: &AppState, config: &TenantConfig) -> TenantView {
    TenantView {
        subdomain: config.subdomain.clone(),
        connection_uri: redact_uri(&config.connection_uri),
        display_name: config.display_name.clone(),
        is_active: config.is_active,
        schema: config.schema.clone(),
        cached: state.router.is_cached(&config.subdomain),
        fallback: config.subdomain == state.router.fallback_subdomain(),
    }
}

/// DNS label rules: 1-63 chars of [a-z0-9-], no leading or trailing hyphen.
fn validate_subdomain(subdomain: &str) -> Result<(), AppError> {
    let valid = !subdomain.is_empty()
        && subdomain.len() <= 63
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid subdomain: '{}'", subdomain)))
    }
}

/// GET /api/v1/admin/tenants
pub async fn list_tenants(State(state): State<AppState>) -> impl IntoResponse {
    let views: Vec<TenantView> = state
        .router
        .list_tenants()
        .iter()
        .map(|c| view(&state, c))
        .collect();
    success_many(views)
}

/// POST /api/v1/admin/tenants — insert or overwrite. A pool already cached for the
/// subdomain keeps its old config until reloaded. The fallback tenant must keep a URI.
pub async fn register_tenant(
    State(state): State<AppState>,
    Json(config): Json<TenantConfig>,
) -> Result<impl IntoResponse, AppError> {
    validate_subdomain(&config.subdomain)?;
    let is_fallback = config.subdomain == state.router.fallback_subdomain();
    if is_fallback && config.connection_uri.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "fallback tenant '{}' needs a connection uri",
            config.subdomain
        )));
    }
    if let Some(pool) = &state.directory {
        upsert_tenant(pool, &config).await?;
    }
    let replaced = state.router.register_tenant(config.clone()).is_some();
    if replaced && state.router.is_cached(&config.subdomain) {
        tracing::info!(
            tenant = %config.subdomain,
            "tenant config replaced; cached pool serves the previous config until reload"
        );
    }
    Ok(success_one(view(&state, &config)))
}

/// GET /api/v1/admin/tenants/:subdomain
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let config = state
        .router
        .lookup_tenant(&subdomain)
        .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", subdomain)))?;
    let data = view(&state, &config);
    match &state.directory {
        Some(pool) => {
            let updated_at = tenant_updated_at(pool, &subdomain).await?;
            Ok(success_one_with_meta(data, serde_json::json!({ "updatedAt": updated_at })))
        }
        None => Ok(success_one_ok(data)),
    }
}

/// DELETE /api/v1/admin/tenants/:subdomain — also closes the tenant's cached pool.
/// The fallback tenant cannot be deleted; replace it with a new registration instead.
pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.router.lookup_tenant(&subdomain).is_none() {
        return Err(AppError::NotFound(format!("tenant not found: {}", subdomain)));
    }
    if subdomain == state.router.fallback_subdomain() {
        return Err(AppError::Conflict(format!(
            "tenant '{}' is the fallback tenant and cannot be deleted",
            subdomain
        )));
    }
    if let Some(pool) = &state.directory {
        delete_directory_row(pool, &subdomain).await?;
    }
    state.router.unregister_tenant(&subdomain).await;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/tenants/:subdomain/reload — drop the cached pool so the next
/// request rebuilds it from the current config.
pub async fn reload_tenant(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.router.lookup_tenant(&subdomain).is_none() && !state.router.is_cached(&subdomain) {
        return Err(AppError::NotFound(format!("tenant not found: {}", subdomain)));
    }
    let evicted = state.router.reload_tenant(&subdomain).await;
    Ok(success_one_ok(serde_json::json!({
        "subdomain": subdomain,
        "evicted": evicted
    })))
}

/// GET /api/v1/admin/connections
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    success_many(state.router.cached_connections())
}
