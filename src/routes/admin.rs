//! Tenant administration routes.

use crate::extractors::AdminAuth;
use crate::handlers::admin::{
    delete_tenant, get_tenant, list_connections, list_tenants, register_tenant, reload_tenant,
};
use crate::state::AppState;
use axum::{middleware::from_extractor_with_state, routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Every route requires `Authorization: Bearer <ADMIN_TOKEN>`; unmatched paths stay 404.
pub fn admin_routes(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/admin/tenants", get(list_tenants).post(register_tenant))
        .route("/admin/tenants/:subdomain", get(get_tenant).delete(delete_tenant))
        .route("/admin/tenants/:subdomain/reload", post(reload_tenant))
        .route("/admin/connections", get(list_connections))
        .route_layer(from_extractor_with_state::<AdminAuth, _>(state.clone()))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
