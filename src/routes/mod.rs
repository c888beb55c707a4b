//! Route assembly: common routes at the root, admin API under `/api/v1`.

mod admin;
mod common;

pub use admin::admin_routes;
pub use common::{common_routes, common_routes_with_ready};

use crate::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Full application router with request tracing.
pub fn app(state: AppState, admin_body_limit: usize) -> Router {
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", admin_routes(state, admin_body_limit))
        .layer(TraceLayer::new_for_http())
}
