//! Tenant router server: loads tenants from env/file/directory, checks the fallback tenant,
//! and serves health, readiness and the tenant admin API.

use pos_tenant_router::{app, AppConfig, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pos_tenant_router=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let router = state.router.clone();
    let app = app(state, config.admin_body_limit);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    router.shutdown().await;
    Ok(())
}
