use anyhow::Context;

use printshop_api::app::{AppState, build_app};
use printshop_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    printshop_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let policy = config.load_route_policy().context("invalid route policy")?;
    let state = AppState::with_policy(&config, policy);
    if let Some(admin) = &config.bootstrap_admin {
        state
            .bootstrap_admin(admin)
            .context("failed to create bootstrap admin")?;
    }

    let app = build_app(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
