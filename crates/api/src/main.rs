use std::sync::Arc;

use anyhow::Context;

use academyerp_api::app::{build_app, services};
use academyerp_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;

    academyerp_observability::init(config.log_format);

    let services = Arc::new(services::build_services(&config).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
