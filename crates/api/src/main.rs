use std::sync::Arc;

use anyhow::Context;

use claimgate_api::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    claimgate_observability::init();

    let settings = Settings::from_env();
    let engine = settings
        .load_engine()
        .context("invalid authorization configuration")?;
    let app = claimgate_api::app::build_app(Arc::new(engine))?;

    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
