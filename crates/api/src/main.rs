use std::sync::Arc;

use anyhow::Context;

use stockledger_api::app::{AppServices, build_app};
use stockledger_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    stockledger_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "starting");

    let services = AppServices::sqlite(&config.database_url, &config.jwt_secret, config.token_ttl)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    services
        .seed_admin(&config.admin_username, &config.admin_password)
        .await
        .context("failed to seed operator account")?;

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
