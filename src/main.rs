use anyhow::{anyhow, Context};
use todo_service::config::AppConfig;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        database_url = %config.database_url,
        ai_enabled = config.ai.is_some(),
        "starting todo service"
    );

    let _rocket = todo_service::rocket_instance(config)
        .launch()
        .await
        .map_err(|e| anyhow!("server failed: {e}"))?;
    Ok(())
}
