use stayspot::config::Config;
use stayspot::{app, Context};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr;
    let ctx = Context::new(config)?;

    tracing::info!(%bind_addr, "starting server");

    axum::Server::bind(&bind_addr)
        .serve(app(ctx).into_make_service())
        .await?;

    Ok(())
}
