use genera_api::{
    app::{build_app, services::build_directory},
    config::ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    genera_observability::init();

    let config = ServerConfig::from_env()?;
    let directory = build_directory(&config).await?;
    let app = build_app(config.jwt_secret.as_bytes(), directory);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
