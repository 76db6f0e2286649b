use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use genera_infra::{InMemoryDirectory, PostgresDirectory, RoleDirectory};

use crate::config::ServerConfig;

/// Shared state handed to protected handlers.
#[derive(Clone)]
pub struct AppServices {
    pub directory: Arc<dyn RoleDirectory>,
}

impl AppServices {
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self { directory }
    }
}

/// Connect to Postgres when `DATABASE_URL` is set, else serve from memory.
pub async fn build_directory(config: &ServerConfig) -> anyhow::Result<Arc<dyn RoleDirectory>> {
    let Some(url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; serving an empty in-memory directory");
        return Ok(Arc::new(InMemoryDirectory::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("connecting to DATABASE_URL")?;

    info!(max_connections = config.max_connections, "connected to postgres directory");
    Ok(Arc::new(PostgresDirectory::new(pool)))
}
