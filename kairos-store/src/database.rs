use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;
use crate::app_config::DatabaseConfig;

/// Postgres pool holding slots and bookings.
#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(url)
            .await?;

        info!(
            "Connected to Postgres (max {} connections, {:?} acquire timeout)",
            config.max_connections,
            config.acquire_timeout()
        );
        Ok(Self { pool })
    }

    /// Apply the availability and booking schema.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Availability schema is up to date");
        Ok(())
    }
}
