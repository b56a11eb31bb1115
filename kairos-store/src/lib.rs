pub mod app_config;
pub mod database;
pub mod memory;
pub mod availability_repo;
pub mod booking_repo;
pub mod redis_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::{InMemoryAvailabilityRepository, InMemoryBookingRepository};
pub use availability_repo::StoreAvailabilityRepository;
pub use booking_repo::StoreBookingRepository;
pub use redis_repo::RedisCodeStore;

use kairos_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::RowNotFound) => CoreError::NotFound("row".to_string()),
            StoreError::Database(sqlx::Error::Database(ref db)) if db.is_unique_violation() => {
                CoreError::ValidationError("record already exists".to_string())
            }
            other => CoreError::InternalError(other.to_string()),
        }
    }
}

/// `map_err` adapter for backend errors inside repository impls.
pub(crate) fn backend<E: Into<StoreError>>(err: E) -> CoreError {
    err.into().into()
}
