use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use kairos_api::{app, AppState};
use kairos_calendar::ChangesSynchronizer;
use kairos_core::repository::{AvailabilityRepository, BookingRepository};
use kairos_core::{CancellationService, CodeStore, InMemoryCodeStore, LogNotifier};
use kairos_store::{
    Config, DbClient, InMemoryAvailabilityRepository, InMemoryBookingRepository, RedisCodeStore,
    StoreAvailabilityRepository, StoreBookingRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kairos_api=debug,kairos_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Kairos API on port {}", config.server.port);

    let (slot_repo, booking_repo): (Arc<dyn AvailabilityRepository>, Arc<dyn BookingRepository>) =
        match &config.database.url {
            Some(url) => {
                let db = DbClient::new(url, &config.database).await.context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                (
                    Arc::new(StoreAvailabilityRepository::new(db.pool.clone())),
                    Arc::new(StoreBookingRepository::new(db.pool)),
                )
            }
            None => {
                tracing::warn!("No database configured, slots and bookings are kept in memory");
                (
                    Arc::new(InMemoryAvailabilityRepository::new()),
                    Arc::new(InMemoryBookingRepository::new()),
                )
            }
        };

    let codes: Arc<dyn CodeStore> = match &config.redis.url {
        Some(url) => Arc::new(RedisCodeStore::new(url).await.context("Invalid Redis url")?),
        None => {
            tracing::info!("No Redis configured, using the in-process cancellation code store");
            Arc::new(InMemoryCodeStore::new())
        }
    };

    // SSE Broadcast Channel
    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let notifier = Arc::new(LogNotifier::new(config.cancellation.reveal_codes));
    let cancellation = CancellationService::new(codes, booking_repo, slot_repo.clone(), notifier)
        .with_policy(config.cancellation.policy())
        .with_events(sse_tx.clone());

    // Dropping the handle stops the sweep
    let _sweeper = cancellation.spawn_sweeper(config.cancellation.sweep_interval());

    let app_state = AppState {
        synchronizer: Arc::new(ChangesSynchronizer::new(slot_repo.clone())),
        slot_repo,
        cancellation: Arc::new(cancellation),
        sse_tx,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
