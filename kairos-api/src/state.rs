use std::sync::Arc;
use tokio::sync::broadcast;
use kairos_calendar::ChangesSynchronizer;
use kairos_core::repository::AvailabilityRepository;
use kairos_core::CancellationService;
use kairos_shared::models::ServerEvent;

#[derive(Clone)]
pub struct AppState {
    pub slot_repo: Arc<dyn AvailabilityRepository>,
    pub cancellation: Arc<CancellationService>,
    pub synchronizer: Arc<ChangesSynchronizer>,
    pub sse_tx: broadcast::Sender<ServerEvent>,
}
