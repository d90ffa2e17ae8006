use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::ClinicDatabase;

use crate::clock::Clock;
use crate::notify::Notifier;

/// Everything a request handler needs, shared across cells.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: ClinicDatabase,
    pub clock: Arc<dyn Clock>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: ClinicDatabase,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            db,
            clock,
            notifier,
        }
    }
}
