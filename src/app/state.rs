//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::scheduler::DetonationScheduler;
use crate::lobby::RoomDirectory;
use crate::player::PlayerRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<PlayerRegistry>,
    pub directory: Arc<RoomDirectory>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Connected players and event fan-out
        let registry = Arc::new(PlayerRegistry::new());

        // Detonation and blast-cleanup timers
        let scheduler = Arc::new(DetonationScheduler::new());

        // Rooms and sessions
        let directory = Arc::new(RoomDirectory::new(registry.clone(), scheduler));

        Self {
            config,
            registry,
            directory,
        }
    }
}
