//! HTTP API for inboxd

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::Config;
use crate::db::Database;
use crate::responder::ResponderGateway;
use crate::runtime::RuntimeManager;
use crate::team::TeamRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    pub team: Arc<TeamRegistry>,
}

impl AppState {
    pub fn new(
        db: Database,
        gateway: Arc<dyn ResponderGateway>,
        team: Arc<TeamRegistry>,
        config: Config,
    ) -> Self {
        Self {
            runtime: Arc::new(RuntimeManager::new(db, gateway, config)),
            team,
        }
    }
}
