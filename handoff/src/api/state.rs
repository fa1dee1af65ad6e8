use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::live::{ChangeHub, LocalSource};
use crate::services::{LifecycleService, TimeoutSweeper};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub hub: ChangeHub,
    pub lifecycle: LifecycleService,
    pub sweeper: TimeoutSweeper,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn DatabaseBackend>, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);
        let hub = ChangeHub::default();
        let lifecycle = LifecycleService::new(db.clone(), hub.clone(), clock, &config.lifecycle);
        let sweeper = TimeoutSweeper::new(lifecycle.clone(), config.lifecycle.sweep_interval_secs);

        Self {
            config,
            db,
            hub,
            lifecycle,
            sweeper,
        }
    }

    /// Live query source backed by this process's store and change hub.
    pub fn live_source(&self) -> Arc<LocalSource> {
        Arc::new(LocalSource::new(self.db.clone(), self.hub.clone()))
    }
}
