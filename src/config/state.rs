// Application state module
// Shared between every connection task

use super::types::Config;
use crate::store::ImageStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: ImageStore,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            store: ImageStore::new(&config.storage.upload_dir),
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
