pub mod types;
pub mod error;
pub mod config;
pub mod outcome;
pub mod backend;
pub mod roles;
pub mod auth;
pub mod users;
pub mod activities;
pub mod stats;
pub mod gate;
pub mod cookies;
pub mod claims;
pub mod settings;

use backend::Backend;
use config::Config;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub config: Config,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Arc<Self> {
        Arc::new(Self { backend, config })
    }
}
