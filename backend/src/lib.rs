pub mod api;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduling;
pub mod store;

use auth::AuthConfig;
use scheduling::SchedulingService;
use store::BookingStore;

/// Shared application state available to all handlers via axum's State extractor.
pub struct AppState<S: BookingStore> {
    pub scheduling: SchedulingService<S>,
    pub auth: AuthConfig,
}

impl<S: BookingStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            scheduling: self.scheduling.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<S: BookingStore> axum::extract::FromRef<AppState<S>> for AuthConfig {
    fn from_ref(state: &AppState<S>) -> Self {
        state.auth.clone()
    }
}
