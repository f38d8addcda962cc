use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::grading::GradingService,
    store::{SharedAccounts, SharedCatalog, SharedSubmissions},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: SharedCatalog,
    pub submissions: SharedSubmissions,
    pub accounts: SharedAccounts,
    pub grading: Arc<GradingService>,
}

impl AppState {
    /// Wires the grading service to the given collaborators.
    pub fn new(
        config: Config,
        catalog: SharedCatalog,
        submissions: SharedSubmissions,
        accounts: SharedAccounts,
    ) -> Self {
        let grading = Arc::new(GradingService::new(
            catalog.clone(),
            submissions.clone(),
            config.pass_threshold,
            config.collaborator_timeout,
        ));

        Self {
            config,
            catalog,
            submissions,
            accounts,
            grading,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SharedCatalog {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for SharedSubmissions {
    fn from_ref(state: &AppState) -> Self {
        state.submissions.clone()
    }
}

impl FromRef<AppState> for SharedAccounts {
    fn from_ref(state: &AppState) -> Self {
        state.accounts.clone()
    }
}

impl FromRef<AppState> for Arc<GradingService> {
    fn from_ref(state: &AppState) -> Self {
        state.grading.clone()
    }
}
