//! Application state shared by every controller.

use std::sync::Arc;

use rasman_api::ApiClient;

use crate::prompt::Prompter;
use crate::settings::SettingsService;

/// Cheap to clone; every controller holds its own copy.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub settings: Arc<SettingsService>,
    pub prompter: Arc<dyn Prompter>,
}

impl AppState {
    pub fn new(settings: Arc<SettingsService>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            api: settings.api().clone(),
            settings,
            prompter,
        }
    }
}
