//! The single in-memory settings handle.
//!
//! Controllers read the current settings from here; saving persists to the
//! store, re-points the shared API client and notifies subscribers (the
//! dashboard reloads on every save).

use std::sync::{Mutex, RwLock};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use rasman_api::ApiClient;
use rasman_shared::constants::DEFAULT_API_URL;
use rasman_store::{Database, Settings, StoreError};

pub struct SettingsService {
    db: Mutex<Database>,
    current: RwLock<Settings>,
    api: ApiClient,
    changes: watch::Sender<Settings>,
}

impl SettingsService {
    /// Load the stored settings and point `api` at the stored URL.
    pub fn open(db: Database, api: ApiClient) -> Result<Self, StoreError> {
        let settings = db.load_settings()?;
        if !api.set_base_url(&settings.api_url) {
            warn!(api_url = %settings.api_url, "Stored API URL is unusable");
        }
        let (changes, _) = watch::channel(settings.clone());

        Ok(Self {
            db: Mutex::new(db),
            current: RwLock::new(settings),
            api,
            changes,
        })
    }

    pub fn current(&self) -> Settings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn admin_screen_name(&self) -> String {
        self.current().admin_screen_name
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.changes.subscribe()
    }

    /// Persist `settings`.  An empty URL becomes the default and
    /// `last_connected` is stamped with the current time.
    pub fn save(&self, mut settings: Settings) -> Result<Settings, StoreError> {
        settings.api_url = normalize_api_url(&settings.api_url);
        settings.admin_screen_name = settings.admin_screen_name.trim().to_string();
        settings.last_connected = Some(Utc::now());

        {
            let db = match self.db.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            db.save_settings(&settings)?;
        }

        match self.current.write() {
            Ok(mut guard) => *guard = settings.clone(),
            Err(poisoned) => *poisoned.into_inner() = settings.clone(),
        }

        if !self.api.set_base_url(&settings.api_url) {
            warn!(api_url = %settings.api_url, "Saved API URL is unusable, API calls will fail");
        }
        self.changes.send_replace(settings.clone());

        info!(api_url = %settings.api_url, admin = %settings.admin_screen_name, "Settings applied");
        Ok(settings)
    }

    pub fn set_api_url(&self, api_url: &str) -> Result<Settings, StoreError> {
        let mut settings = self.current();
        settings.api_url = api_url.to_string();
        self.save(settings)
    }

    pub fn set_admin_screen_name(&self, screen_name: &str) -> Result<Settings, StoreError> {
        let mut settings = self.current();
        settings.admin_screen_name = screen_name.to_string();
        self.save(settings)
    }

    /// Use `api_url` for this process only, without persisting it.
    pub fn override_api_url(&self, api_url: &str) {
        let api_url = normalize_api_url(api_url);
        match self.current.write() {
            Ok(mut guard) => guard.api_url = api_url.clone(),
            Err(poisoned) => poisoned.into_inner().api_url = api_url.clone(),
        }
        if !self.api.set_base_url(&api_url) {
            warn!(api_url = %api_url, "API URL override is unusable");
        }
    }
}

fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim();
    // Old settings files carry this truncated default.
    if trimmed.is_empty() || trimmed == "http://localhost:500" {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}
