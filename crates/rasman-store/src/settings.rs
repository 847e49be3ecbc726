use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rasman_shared::constants::DEFAULT_API_URL;

use crate::database::Database;
use crate::error::Result;

/// Operator preferences that survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the RAS management API.
    pub api_url: String,
    /// Screen name instant messages are sent from.
    pub admin_screen_name: String,
    /// When settings were last saved against a server.
    pub last_connected: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            admin_screen_name: String::new(),
            last_connected: None,
        }
    }
}

impl Database {
    /// Read the stored settings, defaults when none were ever saved.  A
    /// corrupt row is logged and treated as absent.
    pub fn load_settings(&self) -> Result<Settings> {
        let json: Option<String> = self
            .conn()
            .query_row("SELECT json FROM app_settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(json) = json else {
            return Ok(Settings::default());
        };

        match serde_json::from_str(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(error = %e, "Corrupt settings JSON, using defaults");
                Ok(Settings::default())
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO app_settings (id, json) VALUES (1, ?1)",
            params![json],
        )?;
        info!(api_url = %settings.api_url, "Settings saved");
        Ok(())
    }
}
