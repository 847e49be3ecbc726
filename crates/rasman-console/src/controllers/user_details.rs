//! Details page for one account: the full record plus its live sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use rasman_shared::{Session, SuspendedStatus, User};

use crate::controllers::messaging::MessageComposer;
use crate::list::Banner;
use crate::state::AppState;

/// Where the sessions on a details page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// `GET /session/{screen_name}` answered.
    PerUserEndpoint,
    /// That route failed, so the full session list was filtered by screen
    /// name instead.
    FilteredFromAll,
    /// Neither could be fetched.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct UserDetailsSnapshot {
    pub screen_name: String,
    pub loading: bool,
    pub user: Option<User>,
    pub sessions: Vec<Session>,
    pub session_source: SessionSource,
    pub deleted: bool,
    pub banner: Option<Banner>,
}

pub struct UserDetailsController {
    state: AppState,
    screen_name: String,
    inner: Mutex<UserDetailsSnapshot>,
}

impl UserDetailsController {
    pub fn new(state: AppState, screen_name: &str) -> Arc<Self> {
        let screen_name = screen_name.trim().to_string();
        Arc::new(Self {
            inner: Mutex::new(UserDetailsSnapshot {
                screen_name: screen_name.clone(),
                loading: true,
                user: None,
                sessions: Vec::new(),
                session_source: SessionSource::Unavailable,
                deleted: false,
                banner: None,
            }),
            state,
            screen_name,
        })
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    fn lock(&self) -> MutexGuard<'_, UserDetailsSnapshot> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> UserDetailsSnapshot {
        self.lock().clone()
    }

    pub async fn load(&self) {
        self.lock().loading = true;

        let api = &self.state.api;
        let (user, sessions) = tokio::join!(
            api.fetch_user_details(&self.screen_name),
            self.fetch_sessions()
        );
        let (sessions, source) = sessions;

        let banner = match &user {
            None => Some(Banner::danger(format!(
                "Failed to load user details for {}. The user may not exist.",
                self.screen_name
            ))),
            Some(_) if sessions.is_empty() => Some(Banner::warning(format!(
                "User {} is not currently online.",
                self.screen_name
            ))),
            Some(_) => None,
        };

        let mut inner = self.lock();
        inner.loading = false;
        inner.user = user;
        inner.sessions = sessions;
        inner.session_source = source;
        inner.banner = banner;
    }

    /// Per-user session route first; when it fails, filter the full list.
    async fn fetch_sessions(&self) -> (Vec<Session>, SessionSource) {
        let api = &self.state.api;
        if let Some(sessions) = api.fetch_user_sessions(&self.screen_name).await {
            return (sessions, SessionSource::PerUserEndpoint);
        }

        debug!(screen_name = %self.screen_name, "Per-user sessions unavailable, filtering all sessions");
        match api.fetch_sessions().await {
            Some(all) => {
                let mine = all
                    .into_iter()
                    .filter(|s| s.screen_name.eq_ignore_ascii_case(&self.screen_name))
                    .collect();
                (mine, SessionSource::FilteredFromAll)
            }
            None => (Vec::new(), SessionSource::Unavailable),
        }
    }

    fn set_banner(&self, banner: Banner) {
        self.lock().banner = Some(banner);
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    pub async fn reset_password(&self, password: &str) -> bool {
        let ok = !password.is_empty()
            && self
                .state
                .api
                .reset_user_password(&self.screen_name, password)
                .await;
        self.set_banner(Banner::outcome(
            ok,
            format!("Password for '{}' reset successfully", self.screen_name),
            format!("Failed to reset password for '{}'", self.screen_name),
        ));
        ok
    }

    pub async fn update_status(&self, status: Option<SuspendedStatus>) -> bool {
        let ok = self
            .state
            .api
            .update_user_status(&self.screen_name, status.as_ref())
            .await;
        self.set_banner(Banner::outcome(
            ok,
            format!(
                "Status for '{}' updated to {}",
                self.screen_name,
                SuspendedStatus::label_of(status.as_ref())
            ),
            format!("Failed to update status for '{}'", self.screen_name),
        ));
        if ok {
            if let Some(user) = self.lock().user.as_mut() {
                user.suspended_status = status;
            }
        }
        ok
    }

    /// Delete after confirmation.  The page keeps showing the last snapshot,
    /// flagged as deleted.
    pub async fn delete(&self) -> bool {
        let confirmed = self
            .state
            .prompter
            .confirm(
                "Confirm Delete",
                &format!(
                    "Are you sure you want to delete user '{}'? This action cannot be undone.",
                    self.screen_name
                ),
            )
            .await;
        if !confirmed {
            return false;
        }

        let ok = self.state.api.delete_user(&self.screen_name).await;
        self.set_banner(Banner::outcome(
            ok,
            format!("User '{}' deleted successfully", self.screen_name),
            format!("Failed to delete user '{}'", self.screen_name),
        ));
        if ok {
            info!(screen_name = %self.screen_name, "User deleted from details page");
            self.lock().deleted = true;
        }
        ok
    }

    /// Composer for messaging this user.
    pub fn composer(&self) -> MessageComposer {
        MessageComposer::new(self.state.clone(), &self.screen_name)
    }
}
