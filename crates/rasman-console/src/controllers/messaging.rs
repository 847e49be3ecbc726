//! Instant messages from the administrator account.

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::info;

use crate::list::Banner;
use crate::state::AppState;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Message text is empty")]
    EmptyText,

    #[error("No admin screen name configured; set one with `rasman config set-admin`")]
    NoSender,

    #[error("Failed to send message to {to} from {from}. Please try again.")]
    Rejected { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeStatus {
    Idle,
    Sending,
    Sent { from: String },
    Failed(ComposeError),
}

struct Inner {
    draft: String,
    status: ComposeStatus,
}

/// Composes and sends one conversation's messages to `target`.
pub struct MessageComposer {
    state: AppState,
    target: String,
    inner: Mutex<Inner>,
}

impl MessageComposer {
    pub fn new(state: AppState, target: &str) -> Self {
        Self {
            state,
            target: target.trim().to_string(),
            inner: Mutex::new(Inner {
                draft: String::new(),
                status: ComposeStatus::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn status(&self) -> ComposeStatus {
        self.lock().status.clone()
    }

    /// Replace the draft.  Typing after a successful send clears the
    /// success state.
    pub fn set_draft(&self, text: &str) {
        let mut inner = self.lock();
        inner.draft = text.to_string();
        if matches!(inner.status, ComposeStatus::Sent { .. }) {
            inner.status = ComposeStatus::Idle;
        }
    }

    /// Send the draft from the configured admin screen name.  The draft is
    /// cleared only on success.
    pub async fn send(&self) -> Result<(), ComposeError> {
        let text = self.draft();
        if text.trim().is_empty() {
            return Err(self.fail(ComposeError::EmptyText));
        }
        let from = self.state.settings.admin_screen_name();
        if from.trim().is_empty() {
            return Err(self.fail(ComposeError::NoSender));
        }

        self.lock().status = ComposeStatus::Sending;
        let ok = self
            .state
            .api
            .send_instant_message(&from, &self.target, &text)
            .await;

        if ok {
            info!(from = %from, to = %self.target, "Instant message sent");
            let mut inner = self.lock();
            inner.draft.clear();
            inner.status = ComposeStatus::Sent { from };
            Ok(())
        } else {
            Err(self.fail(ComposeError::Rejected {
                from,
                to: self.target.clone(),
            }))
        }
    }

    fn fail(&self, err: ComposeError) -> ComposeError {
        self.lock().status = ComposeStatus::Failed(err.clone());
        err
    }

    pub fn banner(&self) -> Option<Banner> {
        match self.status() {
            ComposeStatus::Sent { from } => Some(Banner::success(format!(
                "Message successfully sent to {} from {from}.",
                self.target
            ))),
            ComposeStatus::Failed(err) => Some(Banner::danger(err.to_string())),
            ComposeStatus::Idle | ComposeStatus::Sending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::state_for;
    use rasman_api::fake::{FakeRas, FakeState, Route};

    #[tokio::test]
    async fn test_send_from_admin() {
        let ras = FakeRas::start().await.unwrap();
        let (state, _) = state_for(&ras, []);
        state.settings.set_admin_screen_name("admin").unwrap();

        let composer = MessageComposer::new(state, "alice");
        composer.set_draft("hello there");
        assert_eq!(composer.send().await, Ok(()));
        assert_eq!(composer.draft(), "");
        assert_eq!(
            composer.banner(),
            Some(Banner::success("Message successfully sent to alice from admin."))
        );
        assert_eq!(ras.state().messages.len(), 1);

        composer.set_draft("again");
        assert_eq!(composer.status(), ComposeStatus::Idle);
    }

    #[tokio::test]
    async fn test_rejects_empty_text_and_missing_sender() {
        let ras = FakeRas::start().await.unwrap();
        let (state, _) = state_for(&ras, []);
        let composer = MessageComposer::new(state, "alice");

        composer.set_draft("   ");
        assert_eq!(composer.send().await, Err(ComposeError::EmptyText));

        composer.set_draft("hi");
        assert_eq!(composer.send().await, Err(ComposeError::NoSender));
        assert!(ras.requests_matching("POST").is_empty());
    }

    #[tokio::test]
    async fn test_server_failure_keeps_draft() {
        let ras = FakeRas::start_with(FakeState::default().failing(Route::InstantMessage))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        state.settings.set_admin_screen_name("admin").unwrap();

        let composer = MessageComposer::new(state, "alice");
        composer.set_draft("hello");
        assert!(matches!(
            composer.send().await,
            Err(ComposeError::Rejected { .. })
        ));
        assert_eq!(composer.draft(), "hello");
        assert_eq!(
            composer.banner().unwrap().text,
            "Failed to send message to alice from admin. Please try again."
        );
    }
}
