use tracing::{info, warn};

use rasman_shared::constants::READ_TIMEOUT;
use rasman_shared::Session;

use crate::client::ApiClient;
use crate::decode;

impl ApiClient {
    /// `GET /session`.  `None` when the server could not be reached.
    pub async fn fetch_sessions(&self) -> Option<Vec<Session>> {
        const ENDPOINT: &str = "GET /session";
        let value = self.read(ENDPOINT, &["session"], READ_TIMEOUT).await?;
        Some(decode::sessions_envelope(ENDPOINT, value))
    }

    /// Number of live sessions, accepting every count shape the server has
    /// used.
    pub async fn fetch_active_session_count(&self) -> Option<usize> {
        let value = self
            .read("GET /session (count)", &["session"], READ_TIMEOUT)
            .await?;
        Some(decode::session_count(&value))
    }

    /// `GET /session/{screen_name}`.  Older servers lack this route and
    /// answer 404, which surfaces here as `None`.
    pub async fn fetch_user_sessions(&self, screen_name: &str) -> Option<Vec<Session>> {
        const ENDPOINT: &str = "GET /session/{screen_name}";
        let value = self
            .read(ENDPOINT, &["session", screen_name.trim()], READ_TIMEOUT)
            .await?;
        Some(decode::sessions_envelope(ENDPOINT, value))
    }

    /// The management API has no way to terminate a session.  Always
    /// `false`; no request is sent.
    pub async fn kick_session(&self, session_id: &str) -> bool {
        if !self.is_configured() {
            warn!("No API URL configured, skipping call");
            return false;
        }
        info!(session_id, "Session termination is not supported by the server");
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::fake::{FakeRas, FakeState, Route};
    use crate::ApiClient;

    #[tokio::test]
    async fn test_fetch_sessions() {
        let ras = FakeRas::start_with(FakeState::default().with_session("alice").with_session("bob"))
            .await
            .unwrap();
        let sessions = ras.client().fetch_sessions().await.unwrap();
        let names: Vec<_> = sessions.iter().map(|s| s.screen_name.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_empty_is_not_failure() {
        let ras = FakeRas::start().await.unwrap();
        assert_eq!(ras.client().fetch_sessions().await, Some(Vec::new()));
        assert_eq!(ras.client().fetch_active_session_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let ras = FakeRas::start_with(FakeState::default().failing(Route::Sessions))
            .await
            .unwrap();
        assert!(ras.client().fetch_sessions().await.is_none());
        assert!(ras.client().fetch_active_session_count().await.is_none());
    }

    #[tokio::test]
    async fn test_user_sessions_encodes_and_filters() {
        let ras = FakeRas::start_with(
            FakeState::default()
                .with_session("Big Al")
                .with_session("bob"),
        )
        .await
        .unwrap();

        let sessions = ras.client().fetch_user_sessions(" big al ").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(ras.requests_matching("GET /session/"), ["GET /session/big%20al"]);
    }

    #[tokio::test]
    async fn test_user_sessions_missing_route_is_none() {
        let ras = FakeRas::start().await.unwrap();
        ras.state().per_user_sessions = false;
        assert!(ras.client().fetch_user_sessions("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_kick_is_unsupported_and_sends_nothing() {
        let ras = FakeRas::start_with(FakeState::default().with_session("alice"))
            .await
            .unwrap();
        assert!(!ras.client().kick_session("sess-0").await);
        assert!(ras.state().requests.is_empty());
        assert!(!ApiClient::unconfigured().kick_session("sess-0").await);
    }
}
