use reqwest::Method;
use serde_json::json;

use rasman_shared::constants::{ACCOUNT_TIMEOUT, READ_TIMEOUT};
use rasman_shared::{SuspendedStatus, User};

use crate::client::ApiClient;
use crate::decode;

impl ApiClient {
    /// `GET /user`.  Only id, screen name, network and status are filled.
    pub async fn fetch_users(&self) -> Option<Vec<User>> {
        const ENDPOINT: &str = "GET /user";
        let value = self.read(ENDPOINT, &["user"], READ_TIMEOUT).await?;
        Some(decode::list(ENDPOINT, value))
    }

    pub async fn fetch_total_users(&self) -> Option<usize> {
        self.fetch_users().await.map(|users| users.len())
    }

    /// `GET /user/{screen_name}/account`, the full record.  `None` when the
    /// account does not exist or the server could not be reached.
    pub async fn fetch_user_details(&self, screen_name: &str) -> Option<User> {
        const ENDPOINT: &str = "GET /user/{screen_name}/account";
        let value = self
            .read(
                ENDPOINT,
                &["user", screen_name.trim(), "account"],
                ACCOUNT_TIMEOUT,
            )
            .await?;
        decode::object(ENDPOINT, value)
    }

    pub async fn create_user(&self, screen_name: &str, password: &str) -> bool {
        let body = json!({ "screen_name": screen_name, "password": password });
        self.write("POST /user", Method::POST, &["user"], Some(&body), ACCOUNT_TIMEOUT)
            .await
    }

    /// Set or clear (`None` = active) the account's suspension status.
    pub async fn update_user_status(
        &self,
        screen_name: &str,
        status: Option<&SuspendedStatus>,
    ) -> bool {
        let body = json!({ "suspended_status": status });
        self.write(
            "PATCH /user/{screen_name}/account",
            Method::PATCH,
            &["user", screen_name.trim(), "account"],
            Some(&body),
            ACCOUNT_TIMEOUT,
        )
        .await
    }

    /// `DELETE /user` with the screen name in the body, not the path.
    pub async fn delete_user(&self, screen_name: &str) -> bool {
        let body = json!({ "screen_name": screen_name });
        self.write("DELETE /user", Method::DELETE, &["user"], Some(&body), ACCOUNT_TIMEOUT)
            .await
    }

    pub async fn reset_user_password(&self, screen_name: &str, new_password: &str) -> bool {
        let body = json!({ "screen_name": screen_name, "password": new_password });
        self.write(
            "PUT /user/password",
            Method::PUT,
            &["user", "password"],
            Some(&body),
            ACCOUNT_TIMEOUT,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use rasman_shared::SuspendedStatus;

    use crate::fake::{FakeRas, FakeState, Route};

    #[tokio::test]
    async fn test_user_lifecycle() {
        let ras = FakeRas::start().await.unwrap();
        let client = ras.client();

        assert!(client.create_user("alice", "hunter2").await);
        assert!(!client.create_user("alice", "again").await);
        assert_eq!(client.fetch_total_users().await, Some(1));

        assert!(client.reset_user_password("alice", "s3cret").await);
        assert_eq!(
            ras.state().passwords.get("alice").map(String::as_str),
            Some("s3cret")
        );

        // 204 No Content counts as success.
        assert!(client.delete_user("alice").await);
        assert_eq!(client.fetch_users().await, Some(Vec::new()));
        assert!(ras.requests_matching("DELETE ").contains(&"DELETE /user".to_string()));
    }

    #[tokio::test]
    async fn test_update_status_round_trip() {
        let ras = FakeRas::start_with(FakeState::default().with_user("bob"))
            .await
            .unwrap();
        let client = ras.client();

        assert!(
            client
                .update_user_status("bob", Some(&SuspendedStatus::SuspendedAge))
                .await
        );
        let details = client.fetch_user_details("bob").await.unwrap();
        assert_eq!(details.suspended_status, Some(SuspendedStatus::SuspendedAge));
        assert_eq!(details.display_description(), "AIM • Suspended (Age)");

        assert!(client.update_user_status("bob", None).await);
        assert!(client.fetch_user_details("bob").await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_missing_user_details_is_none() {
        let ras = FakeRas::start().await.unwrap();
        assert!(ras.client().fetch_user_details("ghost").await.is_none());
        assert!(!ras.client().delete_user("ghost").await);
    }

    #[tokio::test]
    async fn test_failure_versus_empty() {
        let ras = FakeRas::start_with(FakeState::default().failing(Route::Users))
            .await
            .unwrap();
        assert!(ras.client().fetch_users().await.is_none());
        assert!(ras.client().fetch_total_users().await.is_none());
    }
}
