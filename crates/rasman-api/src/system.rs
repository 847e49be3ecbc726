use reqwest::Method;
use serde_json::json;

use rasman_shared::constants::{ACCOUNT_TIMEOUT, READ_TIMEOUT};
use rasman_shared::VersionInfo;

use crate::client::ApiClient;
use crate::decode;

impl ApiClient {
    /// `GET /version`.  Fields the server leaves out read `Unknown`.
    pub async fn fetch_version_info(&self) -> Option<VersionInfo> {
        const ENDPOINT: &str = "GET /version";
        let value = self.read(ENDPOINT, &["version"], READ_TIMEOUT).await?;
        decode::object(ENDPOINT, value)
    }

    /// Deliver an instant message on behalf of `from`.
    pub async fn send_instant_message(&self, from: &str, to: &str, text: &str) -> bool {
        let body = json!({ "from": from, "to": to, "text": text });
        self.write(
            "POST /instant-message",
            Method::POST,
            &["instant-message"],
            Some(&body),
            ACCOUNT_TIMEOUT,
        )
        .await
    }
}
