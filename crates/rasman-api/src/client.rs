use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ApiError, Result};

/// Thin client over the RAS management API.
///
/// Cloning is cheap and clones share the base URL, so re-pointing one
/// handle (after the operator saves a new URL) re-points all of them.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<RwLock<Option<Url>>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let client = Self::unconfigured();
        client.set_base_url(base_url);
        client
    }

    /// A client with no server.  Every call fails fast without touching the
    /// network.
    pub fn unconfigured() -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: Arc::new(RwLock::new(None)),
        }
    }

    /// Point the client at a new server.  Returns `false` (and leaves the
    /// client unconfigured) when the URL is empty or unusable.
    pub fn set_base_url(&self, raw: &str) -> bool {
        let parsed = parse_base_url(raw);
        let accepted = parsed.is_some();
        match self.base_url.write() {
            Ok(mut guard) => *guard = parsed,
            Err(poisoned) => *poisoned.into_inner() = parsed,
        }
        accepted
    }

    pub fn base_url(&self) -> Option<Url> {
        match self.base_url.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url().is_some()
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// Join path segments onto the base URL.  Each segment is
    /// percent-encoded, so screen names and room names with spaces or
    /// slashes stay a single segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url().ok_or(ApiError::NotConfigured)?;
        let display = url.to_string();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(display))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json(&self, segments: &[&str], timeout: Duration) -> Result<Value> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Payload(e.to_string()))
    }

    /// Send a mutating request.  Any 2xx (204 included) is success; the
    /// response body is ignored.
    pub(crate) async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<StatusCode>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.http.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// `get_json`, with failures logged and collapsed to `None`.
    pub(crate) async fn read(
        &self,
        endpoint: &str,
        segments: &[&str],
        timeout: Duration,
    ) -> Option<Value> {
        collapse(endpoint, self.get_json(segments, timeout).await)
    }

    /// `send`, with failures logged and collapsed to `false`.
    pub(crate) async fn write<B>(
        &self,
        endpoint: &str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        timeout: Duration,
    ) -> bool
    where
        B: Serialize + ?Sized,
    {
        collapse(endpoint, self.send(method, segments, body, timeout).await).is_some()
    }
}

pub(crate) fn collapse<T>(endpoint: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(ApiError::NotConfigured) => {
            warn!(endpoint, "No API URL configured, skipping call");
            None
        }
        Err(e) => {
            error!(endpoint, error = %e, "API call failed");
            None
        }
    }
}

fn parse_base_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(url) if !url.cannot_be_a_base() && matches!(url.scheme(), "http" | "https") => {
            Some(url)
        }
        Ok(url) => {
            warn!(url = %url, "API URL must be an http(s) address");
            None
        }
        Err(e) => {
            warn!(url = trimmed, error = %e, "Failed to parse API URL");
            None
        }
    }
}
