//! HTTP client for the control API.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

use super::types::*;

/// Request timeout for control-API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the session control API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    /// Base URL, e.g. "http://localhost:3000".
    base_url: String,
    /// Bearer token; calls fail with `AuthRequired` when absent.
    token: Option<String>,
}

impl ApiClient {
    /// Create a new client against the given backend.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Request)?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated request. Missing credential fails before any
    /// bytes hit the wire.
    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.token.as_ref().ok_or(ClientError::AuthRequired)?;
        let url = format!("{}{}", self.base_url, path);
        Ok(self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", token)))
    }

    /// Create a new session. No body; the backend allocates the id.
    pub async fn create_session(&self) -> ClientResult<CreateSessionResponse> {
        let response = self.request(Method::POST, "/api/sessions")?.send().await?;
        handle_response(response).await
    }

    /// Request runtime allocation for a session.
    pub async fn start_session(&self, session_id: &str) -> ClientResult<StartSessionResponse> {
        let response = self
            .request(Method::POST, &format!("/api/sessions/{}/start", session_id))?
            .json(&StartSessionRequest { providers: vec![] })
            .send()
            .await?;
        handle_response(response).await
    }

    /// Fetch a session under the newer status scheme. `Ok(None)` when the
    /// backend does not know the session under this scheme.
    pub async fn get_session(&self, session_id: &str) -> ClientResult<Option<SessionDetailV2>> {
        let response = self
            .request(Method::GET, &format!("/api/v2/sessions/{}", session_id))?
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        handle_response(response).await.map(Some)
    }

    /// Fetch a session under the older single-status scheme.
    pub async fn get_session_legacy(
        &self,
        session_id: &str,
    ) -> ClientResult<Option<SessionDetailLegacy>> {
        let response = self
            .request(Method::GET, &format!("/api/sessions/{}", session_id))?
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        handle_response(response).await.map(Some)
    }

    /// Resolve a session's backend representation: newer scheme first,
    /// falling back to the older scheme when the newer one does not know it.
    pub async fn resolve_session(&self, session_id: &str) -> ClientResult<ResolvedSession> {
        if let Some(detail) = self.get_session(session_id).await? {
            return Ok(detail.into());
        }
        debug!(session_id, "session unknown to v2 scheme, trying legacy");
        match self.get_session_legacy(session_id).await? {
            Some(detail) => Ok(detail.into()),
            None => Err(ClientError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Ask the backend to resume suspended compute.
    pub async fn resume_session(&self, session_id: &str) -> ClientResult<()> {
        let response = self
            .request(Method::POST, &format!("/api/sessions/{}/resume", session_id))?
            .send()
            .await?;
        expect_success(response).await
    }

    /// Stop a session's compute.
    pub async fn stop_session(&self, session_id: &str) -> ClientResult<()> {
        let response = self
            .request(Method::POST, &format!("/api/sessions/{}/stop", session_id))?
            .send()
            .await?;
        expect_success(response).await
    }

    /// Delete a session.
    pub async fn delete_session(&self, session_id: &str) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &format!("/api/sessions/{}", session_id))?
            .send()
            .await?;
        expect_success(response).await
    }

    /// Fetch historical events starting after the given watermark.
    pub async fn fetch_events(
        &self,
        session_id: &str,
        start_id: i64,
        limit: u32,
    ) -> ClientResult<EventsPage> {
        let path = format!(
            "/api/sessions/{}/events?start_id={}&limit={}",
            session_id, start_id, limit
        );
        let response = self.request(Method::GET, &path)?.send().await?;
        handle_response(response).await
    }

    /// List sessions, paged.
    pub async fn list_sessions(&self, page: u32, per_page: u32) -> ClientResult<SessionPage> {
        let path = format!("/api/sessions?page={}&per_page={}", page, per_page);
        let response = self.request(Method::GET, &path)?.send().await?;
        handle_response(response).await
    }
}

/// Parse a JSON success body or map the failure status into a typed error.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(ClientError::Request);
    }
    Err(error_for(status, response).await)
}

/// Accept any 2xx, discarding the body.
async fn expect_success(response: reqwest::Response) -> ClientResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(error_for(status, response).await)
}

async fn error_for(status: StatusCode, response: reqwest::Response) -> ClientError {
    if status == StatusCode::UNAUTHORIZED {
        return ClientError::AuthRequired;
    }
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}
