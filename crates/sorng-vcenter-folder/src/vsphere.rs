//! vCenter HTTP client with session-based authentication.
//!
//! Sessions are created through the Automation API (`/api/session`); the
//! same session id is accepted by the VI/JSON API under
//! `/sdk/vim25/{release}/...`, which is where folder methods live.

use crate::error::{FolderError, FolderErrorKind, FolderResult};
use crate::types::{ObjectRef, VsphereConfig};

use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// vCenter HTTP client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> FolderResult<Self> {
        if config.host.trim().is_empty() {
            return Err(FolderError::config("missing required argument: hostname"));
        }
        // A full URL (scheme included) is taken as-is; a bare host gets https and the port.
        let address = if config.host.contains("://") {
            config.host.clone()
        } else {
            format!("https://{}:{}", config.host, config.port)
        };
        let base = Url::parse(&address)
            .map_err(|e| FolderError::config(format!("Invalid vCenter address '{}': {e}", config.host)))?;

        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FolderError::connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            session_id: None,
            config: config.clone(),
        })
    }

    /// Base URL for API calls.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current config.
    pub fn config(&self) -> &VsphereConfig {
        &self.config
    }

    /// Path of a VI/JSON property or method on a managed object.
    pub fn vim_path(&self, obj: &ObjectRef, member: &str) -> String {
        format!(
            "/sdk/vim25/{}/{}/{}/{}",
            self.config.api_release, obj.kind, obj.value, member
        )
    }

    // ── Session management ──────────────────────────────────────────

    /// Create a new API session (POST /api/session).
    pub async fn login(&mut self) -> FolderResult<()> {
        let url = format!("{}/api/session", self.base_url);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(FolderError::auth("Invalid credentials"));
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FolderError::api(
                status.as_u16(),
                format!("Login failed: {body}"),
            ));
        }

        // Session ID comes back as a quoted JSON string
        let session_id: String = resp.json().await.map_err(|e| {
            FolderError::parse(format!("Failed to parse session response: {e}"))
        })?;

        debug!("vCenter session established with {}", self.config.host);
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Delete the current session (DELETE /api/session).
    pub async fn logout(&mut self) -> FolderResult<()> {
        if let Some(ref sid) = self.session_id {
            let url = format!("{}/api/session", self.base_url);
            let _ = self
                .client
                .delete(&url)
                .header(SESSION_HEADER, sid.as_str())
                .send()
                .await;
        }
        self.session_id = None;
        Ok(())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn require_session(&self) -> FolderResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| FolderError::auth("Not logged in, no active session"))
    }

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> FolderResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// GET a JSON response with query params (borrowed).
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> FolderResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .query(&borrowed)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with JSON body, return parsed response.
    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> FolderResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header(SESSION_HEADER, sid)
            .json(body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with no body, return parsed response.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> FolderResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header(SESSION_HEADER, sid)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> FolderResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();

        // VI/JSON reports method faults as a JSON object tagged with `_typeName`
        if let Some(fault) = parse_fault(&body) {
            return Err(fault);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(FolderError::auth(format!("Session expired or invalid: {body}"))),
            StatusCode::FORBIDDEN => Err(FolderError::new(
                FolderErrorKind::AccessDenied,
                format!("Access denied: {body}"),
            )),
            StatusCode::NOT_FOUND => Err(FolderError::new(
                FolderErrorKind::ManagedObjectNotFound,
                format!("Resource not found: {body}"),
            )),
            _ => Err(FolderError::api(code, format!("API error {code}: {body}"))),
        }
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> FolderResult<T> {
        let text = resp.text().await.map_err(|e| {
            FolderError::parse(format!("Failed to read response body: {e}"))
        })?;

        if text.is_empty() {
            // Unset properties (e.g. the root folder's parent) come back empty
            return serde_json::from_str("null").map_err(|e| {
                FolderError::parse(format!("Cannot deserialise empty response: {e}"))
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            FolderError::parse(format!("JSON parse error: {e}, body: {}", truncate(&text, 500)))
        })
    }
}

/// Turn a VI/JSON fault body into a tagged error, if it is one.
pub fn parse_fault(body: &str) -> Option<FolderError> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    fault_from_value(&value)
}

/// Same as [`parse_fault`] for an already-parsed fault object.
pub fn fault_from_value(value: &serde_json::Value) -> Option<FolderError> {
    let type_name = value.get("_typeName")?.as_str()?;
    Some(FolderError::fault(type_name, fault_message(type_name, value)))
}

fn fault_message(type_name: &str, value: &serde_json::Value) -> String {
    if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
        return msg.to_string();
    }
    let localized: Vec<&str> = value
        .get("faultMessage")
        .and_then(|m| m.as_array())
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.get("message").and_then(|s| s.as_str()))
                .collect()
        })
        .unwrap_or_default();
    if !localized.is_empty() {
        return localized.join("; ");
    }
    match value.get("name").and_then(|n| n.as_str()) {
        Some(name) => format!("{type_name}: {name}"),
        None => type_name.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
