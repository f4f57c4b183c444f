//! HTTP transport for the calling service control plane.
//!
//! Every request carries basic auth and, when the target instance is known,
//! its sticky cookie. Responses are checked against the set of status codes
//! the caller declared acceptable; a code outside that set is an error even
//! when it is a 2xx, and a 4xx/5xx inside it is a normal result.
//!
//! Idle connections are never pooled, so each exchange releases its
//! connection once the response body has been read or dropped.

use crate::affinity::StickyCookie;
use crate::config::ClientConfig;
use crate::errors::HttpError;
use bytes::Bytes;
use common::secret::{ExposeSecret, SecretString};
use regex::{Captures, Regex};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

/// Bodies longer than this are elided in logs unless verbose logging is on.
pub const LOG_BODY_LIMIT: usize = 100;

/// Maximum length for error body in error messages.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Basic credentials echoed back by proxies or error pages.
static BASIC_AUTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Constant pattern, covered by tests
    Regex::new(r"(?i)\bbasic\s+([A-Za-z0-9+/]{8,}={0,2})").expect("basic auth pattern is valid")
});

/// A credential is base64, so its length is a multiple of four. Prose such
/// as "basic authentication" is left alone.
fn redact_basic_credential(caps: &Captures<'_>) -> String {
    let whole = caps.get(0).map_or("", |m| m.as_str());
    match caps.get(1) {
        Some(token) if token.as_str().len() % 4 == 0 => "[BASIC_REDACTED]".to_string(),
        _ => whole.to_string(),
    }
}

/// Redact credentials from an error body and cap its length.
pub(crate) fn sanitize_error_body(body: &str) -> String {
    let sanitized = BASIC_AUTH_PATTERN.replace_all(body, redact_basic_credential);

    if sanitized.chars().count() > MAX_ERROR_BODY_LEN {
        let truncated: String = sanitized.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{truncated}...[truncated]")
    } else {
        sanitized.into_owned()
    }
}

/// Shorten a body for logging.
pub(crate) fn truncate_for_log(text: &str, verbose: bool) -> Cow<'_, str> {
    if verbose || text.chars().count() <= LOG_BODY_LIMIT {
        return Cow::Borrowed(text);
    }
    let head: String = text.chars().take(LOG_BODY_LIMIT).collect();
    Cow::Owned(format!("{head}..."))
}

/// Content negotiation for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// `Content-Type` and `Accept` set to `application/json`.
    Json,
    /// `Content-Type` and `Accept` set to `text/plain`.
    PlainText,
    /// No negotiation headers; the body is treated as opaque bytes.
    Unspecified,
}

impl MediaType {
    fn header_value(self) -> Option<&'static str> {
        match self {
            MediaType::Json => Some("application/json"),
            MediaType::PlainText => Some("text/plain"),
            MediaType::Unspecified => None,
        }
    }
}

/// A request against a path below the service base URL.
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<String>,
    /// Logged in place of `body` when the wire body carries credentials.
    redacted_body: Option<String>,
    media_type: MediaType,
    affinity: Option<StickyCookie>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.loggable_body())
            .field("media_type", &self.media_type)
            .field("affinity", &self.affinity)
            .finish()
    }
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            redacted_body: None,
            media_type: MediaType::Json,
            affinity: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::POST, path, Some(body.into()))
    }

    pub fn put(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::PUT, path, Some(body.into()))
    }

    #[must_use]
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    /// Route the request to the shard named by `cookie`, if any.
    #[must_use]
    pub fn with_affinity(mut self, cookie: Option<StickyCookie>) -> Self {
        self.affinity = cookie;
        self
    }

    /// Log `summary` instead of the wire body.
    #[must_use]
    pub fn with_redacted_body(mut self, summary: impl Into<String>) -> Self {
        self.redacted_body = Some(summary.into());
        self
    }

    fn loggable_body(&self) -> Option<&str> {
        self.redacted_body.as_deref().or(self.body.as_deref())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn affinity(&self) -> Option<&StickyCookie> {
        self.affinity.as_ref()
    }
}

/// A response whose status was in the acceptable set.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Cookies set by the response, in header order.
    pub cookies: Vec<StickyCookie>,
}

impl HttpResponse {
    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First cookie set under `name`.
    pub fn cookie(&self, name: &str) -> Option<&StickyCookie> {
        self.cookies.iter().find(|cookie| cookie.name == name)
    }
}

/// Authenticated HTTP access to the calling service.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    base_url: String,
    user: String,
    password: SecretString,
    verbose: bool,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build the transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                error!(target: "calling.transport", error = %e, "Failed to build HTTP client");
                HttpError::ClientBuild(e)
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            user: config.basic_auth_user.clone(),
            password: config.basic_auth_password.clone(),
            verbose: config.verbose_logging,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and validate its status against `acceptable`.
    ///
    /// # Errors
    ///
    /// - `HttpError::Transport` if no response was received
    /// - `HttpError::BodyRead` if a successful response body could not be read
    /// - `HttpError::Unauthorized` on an unexpected 401
    /// - `HttpError::UnexpectedStatus` on any other code outside `acceptable`
    pub async fn send(
        &self,
        request: ApiRequest,
        acceptable: &[u16],
    ) -> Result<HttpResponse, HttpError> {
        let ApiRequest {
            method,
            path,
            body,
            redacted_body,
            media_type,
            affinity,
        } = request;
        let url = format!("{}{}", self.base_url, path);
        info!(target: "calling.transport", "{} {}", method, url);

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.user, Some(self.password.expose_secret()));
        if let Some(value) = media_type.header_value() {
            builder = builder.header(CONTENT_TYPE, value).header(ACCEPT, value);
        }
        if let Some(cookie) = &affinity {
            builder = builder.header(COOKIE, cookie.header_value());
        }
        let cookie_header = affinity.as_ref().map(StickyCookie::header_value);
        debug!(
            target: "calling.transport",
            authorization = "[REDACTED]",
            media_type = ?media_type,
            cookie = cookie_header.as_deref().unwrap_or("-"),
            "Request headers"
        );
        if let Some(body) = body {
            let logged = redacted_body.as_deref().unwrap_or(&body);
            info!(
                target: "calling.transport",
                request = %truncate_for_log(logged, self.verbose),
                ">>> Request"
            );
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(target: "calling.transport", method = %method, url = %url, error = %e, "Request failed");
            HttpError::Transport {
                method: method.to_string(),
                url: url.clone(),
                source: e,
            }
        })?;

        let status = response.status().as_u16();
        let cookies: Vec<StickyCookie> = response
            .cookies()
            .map(|cookie| StickyCookie::new(cookie.name(), cookie.value()))
            .collect();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if !(200..300).contains(&status) => {
                // Best effort: an unreadable error body is treated as empty.
                warn!(target: "calling.transport", status, error = %e, "Could not read error body");
                Bytes::new()
            }
            Err(e) => {
                error!(target: "calling.transport", status, error = %e, "Could not read response body");
                return Err(HttpError::BodyRead {
                    method: method.to_string(),
                    url,
                    status,
                    source: e,
                });
            }
        };

        if media_type == MediaType::Unspecified {
            info!(target: "calling.transport", status, bytes = body.len(), "<<< Response");
        } else {
            let text = String::from_utf8_lossy(&body);
            info!(
                target: "calling.transport",
                status,
                response = %truncate_for_log(&text, self.verbose),
                "<<< Response"
            );
        }

        if acceptable.contains(&status) {
            return Ok(HttpResponse {
                status,
                body,
                cookies,
            });
        }

        let text = String::from_utf8_lossy(&body);
        if status == 401 {
            error!(
                target: "calling.transport",
                method = %method,
                url = %url,
                "Not authorized by the calling service, check basic auth credentials"
            );
            return Err(HttpError::Unauthorized {
                body: sanitize_error_body(&text),
            });
        }

        error!(
            target: "calling.transport",
            method = %method,
            url = %url,
            status,
            expected = ?acceptable,
            "Unexpected response status"
        );
        Err(HttpError::UnexpectedStatus {
            status,
            expected: acceptable.to_vec(),
            body: sanitize_error_body(&text),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_redacts_basic_credentials() {
        let body = "upstream rejected Authorization: Basic cWE6aHVudGVyMg== for /api";
        let sanitized = sanitize_error_body(body);

        assert!(!sanitized.contains("cWE6aHVudGVyMg=="));
        assert!(sanitized.contains("[BASIC_REDACTED]"));
        assert!(sanitized.contains("for /api"));
    }

    #[test]
    fn test_sanitize_keeps_diagnostic_prose() {
        for body in [
            "Invalid basic auth",
            "basic authentication required",
            "Basic credentials missing",
        ] {
            assert_eq!(sanitize_error_body(body), body);
        }
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let sanitized = sanitize_error_body(&body);

        assert!(sanitized.ends_with("...[truncated]"));
        assert_eq!(
            sanitized.len(),
            MAX_ERROR_BODY_LEN + "...[truncated]".len()
        );
    }

    #[test]
    fn test_sanitize_keeps_short_bodies() {
        assert_eq!(sanitize_error_body("no such instance"), "no such instance");
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = "ü".repeat(300);
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.starts_with("üü"));
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_truncate_for_log() {
        let long = "a".repeat(150);

        let truncated = truncate_for_log(&long, false);
        assert_eq!(truncated.len(), LOG_BODY_LIMIT + 3);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_for_log(&long, true), long.as_str());
        assert_eq!(truncate_for_log("short", false), "short");
    }

    #[test]
    fn test_api_request_defaults() {
        let request = ApiRequest::get("/api/v1/instance/abc/status");

        assert_eq!(request.path(), "/api/v1/instance/abc/status");
        assert_eq!(request.media_type, MediaType::Json);
        assert!(request.affinity().is_none());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_api_request_builders() {
        let request = ApiRequest::put("/api/v1/instance/abc/destroy", "")
            .with_media_type(MediaType::PlainText)
            .with_affinity(Some(StickyCookie::new("SERVERID", "c2")));

        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.body.as_deref(), Some(""));
        assert_eq!(request.media_type, MediaType::PlainText);
        assert_eq!(
            request.affinity().map(StickyCookie::header_value),
            Some("SERVERID=c2".to_string())
        );
    }

    #[test]
    fn test_api_request_debug_uses_redacted_body() {
        let request = ApiRequest::post("/api/v1/instance/create", r#"{"password":"hunter2"}"#)
            .with_redacted_body("InstanceRequest { password: \"[REDACTED]\" }");

        let debug_output = format!("{request:?}");
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("[REDACTED]"));
        assert_eq!(request.body.as_deref(), Some(r#"{"password":"hunter2"}"#));
    }

    #[test]
    fn test_media_type_headers() {
        assert_eq!(MediaType::Json.header_value(), Some("application/json"));
        assert_eq!(MediaType::PlainText.header_value(), Some("text/plain"));
        assert_eq!(MediaType::Unspecified.header_value(), None);
    }

    #[test]
    fn test_response_cookie_lookup() {
        let response = HttpResponse {
            status: 200,
            body: Bytes::from_static(b"{}"),
            cookies: vec![
                StickyCookie::new("session", "xyz"),
                StickyCookie::new("SERVERID", "c2"),
            ],
        };

        assert_eq!(response.cookie("SERVERID").map(|c| c.value.as_str()), Some("c2"));
        assert!(response.cookie("missing").is_none());
        assert_eq!(response.text(), "{}");
    }

    #[test]
    fn test_transport_debug_redacts_password() {
        let config = ClientConfig::new(
            "http://localhost:8080",
            SecretString::from("very-secret-password"),
        );
        let transport = Transport::new(&config).unwrap();

        let debug_output = format!("{:?}", transport);
        assert!(!debug_output.contains("very-secret-password"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
