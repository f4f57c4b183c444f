//! Instance models.

use super::call::Call;
use common::secret::{serialize_exposed, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// AVS version currently shipped in the mobile clients.
pub const ZCALL_SUPPORT_VERSION: &str = "8.2.29";
/// Latest AVS version.
pub const ZCALL_CURRENT_VERSION: &str = "9.8.15";
/// Firefox ESR.
pub const FIREFOX_SUPPORT_VERSION: &str = "91.8.0esr";
/// Firefox version closest to the Selenium grid.
pub const FIREFOX_CURRENT_VERSION: &str = "104.0";
/// Chrome version in released desktop clients.
pub const CHROME_SUPPORT_VERSION: &str = "102.0.5005.115";
/// Chrome version closest to the Selenium grid.
pub const CHROME_CURRENT_VERSION: &str = "103.0.5060.53";

/// Default server-side instance start timeout in milliseconds.
pub const DEFAULT_INSTANCE_TIMEOUT_MS: u64 = 180_000;

/// Lifecycle status reported by the calling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    NonExistent,
    Starting,
    Started,
    Destroying,
    Destroyed,
    Error,
}

/// Coarse lifecycle phase of an instance as observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePhase {
    /// Creation requested, not yet usable.
    Requested,
    /// Accepting call operations.
    Running,
    /// Torn down or being torn down.
    Destroyed,
    /// The backend reported a failure.
    Failed,
}

impl InstanceStatus {
    /// Map the server status onto the client-side phase.
    pub fn phase(self) -> InstancePhase {
        match self {
            InstanceStatus::NonExistent | InstanceStatus::Starting => InstancePhase::Requested,
            InstanceStatus::Started => InstancePhase::Running,
            InstanceStatus::Destroying | InstanceStatus::Destroyed => InstancePhase::Destroyed,
            InstanceStatus::Error => InstancePhase::Failed,
        }
    }

    /// Whether the instance accepts call operations.
    pub fn is_running(self) -> bool {
        self.phase() == InstancePhase::Running
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceStatus::NonExistent => "NON_EXISTENT",
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Started => "STARTED",
            InstanceStatus::Destroying => "DESTROYING",
            InstanceStatus::Destroyed => "DESTROYED",
            InstanceStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A remote simulated calling client.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Instance {
    /// Server-assigned identifier.
    pub id: String,

    /// Server-reported lifecycle status.
    pub status: InstanceStatus,

    /// Display name given at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Account the instance is logged in as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Client type, e.g. "chrome" or "zcall".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    /// Call currently running on the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_call: Option<Call>,

    /// Live preview frame, base64 (optionally as a `data:` URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl Instance {
    /// Reference an instance by id, e.g. one learned out of band.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: InstanceStatus::Started,
            name: None,
            email: None,
            instance_type: None,
            current_call: None,
            screenshot: None,
        }
    }

    /// Whether the display name contains `pattern`. Unnamed instances never match.
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name.as_deref().is_some_and(|name| name.contains(pattern))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("instance_type", &self.instance_type)
            .field("current_call", &self.current_call)
            .field(
                "screenshot",
                &self.screenshot.as_ref().map(|s| format!("<{} bytes>", s.len())),
            )
            .finish()
    }
}

/// Kind of simulated client to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceType {
    Chrome,
    Firefox,
    Zcall,
    ZcallV3,
}

impl InstanceType {
    /// Version used when none is requested.
    pub fn current_version(self) -> &'static str {
        match self {
            InstanceType::Chrome => CHROME_CURRENT_VERSION,
            InstanceType::Firefox => FIREFOX_CURRENT_VERSION,
            InstanceType::Zcall | InstanceType::ZcallV3 => ZCALL_CURRENT_VERSION,
        }
    }

    /// Version matching what released clients ship.
    pub fn support_version(self) -> &'static str {
        match self {
            InstanceType::Chrome => CHROME_SUPPORT_VERSION,
            InstanceType::Firefox => FIREFOX_SUPPORT_VERSION,
            InstanceType::Zcall | InstanceType::ZcallV3 => ZCALL_SUPPORT_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseInstanceTypeError {
    #[error("Unknown instance type: {0}")]
    UnknownType(String),

    #[error("Empty version in instance type: {0}")]
    EmptyVersion(String),
}

impl FromStr for InstanceType {
    type Err = ParseInstanceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(InstanceType::Chrome),
            "firefox" => Ok(InstanceType::Firefox),
            "zcall" => Ok(InstanceType::Zcall),
            "zcall_v3" => Ok(InstanceType::ZcallV3),
            _ => Err(ParseInstanceTypeError::UnknownType(s.to_string())),
        }
    }
}

/// Instance type pinned to a client version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedInstanceType {
    pub instance_type: InstanceType,
    pub version: String,
}

impl VersionedInstanceType {
    /// Parse `type` or `type:version`.
    ///
    /// A bare type resolves to its current version; the version `support`
    /// resolves to the version shipped in released clients.
    pub fn parse(value: &str) -> Result<Self, ParseInstanceTypeError> {
        let lower = value.trim().to_ascii_lowercase();
        match lower.split_once(':') {
            Some((kind, version)) => {
                let instance_type: InstanceType = kind.parse()?;
                let version = match version.trim() {
                    "" => return Err(ParseInstanceTypeError::EmptyVersion(value.to_string())),
                    "support" => instance_type.support_version().to_string(),
                    other => other.to_string(),
                };
                Ok(Self {
                    instance_type,
                    version,
                })
            }
            None => {
                let instance_type: InstanceType = lower.parse()?;
                Ok(Self {
                    instance_type,
                    version: instance_type.current_version().to_string(),
                })
            }
        }
    }
}

/// Parameters for starting a new instance.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    /// Account email the instance logs in with.
    pub email: String,

    /// Account password.
    #[serde(serialize_with = "serialize_exposed")]
    pub password: SecretString,

    /// Second-factor code, for backends that require one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,

    /// Backend the account lives on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    pub instance_type: InstanceType,

    pub version: String,

    /// Display name, usually "<platform>: <scenario>".
    pub name: String,

    /// Use the beta web app.
    pub beta: bool,

    /// Server-side start timeout in milliseconds.
    pub timeout: u64,
}

impl InstanceRequest {
    /// Create a request with the default timeout and no beta opt-in.
    pub fn new(
        email: impl Into<String>,
        password: SecretString,
        instance_type: VersionedInstanceType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password,
            verification_code: None,
            backend: None,
            instance_type: instance_type.instance_type,
            version: instance_type.version,
            name: name.into(),
            beta: false,
            timeout: DEFAULT_INSTANCE_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_verification_code(mut self, code: impl Into<String>) -> Self {
        self.verification_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    #[must_use]
    pub fn with_beta(mut self, beta: bool) -> Self {
        self.beta = beta;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for InstanceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field(
                "verification_code",
                &self.verification_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("backend", &self.backend)
            .field("instance_type", &self.instance_type)
            .field("version", &self.version)
            .field("name", &self.name)
            .field("beta", &self.beta)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::CallStatus;

    #[test]
    fn test_instance_deserialization_minimal() {
        let json = r#"{"id": "abc123", "status": "STARTING"}"#;

        let instance: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.id, "abc123");
        assert_eq!(instance.status, InstanceStatus::Starting);
        assert!(instance.current_call.is_none());
    }

    #[test]
    fn test_instance_deserialization_with_current_call() {
        let json = r#"{
            "id": "abc123",
            "status": "STARTED",
            "name": "Android: Group call",
            "email": "alice@example.com",
            "instanceType": "chrome",
            "currentCall": {"id": "call-1", "status": "ESTABLISHED"}
        }"#;

        let instance: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.name.as_deref(), Some("Android: Group call"));
        assert_eq!(instance.instance_type.as_deref(), Some("chrome"));
        let call = instance.current_call.unwrap();
        assert_eq!(call.id, "call-1");
        assert_eq!(call.status, CallStatus::Established);
    }

    #[test]
    fn test_instance_rejects_unknown_fields() {
        let json = r#"{"id": "abc123", "status": "STARTED", "surprise": true}"#;

        let err = serde_json::from_str::<Instance>(json).unwrap_err();
        assert!(err.to_string().contains("surprise"));
    }

    #[test]
    fn test_instance_rejects_unknown_status() {
        let json = r#"{"id": "abc123", "status": "HIBERNATING"}"#;
        assert!(serde_json::from_str::<Instance>(json).is_err());
    }

    #[test]
    fn test_instance_debug_elides_screenshot() {
        let mut instance = Instance::with_id("abc123");
        instance.screenshot = Some("iVBORw0KGgoAAAANSUhEUgAA".to_string());

        let debug_output = format!("{:?}", instance);
        assert!(!debug_output.contains("iVBORw0KGgo"));
        assert!(debug_output.contains("<24 bytes>"));
    }

    #[test]
    fn test_name_contains() {
        let mut instance = Instance::with_id("abc123");
        assert!(!instance.name_contains("Android"));

        instance.name = Some("Android: Group call".to_string());
        assert!(instance.name_contains("Android"));
        assert!(!instance.name_contains("iOS"));
    }

    #[test]
    fn test_status_phases() {
        assert_eq!(InstanceStatus::Starting.phase(), InstancePhase::Requested);
        assert_eq!(InstanceStatus::Started.phase(), InstancePhase::Running);
        assert_eq!(InstanceStatus::Destroying.phase(), InstancePhase::Destroyed);
        assert_eq!(InstanceStatus::Error.phase(), InstancePhase::Failed);
        assert!(InstanceStatus::Started.is_running());
        assert!(!InstanceStatus::Destroyed.is_running());
    }

    #[test]
    fn test_status_display_matches_wire_name() {
        assert_eq!(InstanceStatus::NonExistent.to_string(), "NON_EXISTENT");
        let json = serde_json::to_string(&InstanceStatus::NonExistent).unwrap();
        assert_eq!(json, "\"NON_EXISTENT\"");
    }

    #[test]
    fn test_versioned_type_bare_resolves_current() {
        let parsed = VersionedInstanceType::parse("Chrome").unwrap();
        assert_eq!(parsed.instance_type, InstanceType::Chrome);
        assert_eq!(parsed.version, CHROME_CURRENT_VERSION);

        let parsed = VersionedInstanceType::parse("zcall_v3").unwrap();
        assert_eq!(parsed.instance_type, InstanceType::ZcallV3);
        assert_eq!(parsed.version, ZCALL_CURRENT_VERSION);
    }

    #[test]
    fn test_versioned_type_support_alias() {
        let parsed = VersionedInstanceType::parse("firefox:support").unwrap();
        assert_eq!(parsed.instance_type, InstanceType::Firefox);
        assert_eq!(parsed.version, FIREFOX_SUPPORT_VERSION);
    }

    #[test]
    fn test_versioned_type_explicit_version() {
        let parsed = VersionedInstanceType::parse("zcall:9.1.0").unwrap();
        assert_eq!(parsed.instance_type, InstanceType::Zcall);
        assert_eq!(parsed.version, "9.1.0");
    }

    #[test]
    fn test_versioned_type_rejects_unknown() {
        assert_eq!(
            VersionedInstanceType::parse("safari"),
            Err(ParseInstanceTypeError::UnknownType("safari".to_string()))
        );
        assert!(matches!(
            VersionedInstanceType::parse("chrome:"),
            Err(ParseInstanceTypeError::EmptyVersion(_))
        ));
    }

    #[test]
    fn test_instance_request_serialization() {
        let request = InstanceRequest::new(
            "alice@example.com",
            SecretString::from("hunter2"),
            VersionedInstanceType::parse("zcall").unwrap(),
            "Android: Incoming call",
        )
        .with_backend("staging")
        .with_beta(true);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"email\":\"alice@example.com\""));
        assert!(json.contains("\"password\":\"hunter2\""));
        assert!(json.contains("\"instanceType\":\"zcall\""));
        assert!(json.contains("\"version\":\"9.8.15\""));
        assert!(json.contains("\"backend\":\"staging\""));
        assert!(json.contains("\"beta\":true"));
        assert!(json.contains("\"timeout\":180000"));
        assert!(!json.contains("verificationCode"));
    }

    #[test]
    fn test_instance_request_debug_redacts_credentials() {
        let request = InstanceRequest::new(
            "alice@example.com",
            SecretString::from("super-secret-password"),
            VersionedInstanceType::parse("chrome").unwrap(),
            "scenario",
        )
        .with_verification_code("123456");

        let debug_output = format!("{:?}", request);
        assert!(debug_output.contains("alice@example.com"));
        assert!(!debug_output.contains("super-secret-password"));
        assert!(!debug_output.contains("123456"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
