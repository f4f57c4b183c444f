//! Call models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status of a call on one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    NonExistent,
    Started,
    Incoming,
    Answered,
    Established,
    Closed,
    Missed,
    Destroyed,
}

/// Coarse phase of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Ringing,
    Active,
    Terminated,
}

impl CallStatus {
    pub fn phase(self) -> CallPhase {
        match self {
            CallStatus::NonExistent => CallPhase::Idle,
            CallStatus::Started | CallStatus::Incoming => CallPhase::Ringing,
            CallStatus::Answered | CallStatus::Established => CallPhase::Active,
            CallStatus::Closed | CallStatus::Missed | CallStatus::Destroyed => {
                CallPhase::Terminated
            }
        }
    }

    /// Whether no further transitions are expected.
    pub fn is_terminal(self) -> bool {
        self.phase() == CallPhase::Terminated
    }

    fn wire_name(self) -> &'static str {
        match self {
            CallStatus::NonExistent => "NON_EXISTENT",
            CallStatus::Started => "STARTED",
            CallStatus::Incoming => "INCOMING",
            CallStatus::Answered => "ANSWERED",
            CallStatus::Established => "ESTABLISHED",
            CallStatus::Closed => "CLOSED",
            CallStatus::Missed => "MISSED",
            CallStatus::Destroyed => "DESTROYED",
        }
    }

    /// Parse a comma-separated status list as written in test scenarios.
    ///
    /// `READY` is an old alias meaning "no call running" and expands to
    /// `DESTROYED` and `NON_EXISTENT`.
    pub fn parse_list(value: &str) -> Result<Vec<CallStatus>, ParseCallStatusError> {
        let mut statuses = Vec::new();
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case("READY") {
                tracing::warn!(
                    target: "calling.calls",
                    "Call status READY is deprecated, use DESTROYED or NON_EXISTENT"
                );
                for status in [CallStatus::Destroyed, CallStatus::NonExistent] {
                    if !statuses.contains(&status) {
                        statuses.push(status);
                    }
                }
                continue;
            }
            let status: CallStatus = token.parse()?;
            if !statuses.contains(&status) {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown call status: {0}")]
pub struct ParseCallStatusError(pub String);

impl FromStr for CallStatus {
    type Err = ParseCallStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        [
            CallStatus::NonExistent,
            CallStatus::Started,
            CallStatus::Incoming,
            CallStatus::Answered,
            CallStatus::Established,
            CallStatus::Closed,
            CallStatus::Missed,
            CallStatus::Destroyed,
        ]
        .into_iter()
        .find(|status| status.wire_name() == normalized)
        .ok_or_else(|| ParseCallStatusError(s.to_string()))
    }
}

/// A call as reported by the calling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Call {
    pub id: String,

    pub status: CallStatus,

    /// Conversation the call belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Body of call-start and accept requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// How long the service waits for the call, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CallRequest {
    pub fn for_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
