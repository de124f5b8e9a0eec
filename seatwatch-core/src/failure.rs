//! Caller-facing failure taxonomy.
//!
//! Every internal error is mapped onto [`PipelineError`] at the pipeline
//! boundary. Only a stable category and a short detail cross that
//! boundary; credentials never do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::CoreError;

// ============================================================================
// Session Failure Reason
// ============================================================================

/// Why a session credential could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFailureReason {
    /// The cookie string failed the plausibility check.
    IncompleteCredential,
    /// The installed agent could not be reached.
    AgentUnavailable,
    /// The agent answered but could not produce cookies.
    AgentRejected,
    /// The automated browser failed to launch or navigate.
    BrowserFailure,
    /// The proxy rejected the supplied credentials.
    ProxyAuthentication,
}

impl SessionFailureReason {
    /// Returns the human-readable reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncompleteCredential => "incomplete credential",
            Self::AgentUnavailable => "agent unavailable",
            Self::AgentRejected => "agent rejected request",
            Self::BrowserFailure => "browser failure",
            Self::ProxyAuthentication => "proxy authentication failed",
        }
    }
}

impl fmt::Display for SessionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pipeline Error
// ============================================================================

/// Terminal failure of one pipeline run.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// No event id could be extracted from the URL.
    #[error("Could not extract an event id from URL: {0}")]
    InvalidUrl(String),

    /// A required request field was absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Deployment misconfiguration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable session credential.
    #[error("Session acquisition failed ({reason}): {message}")]
    SessionAcquisition {
        /// Failure class.
        reason: SessionFailureReason,
        /// Operator-facing message.
        message: String,
    },

    /// The vendor API answered with a non-2xx status or was unreachable.
    #[error("Upstream error: {}", upstream_label(.status_code, .status_text))]
    Upstream {
        /// HTTP status, absent for transport failures.
        status_code: Option<u16>,
        /// Reason phrase or transport error summary.
        status_text: String,
    },

    /// The vendor's anti-bot layer rejected the request.
    #[error("The request was blocked by the vendor")]
    Blocked {
        /// Body as received, for operator logs only.
        raw_body: String,
    },

    /// The vendor returned non-JSON where JSON was expected.
    #[error("The vendor returned a non-JSON payload")]
    MalformedPayload {
        /// Body as received, for operator logs only.
        raw_body: String,
    },

    /// The overall request deadline elapsed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

fn upstream_label(status_code: &Option<u16>, status_text: &str) -> String {
    match status_code {
        Some(code) => format!("HTTP {code} {status_text}"),
        None => status_text.to_string(),
    }
}

impl PipelineError {
    /// Stable category string for callers and dashboards.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::MissingField(_) => "missing_field",
            Self::Configuration(_) => "configuration_error",
            Self::SessionAcquisition { .. } => "session_acquisition_failed",
            Self::Upstream { .. } => "upstream_error",
            Self::Blocked { .. } => "blocked",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::Timeout(_) => "timeout",
        }
    }

    /// HTTP-equivalent status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl(_) | Self::MissingField(_) => 400,
            Self::Timeout(_) => 504,
            _ => 500,
        }
    }

    /// Returns true if re-running the whole pipeline may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SessionAcquisition { .. } | Self::Blocked { .. } | Self::Timeout(_)
        ) || matches!(self, Self::Upstream { status_code, .. } if status_code.is_none_or(|c| c >= 500))
    }

    /// Builds the outbound error envelope.
    ///
    /// Configuration details are operator-facing and are not echoed.
    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            Self::Configuration(_) => Some("server misconfiguration; see operator logs".to_string()),
            Self::Blocked { .. } | Self::MalformedPayload { .. } | Self::Timeout(_) => {
                Some(self.to_string())
            }
            Self::SessionAcquisition { reason, .. } => Some(reason.as_str().to_string()),
            Self::MissingField(field) => Some(format!("{field} is required")),
            Self::InvalidUrl(_) | Self::Upstream { .. } => Some(self.to_string()),
        };

        ErrorResponse {
            error: self.category().to_string(),
            details,
        }
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidUrl(url) => Self::InvalidUrl(url),
            CoreError::InvalidConfig(msg) => Self::Configuration(msg),
            invalid @ CoreError::InvalidProxy(_) => Self::Configuration(invalid.to_string()),
            other => Self::MalformedPayload {
                raw_body: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Outbound error envelope: `{ "error": ..., "details": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error category.
    pub error: String,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(PipelineError::InvalidUrl("x".into()).status_code(), 400);
        assert_eq!(PipelineError::MissingField("cookie").status_code(), 400);
        assert_eq!(PipelineError::Configuration("x".into()).status_code(), 500);
        assert_eq!(
            PipelineError::Upstream {
                status_code: Some(403),
                status_text: "Forbidden".into()
            }
            .status_code(),
            500
        );
        assert_eq!(
            PipelineError::Timeout(Duration::from_secs(90)).status_code(),
            504
        );
    }

    #[test]
    fn test_configuration_details_hidden() {
        let err = PipelineError::Configuration("TM_COOKIE is not set".into());
        let response = err.to_response();
        assert_eq!(response.error, "configuration_error");
        assert!(!response.details.unwrap().contains("TM_COOKIE"));
    }

    #[test]
    fn test_blocked_response_omits_body() {
        let err = PipelineError::Blocked {
            raw_body: "<html>blocked ref=abc123</html>".into(),
        };
        let response = err.to_response();
        assert_eq!(response.error, "blocked");
        assert!(!response.details.unwrap().contains("abc123"));
    }

    #[test]
    fn test_session_response_uses_reason() {
        let err = PipelineError::SessionAcquisition {
            reason: SessionFailureReason::AgentUnavailable,
            message: "connection refused".into(),
        };
        let response = err.to_response();
        assert_eq!(response.error, "session_acquisition_failed");
        assert_eq!(response.details.as_deref(), Some("agent unavailable"));
    }

    #[test]
    fn test_response_serialization_skips_empty_details() {
        let response = ErrorResponse {
            error: "timeout".into(),
            details: None,
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"error":"timeout"}"#);
    }

    #[test]
    fn test_retryable() {
        assert!(PipelineError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!PipelineError::InvalidUrl("x".into()).is_retryable());
        assert!(
            PipelineError::Upstream {
                status_code: None,
                status_text: "connection reset".into()
            }
            .is_retryable()
        );
        assert!(
            !PipelineError::Upstream {
                status_code: Some(404),
                status_text: "Not Found".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_from_core_error() {
        let err: PipelineError = CoreError::InvalidUrl("https://x".into()).into();
        assert!(matches!(err, PipelineError::InvalidUrl(_)));

        let err: PipelineError = CoreError::InvalidConfig("bad provider".into()).into();
        assert!(matches!(err, PipelineError::Configuration(_)));

        let err: PipelineError = CoreError::InvalidProxy("bad escape".into()).into();
        assert!(matches!(err, PipelineError::Configuration(m) if m.contains("bad escape")));
    }
}
