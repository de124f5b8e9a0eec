//! Installed agent messaging.
//!
//! An agent is a trusted helper with access to the user's real browser.
//! Requests and replies share one envelope regardless of transport:
//!
//! ```text
//! -> { "type": "GET_COOKIE", "payload": { "domain": "ticketmaster.nl" } }
//! <- { "success": true, "payload": { "cookieString": "a=1; b=2" } }
//! ```

mod handler;
mod transport;

pub use handler::{Capability, CookieHandler, HandlerTable, MessageHandler};
pub use transport::{AgentTransport, HttpAgentTransport, LocalAgentTransport};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::AgentError;

/// Message type asking for the cookie string of a domain.
pub const GET_COOKIE: &str = "GET_COOKIE";

// ============================================================================
// Envelope
// ============================================================================

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message type, e.g. [`GET_COOKIE`].
    #[serde(rename = "type")]
    pub message_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl AgentMessage {
    /// Creates a message.
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }

    /// Creates a [`GET_COOKIE`] request for `domain`.
    pub fn get_cookie(domain: &str) -> Self {
        Self::new(GET_COOKIE, serde_json::json!({ "domain": domain }))
    }
}

/// Reply envelope.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Whether the handler succeeded.
    pub success: bool,
    /// Type-specific payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentReply {
    /// Creates a success reply.
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Creates a failure reply.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

impl std::fmt::Debug for AgentReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentReply")
            .field("success", &self.success)
            .field("has_payload", &self.payload.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Payload of a [`GET_COOKIE`] request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCookiePayload {
    /// Cookie domain.
    pub domain: String,
}

/// Payload of a successful [`GET_COOKIE`] reply.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieStringPayload {
    /// `name=value; ...` for the requested domain.
    pub cookie_string: String,
}

// ============================================================================
// Requests
// ============================================================================

/// Asks an agent for the cookie string of `domain`.
///
/// # Errors
///
/// Returns the transport's error, [`AgentError::Rejected`] for a failed
/// reply, or [`AgentError::Protocol`] for a reply without a cookie string.
#[instrument(skip(transport), fields(transport = transport.name()))]
pub async fn request_cookie(
    transport: &dyn AgentTransport,
    domain: &str,
) -> Result<String, AgentError> {
    let reply = transport.send(&AgentMessage::get_cookie(domain)).await?;

    if !reply.success {
        let reason = reply.error.unwrap_or_else(|| "no reason given".to_string());
        debug!(reason = %reason, "Agent declined cookie request");
        return Err(AgentError::Rejected(reason));
    }

    let payload = reply
        .payload
        .ok_or_else(|| AgentError::Protocol("reply has no payload".to_string()))?;
    let parsed: CookieStringPayload = serde_json::from_value(payload)
        .map_err(|e| AgentError::Protocol(format!("unexpected payload: {e}")))?;

    debug!(length = parsed.cookie_string.len(), "Agent returned cookie string");
    Ok(parsed.cookie_string)
}

// ============================================================================
// Tests
// ============================================================================
