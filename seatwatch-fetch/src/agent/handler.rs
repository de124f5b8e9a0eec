//! Capability-scoped message handlers.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AgentMessage, AgentReply, CookieStringPayload, GetCookiePayload, GET_COOKIE};
use crate::error::AgentError;
use crate::host::cookie_store::{cookies_to_header, CookieStore};

/// What a handler is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read cookies from the user's browser profiles.
    ReadCookies,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadCookies => f.write_str("read_cookies"),
        }
    }
}

/// Handles one message type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// The message type this handler answers.
    fn message_type(&self) -> &'static str;

    /// The capability the handler needs.
    fn capability(&self) -> Capability;

    /// Handles a payload and returns the reply payload.
    async fn handle(&self, payload: Value) -> Result<Value, AgentError>;
}

// ============================================================================
// Handler Table
// ============================================================================

/// Dispatches messages by type, limited to granted capabilities.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<&'static str, Arc<dyn MessageHandler>>,
    granted: HashSet<Capability>,
}

impl HandlerTable {
    /// Creates an empty table with no capabilities granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any handler for the same type.
    pub fn register(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(handler.message_type(), handler);
        self
    }

    /// Grants a capability.
    pub fn grant(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }

    /// Creates the table a cookie-reading agent uses.
    pub fn cookie_agent(store: CookieStore) -> Self {
        Self::new()
            .register(Arc::new(CookieHandler::new(store)))
            .grant(Capability::ReadCookies)
    }

    /// Routes a message to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedMessage`] for unknown types,
    /// [`AgentError::CapabilityDenied`] for handlers whose capability was
    /// not granted, or the handler's own error.
    pub async fn route(&self, message: &AgentMessage) -> Result<Value, AgentError> {
        let handler = self
            .handlers
            .get(message.message_type.as_str())
            .ok_or_else(|| AgentError::UnsupportedMessage(message.message_type.clone()))?;

        let capability = handler.capability();
        if !self.granted.contains(&capability) {
            warn!(message_type = %message.message_type, capability = %capability, "Capability not granted");
            return Err(AgentError::CapabilityDenied(capability.to_string()));
        }

        debug!(message_type = %message.message_type, "Dispatching agent message");
        handler.handle(message.payload.clone()).await
    }

    /// Routes a message and wraps the outcome in a reply envelope.
    pub async fn dispatch(&self, message: &AgentMessage) -> AgentReply {
        match self.route(message).await {
            Ok(payload) => AgentReply::ok(payload),
            Err(e) => AgentReply::failed(e.to_string()),
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .field("granted", &self.granted)
            .finish()
    }
}

// ============================================================================
// Cookie Handler
// ============================================================================

/// Answers [`GET_COOKIE`] from the installed browsers' cookie stores.
#[derive(Debug, Clone, Default)]
pub struct CookieHandler {
    store: CookieStore,
}

impl CookieHandler {
    /// Creates a handler reading from `store`.
    pub fn new(store: CookieStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageHandler for CookieHandler {
    fn message_type(&self) -> &'static str {
        GET_COOKIE
    }

    fn capability(&self) -> Capability {
        Capability::ReadCookies
    }

    async fn handle(&self, payload: Value) -> Result<Value, AgentError> {
        let request: GetCookiePayload = serde_json::from_value(payload)
            .map_err(|e| AgentError::Protocol(format!("invalid GET_COOKIE payload: {e}")))?;

        let (browser, cookies) = self.store.first_domain_cookies(&request.domain).await?;
        debug!(browser = %browser, count = cookies.len(), "Read cookies for agent request");

        serde_json::to_value(CookieStringPayload {
            cookie_string: cookies_to_header(&cookies),
        })
        .map_err(|e| AgentError::Protocol(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        fn message_type(&self) -> &'static str {
            "ECHO"
        }

        fn capability(&self) -> Capability {
            Capability::ReadCookies
        }

        async fn handle(&self, payload: Value) -> Result<Value, AgentError> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn test_dispatch_granted() {
        let table = HandlerTable::new()
            .register(Arc::new(EchoHandler))
            .grant(Capability::ReadCookies);

        let reply = table.dispatch(&AgentMessage::new("ECHO", json!({"x": 1}))).await;
        assert!(reply.success);
        assert_eq!(reply.payload, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_dispatch_without_grant() {
        let table = HandlerTable::new().register(Arc::new(EchoHandler));

        let err = table
            .route(&AgentMessage::new("ECHO", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::CapabilityDenied(_)));

        let reply = table.dispatch(&AgentMessage::new("ECHO", json!({}))).await;
        assert!(!reply.success);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_type() {
        let table = HandlerTable::new().grant(Capability::ReadCookies);
        let err = table
            .route(&AgentMessage::new("OPEN_TAB", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedMessage(ref t) if t == "OPEN_TAB"));
    }

    #[tokio::test]
    async fn test_cookie_handler_rejects_bad_payload() {
        let handler = CookieHandler::default();
        let err = handler.handle(json!({"host": "x"})).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }
}
