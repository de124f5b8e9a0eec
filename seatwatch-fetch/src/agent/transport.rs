//! Agent transports.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{AgentMessage, AgentReply, HandlerTable};
use crate::error::{AgentError, HttpError};
use crate::host::http::HttpClient;

/// Carries an [`AgentMessage`] to an agent and returns its reply.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Sends one message.
    ///
    /// Returns [`AgentError::Unavailable`] when the agent cannot be reached.
    async fn send(&self, message: &AgentMessage) -> Result<AgentReply, AgentError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Posts the envelope to a separately running agent.
#[derive(Debug, Clone)]
pub struct HttpAgentTransport {
    client: HttpClient,
    url: String,
}

impl HttpAgentTransport {
    /// Creates a transport posting to `url`.
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, message), fields(url = %self.url, message_type = %message.message_type))]
    async fn send(&self, message: &AgentMessage) -> Result<AgentReply, AgentError> {
        let response = self
            .client
            .post_json(&self.url, message)
            .await
            .map_err(|e| match e {
                HttpError::Request(ref inner) if inner.is_connect() => {
                    AgentError::Unavailable(format!("cannot connect to agent at {}", self.url))
                }
                HttpError::Timeout => AgentError::Unavailable("agent did not answer in time".to_string()),
                other => AgentError::Unavailable(other.to_string()),
            })?;

        let status = response.status();
        debug!(status = %status, "Agent responded");
        if !status.is_success() {
            return Err(AgentError::Unavailable(format!("agent answered HTTP {status}")));
        }

        response
            .json::<AgentReply>()
            .await
            .map_err(|e| AgentError::Protocol(e.to_string()))
    }
}

// ============================================================================
// Local Transport
// ============================================================================

/// Runs the handler table in-process.
#[derive(Debug)]
pub struct LocalAgentTransport {
    table: HandlerTable,
}

impl LocalAgentTransport {
    /// Creates a transport over `table`.
    pub fn new(table: HandlerTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl AgentTransport for LocalAgentTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn send(&self, message: &AgentMessage) -> Result<AgentReply, AgentError> {
        match self.table.route(message).await {
            Ok(payload) => Ok(AgentReply::ok(payload)),
            // No readable profile is the in-process form of an unreachable agent.
            Err(e @ AgentError::Unavailable(_)) => Err(e),
            Err(e) => Ok(AgentReply::failed(e.to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
