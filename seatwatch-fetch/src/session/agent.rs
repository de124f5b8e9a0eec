//! Installed agent provider.

use async_trait::async_trait;
use seatwatch_core::{CredentialSource, SessionCredential};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument};

use super::{AcquireContext, SessionProvider};
use crate::agent::{request_cookie, AgentTransport};
use crate::context::ProviderKind;
use crate::error::{AgentError, SessionError};

/// Asks an installed agent for the user's vendor cookies.
#[derive(Clone)]
pub struct AgentProvider {
    transport: Arc<dyn AgentTransport>,
}

impl AgentProvider {
    /// Creates a provider using `transport`.
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }
}

impl std::fmt::Debug for AgentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProvider")
            .field("transport", &self.transport.name())
            .finish()
    }
}

#[async_trait]
impl SessionProvider for AgentProvider {
    fn id(&self) -> &str {
        "session.agent"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Agent
    }

    #[instrument(skip_all, fields(transport = self.transport.name()))]
    async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError> {
        let domain = ctx.settings.vendor.cookie_domain.as_str();
        let agent_deadline = Instant::now() + ctx.settings.agent.timeout;

        let cookie = match timeout_at(
            ctx.deadline.min(agent_deadline),
            request_cookie(self.transport.as_ref(), domain),
        )
        .await
        {
            Ok(reply) => reply?,
            Err(_) if ctx.deadline <= agent_deadline => return Err(SessionError::DeadlineElapsed),
            Err(_) => {
                return Err(AgentError::Unavailable("agent did not answer in time".to_string()).into());
            }
        };

        debug!(length = cookie.len(), "Agent supplied cookie string");
        Ok(SessionCredential::new(cookie, domain, CredentialSource::InstalledAgent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentMessage, AgentReply};
    use crate::context::{AgentSettings, PipelineSettings};
    use seatwatch_core::EventRequest;
    use serde_json::json;
    use std::time::Duration;

    struct SlowTransport;

    #[async_trait]
    impl AgentTransport for SlowTransport {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn send(&self, _message: &AgentMessage) -> Result<AgentReply, AgentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(AgentReply::ok(json!({"cookieString": "late=1"})))
        }
    }

    struct DomainEcho;

    #[async_trait]
    impl AgentTransport for DomainEcho {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn send(&self, message: &AgentMessage) -> Result<AgentReply, AgentError> {
            let domain = message.payload["domain"].as_str().unwrap_or_default();
            Ok(AgentReply::ok(json!({"cookieString": format!("domain={domain}")})))
        }
    }

    #[tokio::test]
    async fn test_requests_vendor_domain() {
        let settings = PipelineSettings::builder().build();
        let request = EventRequest::new("https://vendor.test/event/1");
        let ctx = AcquireContext {
            request: &request,
            settings: &settings,
            deadline: Instant::now() + Duration::from_secs(5),
        };

        let credential = AgentProvider::new(Arc::new(DomainEcho))
            .acquire(&ctx)
            .await
            .unwrap();
        assert_eq!(credential.cookie_header(), "domain=ticketmaster.nl");
        assert_eq!(credential.source(), CredentialSource::InstalledAgent);
    }

    #[tokio::test]
    async fn test_slow_agent_is_unavailable() {
        let settings = PipelineSettings::builder()
            .agent(AgentSettings {
                timeout: Duration::from_millis(50),
                ..AgentSettings::default()
            })
            .build();
        let request = EventRequest::new("https://vendor.test/event/1");
        let ctx = AcquireContext {
            request: &request,
            settings: &settings,
            deadline: Instant::now() + Duration::from_secs(5),
        };

        let provider = AgentProvider::new(Arc::new(SlowTransport));
        let err = provider.acquire(&ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::Agent(AgentError::Unavailable(_))));
        assert!(provider.should_fallback(&err));
    }

    #[tokio::test]
    async fn test_request_deadline_during_agent_call() {
        let settings = PipelineSettings::builder().build();
        let request = EventRequest::new("https://vendor.test/event/1");
        let ctx = AcquireContext {
            request: &request,
            settings: &settings,
            deadline: Instant::now() + Duration::from_millis(50),
        };

        let provider = AgentProvider::new(Arc::new(SlowTransport));
        let err = provider.acquire(&ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::DeadlineElapsed));
        assert!(!provider.should_fallback(&err));
    }
}
