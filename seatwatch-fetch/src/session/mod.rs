//! Session providers.
//!
//! A provider produces the cookie string the vendor API requires. Four
//! providers exist; a deployment picks one, optionally with a fallback,
//! and the [`SessionChain`] runs them in that order.

mod agent;
mod browser;
mod caller;
mod chain;
mod static_credential;

pub use agent::AgentProvider;
pub use browser::{collect_session, BrowserProvider};
pub(crate) use browser::launch_options;
pub use caller::CallerProvider;
pub use chain::{SessionAttempt, SessionChain, SessionOutcome};
pub use static_credential::StaticProvider;

use async_trait::async_trait;
use seatwatch_core::{EventRequest, SessionCredential};
use tokio::time::Instant;

use crate::context::{PipelineSettings, ProviderKind};
use crate::error::{AgentError, SessionError};

/// Everything a provider may look at during one acquisition.
#[derive(Debug, Clone, Copy)]
pub struct AcquireContext<'a> {
    /// The inbound request.
    pub request: &'a EventRequest,
    /// Deployment settings.
    pub settings: &'a PipelineSettings,
    /// Overall request deadline.
    pub deadline: Instant,
}

/// Produces a session credential for one pipeline run.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Identifier for logs and attempt records, e.g. `"session.browser"`.
    fn id(&self) -> &str;

    /// Which provider this is.
    fn kind(&self) -> ProviderKind;

    /// Obtains a credential.
    ///
    /// The returned credential has not been checked yet; the chain applies
    /// the plausibility policy to every provider's output.
    async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError>;

    /// Whether the next provider may be tried after `error`.
    ///
    /// Deployment errors never fall back.
    fn should_fallback(&self, error: &SessionError) -> bool {
        is_fallback_error(error)
    }
}

/// Errors after which the next configured provider may be tried.
pub(crate) fn is_fallback_error(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::NotSupplied
            | SessionError::IncompleteCredential(_)
            | SessionError::Agent(AgentError::Unavailable(_))
    )
}
