//! Provider chain: primary provider plus optional fallback.

use seatwatch_core::{CredentialPolicy, SessionCredential};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{AcquireContext, SessionProvider};
use crate::context::ProviderKind;
use crate::error::SessionError;

// ============================================================================
// Session Attempt
// ============================================================================

/// Record of a single acquisition attempt.
#[derive(Debug, Clone)]
pub struct SessionAttempt {
    /// The provider ID that was attempted.
    pub provider_id: String,
    /// Which provider it was.
    pub kind: ProviderKind,
    /// Whether the attempt produced a usable credential.
    pub success: bool,
    /// Error if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl SessionAttempt {
    pub(crate) fn success(provider_id: &str, kind: ProviderKind, duration: Duration) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            kind,
            success: true,
            error: None,
            duration,
        }
    }

    pub(crate) fn failure(provider_id: &str, kind: ProviderKind, error: &SessionError, duration: Duration) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            kind,
            success: false,
            error: Some(error.to_string()),
            duration,
        }
    }
}

// ============================================================================
// Session Outcome
// ============================================================================

/// The outcome of running the chain.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The checked credential or the final error.
    pub result: Result<SessionCredential, SessionError>,
    /// All attempts made.
    pub attempts: Vec<SessionAttempt>,
    /// Total duration.
    pub duration: Duration,
}

impl SessionOutcome {
    /// Returns true if a credential was obtained.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of providers that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the successful provider ID, if any.
    pub fn successful_provider(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.provider_id.as_str())
    }
}

// ============================================================================
// Session Chain
// ============================================================================

/// Providers tried in configured order, each output checked by the policy.
#[derive(Clone)]
pub struct SessionChain {
    providers: Vec<Arc<dyn SessionProvider>>,
    policy: CredentialPolicy,
}

impl SessionChain {
    /// Creates a chain.
    pub fn new(providers: Vec<Arc<dyn SessionProvider>>, policy: CredentialPolicy) -> Self {
        Self { providers, policy }
    }

    /// Returns the number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the primary provider's kind.
    pub fn primary(&self) -> Option<ProviderKind> {
        self.providers.first().map(|p| p.kind())
    }

    /// Returns the chain without its primary provider.
    pub fn fallbacks(&self) -> Self {
        Self {
            providers: self.providers.iter().skip(1).cloned().collect(),
            policy: self.policy,
        }
    }

    /// Runs providers until one yields a plausible credential.
    #[instrument(skip_all, fields(providers = self.providers.len()))]
    pub async fn acquire(&self, ctx: &AcquireContext<'_>) -> SessionOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error = SessionError::NoProviders;

        for provider in &self.providers {
            let provider_id = provider.id();
            let kind = provider.kind();
            let attempt_start = Instant::now();
            debug!(provider = %provider_id, "Acquiring session");

            let result = provider.acquire(ctx).await.and_then(|credential| {
                self.policy
                    .check_credential(&credential)
                    .map(|()| credential)
                    .map_err(SessionError::IncompleteCredential)
            });

            match result {
                Ok(credential) => {
                    let duration = attempt_start.elapsed();
                    info!(
                        provider = %provider_id,
                        length = credential.len(),
                        duration = ?duration,
                        "Session acquired"
                    );
                    attempts.push(SessionAttempt::success(provider_id, kind, duration));
                    return SessionOutcome {
                        result: Ok(credential),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Err(error) => {
                    let duration = attempt_start.elapsed();
                    warn!(
                        provider = %provider_id,
                        error = %error,
                        duration = ?duration,
                        "Session provider failed"
                    );
                    attempts.push(SessionAttempt::failure(provider_id, kind, &error, duration));

                    let fallback = provider.should_fallback(&error);
                    last_error = error;
                    if !fallback {
                        debug!(provider = %provider_id, "Provider indicates no fallback");
                        break;
                    }
                }
            }
        }

        SessionOutcome {
            result: Err(last_error),
            attempts,
            duration: start.elapsed(),
        }
    }
}

impl std::fmt::Debug for SessionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionChain")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .field("policy", &self.policy)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineSettings;
    use crate::session::{CallerProvider, StaticProvider};
    use async_trait::async_trait;
    use seatwatch_core::{CredentialDefect, CredentialSource, EventRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        cookie: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        fn id(&self) -> &str {
            "session.counting"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Browser
        }

        async fn acquire(&self, _ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionCredential::new(
                self.cookie.clone(),
                "ticketmaster.nl",
                CredentialSource::BrowserAutomation,
            ))
        }
    }

    fn long_cookie() -> String {
        format!("session={}", "x".repeat(300))
    }

    async fn run(chain: &SessionChain, request: &EventRequest) -> SessionOutcome {
        let settings = PipelineSettings::builder().build();
        let ctx = AcquireContext {
            request,
            settings: &settings,
            deadline: tokio::time::Instant::now() + Duration::from_secs(5),
        };
        chain.acquire(&ctx).await
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = SessionChain::new(Vec::new(), CredentialPolicy::default());
        let outcome = run(&chain, &EventRequest::new("https://x/1")).await;
        assert!(matches!(outcome.result, Err(SessionError::NoProviders)));
        assert_eq!(outcome.attempts_count(), 0);
    }

    #[tokio::test]
    async fn test_caller_preferred_static_fallback() {
        let chain = SessionChain::new(
            vec![
                Arc::new(CallerProvider::new()),
                Arc::new(StaticProvider::new(Some(Arc::from(long_cookie())))),
            ],
            CredentialPolicy::default(),
        );

        let outcome = run(&chain, &EventRequest::new("https://x/1")).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts_count(), 2);
        assert_eq!(outcome.successful_provider(), Some("session.static"));

        let request = EventRequest::new("https://x/1").with_cookie(format!("caller={}", "y".repeat(300)));
        let outcome = run(&chain, &request).await;
        assert_eq!(outcome.successful_provider(), Some("session.caller"));
        assert_eq!(outcome.attempts_count(), 1);
    }

    #[tokio::test]
    async fn test_short_credential_rejected_for_every_provider() {
        let provider = Arc::new(CountingProvider {
            cookie: "session=short".to_string(),
            calls: AtomicUsize::new(0),
        });
        let chain = SessionChain::new(vec![provider.clone()], CredentialPolicy::default());

        let outcome = run(&chain, &EventRequest::new("https://x/1")).await;
        assert!(matches!(
            outcome.result,
            Err(SessionError::IncompleteCredential(CredentialDefect::TooShort { length: 13, minimum: 200 }))
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configuration_error_does_not_fall_back() {
        let fallback = Arc::new(CountingProvider {
            cookie: long_cookie(),
            calls: AtomicUsize::new(0),
        });
        let chain = SessionChain::new(
            vec![Arc::new(StaticProvider::new(None)), fallback.clone()],
            CredentialPolicy::default(),
        );

        let outcome = run(&chain, &EventRequest::new("https://x/1")).await;
        assert!(matches!(outcome.result, Err(SessionError::Configuration(_))));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallbacks_drop_primary() {
        let chain = SessionChain::new(
            vec![
                Arc::new(CallerProvider::new()),
                Arc::new(StaticProvider::new(None)),
            ],
            CredentialPolicy::default(),
        );
        assert_eq!(chain.primary(), Some(ProviderKind::Caller));
        assert_eq!(chain.fallbacks().primary(), Some(ProviderKind::Static));
        assert!(chain.fallbacks().fallbacks().is_empty());
    }
}
