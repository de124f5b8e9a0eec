//! Credential passed in with the request.

use async_trait::async_trait;
use seatwatch_core::{CredentialSource, SessionCredential};

use super::{AcquireContext, SessionProvider};
use crate::context::ProviderKind;
use crate::error::SessionError;

/// Uses the cookie the caller sent alongside the event URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerProvider;

impl CallerProvider {
    /// Creates the provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionProvider for CallerProvider {
    fn id(&self) -> &str {
        "session.caller"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Caller
    }

    async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError> {
        let cookie = ctx.request.supplied_cookie().ok_or(SessionError::NotSupplied)?;
        Ok(SessionCredential::new(
            cookie,
            ctx.settings.vendor.cookie_domain.as_str(),
            CredentialSource::CallerSupplied,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineSettings;
    use seatwatch_core::EventRequest;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_missing_cookie_is_not_supplied() {
        let settings = PipelineSettings::builder().build();
        let request = EventRequest::new("https://vendor.test/event/1").with_cookie("   ");
        let ctx = AcquireContext {
            request: &request,
            settings: &settings,
            deadline: Instant::now(),
        };

        let err = CallerProvider.acquire(&ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::NotSupplied));
        assert!(CallerProvider.should_fallback(&err));
    }

    #[tokio::test]
    async fn test_supplied_cookie_is_used() {
        let settings = PipelineSettings::builder().build();
        let request = EventRequest::new("https://vendor.test/event/1").with_cookie(" a=1 ");
        let ctx = AcquireContext {
            request: &request,
            settings: &settings,
            deadline: Instant::now(),
        };

        let credential = CallerProvider.acquire(&ctx).await.unwrap();
        assert_eq!(credential.cookie_header(), "a=1");
        assert_eq!(credential.source(), CredentialSource::CallerSupplied);
    }
}
