//! Pre-provisioned credential.

use async_trait::async_trait;
use seatwatch_core::{CredentialSource, SessionCredential};
use std::sync::Arc;
use tracing::warn;

use super::{AcquireContext, SessionProvider};
use crate::context::ProviderKind;
use crate::error::SessionError;

/// Serves the credential configured at process start.
///
/// The value is captured at construction and never changes afterwards.
#[derive(Clone, Default)]
pub struct StaticProvider {
    cookie: Option<Arc<str>>,
}

impl StaticProvider {
    /// Creates a provider serving `cookie`, or failing if it is unset.
    pub fn new(cookie: Option<Arc<str>>) -> Self {
        Self {
            cookie: cookie.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Returns true if a credential is configured.
    pub fn is_configured(&self) -> bool {
        self.cookie.is_some()
    }
}

impl std::fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticProvider")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[async_trait]
impl SessionProvider for StaticProvider {
    fn id(&self) -> &str {
        "session.static"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Static
    }

    async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError> {
        let Some(cookie) = &self.cookie else {
            warn!("Static session provider is active but no credential is configured");
            return Err(SessionError::Configuration(
                "static credential is not configured; set TM_COOKIE or session.static_cookie"
                    .to_string(),
            ));
        };

        Ok(SessionCredential::new(
            cookie.trim(),
            ctx.settings.vendor.cookie_domain.as_str(),
            CredentialSource::Static,
        ))
    }
}
