//! Fetch error types.

use seatwatch_core::CredentialDefect;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Fetch Error
// ============================================================================

/// Any failure below the pipeline boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Vendor or agent HTTP failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Browser failure outside session acquisition.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Session acquisition failure.
    #[error(transparent)]
    Session(#[from] SessionError),
}

// ============================================================================
// Session Error
// ============================================================================

/// Error type for session acquisition.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The caller did not supply a credential.
    #[error("No session cookie was supplied with the request")]
    NotSupplied,

    /// Deployment misconfiguration (e.g. static credential unset).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The credential failed the plausibility check.
    #[error("Incomplete credential: {0}")]
    IncompleteCredential(CredentialDefect),

    /// Installed agent error.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Browser automation error.
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// The overall request deadline elapsed while a provider was working.
    #[error("Request deadline elapsed during session acquisition")]
    DeadlineElapsed,

    /// No session providers configured.
    #[error("No session providers configured")]
    NoProviders,
}

impl SessionError {
    /// Returns true if this is a deployment problem rather than a per-request one.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NoProviders)
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header value could not be encoded.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// The client could not be built (TLS or proxy setup).
    #[error("Client setup failed: {0}")]
    Setup(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for automated browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Proxy authentication could not be set up.
    #[error("Proxy authentication failed: {0}")]
    ProxyAuthentication(String),

    /// Navigation failed.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL (without credentials).
        url: String,
        /// Browser-reported reason.
        reason: String,
    },

    /// Navigation did not settle in time.
    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    /// The overall request deadline elapsed while the browser was in use.
    #[error("Request deadline elapsed during browser work")]
    DeadlineElapsed,

    /// Cookie or DOM read failed.
    #[error("Page read failed: {0}")]
    Read(String),

    /// Teardown failed.
    #[error("Browser close failed: {0}")]
    Close(String),

    /// IO error (profile directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Agent Error
// ============================================================================

/// Error type for installed agent messaging.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be reached.
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    /// No handler registered for the message type.
    #[error("Unsupported message type: {0}")]
    UnsupportedMessage(String),

    /// The handler exists but its capability was not granted.
    #[error("Capability not granted: {0}")]
    CapabilityDenied(String),

    /// The agent answered with an error.
    #[error("Agent rejected request: {0}")]
    Rejected(String),

    /// The reply did not match the message envelope.
    #[error("Malformed agent reply: {0}")]
    Protocol(String),
}

impl From<CookieStoreError> for AgentError {
    fn from(err: CookieStoreError) -> Self {
        match err {
            CookieStoreError::NoBrowsersAvailable => {
                AgentError::Unavailable("no supported browser profile found".to_string())
            }
            other => AgentError::Rejected(other.to_string()),
        }
    }
}

// ============================================================================
// Cookie Store Error
// ============================================================================

/// Error type for reading installed browsers' cookie databases.
#[derive(Debug, Error)]
pub enum CookieStoreError {
    /// Browser not supported on this platform.
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// No browsers available.
    #[error("No browsers available")]
    NoBrowsersAvailable,

    /// Cookie database not found.
    #[error("Cookie database not found for {browser}: {path}")]
    DatabaseNotFound {
        /// Browser name.
        browser: String,
        /// Expected database path.
        path: String,
    },

    /// Failed to read cookies.
    #[error("Failed to read cookies: {0}")]
    ReadFailed(String),

    /// No cookies found for domain.
    #[error("No cookies found for domain: {0}")]
    NoCookiesFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
