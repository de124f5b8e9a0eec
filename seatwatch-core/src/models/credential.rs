//! Session credentials and the plausibility check applied before use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default minimum length of a complete vendor cookie string.
///
/// The vendor's anti-bot layer sets a cookie bundle well above this size;
/// anything shorter means the challenge did not complete.
pub const DEFAULT_MIN_COOKIE_LENGTH: usize = 200;

// ============================================================================
// Credential Source
// ============================================================================

/// Where a session credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Read from an automated browser after warm-up navigation.
    BrowserAutomation,
    /// Returned by an installed agent with access to a real browser profile.
    InstalledAgent,
    /// Pre-provisioned in process configuration.
    Static,
    /// Passed in by the caller with the request.
    CallerSupplied,
}

impl CredentialSource {
    /// Returns the display name for this source.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BrowserAutomation => "Browser Automation",
            Self::InstalledAgent => "Installed Agent",
            Self::Static => "Static",
            Self::CallerSupplied => "Caller Supplied",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Session Credential
// ============================================================================

/// A cookie string that proves a completed anti-bot challenge.
///
/// Created per pipeline run and dropped with it. `Debug` never prints the
/// cookie value.
#[derive(Clone)]
pub struct SessionCredential {
    cookie_string: String,
    domain_scope: String,
    acquired_at: DateTime<Utc>,
    source: CredentialSource,
}

impl SessionCredential {
    /// Creates a credential acquired now.
    pub fn new(
        cookie_string: impl Into<String>,
        domain_scope: impl Into<String>,
        source: CredentialSource,
    ) -> Self {
        Self {
            cookie_string: cookie_string.into(),
            domain_scope: domain_scope.into(),
            acquired_at: Utc::now(),
            source,
        }
    }

    /// Returns the value for the `Cookie` request header.
    pub fn cookie_header(&self) -> &str {
        &self.cookie_string
    }

    /// Returns the cookie domain the credential was scoped to.
    pub fn domain_scope(&self) -> &str {
        &self.domain_scope
    }

    /// Returns when the credential was obtained.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Returns which provider produced the credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Returns the serialized cookie length.
    pub fn len(&self) -> usize {
        self.cookie_string.len()
    }

    /// Returns true if the cookie string is empty.
    pub fn is_empty(&self) -> bool {
        self.cookie_string.is_empty()
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("length", &self.cookie_string.len())
            .field("domain_scope", &self.domain_scope)
            .field("acquired_at", &self.acquired_at)
            .field("source", &self.source)
            .finish()
    }
}

/// Joins `(name, value)` pairs into a `name=value; name=value` header.
pub fn join_cookie_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Credential Policy
// ============================================================================

/// Why a cookie string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialDefect {
    /// Shorter than the configured minimum.
    TooShort {
        /// Observed length.
        length: usize,
        /// Required minimum.
        minimum: usize,
    },
    /// A `;`-separated segment is not a `name=value` pair.
    MalformedPair {
        /// Zero-based index of the offending segment.
        index: usize,
    },
}

impl fmt::Display for CredentialDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { length, minimum } => {
                write!(f, "cookie is {length} characters, expected at least {minimum}")
            }
            Self::MalformedPair { index } => {
                write!(f, "cookie segment {index} is not a name=value pair")
            }
        }
    }
}

/// Plausibility rules every credential passes before it is used.
///
/// The length threshold is an empirical property of the vendor's current
/// cookie set, so it is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPolicy {
    /// Minimum serialized cookie length.
    pub min_length: usize,
}

impl CredentialPolicy {
    /// Creates a policy with a custom minimum length.
    pub fn with_min_length(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Checks a raw cookie string.
    ///
    /// # Errors
    ///
    /// Returns the first [`CredentialDefect`] found.
    pub fn check(&self, cookie: &str) -> Result<(), CredentialDefect> {
        if cookie.len() < self.min_length {
            return Err(CredentialDefect::TooShort {
                length: cookie.len(),
                minimum: self.min_length,
            });
        }

        for (index, segment) in cookie.split(';').enumerate() {
            let segment = segment.trim();
            // Tolerate a trailing separator.
            if segment.is_empty() && index > 0 {
                continue;
            }
            match segment.split_once('=') {
                Some((name, _)) if !name.trim().is_empty() => {}
                _ => return Err(CredentialDefect::MalformedPair { index }),
            }
        }

        Ok(())
    }

    /// Checks an acquired credential.
    ///
    /// # Errors
    ///
    /// Returns the first [`CredentialDefect`] found.
    pub fn check_credential(&self, credential: &SessionCredential) -> Result<(), CredentialDefect> {
        self.check(credential.cookie_header())
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_COOKIE_LENGTH,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
