//! Inbound event requests and resource id extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::CoreError;

/// Matches a maximal run of ASCII digits.
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").unwrap_or_else(|e| panic!("invalid digit pattern: {e}")));

// ============================================================================
// Event Request
// ============================================================================

/// A single inbound request for an event's availability.
///
/// `cookie` is only meaningful when the caller-supplied session provider is
/// active; every other provider ignores it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    /// The event page URL as entered by the user.
    pub event_url: String,
    /// A session cookie string supplied alongside the request.
    #[serde(default, alias = "cookieString", skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl EventRequest {
    /// Creates a request without a caller-supplied cookie.
    pub fn new(event_url: impl Into<String>) -> Self {
        Self {
            event_url: event_url.into(),
            cookie: None,
        }
    }

    /// Attaches a caller-supplied cookie string.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Returns the caller-supplied cookie, treating blank strings as absent.
    pub fn supplied_cookie(&self) -> Option<&str> {
        self.cookie.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

impl fmt::Debug for EventRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRequest")
            .field("event_url", &self.event_url)
            .field("cookie", &self.cookie.as_ref().map(|c| format!("<{} chars>", c.len())))
            .finish()
    }
}

// ============================================================================
// Resource Id
// ============================================================================

/// The vendor's numeric event identifier.
///
/// The vendor encodes the event id in the trailing numeric segment of its
/// event URLs; earlier segments may carry other numbers (venue ids, years).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Extracts the rightmost run of digits from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrl`] if the string contains no digits.
    pub fn extract(url: &str) -> Result<Self, CoreError> {
        DIGIT_RUN
            .find_iter(url)
            .last()
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| CoreError::InvalidUrl(url.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts the event id from a vendor URL.
///
/// Shorthand for [`ResourceId::extract`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidUrl`] if the string contains no digits.
pub fn extract_id(url: &str) -> Result<ResourceId, CoreError> {
    ResourceId::extract(url)
}

// ============================================================================
// Tests
// ============================================================================
