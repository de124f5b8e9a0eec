//! Response classification.
//!
//! Every vendor response, from the HTTP client or a rendered browser page,
//! passes through [`classify`]. Block detection is a pluggable predicate
//! over the raw body so new rules can be added without touching the order
//! of the checks.

use seatwatch_core::RetrievalResult;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::context::VendorSettings;

// ============================================================================
// Block Detection
// ============================================================================

/// Decides whether a response body is an anti-bot block page.
pub trait BlockDetector: Send + Sync {
    /// Returns true if `body` looks like a soft block.
    fn is_blocked(&self, body: &str) -> bool;
}

/// Case-sensitive substring markers.
#[derive(Debug, Clone)]
pub struct SubstringBlockDetector {
    markers: Vec<String>,
}

impl SubstringBlockDetector {
    /// Creates a detector matching any of `markers`.
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    /// Creates a detector from the vendor's configured markers.
    pub fn from_settings(vendor: &VendorSettings) -> Self {
        Self::new(vendor.block_markers.clone())
    }

    /// Returns the configured markers.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl BlockDetector for SubstringBlockDetector {
    fn is_blocked(&self, body: &str) -> bool {
        self.markers.iter().any(|m| body.contains(m.as_str()))
    }
}

/// Flags a body if any inner detector does.
#[derive(Clone, Default)]
pub struct AnyBlockDetector {
    detectors: Vec<Arc<dyn BlockDetector>>,
}

impl AnyBlockDetector {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detector.
    #[must_use]
    pub fn with(mut self, detector: Arc<dyn BlockDetector>) -> Self {
        self.detectors.push(detector);
        self
    }
}

impl BlockDetector for AnyBlockDetector {
    fn is_blocked(&self, body: &str) -> bool {
        self.detectors.iter().any(|d| d.is_blocked(body))
    }
}

impl std::fmt::Debug for AnyBlockDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyBlockDetector")
            .field("detectors", &self.detectors.len())
            .finish()
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classifies a vendor response.
///
/// Order: a non-2xx status is an upstream error even with a JSON body; a
/// block marker anywhere in the raw body is a block even under 2xx; a body
/// that fails to parse is malformed; anything else is a success.
pub fn classify(
    status: u16,
    status_text: &str,
    body: String,
    detector: &dyn BlockDetector,
) -> RetrievalResult {
    if !(200..300).contains(&status) {
        debug!(status, "Classified as upstream error");
        return RetrievalResult::UpstreamError {
            status_code: status,
            status_text: status_text.to_string(),
        };
    }

    if detector.is_blocked(&body) {
        debug!("Classified as blocked");
        return RetrievalResult::Blocked { raw_body: body };
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(payload) => RetrievalResult::Success { payload },
        Err(e) => {
            debug!(error = %e, "Classified as malformed payload");
            RetrievalResult::MalformedPayload { raw_body: body }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> SubstringBlockDetector {
        SubstringBlockDetector::from_settings(&VendorSettings::default())
    }

    #[test]
    fn test_empty_payload_is_success() {
        let result = classify(200, "OK", r#"{"groups":[],"offers":[]}"#.to_string(), &detector());
        match result {
            RetrievalResult::Success { payload } => {
                assert_eq!(payload, json!({"groups": [], "offers": []}));
            }
            other => panic!("expected success, got {}", other.label()),
        }
    }

    #[test]
    fn test_marker_under_2xx_is_blocked() {
        let body = r#"{"message":"request blocked"}"#.to_string();
        let result = classify(200, "OK", body.clone(), &detector());
        assert_eq!(result, RetrievalResult::Blocked { raw_body: body });

        let result = classify(200, "OK", "<html>Forbidden</html>".to_string(), &detector());
        assert_eq!(result.label(), "blocked");
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        let result = classify(200, "OK", r#"{"note":"BLOCKED"}"#.to_string(), &detector());
        assert!(result.is_success());
    }

    #[test]
    fn test_non_2xx_wins_over_json_and_markers() {
        let result = classify(403, "Forbidden", r#"{"groups":[],"offers":[]}"#.to_string(), &detector());
        assert_eq!(
            result,
            RetrievalResult::UpstreamError {
                status_code: 403,
                status_text: "Forbidden".to_string(),
            }
        );

        let result = classify(503, "Service Unavailable", "blocked".to_string(), &detector());
        assert_eq!(result.label(), "upstream_error");
    }

    #[test]
    fn test_non_json_is_malformed() {
        let result = classify(200, "OK", "<html>hello</html>".to_string(), &detector());
        assert_eq!(
            result,
            RetrievalResult::MalformedPayload {
                raw_body: "<html>hello</html>".to_string(),
            }
        );
    }

    #[test]
    fn test_composite_detector() {
        struct Challenge;
        impl BlockDetector for Challenge {
            fn is_blocked(&self, body: &str) -> bool {
                body.contains("captcha")
            }
        }

        let composite = AnyBlockDetector::new()
            .with(Arc::new(detector()))
            .with(Arc::new(Challenge));
        assert!(composite.is_blocked(r#"{"captcha":true}"#));
        assert!(composite.is_blocked("blocked"));
        assert!(!composite.is_blocked(r#"{"groups":[]}"#));
        assert!(!AnyBlockDetector::new().is_blocked("blocked"));
    }

    #[test]
    fn test_empty_markers_are_ignored() {
        let detector = SubstringBlockDetector::new(vec![String::new()]);
        assert!(detector.markers().is_empty());
        assert!(!detector.is_blocked("anything"));
    }
}
