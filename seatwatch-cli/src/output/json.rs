//! JSON output formatting.

use anyhow::Result;
use seatwatch_core::{PipelineError, SessionCredential};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output of the cookie command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieOutput {
    pub cookie_string: String,
    pub length: usize,
    pub source: String,
    pub domain: String,
}

impl CookieOutput {
    /// Builds the output for a collected credential.
    pub fn from_credential(credential: &SessionCredential) -> Self {
        Self {
            cookie_string: credential.cookie_header().to_string(),
            length: credential.len(),
            source: credential.source().to_string(),
            domain: credential.domain_scope().to_string(),
        }
    }
}

/// Configuration paths.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsOutput {
    pub config_file: String,
    pub config_dir: String,
    pub exists: bool,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats the `{ error, details }` envelope for a failure.
    pub fn format_error(&self, err: &PipelineError) -> Result<String> {
        self.format(&err.to_response())
    }
}
