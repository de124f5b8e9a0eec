//! Text output formatting with colors.

use seatwatch_core::{AvailabilityPayload, PipelineError, ResourceId, SessionCredential};
use seatwatch_fetch::SessionAttempt;
use seatwatch_store::StoreError;
use std::time::Duration;

use super::PathsOutput;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

const RULE_WIDTH: usize = 40;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats the seat summary of a payload.
    pub fn format_availability(
        &self,
        event_id: Option<&ResourceId>,
        payload: &AvailabilityPayload,
    ) -> String {
        let totals = payload.seat_totals();
        let mut lines = Vec::new();

        let title = match event_id {
            Some(id) => format!("Event {id}"),
            None => "Event".to_string(),
        };
        lines.push(self.bold(&title));
        lines.push("─".repeat(RULE_WIDTH));
        lines.push(format!("Standard seats  {}", self.count(totals.total_standard)));
        lines.push(format!("Resale seats    {}", self.count(totals.total_resale)));
        lines.push(self.dim(&format!(
            "{} groups, {} offers",
            payload.groups.len(),
            payload.offers.len()
        )));

        lines.join("\n")
    }

    /// Formats how the session was obtained.
    ///
    /// Verbose mode lists every provider attempt.
    pub fn format_session(
        &self,
        attempts: &[SessionAttempt],
        duration: Duration,
        verbose: bool,
    ) -> String {
        let used = attempts.iter().find(|a| a.success);
        let mut lines = vec![match used {
            Some(attempt) => self.dim(&format!(
                "Session via {} in {}",
                attempt.kind,
                format_duration(duration)
            )),
            None => self.dim(&format!("Finished in {}", format_duration(duration))),
        }];

        if verbose {
            for attempt in attempts {
                let mark = if attempt.success {
                    self.green("✓")
                } else {
                    self.red("✗")
                };
                let mut line = format!(
                    "  {mark} {} {}",
                    attempt.provider_id,
                    self.dim(&format_duration(attempt.duration))
                );
                if let Some(error) = &attempt.error {
                    line.push_str(&format!(": {error}"));
                }
                lines.push(line);
            }
        }

        lines.join("\n")
    }

    /// Formats a pipeline failure.
    ///
    /// Retryable failures are shown in yellow.
    pub fn format_error(&self, err: &PipelineError) -> String {
        let label = format!("✗ {}", err.category());
        let label = if err.is_retryable() {
            self.yellow(&label)
        } else {
            self.red(&label)
        };

        let mut out = format!("{}: {err}", self.bold(&label));
        if let Some(hint) = hint_for(err) {
            out.push('\n');
            out.push_str(&self.dim(hint));
        }
        out
    }

    /// Formats the stderr line after a cookie was collected.
    pub fn format_cookie_summary(&self, credential: &SessionCredential) -> String {
        format!(
            "{} {} characters for {} via {}",
            self.green("✓"),
            credential.len(),
            credential.domain_scope(),
            credential.source()
        )
    }

    /// Formats a progress message.
    pub fn progress(&self, message: &str) -> String {
        self.dim(message)
    }

    /// Formats the heading of `config show`.
    pub fn format_config_header(&self, problem: Option<&StoreError>) -> String {
        let mut lines = vec![self.bold("Seatwatch Configuration"), "─".repeat(RULE_WIDTH)];
        match problem {
            Some(e) => lines.push(format!("{} {e}", self.red("✗ Invalid:"))),
            None => lines.push(self.green("✓ Valid")),
        }
        lines.join("\n")
    }

    /// Formats configuration paths.
    pub fn format_paths(&self, paths: &PathsOutput) -> String {
        let state = if paths.exists {
            self.green("exists")
        } else {
            self.dim("not found, using defaults")
        };
        format!(
            "Config file:  {} ({state})\nConfig dir:   {}",
            paths.config_file, paths.config_dir
        )
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn count(&self, n: usize) -> String {
        if n == 0 {
            self.dim("0")
        } else {
            self.green(&n.to_string())
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

fn hint_for(err: &PipelineError) -> Option<&'static str> {
    match err {
        PipelineError::MissingField("cookie") => {
            Some("Pass --cookie, or choose another session provider with --provider.")
        }
        PipelineError::Blocked { .. } => {
            Some("The session was rejected. Try a fresh cookie or a different proxy.")
        }
        PipelineError::Timeout(_) => Some("Raise --timeout or check the proxy."),
        _ => None,
    }
}

fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(420)), "420ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_colors_disabled() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.red("x"), "x");
        assert_eq!(formatter.count(0), "0");
    }

    #[test]
    fn test_colors_enabled() {
        let formatter = TextFormatter::new(true);
        assert_eq!(formatter.green("x"), "\x1b[32mx\x1b[0m");
    }

    #[test]
    fn test_hint_only_for_actionable_errors() {
        assert!(hint_for(&PipelineError::MissingField("cookie")).is_some());
        assert!(hint_for(&PipelineError::InvalidUrl("x".into())).is_none());
    }
}
