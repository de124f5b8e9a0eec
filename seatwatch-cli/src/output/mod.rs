//! Output formatting for CLI.

mod json;
mod text;

pub use json::{CookieOutput, JsonFormatter, PathsOutput};
pub use text::TextFormatter;
