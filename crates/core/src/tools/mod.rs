//! Tool functions the realtime model may call mid-conversation.
//!
//! Each tool performs a single outbound request through a provider trait and
//! hands back plain text. Failures are never fatal: they are rendered as a
//! marked error string so the assistant can tell the user what went wrong.

pub mod search;
pub mod weather;

use std::time::Duration;

/// Errors a tool provider can report.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("no data found for '{0}'")]
    NotFound(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no results for '{0}'")]
    NoResults(String),
}

/// Prefix that marks a tool result as an error for the model.
pub const ERROR_PREFIX: &str = "Error:";

/// Renders a tool error the way the assistant expects to read it.
pub fn error_text(action: &str, err: &ToolError) -> String {
    format!("{ERROR_PREFIX} could not {action}: {err}")
}

/// Trims tool input and rejects empty values.
pub(crate) fn require_input<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ToolError::EmptyInput(field))
    } else {
        Ok(trimmed)
    }
}

/// Builds the shared HTTP client used by the providers.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kaira/", env!("CARGO_PKG_VERSION")))
        .build()
}
