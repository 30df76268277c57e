//! Error formatting and exit codes for CLI output

use serde::Serialize;

/// Error body printed to stdout when a command fails.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
}

/// Format an error for user display (no stack traces)
///
/// Appends the immediate cause when it adds information.
#[must_use]
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    match err.source().map(ToString::to_string) {
        Some(source) if !source.is_empty() && !msg.contains(&source) => {
            format!("{msg}\nCause: {source}")
        }
        _ => msg,
    }
}

/// Machine-readable error body.
#[must_use]
pub fn error_output(err: &anyhow::Error) -> ErrorOutput {
    ErrorOutput {
        success: false,
        code: err
            .downcast_ref::<foreman_core::Error>()
            .map_or("ERROR", foreman_core::Error::code),
        message: format_error(err),
    }
}

/// Extract appropriate exit code from an error
///
/// Coordinator errors carry their own code. Anything else (bad arguments
/// that reached a handler, setup failures) is a system error.
#[must_use]
pub fn get_exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<foreman_core::Error>()
        .map_or(2, foreman_core::Error::exit_code)
}
