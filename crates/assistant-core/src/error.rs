//! Error types for attachments and chat dispatch.
//!
//! Dispatch failures are split into two structurally different kinds so the
//! transcript can tell "the server said no" apart from "the server could not
//! be reached".

use std::path::PathBuf;

use thiserror::Error;

/// Shown when the backend answered but did not produce a reply.
pub const GENERIC_FAILURE_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Shown when the backend could not be reached or answered with garbage.
pub const CONNECTIVITY_FAILURE_TEXT: &str =
    "Sorry, I couldn't connect to the server. Please make sure the server is running.";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("'{content_type}' is not an image type")]
    NotAnImage { content_type: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of a dispatch that did not produce an assistant reply.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The server responded with a parseable body that does not signal success.
    #[error("backend reported failure (HTTP {status}){}", format_detail(.detail))]
    Application { status: u16, detail: Option<String> },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unparseable response body (HTTP {status}): {source}")]
    MalformedBody {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The task carrying the request ended without producing a result.
    #[error("request task ended unexpectedly: {0}")]
    Aborted(String),
}

fn format_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ChatError {
    /// Transcript text used in place of an assistant reply.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            ChatError::Application { .. } => GENERIC_FAILURE_TEXT,
            ChatError::Transport(_) => CONNECTIVITY_FAILURE_TEXT,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ChatError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_text_distinguishes_failure_kinds() {
        let app = ChatError::Application { status: 200, detail: None };
        let transport = ChatError::from(TransportError::Aborted("panicked".to_string()));

        assert_eq!(app.fallback_text(), GENERIC_FAILURE_TEXT);
        assert_eq!(transport.fallback_text(), CONNECTIVITY_FAILURE_TEXT);
        assert!(transport.is_transport());
        assert!(!app.is_transport());
    }

    #[test]
    fn test_application_error_display_includes_detail() {
        let err = ChatError::Application {
            status: 400,
            detail: Some("Message is required".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "backend reported failure (HTTP 400): Message is required"
        );
    }
}
