//! Session error taxonomy, organized by propagation policy.

use thiserror::Error;

/// Errors surfaced by session operations.
///
/// Cancellation is deliberately a variant here rather than a success shape:
/// callers that observe `Cancelled` emit a stopped event instead of an
/// error event.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A sandbox call reported failure. Logged and surfaced; state unchanged.
    #[error("sandbox: {0}")]
    Sandbox(String),

    /// The operation observed an aborted token.
    #[error("operation cancelled")]
    Cancelled,

    /// Control-frame or argument validation failed. No state mutation.
    #[error("validation: {0}")]
    Validation(String),

    /// Inference transport failed after retries.
    #[error("inference: {0}")]
    Inference(String),

    /// Embedded version-control store failure.
    #[error("vcs: {0}")]
    Vcs(String),

    /// Conversation or state persistence failure.
    #[error("storage: {0}")]
    Storage(String),

    /// Deployment sequencing failure.
    #[error("deploy: {0}")]
    Deploy(String),

    /// External export (git push) failure.
    #[error("export: {0}")]
    Export(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        assert_eq!(
            SessionError::Sandbox("boom".into()).to_string(),
            "sandbox: boom"
        );
        assert_eq!(SessionError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn cancelled_is_detectable() {
        assert!(SessionError::Cancelled.is_cancelled());
        assert!(!SessionError::Validation("x".into()).is_cancelled());
    }
}
