//! Error types for the sandbox module.
//!
//! These are infrastructure failures only. Anything user code does wrong,
//! including timeouts and crashing its own context, becomes a failed
//! [`Outcome`](super::outcome::Outcome) instead.

use std::path::PathBuf;

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("cannot construct isolated context via {program}: {source}")]
    ContextUnavailable {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pipe error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed worker request: {0}")]
    Protocol(String),

    #[error("engine initialisation failed: {0}")]
    Engine(String),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_unavailable_names_program() {
        let err = SandboxError::ContextUnavailable {
            program: PathBuf::from("/nope/jsbox-worker"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let text = err.to_string();
        assert!(text.contains("/nope/jsbox-worker"));
        assert!(text.contains("missing"));
    }
}
