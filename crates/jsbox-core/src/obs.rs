//! Structured observability hooks for the invocation lifecycle.
//!
//! Events are emitted at `info!` level under stable `event` names so that a
//! JSON subscriber (see [`crate::telemetry`]) yields greppable records. Code
//! text never appears in events, only its length and a digest prefix.

use sha2::{Digest, Sha256};
use tracing::info;

use crate::sandbox::outcome::{Invocation, InvocationId};

/// Span covering one invocation; attach with `tracing::Instrument`.
pub fn invocation_span(id: InvocationId) -> tracing::Span {
    tracing::info_span!("jsbox.invocation", invocation_id = %id)
}

/// First 12 hex characters of the SHA-256 of `code`.
pub fn code_digest(code: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(code.as_bytes()));
    digest.truncate(12);
    digest
}

/// Emit event: invocation submitted to a fresh context.
pub fn emit_invocation_started(invocation: &Invocation) {
    let code = invocation.code();
    info!(
        event = "invocation.started",
        invocation_id = %invocation.id(),
        submitted_at = %invocation.submitted_at().to_rfc3339(),
        timeout_ms = invocation.timeout().as_millis() as u64,
        code_len = code.len(),
        code_digest = %code_digest(code),
    );
}

/// Emit event: invocation reached a terminal state.
pub fn emit_invocation_finished(id: InvocationId, status: &str, duration_ms: u64, log_count: usize) {
    info!(
        event = "invocation.finished",
        invocation_id = %id,
        status = status,
        duration_ms = duration_ms,
        log_count = log_count,
    );
}

/// Emit event: the sandbox itself failed (warning level).
pub fn emit_infrastructure_error(id: InvocationId, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "invocation.infrastructure_error", invocation_id = %id, error = %error);
}
