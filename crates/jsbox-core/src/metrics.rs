//! Global atomic counters for sandbox activity.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before a CLI exits).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::sandbox::outcome::{FailureKind, Outcome};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    invocations_started: AtomicU64,
    invocations_completed: AtomicU64,
    invocations_failed: AtomicU64,
    invocations_timed_out: AtomicU64,
    contexts_created: AtomicU64,
    contexts_destroyed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            invocations_started: AtomicU64::new(0),
            invocations_completed: AtomicU64::new(0),
            invocations_failed: AtomicU64::new(0),
            invocations_timed_out: AtomicU64::new(0),
            contexts_created: AtomicU64::new(0),
            contexts_destroyed: AtomicU64::new(0),
        }
    }

    pub fn inc_invocations_started(&self) {
        self.invocations_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "invocations_started", "counter incremented");
    }

    pub fn inc_contexts_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "contexts_created", "counter incremented");
    }

    pub fn inc_contexts_destroyed(&self) {
        self.contexts_destroyed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "contexts_destroyed", "counter incremented");
    }

    /// Bump the counter matching a terminal outcome.
    pub fn record_outcome(&self, outcome: &Outcome) {
        let (counter, metric) = match outcome {
            Outcome::Completed(_) => (&self.invocations_completed, "invocations_completed"),
            Outcome::Failed(f) if f.kind == FailureKind::Timeout => {
                (&self.invocations_timed_out, "invocations_timed_out")
            }
            Outcome::Failed(_) => (&self.invocations_failed, "invocations_failed"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = metric, "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            invocations_started = self.invocations_started(),
            invocations_completed = self.invocations_completed(),
            invocations_failed = self.invocations_failed(),
            invocations_timed_out = self.invocations_timed_out(),
            contexts_created = self.contexts_created(),
            contexts_destroyed = self.contexts_destroyed(),
        );
    }

    pub fn invocations_started(&self) -> u64 {
        self.invocations_started.load(Ordering::Relaxed)
    }

    pub fn invocations_completed(&self) -> u64 {
        self.invocations_completed.load(Ordering::Relaxed)
    }

    pub fn invocations_failed(&self) -> u64 {
        self.invocations_failed.load(Ordering::Relaxed)
    }

    pub fn invocations_timed_out(&self) -> u64 {
        self.invocations_timed_out.load(Ordering::Relaxed)
    }

    pub fn contexts_created(&self) -> u64 {
        self.contexts_created.load(Ordering::Relaxed)
    }

    pub fn contexts_destroyed(&self) -> u64 {
        self.contexts_destroyed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.invocations_started,
            &self.invocations_completed,
            &self.invocations_failed,
            &self.invocations_timed_out,
            &self.contexts_created,
            &self.contexts_destroyed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::outcome::{Completion, CompletionValue, Failure};

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_invocations_started();
        m.inc_invocations_started();
        assert_eq!(m.invocations_started(), 2);

        m.inc_contexts_created();
        m.inc_contexts_destroyed();
        assert_eq!(m.contexts_created(), m.contexts_destroyed());
    }

    #[test]
    fn outcomes_land_in_their_own_counter() {
        let m = Metrics::new();
        m.record_outcome(&Outcome::Completed(Completion {
            value: CompletionValue::Undefined,
            logs: vec![],
        }));
        m.record_outcome(&Outcome::Failed(Failure::timeout(vec![])));
        m.record_outcome(&Outcome::Failed(Failure::fault("x", vec![])));
        m.record_outcome(&Outcome::Failed(Failure::fault("y", vec![])));
        assert_eq!(m.invocations_completed(), 1);
        assert_eq!(m.invocations_timed_out(), 1);
        assert_eq!(m.invocations_failed(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_invocations_started();
        m.inc_contexts_created();
        m.record_outcome(&Outcome::Failed(Failure::timeout(vec![])));
        m.reset();
        assert_eq!(m.invocations_started(), 0);
        assert_eq!(m.contexts_created(), 0);
        assert_eq!(m.invocations_timed_out(), 0);
    }
}
