//! Invocation state machine: `Idle → Running → {Completed | Failed | TimedOut}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::TimedOut
        )
    }

    /// `Idle → Running`. Returns `false` from any other state.
    pub fn start(&mut self) -> bool {
        if *self != ExecutionState::Idle {
            return false;
        }
        *self = ExecutionState::Running;
        true
    }

    /// `Running → terminal`. Only the first call wins; later ones return
    /// `false` and leave the state untouched.
    pub fn finish(&mut self, terminal: ExecutionState) -> bool {
        if *self != ExecutionState::Running || !terminal.is_terminal() {
            return false;
        }
        *self = terminal;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = ExecutionState::default();
        assert!(!state.is_terminal());
        assert!(state.start());
        assert!(state.finish(ExecutionState::Completed));
        assert_eq!(state, ExecutionState::Completed);
    }

    #[test]
    fn test_only_first_terminal_transition_wins() {
        let mut state = ExecutionState::Running;
        assert!(state.finish(ExecutionState::TimedOut));
        assert!(!state.finish(ExecutionState::Completed));
        assert!(!state.finish(ExecutionState::Failed));
        assert_eq!(state, ExecutionState::TimedOut);
    }

    #[test]
    fn test_cannot_finish_before_start_or_restart() {
        let mut idle = ExecutionState::Idle;
        assert!(!idle.finish(ExecutionState::Failed));
        assert_eq!(idle, ExecutionState::Idle);

        let mut running = ExecutionState::Idle;
        assert!(running.start());
        assert!(!running.start());
        assert!(!running.finish(ExecutionState::Running));

        let mut failed = ExecutionState::Failed;
        assert!(!failed.start());
        assert_eq!(failed, ExecutionState::Failed);
    }
}
