//! Sandbox: run untrusted JavaScript in disposable, isolated contexts.
//!
//! Every invocation gets its own worker process hosting a fresh engine
//! context with no ambient capabilities. The host races the worker's message
//! stream against a wall-clock deadline and always kills the worker when the
//! race is decided.
//!
//! # Modules
//!
//! - [`executor`]: `Executor`, `WorkerCommand`, `ExecutorConfig` (host side)
//! - [`worker`]: `serve_stdio()` (context side, one request per process)
//! - [`prelude`]: JavaScript installed before the user script
//! - [`instrument`]: statement marks that locate runtime faults
//! - [`protocol`]: `WorkerRequest`, `WorkerMessage`, `Envelope`
//! - [`outcome`]: `Invocation`, `Outcome`, `Completion`, `Failure`
//! - [`state`]: `ExecutionState` single-resolution state machine
//! - [`error`]: `SandboxError` / `SandboxResult`

pub mod error;
pub mod executor;
pub mod instrument;
pub mod outcome;
pub mod prelude;
pub mod protocol;
pub mod state;
pub mod worker;

pub use error::{SandboxError, SandboxResult};
pub use executor::{Executor, ExecutorConfig, WorkerCommand};
pub use outcome::{
    Completion, CompletionValue, Failure, FailureKind, Invocation, InvocationId, Outcome,
    DEFAULT_TIMEOUT_MS, TIMEOUT_MESSAGE,
};
pub use protocol::{Envelope, WorkerMessage, WorkerRequest};
pub use state::ExecutionState;
