//! jsbox core library
//!
//! Sandboxed execution of agent-submitted JavaScript: source transformation,
//! isolated per-invocation contexts with a wall-clock deadline, console
//! capture, error location, result rendering, and the tool registry that
//! exposes all of it as `code_interpreter_javascript`.

pub mod config;
pub mod console;
pub mod locate;
pub mod metrics;
pub mod obs;
pub mod render;
pub mod sandbox;
pub mod telemetry;
pub mod tool;
pub mod transform;

pub use config::{ConfigError, ExecutorSettings, JsboxConfig};
pub use console::{ConsoleCapture, LogEntry, LogLevel};
pub use locate::{ErrorLocation, ErrorLocator};
pub use render::{render_outcome, render_value, NO_OUTPUT};
pub use sandbox::{
    Completion, CompletionValue, Executor, ExecutorConfig, Failure, FailureKind, InvocationId,
    Outcome, SandboxError, SandboxResult, WorkerCommand,
};
pub use tool::{
    ToolDefinition, ToolError, ToolHandler, ToolOutput, ToolRegistration, ToolRegistry,
    ToolRegistryBuilder, ToolSettings, CODE_INTERPRETER_JS_TOOL_NAME,
};
pub use transform::{transform_snippet, TransformedSource};

/// Crate version, as reported by `jsbox --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
