//! Tool surface: registration records, the immutable registry, and the
//! built-in JavaScript code interpreter.
//!
//! # Modules
//!
//! - [`definition`]: OpenAI-style `ToolDefinition`
//! - [`registry`]: `ToolRegistration`, `ToolRegistryBuilder`, `ToolRegistry`
//! - [`code_interpreter`]: `code_interpreter_javascript` handler and record

pub mod code_interpreter;
pub mod definition;
pub mod registry;

pub use code_interpreter::{parse_code_argument, CodeInterpreterTool, CODE_INTERPRETER_JS_TOOL_NAME};
pub use definition::{FunctionDefinition, ToolDefinition};
pub use registry::{
    ToolError, ToolHandler, ToolOutput, ToolRegistration, ToolRegistry, ToolRegistryBuilder,
    ToolSettings,
};
