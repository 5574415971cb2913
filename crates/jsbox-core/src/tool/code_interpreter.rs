//! The `code_interpreter_javascript` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::definition::ToolDefinition;
use super::registry::{ToolError, ToolHandler, ToolOutput, ToolRegistration};
use crate::render::render_outcome;
use crate::sandbox::Executor;

pub const CODE_INTERPRETER_JS_TOOL_NAME: &str = "code_interpreter_javascript";
pub const CODE_INTERPRETER_LABEL: &str = "Code Interpreter (JavaScript)";
pub const CODE_INTERPRETER_ENABLE_KEY: &str = "enableCodeInterpreterTool";

const TOOL_DESCRIPTION: &str =
    "Run JavaScript in an isolated sandbox and capture console output plus the final value.";
const DEFINITION_DESCRIPTION: &str = "Execute JavaScript in a sandboxed environment. Returns console output and the final evaluated value.";
const CODE_PARAM_DESCRIPTION: &str = "JavaScript source code to run.";

/// Pull the snippet out of a tool-call argument string.
///
/// Agents are expected to send `{"code": "..."}`, but anything else
/// (bare code, malformed JSON, a non-string `code`) runs as raw text.
pub fn parse_code_argument(args_json: &str) -> String {
    match serde_json::from_str::<Value>(args_json) {
        Ok(Value::Object(map)) => match map.get("code") {
            Some(Value::String(code)) => code.clone(),
            _ => args_json.to_string(),
        },
        _ => args_json.to_string(),
    }
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::function(
        CODE_INTERPRETER_JS_TOOL_NAME,
        DEFINITION_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": CODE_PARAM_DESCRIPTION,
                }
            },
            "required": ["code"],
        }),
    )
}

/// Handler backed by a shared [`Executor`].
#[derive(Debug, Clone)]
pub struct CodeInterpreterTool {
    executor: Arc<Executor>,
}

impl CodeInterpreterTool {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for CodeInterpreterTool {
    async fn execute(&self, args_json: &str) -> Result<ToolOutput, ToolError> {
        let code = parse_code_argument(args_json);
        let outcome = self.executor.run(&code).await?;
        Ok(ToolOutput {
            content: render_outcome(&outcome),
            expression: Some(code),
        })
    }
}

pub fn registration(executor: Arc<Executor>) -> ToolRegistration {
    ToolRegistration {
        name: CODE_INTERPRETER_JS_TOOL_NAME.to_string(),
        label: CODE_INTERPRETER_LABEL.to_string(),
        description: TOOL_DESCRIPTION.to_string(),
        enable_config_key: CODE_INTERPRETER_ENABLE_KEY.to_string(),
        default_enabled: false,
        definition: definition(),
        handler: Arc::new(CodeInterpreterTool::new(executor)),
    }
}
