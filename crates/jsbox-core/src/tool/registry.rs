//! Tool registration records and the registry agents query.
//!
//! Registration is append-only and happens once, through
//! [`ToolRegistryBuilder`]. The built [`ToolRegistry`] is immutable and safe
//! to share across concurrent invocations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::definition::ToolDefinition;
use crate::sandbox::{Executor, SandboxError};

/// Text handed back to the agent, plus the code that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Executes one tool call from its raw JSON argument text.
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn execute(&self, args_json: &str) -> Result<ToolOutput, ToolError>;
}

/// Static description of one tool plus its handler.
#[derive(Clone)]
pub struct ToolRegistration {
    pub name: String,
    pub label: String,
    pub description: String,
    /// Settings key that switches the tool on or off.
    pub enable_config_key: String,
    pub default_enabled: bool,
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("enable_config_key", &self.enable_config_key)
            .field("default_enabled", &self.default_enabled)
            .finish_non_exhaustive()
    }
}

/// User-provided enable flags, keyed by `enable_config_key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSettings {
    flags: BTreeMap<String, bool>,
}

impl ToolSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.set(key, enabled);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.flags.insert(key.into(), enabled);
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.flags.get(key).copied()
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolRegistration>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. A second registration under an existing name
    /// is ignored and returns `false`.
    pub fn register(&mut self, registration: ToolRegistration) -> bool {
        if self.tools.iter().any(|t| t.name == registration.name) {
            tracing::warn!(tool = %registration.name, "duplicate tool registration ignored");
            return false;
        }
        self.tools.push(registration);
        true
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: Arc::from(self.tools),
        }
    }
}

/// Immutable, cheaply cloneable registry.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Arc<[ToolRegistration]>,
}

impl ToolRegistry {
    /// Registry holding every tool this crate ships.
    pub fn builtin(executor: Arc<Executor>) -> Self {
        let mut builder = ToolRegistryBuilder::new();
        builder.register(super::code_interpreter::registration(executor));
        builder.build()
    }

    /// All registrations, in registration order.
    pub fn all(&self) -> &[ToolRegistration] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&ToolRegistration> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Unknown names are never enabled.
    pub fn is_enabled(&self, name: &str, settings: &ToolSettings) -> bool {
        self.find(name)
            .map(|t| enabled(t, settings))
            .unwrap_or(false)
    }

    pub fn enabled_definitions(&self, settings: &ToolSettings) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| enabled(t, settings))
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Default value for every enable key.
    pub fn setting_defaults(&self) -> ToolSettings {
        self.tools.iter().fold(ToolSettings::new(), |settings, t| {
            settings.with(t.enable_config_key.clone(), t.default_enabled)
        })
    }

    /// Route a call to its handler.
    pub async fn dispatch(&self, name: &str, args_json: &str) -> Result<ToolOutput, ToolError> {
        let tool = self.find(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        tracing::debug!(tool = %name, args_len = args_json.len(), "dispatching tool call");
        tool.handler.execute(args_json).await
    }
}

fn enabled(tool: &ToolRegistration, settings: &ToolSettings) -> bool {
    settings
        .get(&tool.enable_config_key)
        .unwrap_or(tool.default_enabled)
}
