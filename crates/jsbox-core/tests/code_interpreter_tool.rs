//! The registered tool, dispatched the way an agent would call it.

use std::sync::Arc;

use jsbox_core::tool::code_interpreter::CODE_INTERPRETER_ENABLE_KEY;
use jsbox_core::{
    Executor, ExecutorConfig, ToolError, ToolRegistry, ToolSettings, WorkerCommand,
    CODE_INTERPRETER_JS_TOOL_NAME,
};

fn registry() -> ToolRegistry {
    let executor = Executor::new(
        WorkerCommand::new(env!("CARGO_BIN_EXE_jsbox-worker")),
        ExecutorConfig::default(),
    );
    ToolRegistry::builtin(Arc::new(executor))
}

#[tokio::test]
async fn json_arguments_run_the_code_field() {
    let out = registry()
        .dispatch(
            CODE_INTERPRETER_JS_TOOL_NAME,
            r#"{"code":"console.log('hi');\n6 * 7"}"#,
        )
        .await
        .unwrap();
    assert_eq!(out.content, "hi\n42");
    assert_eq!(out.expression.as_deref(), Some("console.log('hi');\n6 * 7"));
}

#[tokio::test]
async fn raw_text_arguments_run_as_code() {
    let out = registry()
        .dispatch(CODE_INTERPRETER_JS_TOOL_NAME, "2 ** 10")
        .await
        .unwrap();
    assert_eq!(out.content, "1024");
    assert_eq!(out.expression.as_deref(), Some("2 ** 10"));
}

#[tokio::test]
async fn failures_are_rendered_not_raised() {
    let out = registry()
        .dispatch(CODE_INTERPRETER_JS_TOOL_NAME, r#"{"code":"const a = 1;\nmissing(a)"}"#)
        .await
        .unwrap();
    assert!(out.content.starts_with("Error (line 2: missing(a)): "));
}

#[tokio::test]
async fn unknown_tools_are_rejected() {
    let err = registry().dispatch("python", "{}").await.unwrap_err();
    assert!(matches!(err, ToolError::UnknownTool { .. }));
}

#[tokio::test]
async fn enable_flag_controls_exposed_definitions() {
    let registry = registry();
    assert!(registry.enabled_definitions(&ToolSettings::new()).is_empty());

    let settings = ToolSettings::new().with(CODE_INTERPRETER_ENABLE_KEY, true);
    let defs = registry.enabled_definitions(&settings);
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name(), CODE_INTERPRETER_JS_TOOL_NAME);
    assert_eq!(
        registry.setting_defaults().get(CODE_INTERPRETER_ENABLE_KEY),
        Some(false)
    );
}
