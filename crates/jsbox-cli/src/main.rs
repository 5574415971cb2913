//! jsbox - sandboxed JavaScript execution for autonomous agents
//!
//! ## Commands
//!
//! - `run`: Execute a snippet and print its logs and result
//! - `tool list`: Show registered tools and whether they are enabled
//! - `tool definitions`: Print tool definitions as JSON
//! - `tool call`: Dispatch a tool call the way an agent would

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

use jsbox_core::metrics::METRICS;
use jsbox_core::{render_outcome, Executor, JsboxConfig, ToolRegistry, WorkerCommand};

/// Subcommand the CLI re-launches itself with to host a context.
const WORKER_SUBCOMMAND: &str = "worker";

#[derive(Parser)]
#[command(name = "jsbox")]
#[command(author = "Stevedores Org")]
#[command(version = jsbox_core::VERSION)]
#[command(about = "Sandboxed JavaScript execution for autonomous agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "JSBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a snippet from a file, `-e`, or stdin
    Run {
        /// File containing the snippet
        file: Option<PathBuf>,

        /// Snippet text
        #[arg(short = 'e', long = "eval", conflicts_with = "file")]
        eval: Option<String>,

        /// Wall-clock budget in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Inspect and call registered tools
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Serve one isolated context on stdin/stdout
    #[command(hide = true)]
    Worker,
}

#[derive(Subcommand)]
enum ToolAction {
    /// List registered tools
    List,

    /// Print tool definitions as JSON
    Definitions {
        /// Include disabled tools
        #[arg(long)]
        all: bool,
    },

    /// Call a tool with JSON (or raw) arguments
    Call {
        /// Tool name
        name: String,

        /// Argument text (default: read stdin)
        args: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

struct ToolSummary<'a> {
    name: &'a str,
    label: &'a str,
    enable_config_key: &'a str,
    enabled: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli {
        verbose,
        json,
        config,
        command,
    } = Cli::parse();

    let setup = || -> Result<JsboxConfig> {
        let level = if verbose { Level::DEBUG } else { Level::WARN };
        jsbox_core::telemetry::init_tracing(json, level);
        JsboxConfig::load(config.as_deref()).context("Failed to load configuration")
    };

    let code = match command {
        Commands::Worker => return cmd_worker(json),
        Commands::Run {
            file,
            eval,
            timeout_ms,
            format,
        } => cmd_run(&setup()?, file.as_deref(), eval, timeout_ms, format).await,
        Commands::Tool { action } => {
            let config = setup()?;
            match action {
                ToolAction::List => cmd_tool_list(&config),
                ToolAction::Definitions { all } => cmd_tool_definitions(&config, all),
                ToolAction::Call { name, args } => cmd_tool_call(&config, &name, args).await,
            }
        }
    };

    METRICS.flush();
    code
}

/// Stdout is the protocol channel here, so logging stays at `warn` and no
/// config is read.
fn cmd_worker(json: bool) -> Result<ExitCode> {
    jsbox_core::telemetry::init_tracing(json, Level::WARN);
    jsbox_core::sandbox::worker::serve_stdio()?;
    Ok(ExitCode::SUCCESS)
}

fn build_executor(config: &JsboxConfig) -> Result<Executor> {
    let worker = match config.executor.worker_command() {
        Some(worker) => worker,
        None => WorkerCommand::current_exe_with([WORKER_SUBCOMMAND])
            .context("Failed to locate the jsbox executable")?,
    };
    Ok(Executor::new(worker, config.executor.executor_config()))
}

fn build_registry(config: &JsboxConfig) -> Result<ToolRegistry> {
    Ok(ToolRegistry::builtin(Arc::new(build_executor(config)?)))
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn read_snippet(file: Option<&Path>, eval: Option<String>) -> Result<String> {
    match (eval, file) {
        (Some(code), _) => Ok(code),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => read_stdin(),
    }
}

async fn cmd_run(
    config: &JsboxConfig,
    file: Option<&Path>,
    eval: Option<String>,
    timeout_ms: Option<u64>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let code = read_snippet(file, eval)?;
    let executor = build_executor(config)?;
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| executor.default_timeout());

    let outcome = executor
        .run_with_timeout(&code, timeout)
        .await
        .context("Sandbox failed")?;

    match format {
        OutputFormat::Text => println!("{}", render_outcome(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(if outcome.is_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn cmd_tool_list(config: &JsboxConfig) -> Result<ExitCode> {
    let registry = build_registry(config)?;
    let summaries: Vec<ToolSummary<'_>> = registry
        .all()
        .iter()
        .map(|tool| ToolSummary {
            name: &tool.name,
            label: &tool.label,
            enable_config_key: &tool.enable_config_key,
            enabled: registry.is_enabled(&tool.name, &config.tools),
        })
        .collect();

    for tool in &summaries {
        let state = if tool.enabled { "enabled" } else { "disabled" };
        println!(
            "{:<32} {:<8} {} ({})",
            tool.name, state, tool.label, tool.enable_config_key
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_tool_definitions(config: &JsboxConfig, all: bool) -> Result<ExitCode> {
    let registry = build_registry(config)?;
    let definitions = if all {
        registry
            .all()
            .iter()
            .map(|tool| tool.definition.clone())
            .collect()
    } else {
        registry.enabled_definitions(&config.tools)
    };
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_tool_call(config: &JsboxConfig, name: &str, args: Option<String>) -> Result<ExitCode> {
    let registry = build_registry(config)?;
    let args = match args {
        Some(args) => args,
        None => read_stdin()?,
    };
    let output = registry
        .dispatch(name, &args)
        .await
        .with_context(|| format!("Tool call '{name}' failed"))?;
    println!("{}", output.content);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "jsbox",
            "--verbose",
            "run",
            "-e",
            "1 + 1",
            "--timeout-ms",
            "250",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                eval,
                timeout_ms,
                format,
                file,
            } => {
                assert_eq!(eval.as_deref(), Some("1 + 1"));
                assert_eq!(timeout_ms, Some(250));
                assert_eq!(format, OutputFormat::Json);
                assert!(file.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_file_and_eval_conflict() {
        assert!(Cli::try_parse_from(["jsbox", "run", "a.js", "-e", "1"]).is_err());
    }

    #[test]
    fn test_tool_call_parses() {
        let cli =
            Cli::try_parse_from(["jsbox", "tool", "call", "code_interpreter_javascript", "1"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tool {
                action: ToolAction::Call { ref name, args: Some(_) }
            } if name == "code_interpreter_javascript"
        ));
    }

    #[test]
    fn test_read_snippet_prefers_eval_then_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "console.log('from file')").unwrap();

        assert_eq!(
            read_snippet(Some(file.path()), Some("inline".into())).unwrap(),
            "inline"
        );
        assert_eq!(
            read_snippet(Some(file.path()), None).unwrap(),
            "console.log('from file')"
        );
        assert!(read_snippet(Some(Path::new("/nonexistent/snippet.js")), None).is_err());
    }

    #[test]
    fn test_configured_worker_is_used() {
        let mut config = JsboxConfig::default();
        config.executor.worker_program = Some(PathBuf::from("/opt/jsbox-worker"));
        let executor = build_executor(&config).unwrap();
        assert_eq!(executor.worker().program(), Path::new("/opt/jsbox-worker"));
    }
}
