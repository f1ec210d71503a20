use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guardian::checks::CheckContext;
use guardian::decision::Decision;
use guardian::handlers::{self, handle_pre_tool_use};
use guardian::hooks::{self, HookInput, exit_code};
use guardian::{errors, style, tracing_init};
use guardian_config::{ConfigLocator, GuardianConfig, LoggingConfig, load_effective};
use serde_json::json;
use tracing::{Level, error, instrument};

#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "Policy enforcement for coding-agent tool invocations")]
struct Cli {
    /// Configuration file to use instead of discovery
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Handle a PreToolUse hook: read JSON from stdin, exit 0 (allow) or 2 (block/confirm)
    Hook,

    /// Evaluate a single tool invocation and print the decision
    Check {
        /// Tool name (Bash, Read, Write, Edit, NotebookEdit, Glob, Grep)
        tool: String,
        /// The command for Bash, otherwise the path
        arg: String,
    },

    /// Print the effective configuration as YAML
    Config {
        /// Print the resolved configuration file path instead
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    fn locator(&self) -> ConfigLocator {
        let locator = ConfigLocator::new();
        match &self.config {
            Some(path) => locator.with_explicit(path),
            None => locator,
        }
    }

    fn load_config(&self) -> Result<(GuardianConfig, Option<PathBuf>)> {
        load_effective(&self.locator()).context("failed to load guardian configuration")
    }
}

/// Runs the hook. Every failure fails open, panics included.
fn run_hook(cli: &Cli) -> i32 {
    hook_exit_code(
        std::panic::catch_unwind(|| try_hook(cli)),
        &LoggingConfig::default(),
    )
}

/// Exit code for a finished hook run. Errors and panics allow the tool call.
///
/// `fallback_logging` is installed first so the failure is recorded even
/// when the configuration never loaded.
fn hook_exit_code(
    outcome: std::thread::Result<Result<i32>>,
    fallback_logging: &LoggingConfig,
) -> i32 {
    let failure = match outcome {
        Ok(Ok(code)) => return code,
        Ok(Err(e)) => format!("{e:#}"),
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string()),
    };
    tracing_init::init_tracing(fallback_logging);
    error!(error = %failure, "hook failed, allowing tool invocation");
    exit_code::SUCCESS
}

#[instrument(level = Level::TRACE, skip(cli))]
fn try_hook(cli: &Cli) -> Result<i32> {
    let (config, _) = cli.load_config()?;
    tracing_init::init_tracing(&config.logging);

    let input = HookInput::from_stdin()?;
    let ctx = CheckContext::new(config);
    let decision = handle_pre_tool_use(&input, &ctx);
    hooks::emit(&decision, std::io::stderr().lock())
}

fn tool_input(tool: &str, arg: &str) -> serde_json::Value {
    match tool {
        "Bash" => json!({ "command": arg }),
        "NotebookEdit" => json!({ "notebook_path": arg }),
        "Glob" | "Grep" => json!({ "path": arg }),
        _ => json!({ "file_path": arg }),
    }
}

fn run_check(cli: &Cli, tool: &str, arg: &str) -> Result<i32> {
    let (config, _) = cli.load_config()?;
    let ctx = CheckContext::new(config);
    let decision: Decision = handlers::evaluate(&HookInput::new(tool, tool_input(tool, arg)), &ctx);

    println!("{} {}", style::header("decision:"), style::status(decision.status));
    if !decision.is_allowed() {
        println!("{} {}", style::header("check:"), decision.check);
        println!("{} {}", style::header("reason:"), decision.reason);
        println!("{} {}", style::header("guidance:"), style::dim(&decision.guidance));
    }
    Ok(decision.exit_code())
}

fn run_config(cli: &Cli, path: bool) -> Result<i32> {
    let (config, source) = cli.load_config()?;
    if path {
        match source {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", style::dim("(built-in defaults)")),
        }
    } else {
        print!("{}", guardian_config::to_yaml(&config)?);
    }
    Ok(exit_code::SUCCESS)
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Hook => Ok(run_hook(&cli)),
        Commands::Check { tool, arg } => run_check(&cli, tool, arg),
        Commands::Config { path } => run_config(&cli, *path),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            errors::display_error(&e, cli.verbose);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> LoggingConfig {
        LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_hook_exit_code_passes_decisions_through() {
        assert_eq!(hook_exit_code(Ok(Ok(exit_code::BLOCKING_ERROR)), &quiet()), 2);
        assert_eq!(hook_exit_code(Ok(Ok(exit_code::SUCCESS)), &quiet()), 0);
    }

    #[test]
    fn test_hook_errors_fail_open() {
        let outcome = Ok(Err(anyhow::anyhow!("failed to load guardian configuration")));
        assert_eq!(hook_exit_code(outcome, &quiet()), exit_code::SUCCESS);
    }

    #[test]
    fn test_hook_panics_fail_open() {
        let outcome = std::panic::catch_unwind(|| -> Result<i32> { panic!("check bug") });
        assert_eq!(hook_exit_code(outcome, &quiet()), exit_code::SUCCESS);

        let outcome = std::panic::catch_unwind(|| -> Result<i32> {
            panic!("{}", String::from("formatted"))
        });
        assert_eq!(hook_exit_code(outcome, &quiet()), exit_code::SUCCESS);
    }
}
