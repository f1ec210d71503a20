//! Tool dispatch: which checks run for which tool.
//!
//! Each tool names its target differently (`command`, `file_path`,
//! `notebook_path`, `path`). Missing or empty targets have nothing to check
//! and are allowed.

use tracing::{Level, info, instrument};

use crate::audit;
use crate::checks::{self, BASH_CHECKS, CheckContext, FILE_CHECKS, SEARCH_CHECKS};
use crate::command;
use crate::decision::Decision;
use crate::hooks::{HookInput, ToolInput};

/// Decides a single tool invocation.
#[instrument(level = Level::TRACE, skip(input, ctx), fields(tool = %input.tool_name))]
pub fn evaluate(input: &HookInput, ctx: &CheckContext) -> Decision {
    match input.typed_tool_input() {
        ToolInput::Bash(bash) => evaluate_command(&bash.command, ctx),
        ToolInput::Read(file) => evaluate_path(&file.file_path, "read", ctx),
        ToolInput::Write(file) | ToolInput::Edit(file) => {
            evaluate_path(&file.file_path, "write", ctx)
        }
        ToolInput::NotebookEdit(notebook) => evaluate_path(&notebook.notebook_path, "write", ctx),
        ToolInput::Glob(search) | ToolInput::Grep(search) => match search.path.as_deref() {
            Some(path) if !path.trim().is_empty() => {
                checks::run_path(SEARCH_CHECKS, ctx, path, "find")
            }
            _ => Decision::allow(),
        },
        ToolInput::Unknown(_) => Decision::allow(),
    }
}

/// Runs the Bash pipeline over a command line.
pub fn evaluate_command(raw: &str, ctx: &CheckContext) -> Decision {
    if raw.trim().is_empty() {
        return Decision::allow();
    }
    let graph = command::parse(raw);
    checks::run_command(BASH_CHECKS, ctx, raw, &graph)
}

/// Runs the file pipeline over one path.
pub fn evaluate_path(path: &str, operation: &str, ctx: &CheckContext) -> Decision {
    if path.trim().is_empty() {
        return Decision::allow();
    }
    checks::run_path(FILE_CHECKS, ctx, path, operation)
}

/// Handles a PreToolUse request: decides, then records non-allow outcomes.
#[instrument(level = Level::TRACE, skip(input, ctx))]
pub fn handle_pre_tool_use(input: &HookInput, ctx: &CheckContext) -> Decision {
    let decision = evaluate(input, ctx);
    if !decision.is_allowed() {
        info!(
            tool = %input.tool_name,
            status = %decision.status,
            check = %decision.check,
            reason = %decision.reason,
            "tool invocation flagged"
        );
        audit::log_decision(&ctx.config.logging, input, &decision);
    }
    decision
}
