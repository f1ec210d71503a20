//! Attempts to get around the other checks by indirection.

use guardian_config::BypassPreventionConfig;

use crate::command::{CommandGraph, ParsedCommand, pipes_into};
use crate::decision::Decision;
use crate::guidance;

use super::{Check, CheckContext};

const NAME: &str = "bypass_check";

/// Shells that accept a command string with `-c`.
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh", "ash"];

/// Detects eval-style commands, variable commands, shell pipes, inline
/// shell execution and suspicious interpreter one-liners.
#[derive(Debug, Clone, Copy, Default)]
pub struct BypassCheck;

impl Check for BypassCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, raw: &str, graph: &CommandGraph) -> Decision {
        let config = &ctx.config.bypass_prevention;
        [
            check_hard_blocked,
            check_variable_as_command,
            check_pipe_to_shell,
            check_shell_exec,
            check_inline_interpreter,
        ]
        .iter()
        .map(|sub_check| sub_check(config, raw, graph))
        .find(|d| !d.is_allowed())
        .unwrap_or_else(Decision::allow)
    }
}

fn check_hard_blocked(config: &BypassPreventionConfig, _raw: &str, graph: &CommandGraph) -> Decision {
    for cmd in graph {
        if let Some(blocked) = config.hard_blocked.iter().find(|name| cmd.is(name)) {
            return Decision::block(
                NAME,
                guidance::render("bypass.hard_blocked", &[("command", blocked)]),
                guidance::render("bypass.hard_blocked.guidance", &[]),
            );
        }
    }
    Decision::allow()
}

fn check_variable_as_command(
    config: &BypassPreventionConfig,
    _raw: &str,
    graph: &CommandGraph,
) -> Decision {
    if config.block_variable_as_command && graph.iter().any(|cmd| cmd.variable_as_command) {
        return Decision::block(
            NAME,
            guidance::render("bypass.variable", &[]),
            guidance::render("bypass.variable.guidance", &[]),
        );
    }
    Decision::allow()
}

fn check_pipe_to_shell(config: &BypassPreventionConfig, _raw: &str, graph: &CommandGraph) -> Decision {
    if pipes_into(graph, &config.block_shell_pipe_targets) {
        return Decision::block(
            NAME,
            guidance::render("bypass.pipe_shell", &[]),
            guidance::render("bypass.pipe_shell.guidance", &[]),
        );
    }
    Decision::allow()
}

fn check_shell_exec(config: &BypassPreventionConfig, raw: &str, graph: &CommandGraph) -> Decision {
    if let Some(pattern) = config
        .block_shell_exec_patterns
        .iter()
        .find(|p| contains_at_word_start(raw, p))
    {
        return Decision::block(
            NAME,
            guidance::render("bypass.exec_pattern", &[("pattern", pattern.trim_end())]),
            guidance::render("bypass.exec_pattern.guidance", &[]),
        );
    }

    for cmd in graph {
        if let Some(decision) = shell_exec_form(cmd) {
            return decision;
        }
    }
    Decision::allow()
}

fn shell_exec_form(cmd: &ParsedCommand) -> Option<Decision> {
    let program = cmd.program();

    if SHELLS.contains(&program) && cmd.flags.iter().any(|f| is_command_flag(f)) {
        return Some(Decision::block(
            NAME,
            guidance::render("bypass.shell_exec", &[("command", program)]),
            guidance::render("bypass.shell_exec.guidance", &[]),
        ));
    }

    let names_shell = |arg: &String| {
        let base = arg.rsplit('/').next().unwrap_or(arg);
        SHELLS.contains(&base)
    };

    if program == "env" && cmd.args.iter().any(names_shell) {
        return Some(Decision::block(
            NAME,
            guidance::render("bypass.env_shell", &[]),
            guidance::render("bypass.env_shell.guidance", &[]),
        ));
    }

    if program == "busybox" && cmd.args.iter().any(names_shell) {
        return Some(Decision::block(
            NAME,
            guidance::render("bypass.busybox", &[]),
            guidance::render("bypass.busybox.guidance", &[]),
        ));
    }

    None
}

/// `-c`, or a short cluster such as `-lc` or `-ec`.
fn is_command_flag(flag: &str) -> bool {
    flag == "-c" || (!flag.starts_with("--") && flag.len() > 2 && flag[1..].contains('c'))
}

/// True if `needle` occurs in `haystack` not preceded by a word character,
/// so `sh -c ` does not fire on `ssh -c `.
fn contains_at_word_start(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
    })
}

fn check_inline_interpreter(
    config: &BypassPreventionConfig,
    raw: &str,
    _graph: &CommandGraph,
) -> Decision {
    let contains_any = |patterns: &[String]| patterns.iter().any(|p| !p.is_empty() && raw.contains(p.as_str()));

    if !contains_any(&config.confirm_interpreter_inline_with_network) {
        return Decision::allow();
    }

    let network = contains_any(&config.network_patterns);
    let rce = contains_any(&config.rce_patterns_require_network);
    let obfuscation = contains_any(&config.obfuscation_patterns);

    let key = if network && rce {
        "bypass.rce"
    } else if network {
        "bypass.network"
    } else if obfuscation {
        "bypass.obfuscation"
    } else {
        return Decision::allow();
    };

    Decision::confirm(
        NAME,
        guidance::render(key, &[]),
        guidance::render(&format!("{key}.guidance"), &[]),
    )
}
