//! Making files executable.

use std::path::Path;

use tracing::debug;

use crate::command::{CommandGraph, ParsedCommand};
use crate::decision::Decision;
use crate::guidance;
use crate::{git, subprocess};

use super::download::DownloadRecord;
use super::{Check, CheckContext};

const NAME: &str = "execution_check";

/// chmod options that never name the mode or a target.
const CHMOD_OPTIONS: &[&str] = &[
    "-R",
    "-f",
    "-v",
    "-c",
    "--recursive",
    "--silent",
    "--quiet",
    "--verbose",
    "--changes",
    "--preserve-root",
    "--no-preserve-root",
];

/// Asks for confirmation before `chmod` makes a downloaded or binary file
/// executable. Never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionCheck;

impl Check for ExecutionCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, _raw: &str, graph: &CommandGraph) -> Decision {
        graph
            .iter()
            .filter(|cmd| cmd.is("chmod"))
            .map(|cmd| check_chmod(ctx, cmd))
            .find(|d| !d.is_allowed())
            .unwrap_or_else(Decision::allow)
    }
}

fn check_chmod(ctx: &CheckContext, cmd: &ParsedCommand) -> Decision {
    let Some((mode, targets)) = split_mode(cmd) else {
        return Decision::allow();
    };
    if !adds_execute(mode) {
        return Decision::allow();
    }

    let config = &ctx.config.download_protection;
    let record = DownloadRecord::load(&ctx.download_record);

    for target in targets {
        let resolved = ctx.sandbox.resolve(target);

        if config.git_tracked_allow && git::is_git_tracked(&resolved, &ctx.sandbox.root) {
            continue;
        }

        if record.contains(&resolved) {
            return Decision::confirm(
                NAME,
                guidance::render("exec.downloaded", &[("path", target)]),
                guidance::render("exec.downloaded.guidance", &[("path", target)]),
            );
        }

        if config.detect_binary_by_magic
            && let Some(decision) = inspect_file(&resolved, target, config.file_command_fallback)
        {
            return decision;
        }
    }

    Decision::allow()
}

/// The mode operand and the file operands that follow it.
fn split_mode(cmd: &ParsedCommand) -> Option<(&str, Vec<&str>)> {
    let mut operands = cmd
        .words
        .iter()
        .map(String::as_str)
        .filter(|w| !CHMOD_OPTIONS.contains(w) && !w.starts_with("--reference"));
    let mode = operands.next()?;
    Some((mode, operands.collect()))
}

/// True if `mode` grants an execute bit.
///
/// Octal modes count when any permission digit is odd. Symbolic modes count
/// when a `+` or `=` clause includes `x` or `X`.
pub fn adds_execute(mode: &str) -> bool {
    if !mode.is_empty() && mode.chars().all(|c| c.is_ascii_digit()) {
        let digits = mode.as_bytes();
        let perms = &digits[digits.len().saturating_sub(3)..];
        return mode.len() >= 3 && perms.iter().any(|&d| (d - b'0') % 2 == 1);
    }

    mode.split(',').any(|clause| {
        let ops = clause.trim_start_matches(['u', 'g', 'o', 'a']);
        let mut granting = false;
        for c in ops.chars() {
            match c {
                '+' | '=' => granting = true,
                '-' => granting = false,
                'x' | 'X' if granting => return true,
                _ => {}
            }
        }
        false
    })
}

fn inspect_file(resolved: &Path, shown: &str, fallback: bool) -> Option<Decision> {
    if !resolved.is_file() {
        return None;
    }

    match subprocess::file_type(resolved) {
        Ok(description) => subprocess::describes_executable(&description).then(|| {
            Decision::confirm(
                NAME,
                guidance::render("exec.binary", &[("path", shown)]),
                guidance::render("exec.binary.guidance", &[("path", shown)]),
            )
        }),
        Err(e) => {
            debug!("file type check failed: {e:#}");
            if !fallback {
                return None;
            }
            let kind = subprocess::sniff_magic(resolved)?.to_string();
            Some(Decision::confirm(
                NAME,
                guidance::render("exec.magic", &[("kind", &kind), ("path", shown)]),
                guidance::render("exec.magic.guidance", &[("kind", &kind), ("path", shown)]),
            ))
        }
    }
}
