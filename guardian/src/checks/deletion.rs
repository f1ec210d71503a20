//! File deletion commands.

use std::path::Path;

use crate::command::{CommandGraph, ParsedCommand, extract_paths};
use crate::decision::Decision;
use crate::guidance;

use super::{Check, CheckContext};

const NAME: &str = "deletion_check";

const DELETE_COMMANDS: &[&str] = &["rm", "rmdir", "unlink", "shred"];

/// Blocks deletion outside the sandbox and recursive deletion of protected
/// trees or the project root.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionCheck;

impl Check for DeletionCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, _raw: &str, graph: &CommandGraph) -> Decision {
        graph
            .iter()
            .filter(|cmd| DELETE_COMMANDS.iter().any(|name| cmd.is(name)))
            .map(|cmd| check_deletion(ctx, cmd))
            .find(|d| !d.is_allowed())
            .unwrap_or_else(Decision::allow)
    }
}

fn check_deletion(ctx: &CheckContext, cmd: &ParsedCommand) -> Decision {
    let recursive = is_recursive(&cmd.flags);
    let protected = protected_bases(&ctx.config.protected_paths.no_modify);

    for path in extract_paths(cmd) {
        let resolved = ctx.sandbox.resolve(&path);

        if !ctx.sandbox.contains(&resolved) {
            let suggested = std::iter::once(cmd.program())
                .chain(cmd.flags.iter().map(String::as_str))
                .chain(std::iter::once(path.as_str()))
                .collect::<Vec<_>>()
                .join(" ");
            return Decision::block(
                NAME,
                guidance::render("delete.outside", &[("path", &path)]),
                guidance::render("delete.outside.guidance", &[("command", &suggested)]),
            );
        }

        if recursive && let Some(decision) = check_recursive(ctx, &resolved, &path, &protected) {
            return decision;
        }
    }

    Decision::allow()
}

fn check_recursive(
    ctx: &CheckContext,
    resolved: &Path,
    original: &str,
    protected: &[String],
) -> Option<Decision> {
    // Allowed roots outside the project have no protected trees.
    let relative = ctx.sandbox.relative(resolved)?;

    if relative.is_empty() || relative == "." {
        return Some(Decision::block(
            NAME,
            guidance::render("delete.root", &[]),
            guidance::render("delete.root.guidance", &[]),
        ));
    }

    let is_protected = protected.iter().any(|base| {
        relative == *base
            || relative
                .strip_prefix(base.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    });
    if is_protected {
        return Some(Decision::block(
            NAME,
            guidance::render("delete.protected", &[("path", original)]),
            guidance::render("delete.protected.guidance", &[("path", original)]),
        ));
    }

    None
}

/// `-r`, `-R`, `--recursive`, or a short cluster containing `r` or `R`.
fn is_recursive(flags: &[String]) -> bool {
    flags.iter().any(|flag| {
        flag == "--recursive"
            || (!flag.starts_with("--") && flag.len() > 1 && flag[1..].contains(['r', 'R']))
    })
}

/// Literal prefixes of the no-modify globs, plus `.git`.
fn protected_bases(no_modify: &[String]) -> Vec<String> {
    let mut bases: Vec<String> = no_modify
        .iter()
        .filter_map(|pattern| {
            let base = pattern.split('*').next().unwrap_or("").trim_end_matches('/');
            (!base.is_empty() && base != ".").then(|| base.to_string())
        })
        .collect();
    if !bases.iter().any(|b| b == ".git") {
        bases.push(".git".to_string());
    }
    bases
}
