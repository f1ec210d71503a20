//! Secret files and protected project files.

use std::path::Path;

use glob::Pattern;

use crate::command::{CommandGraph, ParsedCommand, extract_paths};
use crate::decision::Decision;
use crate::guidance;

use super::{Check, CheckContext};

const NAME: &str = "secrets_check";

/// Operations that change the file they name.
const WRITE_OPERATIONS: &[&str] = &[
    "write", "edit", "tee", "echo", ">", ">>", "cp", "mv", "rm", "touch", "sed", "awk",
    "truncate", "install", "ln", "dd",
];

/// Blocks reading secrets and modifying protected files inside the project.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretsCheck;

impl Check for SecretsCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, _raw: &str, graph: &CommandGraph) -> Decision {
        for cmd in graph {
            for path in extract_paths(cmd) {
                let decision = self.check_path(ctx, &path, operation_for(cmd, &path));
                if !decision.is_allowed() {
                    return decision;
                }
            }
        }
        Decision::allow()
    }

    fn check_path(&self, ctx: &CheckContext, path: &str, operation: &str) -> Decision {
        let resolved = ctx.sandbox.resolve(path);
        let Some(relative) = ctx.sandbox.relative(&resolved) else {
            return Decision::allow();
        };
        let protected = &ctx.config.protected_paths;

        if is_write_operation(operation) {
            if matches_any(&protected.no_modify, &relative, false) {
                return Decision::block(
                    NAME,
                    guidance::render("secrets.modify", &[("path", path)]),
                    guidance::render("secrets.modify.guidance", &[("path", path)]),
                );
            }
        } else if matches_any(&protected.no_read_content, &relative, true) {
            return Decision::block(
                NAME,
                guidance::render("secrets.read", &[("path", path)]),
                read_guidance(ctx, &resolved, path),
            );
        }

        Decision::allow()
    }
}

/// `cp` reads its sources; everything else takes the program's class.
fn operation_for<'a>(cmd: &'a ParsedCommand, path: &str) -> &'a str {
    let Some(position) = cmd.args.iter().position(|a| a == path) else {
        return ">";
    };
    if cmd.is("cp") && position + 1 < cmd.args.len() {
        "read"
    } else {
        cmd.program()
    }
}

fn is_write_operation(operation: &str) -> bool {
    let lower = operation.to_lowercase();
    WRITE_OPERATIONS.contains(&lower.as_str())
}

/// Glob match against the project-relative path and, when `by_name`, the
/// bare file name. Negated patterns (`!glob`) are consulted first and win.
fn matches_any(patterns: &[String], relative: &str, by_name: bool) -> bool {
    let name = Path::new(relative)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hits = |glob: &str| {
        let glob = glob.strip_prefix("**/").unwrap_or(glob);
        glob_matches(glob, relative) || (by_name && glob_matches(glob, &name))
    };

    let negated = patterns
        .iter()
        .filter_map(|p| p.strip_prefix('!'))
        .any(hits);
    if negated {
        return false;
    }

    patterns
        .iter()
        .filter(|p| !p.starts_with('!'))
        .any(|p| hits(p))
}

/// fnmatch-style: `*` also crosses `/`. An invalid pattern only matches
/// itself literally.
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(candidate),
        Err(_) => pattern == candidate,
    }
}

fn read_guidance(ctx: &CheckContext, resolved: &Path, shown: &str) -> String {
    let is_env = resolved
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(".env"));
    if !is_env {
        return guidance::render("secrets.protected", &[("path", shown)]);
    }

    let example = resolved.with_file_name(".env.example");
    if example.is_file() {
        let shown_example = ctx
            .sandbox
            .relative(&example)
            .unwrap_or_else(|| example.display().to_string());
        return guidance::render(
            "secrets.env_example",
            &[("path", shown), ("example", &shown_example)],
        );
    }
    guidance::render("secrets.env", &[("path", shown)])
}
