//! Directory boundary: the primary containment layer.

use crate::command::{CommandGraph, ParsedCommand, extract_paths};
use crate::decision::Decision;
use crate::guidance;

use super::{Check, CheckContext};

const NAME: &str = "directory_check";

/// Every path an operation touches must resolve inside the sandbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryCheck;

impl Check for DirectoryCheck {
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
        let shown = resolved.display().to_string();

        if ctx.sandbox.is_symlink_escape(path) {
            return Decision::block(
                NAME,
                guidance::render("dir.symlink", &[("path", path), ("resolved", &shown)]),
                guidance::render("dir.symlink.guidance", &[("op", operation), ("path", path)]),
            );
        }

        if !ctx.sandbox.contains(&resolved) {
            return Decision::block(
                NAME,
                guidance::render("dir.outside", &[("resolved", &shown)]),
                guidance_for(operation, path),
            );
        }

        Decision::allow()
    }
}

/// Paths that only appear as redirect targets are written by the shell.
fn operation_for<'a>(cmd: &'a ParsedCommand, path: &str) -> &'a str {
    if cmd.args.iter().any(|a| a == path) {
        cmd.program()
    } else {
        ">"
    }
}

fn guidance_for(operation: &str, path: &str) -> String {
    let key = match operation {
        "cat" | "less" | "head" | "tail" | "read" => "dir.read",
        "rm" | "unlink" | "rmdir" => "dir.delete",
        "cp" | "mv" => "dir.copy",
        "find" | "ls" => "dir.search",
        "echo" | "tee" | "write" | ">" | ">>" => "dir.write",
        _ => "dir.other",
    };
    guidance::render(key, &[("op", operation), ("path", path)])
}
