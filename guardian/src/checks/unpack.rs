//! Archive extraction targets.

use crate::command::{CommandGraph, ParsedCommand};
use crate::decision::Decision;
use crate::guidance;
use crate::paths::archive_path_traversal;

use super::{Check, CheckContext};

const NAME: &str = "unpack_check";

const UNPACK_COMMANDS: &[&str] = &[
    "tar", "bsdtar", "unzip", "unrar", "7z", "7za", "gunzip", "bunzip2", "unxz",
];

/// Blocks extraction outside the sandbox and path-rewriting extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpackCheck;

impl Check for UnpackCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, raw: &str, graph: &CommandGraph) -> Decision {
        if let Some(pattern) = ctx
            .config
            .unpack_protection
            .blocked_patterns
            .iter()
            .find(|p| !p.is_empty() && raw.contains(p.as_str()))
        {
            return Decision::block(
                NAME,
                guidance::render("unpack.pattern", &[("pattern", pattern)]),
                guidance::render("unpack.pattern.guidance", &[("command", raw)]),
            );
        }

        for cmd in graph {
            let decision = if cmd.program().starts_with("python") {
                check_python_unpack(ctx, cmd)
            } else if UNPACK_COMMANDS.contains(&cmd.program()) {
                check_unpack(ctx, cmd)
            } else {
                continue;
            };
            if !decision.is_allowed() {
                return decision;
            }
        }

        Decision::allow()
    }
}

/// `python -m zipfile|tarfile -e ARCHIVE TARGET`.
fn check_python_unpack(ctx: &CheckContext, cmd: &ParsedCommand) -> Decision {
    let words = &cmd.words;
    let is_archive_module = words
        .windows(2)
        .any(|w| w[0] == "-m" && (w[1] == "zipfile" || w[1] == "tarfile"));
    if !is_archive_module {
        return Decision::allow();
    }

    let Some(target) = words
        .iter()
        .position(|w| w == "-e" || w == "--extract")
        .and_then(|idx| words.get(idx + 2))
    else {
        return Decision::allow();
    };

    if !ctx.sandbox.contains(&ctx.sandbox.resolve(target)) {
        return Decision::block(
            NAME,
            guidance::render("unpack.python", &[("target", target)]),
            guidance::render("unpack.outside.guidance", &[("command", &command_text(cmd))]),
        );
    }

    Decision::allow()
}

fn check_unpack(ctx: &CheckContext, cmd: &ParsedCommand) -> Decision {
    if let Some(target) = target_directory(cmd) {
        if !ctx.sandbox.contains(&ctx.sandbox.resolve(target)) {
            return Decision::block(
                NAME,
                guidance::render("unpack.outside", &[("target", target)]),
                guidance::render("unpack.outside.guidance", &[("command", &command_text(cmd))]),
            );
        }

        if ctx.config.unpack_protection.check_archive_path_traversal
            && archive_path_traversal(target)
        {
            return Decision::block(
                NAME,
                guidance::render("unpack.traversal", &[("target", target)]),
                guidance::render("unpack.traversal.guidance", &[]),
            );
        }
    }

    if let Some(flag) = rewrite_flag(cmd) {
        return Decision::block(
            NAME,
            guidance::render("unpack.rewrite", &[("command", cmd.program()), ("flag", flag)]),
            guidance::render("unpack.rewrite.guidance", &[]),
        );
    }

    Decision::allow()
}

/// The extraction directory named on the command line, if any.
fn target_directory(cmd: &ParsedCommand) -> Option<&str> {
    let words = &cmd.words;
    let next_after = |idx: usize| words.get(idx + 1).map(String::as_str);

    match cmd.program() {
        "tar" | "bsdtar" => words.iter().enumerate().find_map(|(idx, word)| {
            if word == "-C" || word == "--directory" {
                next_after(idx)
            } else if let Some(dir) = word.strip_prefix("--directory=") {
                Some(dir)
            } else if let Some(dir) = word.strip_prefix("--one-top-level=") {
                Some(dir)
            } else if !word.starts_with("--") {
                word.strip_prefix("-C").filter(|dir| !dir.is_empty())
            } else {
                None
            }
        }),
        "unzip" => words.iter().enumerate().find_map(|(idx, word)| {
            if word == "-d" {
                next_after(idx)
            } else if !word.starts_with("--") {
                word.strip_prefix("-d").filter(|dir| !dir.is_empty())
            } else {
                None
            }
        }),
        "7z" | "7za" => words
            .iter()
            .find_map(|word| word.strip_prefix("-o").filter(|dir| !dir.is_empty())),
        _ => None,
    }
}

/// Flags that rename entries during extraction.
fn rewrite_flag(cmd: &ParsedCommand) -> Option<&'static str> {
    match cmd.program() {
        "bsdtar" if cmd.flags.iter().any(|f| f == "-s") => Some("-s"),
        "tar" | "bsdtar" => cmd.flags.iter().find_map(|f| {
            if f == "--transform" || f.starts_with("--transform=") {
                Some("--transform")
            } else if f == "--xform" || f.starts_with("--xform=") {
                Some("--xform")
            } else {
                None
            }
        }),
        _ => None,
    }
}

fn command_text(cmd: &ParsedCommand) -> String {
    if cmd.raw_text.is_empty() {
        std::iter::once(cmd.command.as_str())
            .chain(cmd.words.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        cmd.raw_text.clone()
    }
}
