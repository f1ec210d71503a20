//! Message templates shown to the agent.
//!
//! Templates use `{name}` placeholders and are resolved when a decision is
//! built. Placeholders without a supplied value are left as written.

/// Key to template.
const TEMPLATES: &[(&str, &str)] = &[
    // Fallback for any non-allow decision without guidance.
    ("default", "Ask the user how to proceed."),
    // Directory boundary
    ("dir.outside", "Path '{resolved}' is outside project boundaries"),
    (
        "dir.symlink",
        "Symlink escape detected: '{path}' resolves to '{resolved}' outside project",
    ),
    (
        "dir.symlink.guidance",
        "Symlink points outside project boundaries. Give user the command: `{op} {path}`",
    ),
    (
        "dir.read",
        "Path is outside project. Give user the command: `cat {path}`",
    ),
    (
        "dir.delete",
        "Cannot delete files outside project. Give user the command: `rm {path}`",
    ),
    (
        "dir.copy",
        "Cannot copy/move files outside project. Give user the command: `{op} {path}`",
    ),
    (
        "dir.search",
        "Cannot search outside project. Give user the command: `{op} {path}`",
    ),
    (
        "dir.write",
        "Cannot write outside project. Give user the command for writing to {path}",
    ),
    (
        "dir.other",
        "Operation '{op}' blocked outside project. Give user the command or add path to allowed_paths in config.",
    ),
    // Git
    ("git.blocked", "Destructive git operation blocked: {operation}"),
    ("git.confirm", "Git operation requires confirmation: {operation}"),
    (
        "git.force_push",
        "Use --force-with-lease instead: `git push --force-with-lease`",
    ),
    (
        "git.reset_hard",
        "Consider `git stash` first, or give user: `git reset --hard`",
    ),
    (
        "git.branch_delete",
        "Give user the command: `git branch -D <branch>`",
    ),
    (
        "git.clean",
        "Try `git clean -fd --dry-run` first, or give user: `git clean -fd`",
    ),
    ("git.reflog_expire", "Give user the command: `git reflog expire`"),
    ("git.give_user", "Give user the command: `git {operation}`"),
    // Deletion
    (
        "delete.outside",
        "Cannot delete files outside project: {path}",
    ),
    ("delete.outside.guidance", "Give user the command: `{command}`"),
    (
        "delete.protected",
        "Cannot recursively delete protected path: {path}",
    ),
    (
        "delete.protected.guidance",
        "Path '{path}' is protected. Give user the command if needed.",
    ),
    ("delete.root", "Cannot recursively delete project root"),
    (
        "delete.root.guidance",
        "Deleting entire project is blocked. Be more specific about what to delete.",
    ),
    // Bypass
    ("bypass.hard_blocked", "Command '{command}' is blocked (potential bypass)"),
    (
        "bypass.hard_blocked.guidance",
        "Use explicit commands instead of eval/exec.",
    ),
    ("bypass.variable", "Variable used as command (potential bypass)"),
    (
        "bypass.variable.guidance",
        "Use explicit commands. Variable expansion as command is blocked.",
    ),
    ("bypass.pipe_shell", "Piping to shell detected (dangerous pattern)"),
    (
        "bypass.pipe_shell.guidance",
        "Cannot pipe to shell. Download file first, review, then execute.",
    ),
    ("bypass.exec_pattern", "Shell exec pattern detected: {pattern}"),
    (
        "bypass.exec_pattern.guidance",
        "Direct shell execution with -c is blocked. Run commands directly.",
    ),
    ("bypass.shell_exec", "Shell exec detected: {command} -c"),
    (
        "bypass.shell_exec.guidance",
        "Direct shell execution is blocked. Run the inner command directly.",
    ),
    ("bypass.env_shell", "env shell execution detected"),
    ("bypass.env_shell.guidance", "Shell execution via env is blocked."),
    ("bypass.busybox", "busybox shell execution detected"),
    ("bypass.busybox.guidance", "Shell execution via busybox is blocked."),
    (
        "bypass.rce",
        "Potential RCE pattern with network access detected",
    ),
    (
        "bypass.rce.guidance",
        "This code pattern could execute remote code. Verify carefully.",
    ),
    (
        "bypass.network",
        "Inline interpreter code with network calls detected",
    ),
    (
        "bypass.network.guidance",
        "This code makes network calls. Verify it's safe before allowing.",
    ),
    (
        "bypass.obfuscation",
        "Inline interpreter code with potential obfuscation detected",
    ),
    (
        "bypass.obfuscation.guidance",
        "This code uses import obfuscation. Verify it's safe.",
    ),
    // Download
    ("download.pipe_shell", "Downloading and piping to shell detected"),
    (
        "download.pipe_shell.guidance",
        "Cannot pipe downloads to shell. Download file, review, then run.",
    ),
    (
        "download.executable",
        "Download of executable file blocked: *{extension}",
    ),
    (
        "download.executable.guidance",
        "Cannot download executable files. Give user the command: `{command}`",
    ),
    // Unpack
    ("unpack.pattern", "Blocked unpack pattern: {pattern}"),
    (
        "unpack.pattern.guidance",
        "Unpack to allowed directory only. Give user: `{command}`",
    ),
    ("unpack.outside", "Unpack target outside project: {target}"),
    (
        "unpack.outside.guidance",
        "Cannot unpack outside project. Give user: `{command}`",
    ),
    ("unpack.python", "Python unpack target outside project: {target}"),
    ("unpack.traversal", "Path traversal in unpack target: {target}"),
    (
        "unpack.traversal.guidance",
        "Path traversal detected. Give user the command.",
    ),
    (
        "unpack.rewrite",
        "{command} {flag} can rewrite extracted paths and bypass path protection",
    ),
    (
        "unpack.rewrite.guidance",
        "Path rewriting during extraction is blocked. Give user the command.",
    ),
    // Execution
    ("exec.downloaded", "chmod +x on downloaded file: {path}"),
    (
        "exec.downloaded.guidance",
        "File was downloaded from internet. Give user: `chmod +x {path}`",
    ),
    ("exec.binary", "chmod +x on binary/script file: {path}"),
    (
        "exec.binary.guidance",
        "File appears to be executable. Give user: `chmod +x {path}`",
    ),
    ("exec.magic", "chmod +x on {kind}: {path}"),
    (
        "exec.magic.guidance",
        "File is {kind}. Give user: `chmod +x {path}`",
    ),
    // Secrets
    ("secrets.modify", "Cannot modify protected file: {path}"),
    (
        "secrets.modify.guidance",
        "File is protected. Cannot modify {path}.",
    ),
    ("secrets.read", "Cannot read secrets file: {path}"),
    (
        "secrets.env_example",
        "Cannot read {path} (secrets file). Look at {example} for structure, then ask user for values.",
    ),
    (
        "secrets.env",
        "Cannot read {path} (secrets file). Ask user what environment variables are needed.",
    ),
    (
        "secrets.protected",
        "Cannot read {path} (protected file). Ask user for needed information.",
    ),
];

/// Looks up a template by key.
pub fn template(key: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, template)| *template)
}

/// Renders `key` with `args` substituted. Unknown keys render empty.
pub fn render(key: &str, args: &[(&str, &str)]) -> String {
    template(key)
        .map(|template| substitute(template, args))
        .unwrap_or_default()
}

/// Replaces `{name}` placeholders in `template`.
pub fn substitute(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match args.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
