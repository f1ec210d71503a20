//! Heuristic parser for input the syntax tree rejects.
//!
//! Splits on unquoted `|`, `;`, `&&`, `||` and `&`, then tokenizes each
//! segment with `shlex`. Unquoted redirection operators are padded with
//! spaces first so `echo hi>out` still yields a redirect target.

use super::ParsedCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Pipe,
    List,
}

/// Parses `source` into commands. Never fails.
pub fn parse(source: &str) -> Vec<ParsedCommand> {
    let mut commands: Vec<ParsedCommand> = Vec::new();
    let mut pending_pipe: Option<usize> = None;

    for (segment, separator) in split_segments(source) {
        let Some(cmd) = parse_segment(&segment) else {
            continue;
        };
        commands.push(cmd);
        let idx = commands.len() - 1;

        if let Some(prev) = pending_pipe.take() {
            commands[prev].pipes_to = Some(idx);
        }
        if separator == Some(Separator::Pipe) {
            pending_pipe = Some(idx);
        }
    }

    commands
}

/// Splits on unquoted control operators, returning each segment with the
/// separator that ended it.
fn split_segments(source: &str) -> Vec<(String, Option<Separator>)> {
    let chars: Vec<char> = source.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && q == '"' {
                if let Some(n) = next {
                    current.push(n);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                current.push(c);
                if let Some(n) = next {
                    current.push(n);
                    i += 1;
                }
            }
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '|' if next == Some('|') => {
                segments.push((std::mem::take(&mut current), Some(Separator::List)));
                i += 1;
            }
            '|' => {
                segments.push((std::mem::take(&mut current), Some(Separator::Pipe)));
                if next == Some('&') {
                    i += 1;
                }
            }
            ';' => segments.push((std::mem::take(&mut current), Some(Separator::List))),
            '&' if next == Some('&') => {
                segments.push((std::mem::take(&mut current), Some(Separator::List)));
                i += 1;
            }
            '&' if next == Some('>') || current.ends_with(['>', '<']) => current.push(c),
            '&' => segments.push((std::mem::take(&mut current), Some(Separator::List))),
            '>' | '<' => {
                let attached_fd = current
                    .rsplit(char::is_whitespace)
                    .next()
                    .is_some_and(|tail| !tail.is_empty() && tail.chars().all(|d| d.is_ascii_digit() || d == '&'));
                if !attached_fd {
                    current.push(' ');
                }
                current.push(c);
                while let Some(&n) = chars.get(i + 1) {
                    if matches!(n, '>' | '<' | '&' | '|') && !(n == '|' && c == '<') {
                        current.push(n);
                        i += 1;
                    } else {
                        break;
                    }
                }
                current.push(' ');
            }
            _ => current.push(c),
        }
        i += 1;
    }

    segments.push((current, None));
    segments
}

fn tokenize(segment: &str) -> Vec<String> {
    shlex::split(segment)
        .unwrap_or_else(|| segment.split_whitespace().map(str::to_string).collect())
}

#[derive(Debug, PartialEq, Eq)]
enum RedirectOp {
    Output,
    Input,
    Duplicate,
    HereDoc,
}

/// Classifies a token as a redirection operator, ignoring a leading fd.
fn redirect_op(token: &str) -> Option<RedirectOp> {
    let op = token.trim_start_matches(|c: char| c.is_ascii_digit());
    match op {
        ">" | ">>" | ">|" | "&>" | "&>>" | "<>" => Some(RedirectOp::Output),
        ">&" | "<&" => Some(RedirectOp::Duplicate),
        "<" => Some(RedirectOp::Input),
        "<<" | "<<-" | "<<<" => Some(RedirectOp::HereDoc),
        _ => None,
    }
}

fn is_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

fn parse_segment(segment: &str) -> Option<ParsedCommand> {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return None;
    }

    let tokens = tokenize(trimmed);
    let mut cmd: Option<ParsedCommand> = None;
    let mut redirects = Vec::new();
    let mut inputs = Vec::new();

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if let Some(op) = redirect_op(&token) {
            let target = iter.next();
            match (op, target) {
                (RedirectOp::Output, Some(t)) => redirects.push(t),
                (RedirectOp::Input, Some(t)) => inputs.push(t),
                (RedirectOp::Duplicate, Some(t))
                    if !(t == "-" || t.chars().all(|c| c.is_ascii_digit())) =>
                {
                    redirects.push(t)
                }
                _ => {}
            }
            continue;
        }

        match cmd.as_mut() {
            None if is_assignment(&token) => {}
            None => cmd = Some(ParsedCommand::new(token)),
            Some(c) => c.push_word(token),
        }
    }

    let mut cmd = cmd.unwrap_or_else(|| ParsedCommand::new(""));
    for input in inputs {
        cmd.push_word(input);
    }
    cmd.redirect_targets = redirects;
    cmd.raw_text = trimmed.to_string();

    if cmd.command.is_empty() && cmd.words.is_empty() && cmd.redirect_targets.is_empty() {
        return None;
    }
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cmds: &[ParsedCommand]) -> Vec<&str> {
        cmds.iter().map(|c| c.command.as_str()).collect()
    }

    #[test]
    fn test_pipes_and_lists() {
        let cmds = parse("a x | b y && c; d | e");
        assert_eq!(names(&cmds), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(cmds[0].pipes_to, Some(1));
        assert_eq!(cmds[1].pipes_to, None);
        assert_eq!(cmds[2].pipes_to, None);
        assert_eq!(cmds[3].pipes_to, Some(4));
    }

    #[test]
    fn test_or_is_not_pipe() {
        let cmds = parse("test -f x || touch x");
        assert_eq!(names(&cmds), vec!["test", "touch"]);
        assert!(cmds.iter().all(|c| c.pipes_to.is_none()));
    }

    #[test]
    fn test_quoted_separators_ignored() {
        let cmds = parse(r#"echo "a | b; c && d" 'e|f'"#);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].args, vec!["a | b; c && d", "e|f"]);
    }

    #[test]
    fn test_flags_and_clusters() {
        let cmds = parse("rm -rf --verbose dir");
        assert_eq!(cmds[0].flags, vec!["-rf", "--verbose"]);
        assert_eq!(cmds[0].args, vec!["dir"]);
    }

    #[test]
    fn test_variable_as_command() {
        let cmds = parse("$RUNNER build");
        assert!(cmds[0].variable_as_command);
    }

    #[test]
    fn test_redirects() {
        let cmds = parse("echo hi>out.txt 2>&1; cat < in.txt >> log.txt");
        assert_eq!(cmds[0].args, vec!["hi"]);
        assert_eq!(cmds[0].redirect_targets, vec!["out.txt"]);
        assert_eq!(cmds[1].args, vec!["in.txt"]);
        assert_eq!(cmds[1].redirect_targets, vec!["log.txt"]);
    }

    #[test]
    fn test_stderr_to_file() {
        let cmds = parse("make 2>/dev/null");
        assert_eq!(cmds[0].redirect_targets, vec!["/dev/null"]);
        assert!(cmds[0].args.is_empty());
    }

    #[test]
    fn test_background_and_ampersand_redirect() {
        let cmds = parse("server &> srv.log & client");
        assert_eq!(names(&cmds), vec!["server", "client"]);
        assert_eq!(cmds[0].redirect_targets, vec!["srv.log"]);
    }

    #[test]
    fn test_unbalanced_quote_falls_back_to_whitespace() {
        let cmds = parse("echo 'oops x");
        assert_eq!(cmds[0].command, "echo");
        assert_eq!(cmds[0].args, vec!["'oops", "x"]);
    }

    #[test]
    fn test_assignment_prefix_skipped() {
        let cmds = parse("A=1 B=2 run thing");
        assert_eq!(cmds[0].command, "run");
        assert_eq!(cmds[0].args, vec!["thing"]);
    }

    #[test]
    fn test_empty_segments_skipped() {
        let cmds = parse(";; ls ;");
        assert_eq!(names(&cmds), vec!["ls"]);
    }
}
