//! Flag normalization and subset matching for subcommand rules.
//!
//! A rule such as `clean -fd` matches any operation with the same subcommand
//! whose flags include at least `-f` and `-d`, in any order and clustering.

use std::collections::BTreeSet;

use guardian_config::GitConfig;

/// Expands short-flag clusters (`-fd` becomes `-f`, `-d`). Long flags and
/// single short flags pass through.
pub fn expand_flags<I, S>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for token in tokens {
        let token = token.as_ref();
        if !token.starts_with("--") && token.starts_with('-') && token.len() > 2 {
            out.extend(token.chars().skip(1).map(|c| format!("-{c}")));
        } else {
            out.insert(token.to_string());
        }
    }
    out
}

/// `"<subcommand> <sorted normalized flags>"`.
pub fn operation_string<S: AsRef<str>>(subcommand: &str, flags: &[S]) -> String {
    std::iter::once(subcommand.to_string())
        .chain(expand_flags(flags))
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if `pattern`'s subcommand equals the operation's and its flag set is
/// a subset of the operation's. An empty pattern matches nothing.
pub fn matches(operation: &str, pattern: &str) -> bool {
    let mut pattern_parts = pattern.split_whitespace();
    let mut operation_parts = operation.split_whitespace();

    let Some(pattern_sub) = pattern_parts.next() else {
        return false;
    };
    if operation_parts.next() != Some(pattern_sub) {
        return false;
    }

    let wanted = expand_flags(pattern_parts);
    let present = expand_flags(operation_parts);
    wanted.is_subset(&present)
}

/// The first pattern in `patterns` that matches `operation`.
pub fn first_match<'p>(operation: &str, patterns: &'p [String]) -> Option<&'p str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|p| matches(operation, p))
}

/// How a git operation is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitClass {
    /// Listed in `allowed`.
    ExplicitlyAllowed,
    /// Matched a `hard_blocked` pattern.
    HardBlocked(String),
    /// Matched `ci_auto_allow` while running in CI.
    CiAllowed,
    /// Matched a `confirm_required` pattern.
    ConfirmRequired(String),
    /// Nothing matched.
    Default,
}

/// Git classification rules with precedence.
#[derive(Debug, Clone, Copy)]
pub struct GitRules<'a> {
    config: &'a GitConfig,
}

impl<'a> GitRules<'a> {
    pub fn new(config: &'a GitConfig) -> Self {
        Self { config }
    }

    /// Classifies an operation string.
    ///
    /// Precedence: explicit allow, hard block (not when `--force-with-lease`
    /// is present), CI auto-allow (only when `ci`), confirm, default.
    pub fn classify(&self, operation: &str, ci: bool) -> GitClass {
        if first_match(operation, &self.config.allowed).is_some() {
            return GitClass::ExplicitlyAllowed;
        }

        if let Some(pattern) = first_match(operation, &self.config.hard_blocked)
            && !operation.contains("--force-with-lease")
        {
            return GitClass::HardBlocked(pattern.to_string());
        }

        if ci && first_match(operation, &self.config.ci_auto_allow).is_some() {
            return GitClass::CiAllowed;
        }

        if let Some(pattern) = first_match(operation, &self.config.confirm_required) {
            return GitClass::ConfirmRequired(pattern.to_string());
        }

        GitClass::Default
    }
}
