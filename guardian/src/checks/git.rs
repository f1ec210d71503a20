//! Destructive git operations.

use tracing::debug;

use crate::command::{CommandGraph, git_invocations};
use crate::decision::Decision;
use crate::guidance;
use crate::pattern::{GitClass, GitRules, matches, operation_string};

use super::{Check, CheckContext};

const NAME: &str = "git_check";

/// Safer alternatives, keyed by operation pattern.
const SAFER_ALTERNATIVES: &[(&str, &str)] = &[
    ("push --force", "git.force_push"),
    ("push -f", "git.force_push"),
    ("reset --hard", "git.reset_hard"),
    ("branch -D", "git.branch_delete"),
    ("clean -fd", "git.clean"),
    ("reflog expire", "git.reflog_expire"),
];

/// Classifies every git invocation in a command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCheck;

impl Check for GitCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, _raw: &str, graph: &CommandGraph) -> Decision {
        let rules = GitRules::new(&ctx.config.git);

        for invocation in git_invocations(graph) {
            let operation = operation_string(&invocation.command_words(), &invocation.flags);
            let class = rules.classify(&operation, ctx.ci);
            debug!(%operation, ?class, "classified git operation");

            match class {
                GitClass::HardBlocked(_) => {
                    return Decision::block(
                        NAME,
                        guidance::render("git.blocked", &[("operation", &operation)]),
                        safer_alternative(&operation),
                    );
                }
                GitClass::ConfirmRequired(_) => {
                    return Decision::confirm(
                        NAME,
                        guidance::render("git.confirm", &[("operation", &operation)]),
                        safer_alternative(&operation),
                    );
                }
                GitClass::ExplicitlyAllowed | GitClass::CiAllowed | GitClass::Default => {}
            }
        }

        Decision::allow()
    }
}

fn safer_alternative(operation: &str) -> String {
    SAFER_ALTERNATIVES
        .iter()
        .find(|(pattern, _)| matches(operation, pattern))
        .map(|(_, key)| guidance::render(key, &[]))
        .unwrap_or_else(|| guidance::render("git.give_user", &[("operation", operation)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::Fixture;

    #[test]
    fn test_force_push_blocked() {
        let fx = Fixture::new();
        let d = fx.command(&GitCheck, "git push --force origin main");
        assert!(d.is_blocked());
        assert_eq!(d.reason, "Destructive git operation blocked: push --force");
        assert!(d.guidance.contains("--force-with-lease"));

        assert!(fx.command(&GitCheck, "git push -f").is_blocked());
    }

    #[test]
    fn test_force_with_lease_allowed() {
        let fx = Fixture::new();
        assert!(fx.command(&GitCheck, "git push --force-with-lease origin main").is_allowed());
        assert!(fx.command(&GitCheck, "git push --force-with-lease=main:abc origin").is_allowed());
    }

    #[test]
    fn test_clean_confirm_outside_ci_allowed_in_ci() {
        let fx = Fixture::new();
        let d = fx.command(&GitCheck, "git clean -fd");
        assert!(d.needs_confirmation());
        assert!(d.guidance.contains("--dry-run"));

        let ci = Fixture::ci();
        assert!(ci.command(&GitCheck, "git clean -fd").is_allowed());
    }

    #[test]
    fn test_dry_run_explicitly_allowed() {
        let fx = Fixture::new();
        assert!(fx.command(&GitCheck, "git clean -fd --dry-run").is_allowed());
        assert!(fx.command(&GitCheck, "git clean -n").is_allowed());
    }

    #[test]
    fn test_confirm_with_generic_guidance() {
        let fx = Fixture::new();
        let d = fx.command(&GitCheck, "git stash drop");
        assert!(d.needs_confirmation());
        assert_eq!(d.guidance, "Give user the command: `git stash drop`");
    }

    #[test]
    fn test_action_word_patterns_need_confirmation() {
        let fx = Fixture::new();
        for raw in [
            "git stash drop stash@{0}",
            "git stash clear",
            "git reflog expire --expire=now --all",
        ] {
            assert!(fx.command(&GitCheck, raw).needs_confirmation(), "{raw}");
        }
        let d = fx.command(&GitCheck, "git reflog expire --expire=now --all");
        assert_eq!(d.reason, "Git operation requires confirmation: reflog expire --all --expire=now");
        assert_eq!(d.guidance, "Give user the command: `git reflog expire`");
    }

    #[test]
    fn test_every_default_confirm_pattern_fires() {
        let fx = Fixture::new();
        for raw in [
            "git reset --hard",
            "git branch -D topic",
            "git clean -f",
            "git clean -fd",
            "git clean -fx",
            "git reflog expire",
            "git stash drop",
            "git stash clear",
            "git checkout --force main",
            "git checkout -f main",
            "git rebase --onto main topic",
            "git filter-branch --tree-filter true",
            "git update-ref -d refs/heads/old",
        ] {
            assert!(fx.command(&GitCheck, raw).needs_confirmation(), "{raw}");
        }
    }

    #[test]
    fn test_other_action_words_allowed() {
        let fx = Fixture::new();
        assert!(fx.command(&GitCheck, "git stash list").is_allowed());
        assert!(fx.command(&GitCheck, "git stash pop").is_allowed());
        assert!(fx.command(&GitCheck, "git reflog show").is_allowed());
        assert!(fx.command(&GitCheck, "git remote -v").is_allowed());
    }

    #[test]
    fn test_every_invocation_checked() {
        let fx = Fixture::new();
        let d = fx.command(&GitCheck, "git status && git reset --hard HEAD~1");
        assert!(d.needs_confirmation());
        assert!(d.guidance.contains("git stash"));
    }

    #[test]
    fn test_global_options_skipped() {
        let fx = Fixture::new();
        assert!(fx.command(&GitCheck, "git -C sub push --force").is_blocked());
    }

    #[test]
    fn test_safe_operations_allowed() {
        let fx = Fixture::new();
        assert!(fx.command(&GitCheck, "git commit -m 'push --force'").is_allowed());
        assert!(fx.command(&GitCheck, "git branch -d merged").is_allowed());
        assert!(fx.command(&GitCheck, "echo git push --force").is_allowed());
    }
}
