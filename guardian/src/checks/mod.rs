//! The policy checks and the per-tool pipelines that run them.
//!
//! Each check is a stateless unit type implementing [`Check`]. Pipelines are
//! static ordered slices; the first non-Allow decision ends a run.

pub mod bypass;
pub mod deletion;
pub mod directory;
pub mod download;
pub mod execution;
pub mod git;
pub mod secrets;
pub mod unpack;

use std::path::{Path, PathBuf};

use guardian_config::GuardianConfig;
use tracing::{Level, debug, instrument};

use crate::command::CommandGraph;
use crate::decision::{Decision, first_flagged};
use crate::paths::{self, Sandbox};

pub use bypass::BypassCheck;
pub use deletion::DeletionCheck;
pub use directory::DirectoryCheck;
pub use download::DownloadCheck;
pub use execution::ExecutionCheck;
pub use git::GitCheck;
pub use secrets::SecretsCheck;
pub use unpack::UnpackCheck;

/// Everything a check may consult. Read-only for the duration of a decision.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub config: GuardianConfig,
    pub sandbox: Sandbox,
    /// A recognised CI environment is present.
    pub ci: bool,
    /// Location of the downloaded-files record.
    pub download_record: PathBuf,
}

impl CheckContext {
    /// Builds a context from the process environment.
    pub fn new(config: GuardianConfig) -> Self {
        let sandbox = Sandbox::from_config(&config);
        Self::with_sandbox(config, sandbox, paths::is_ci_environment())
    }

    /// Builds a context with an explicit sandbox and CI signal.
    pub fn with_sandbox(config: GuardianConfig, sandbox: Sandbox, ci: bool) -> Self {
        let download_record =
            record_location(&sandbox.root, &config.download_protection.downloaded_files_metadata);
        Self {
            config,
            sandbox,
            ci,
            download_record,
        }
    }
}

fn record_location(root: &Path, configured: &str) -> PathBuf {
    let expanded = PathBuf::from(paths::expand(configured));
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

/// One independent policy rule.
pub trait Check: Sync {
    /// Identifier reported as the decision's origin.
    fn name(&self) -> &'static str;

    /// Evaluates a shell command line.
    fn check_command(&self, ctx: &CheckContext, raw: &str, graph: &CommandGraph) -> Decision;

    /// Evaluates a single path accessed by a file tool.
    fn check_path(&self, _ctx: &CheckContext, _path: &str, _operation: &str) -> Decision {
        Decision::allow()
    }
}

/// Checks for the Bash tool, in evaluation order.
pub static BASH_CHECKS: &[&dyn Check] = &[
    &DirectoryCheck,
    &GitCheck,
    &DeletionCheck,
    &BypassCheck,
    &DownloadCheck,
    &UnpackCheck,
    &ExecutionCheck,
    &SecretsCheck,
];

/// Checks for tools that read or write a single file.
pub static FILE_CHECKS: &[&dyn Check] = &[&DirectoryCheck, &SecretsCheck];

/// Checks for search tools.
pub static SEARCH_CHECKS: &[&dyn Check] = &[&DirectoryCheck];

/// Runs `checks` against a command line until one flags it.
#[instrument(level = Level::TRACE, skip(checks, ctx, graph))]
pub fn run_command(
    checks: &[&dyn Check],
    ctx: &CheckContext,
    raw: &str,
    graph: &CommandGraph,
) -> Decision {
    first_flagged(checks.iter().map(|check| {
        let decision = check.check_command(ctx, raw, graph);
        debug!(check = check.name(), status = %decision.status, "check evaluated");
        decision
    }))
}

/// Runs `checks` against one path until one flags it.
#[instrument(level = Level::TRACE, skip(checks, ctx))]
pub fn run_path(checks: &[&dyn Check], ctx: &CheckContext, path: &str, operation: &str) -> Decision {
    first_flagged(checks.iter().map(|check| {
        let decision = check.check_path(ctx, path, operation);
        debug!(check = check.name(), status = %decision.status, "check evaluated");
        decision
    }))
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;

    #[test]
    fn test_bash_pipeline_order() {
        let names: Vec<_> = BASH_CHECKS.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "directory_check",
                "git_check",
                "deletion_check",
                "bypass_check",
                "download_check",
                "unpack_check",
                "execution_check",
                "secrets_check",
            ]
        );
    }

    #[test]
    fn test_first_blocker_wins() {
        let fx = Fixture::new();
        // Outside the project and a deletion: directory runs first.
        let raw = "rm -rf /etc/passwd";
        let d = run_command(BASH_CHECKS, &fx.ctx, raw, &crate::command::parse(raw));
        assert_eq!(d.check, "directory_check");
    }

    #[test]
    fn test_clean_command_allowed() {
        let fx = Fixture::new();
        let raw = "cargo build && ls src";
        let d = run_command(BASH_CHECKS, &fx.ctx, raw, &crate::command::parse(raw));
        assert!(d.is_allowed());
    }

    #[test]
    fn test_record_location_relative_to_root() {
        let fx = Fixture::new();
        assert_eq!(
            fx.ctx.download_record,
            fx.root().join(".claude/hooks/security-guardian/.downloaded.json")
        );
        assert_eq!(
            record_location(Path::new("/p"), "/var/tmp/d.json"),
            PathBuf::from("/var/tmp/d.json")
        );
    }
}
