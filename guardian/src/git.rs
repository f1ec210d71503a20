//! Repository detection and tracked-file queries.
//!
//! The project root defaults to the nearest directory holding `.git`, which
//! may be a directory (normal clone) or a file (worktree or submodule).

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::subprocess::{self, SUBPROCESS_TIMEOUT};

/// Find the repository root containing `start`, if any.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    match find_dot_git(start) {
        Ok(dot_git) => dot_git.parent().map(Path::to_path_buf),
        Err(e) => {
            debug!("repository detection failed for {}: {:#}", start.display(), e);
            None
        }
    }
}

/// Walk up from `start` looking for `.git` (file or directory).
fn find_dot_git(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(".git");
        if candidate.exists() {
            return Ok(candidate);
        }
        if !current.pop() {
            anyhow::bail!("no .git found above {}", start.display());
        }
    }
}

/// True if git tracks `file` in the repository at `root`.
///
/// Any failure (git missing, not a repository, timeout) reports untracked.
pub fn is_git_tracked(file: &Path, root: &Path) -> bool {
    let file_arg = file.to_string_lossy();
    match subprocess::run_with_timeout(
        "git",
        &["ls-files", "--error-unmatch", file_arg.as_ref()],
        Some(root),
        SUBPROCESS_TIMEOUT,
    ) {
        Ok(output) => output.success,
        Err(e) => {
            debug!("git ls-files failed for {}: {:#}", file.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_repo_root_from_nested_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repo_root(&nested), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn test_find_repo_root_accepts_git_file() {
        let tmp = TempDir::new().unwrap();
        let worktree = tmp.path().join("wt");
        fs::create_dir(&worktree).unwrap();
        fs::write(worktree.join(".git"), "gitdir: /elsewhere/.git/worktrees/wt\n").unwrap();

        assert_eq!(find_repo_root(&worktree), Some(worktree.clone()));
    }

    #[test]
    fn test_untracked_outside_repository() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("script.sh");
        fs::write(&file, "#!/bin/sh\n").unwrap();
        assert!(!is_git_tracked(&file, tmp.path()));
    }
}
