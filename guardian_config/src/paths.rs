//! Configuration file discovery.
//!
//! Candidates are tried in order:
//!
//! 1. an explicit path (the `--config` flag)
//! 2. the `GUARDIAN_CONFIG` environment variable
//! 3. `<project>/.claude/hooks/security-guardian/config/security_config.yaml`
//! 4. `<project>/.claude/security-guardian.yaml`
//! 5. `~/.claude/security-guardian.yaml`
//!
//! The first candidate that exists wins. An explicit path is returned even if
//! it does not exist, so a typo surfaces as a not-found error.

use std::env;
use std::path::{Path, PathBuf};

/// The name of the Claude directory.
const CLAUDE_DIR: &str = ".claude";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "GUARDIAN_CONFIG";

/// Config file inside the hook's install directory.
const HOOK_CONFIG_PATH: &str = "hooks/security-guardian/config/security_config.yaml";

/// Config file directly under `.claude`.
const CONFIG_FILE: &str = "security-guardian.yaml";

/// Resolver for the guardian configuration file.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    explicit: Option<PathBuf>,
    home_override: Option<PathBuf>,
    project_override: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLocator {
    pub fn new() -> Self {
        Self {
            explicit: None,
            home_override: None,
            project_override: None,
            use_env: true,
        }
    }

    /// Uses an explicit config file, bypassing discovery.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Overrides the home directory (useful for testing).
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }

    /// Overrides the project directory.
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project_override = Some(project.into());
        self
    }

    /// Ignores `GUARDIAN_CONFIG`.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_override.clone().or_else(dirs::home_dir)
    }

    /// Returns the project directory used for discovery.
    ///
    /// Falls back to the nearest ancestor of the current directory that holds
    /// a `.claude` or `.git` entry, then to the current directory itself.
    pub fn project_dir(&self) -> Option<PathBuf> {
        if let Some(ref project) = self.project_override {
            return Some(project.clone());
        }
        if let Ok(dir) = env::var("CLAUDE_PROJECT_DIR")
            && !dir.is_empty()
        {
            return Some(PathBuf::from(dir));
        }

        let cwd = env::current_dir().ok()?;
        find_ancestor_with(&cwd, CLAUDE_DIR)
            .or_else(|| find_ancestor_with(&cwd, ".git"))
            .or(Some(cwd))
    }

    /// Returns every candidate path in priority order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(ref explicit) = self.explicit {
            paths.push(explicit.clone());
        }
        if self.use_env
            && let Ok(from_env) = env::var(CONFIG_ENV_VAR)
            && !from_env.is_empty()
        {
            paths.push(PathBuf::from(from_env));
        }
        if let Some(project) = self.project_dir() {
            let claude = project.join(CLAUDE_DIR);
            paths.push(claude.join(HOOK_CONFIG_PATH));
            paths.push(claude.join(CONFIG_FILE));
        }
        if let Some(home) = self.home_dir() {
            paths.push(home.join(CLAUDE_DIR).join(CONFIG_FILE));
        }

        paths
    }

    /// Returns the config file that should be loaded, if any.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(ref explicit) = self.explicit {
            return Some(explicit.clone());
        }
        self.candidates().into_iter().find(|p| p.is_file())
    }
}

/// Finds the nearest ancestor of `start` (inclusive) containing `name`.
pub fn find_ancestor_with(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(name).exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn locator(tmp: &TempDir) -> ConfigLocator {
        ConfigLocator::new()
            .with_home(tmp.path().join("home"))
            .with_project(tmp.path().join("project"))
            .without_env()
    }

    #[test]
    fn test_candidates_order() {
        let tmp = TempDir::new().unwrap();
        let candidates = locator(&tmp).candidates();
        assert_eq!(
            candidates,
            vec![
                tmp.path()
                    .join("project/.claude/hooks/security-guardian/config/security_config.yaml"),
                tmp.path().join("project/.claude/security-guardian.yaml"),
                tmp.path().join("home/.claude/security-guardian.yaml"),
            ]
        );
    }

    #[test]
    fn test_locate_prefers_project_over_home() {
        let tmp = TempDir::new().unwrap();
        let project_cfg = tmp.path().join("project/.claude/security-guardian.yaml");
        let home_cfg = tmp.path().join("home/.claude/security-guardian.yaml");
        fs::create_dir_all(project_cfg.parent().unwrap()).unwrap();
        fs::create_dir_all(home_cfg.parent().unwrap()).unwrap();
        fs::write(&project_cfg, "{}").unwrap();
        fs::write(&home_cfg, "{}").unwrap();

        assert_eq!(locator(&tmp).locate(), Some(project_cfg));
    }

    #[test]
    fn test_locate_falls_back_to_home() {
        let tmp = TempDir::new().unwrap();
        let home_cfg = tmp.path().join("home/.claude/security-guardian.yaml");
        fs::create_dir_all(home_cfg.parent().unwrap()).unwrap();
        fs::write(&home_cfg, "{}").unwrap();

        assert_eq!(locator(&tmp).locate(), Some(home_cfg));
    }

    #[test]
    fn test_explicit_wins_even_if_missing() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("nope.yaml");
        let found = locator(&tmp).with_explicit(&explicit).locate();
        assert_eq!(found, Some(explicit));
    }

    #[test]
    fn test_nothing_found() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(locator(&tmp).locate(), None);
    }

    #[test]
    fn test_find_ancestor_with() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(tmp.path().join("a/.git")).unwrap();

        assert_eq!(
            find_ancestor_with(&nested, ".git"),
            Some(tmp.path().join("a"))
        );
        assert_eq!(find_ancestor_with(&nested, ".no-such-marker-here"), None);
    }
}
