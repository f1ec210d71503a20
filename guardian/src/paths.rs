//! Path resolution and the sandbox boundary.
//!
//! Every filesystem target an agent names is resolved to a canonical
//! absolute path before it is compared against the sandbox. Resolution never
//! fails: paths that do not exist yet are normalized lexically and anchored
//! on their longest existing (canonical) ancestor.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use guardian_config::{GuardianConfig, expand_env_vars};
use tracing::{Level, debug, instrument};

use crate::git;

/// Environment variables whose presence marks a CI run.
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
    "CIRCLECI",
    "TRAVIS",
    "BUILDKITE",
];

/// The directory tree an agent may operate in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    /// Canonical project root.
    pub root: PathBuf,
    /// Canonical extra roots from `directories.allowed_paths`.
    pub allowed_roots: Vec<PathBuf>,
}

impl Sandbox {
    /// Builds a sandbox rooted at `root`. Relative allowed paths are taken
    /// relative to the root.
    pub fn new(root: impl AsRef<Path>, allowed_paths: &[String]) -> Self {
        let root = resolve_buf(root.as_ref());
        let allowed_roots = allowed_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| resolve(p, &root))
            .collect();
        Self {
            root,
            allowed_roots,
        }
    }

    /// Builds the sandbox described by a configuration, detecting the project
    /// root when it is not set explicitly.
    pub fn from_config(config: &GuardianConfig) -> Self {
        let root = project_root(config.directories.project_root.as_deref());
        Self::new(root, &config.directories.allowed_paths)
    }

    /// Resolves a path string against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve(path, &self.root)
    }

    /// True if an already-resolved path lies inside the sandbox.
    pub fn contains(&self, resolved: &Path) -> bool {
        is_within(resolved, &self.root, &self.allowed_roots)
    }

    /// True if a path inside the project tree is a symlink leading out of it.
    pub fn is_symlink_escape(&self, path: &str) -> bool {
        is_symlink_escape(path, &self.root, &self.root)
    }

    /// Project-relative form of a resolved path, if it lies under the root.
    pub fn relative(&self, resolved: &Path) -> Option<String> {
        relative_to_root(resolved, &self.root)
    }
}

/// Detects the project root.
///
/// Order: explicit override, `CLAUDE_PROJECT_DIR`, nearest ancestor of the
/// current directory holding `.git`, the current directory.
#[instrument(level = Level::TRACE)]
pub fn project_root(override_root: Option<&str>) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

    if let Some(root) = override_root
        && !root.trim().is_empty()
    {
        return resolve(root, &cwd);
    }

    if let Ok(root) = env::var("CLAUDE_PROJECT_DIR")
        && !root.is_empty()
    {
        return resolve(&root, &cwd);
    }

    if let Some(root) = git::find_repo_root(&cwd) {
        return resolve_buf(&root);
    }

    debug!(cwd = %cwd.display(), "no project marker found, using current directory");
    resolve_buf(&cwd)
}

/// Expands `~`, `~/...` and `$VAR` / `${VAR}` references.
pub fn expand(path: &str) -> String {
    let home_expanded = if path == "~" || path.starts_with("~/") {
        match dirs::home_dir() {
            Some(home) => format!("{}{}", home.display(), &path[1..]),
            None => path.to_string(),
        }
    } else {
        path.to_string()
    };
    expand_env_vars(&home_expanded)
}

/// Resolves `path` to a canonical absolute path, relative paths taken from
/// `base`.
pub fn resolve(path: &str, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand(path));
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    resolve_buf(&joined)
}

fn resolve_buf(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let normalized = normalize_lexical(path);
    canonicalize_existing_prefix(&normalized)
}

/// Canonicalizes the longest existing ancestor and re-appends the rest.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut remainder: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in remainder.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match existing.file_name() {
            Some(name) => {
                remainder.push(name.to_os_string());
                existing.pop();
            }
            None => return path.to_path_buf(),
        }
    }
}

/// Folds `.` and `..` without touching the filesystem.
///
/// `..` never climbs above `/`. Leading `..` on a relative path is kept.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// True if `path` equals or descends from `root` or one of `extra_roots`.
///
/// Comparison is per component, so `/home/projectile` is not inside
/// `/home/project`. Both sides must already be canonical.
pub fn is_within(path: &Path, root: &Path, extra_roots: &[PathBuf]) -> bool {
    path.starts_with(root) || extra_roots.iter().any(|r| path.starts_with(r))
}

/// True if `path` reaches outside `root` through a symlink located inside
/// `root`.
///
/// A path that is simply outside the root is not an escape; `is_within`
/// rejects those. This walks the unresolved path one component at a time
/// and re-resolves each prefix.
pub fn is_symlink_escape(path: &str, root: &Path, base: &Path) -> bool {
    let root = resolve_buf(root);
    if resolve(path, base).starts_with(&root) {
        return false;
    }

    let expanded = PathBuf::from(expand(path));
    let original = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    let normalized = normalize_lexical(&original);

    let mut prefix = PathBuf::new();
    let mut inside = false;
    for component in normalized.components() {
        prefix.push(component);
        if !matches!(component, Component::Normal(_)) {
            continue;
        }

        if !inside && resolve_buf(&prefix).starts_with(&root) {
            inside = true;
        }

        if inside
            && let Ok(meta) = fs::symlink_metadata(&prefix)
            && meta.file_type().is_symlink()
            && !resolve_buf(&prefix).starts_with(&root)
        {
            return true;
        }
    }

    false
}

/// True if an archive entry or extraction target climbs out through `..`.
///
/// Absolute paths are not traversal; the boundary check handles them.
pub fn archive_path_traversal(entry: &str) -> bool {
    normalize_lexical(Path::new(entry)).starts_with("..")
}

/// Project-relative form of a path, `None` if it is not under `root`.
pub fn relative_to_root(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().into_owned())
}

/// True if any recognised CI environment variable is set.
pub fn is_ci_environment() -> bool {
    CI_VARS
        .iter()
        .any(|var| env::var_os(var).is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sandbox(tmp: &TempDir) -> Sandbox {
        Sandbox::new(tmp.path(), &[])
    }

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(normalize_lexical(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexical(Path::new("/a/./b/")), PathBuf::from("/a/b"));
        assert_eq!(normalize_lexical(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_lexical(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_lexical(Path::new("a/../../x")), PathBuf::from("../x"));
        assert_eq!(normalize_lexical(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_resolve_relative_against_base() {
        let tmp = TempDir::new().unwrap();
        let sb = sandbox(&tmp);
        std::fs::write(tmp.path().join("file.txt"), "x").unwrap();

        assert_eq!(sb.resolve("file.txt"), sb.root.join("file.txt"));
        assert_eq!(sb.resolve("./src/../file.txt"), sb.root.join("file.txt"));
    }

    #[test]
    fn test_resolve_nonexistent_anchors_on_existing_ancestor() {
        let tmp = TempDir::new().unwrap();
        let sb = sandbox(&tmp);
        assert_eq!(
            sb.resolve("new/dir/out.bin"),
            sb.root.join("new").join("dir").join("out.bin")
        );
        assert_eq!(sb.resolve("new/../other.txt"), sb.root.join("other.txt"));
    }

    #[test]
    fn test_resolve_is_idempotent_on_canonical_input() {
        let tmp = TempDir::new().unwrap();
        let sb = sandbox(&tmp);
        std::fs::create_dir(tmp.path().join("src")).unwrap();
        let canonical = sb.resolve("src");
        let again = resolve(&canonical.to_string_lossy(), Path::new("/"));
        assert_eq!(canonical, again);
    }

    #[test]
    fn test_traversal_leaves_sandbox() {
        let tmp = TempDir::new().unwrap();
        let sb = sandbox(&tmp);
        let resolved = sb.resolve("../../../etc/passwd");
        assert!(!sb.contains(&resolved));
    }

    #[test]
    fn test_is_within_component_wise() {
        let root = Path::new("/home/project");
        assert!(is_within(Path::new("/home/project"), root, &[]));
        assert!(is_within(Path::new("/home/project/src/a.rs"), root, &[]));
        assert!(!is_within(Path::new("/home/projectile"), root, &[]));
        assert!(!is_within(Path::new("/home/projectile/a"), root, &[]));
        assert!(is_within(
            Path::new("/opt/shared/x"),
            root,
            &[PathBuf::from("/opt/shared")]
        ));
    }

    #[test]
    fn test_allowed_paths_extend_sandbox() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let shared = tmp.path().join("shared");
        std::fs::create_dir(&project).unwrap();
        std::fs::create_dir(&shared).unwrap();

        let sb = Sandbox::new(&project, &[shared.to_string_lossy().into_owned()]);
        assert!(sb.contains(&sb.resolve("../shared/data.csv")));
        assert!(!sb.contains(&sb.resolve("../elsewhere/data.csv")));
    }

    #[test]
    fn test_dev_null_allowed_by_default_config() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::new(tmp.path(), &GuardianConfig::default().directories.allowed_paths);
        assert!(sb.contains(&sb.resolve("/dev/null")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_detected() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let outside = tmp.path().join("outside");
        std::fs::create_dir(&project).unwrap();
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(&outside, project.join("link")).unwrap();

        let sb = Sandbox::new(&project, &[]);
        assert!(sb.is_symlink_escape("link/secret.txt"));
        assert!(!sb.contains(&sb.resolve("link/secret.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_project_is_not_escape() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        std::fs::create_dir_all(project.join("real")).unwrap();
        std::os::unix::fs::symlink(project.join("real"), project.join("alias")).unwrap();

        let sb = Sandbox::new(&project, &[]);
        assert!(!sb.is_symlink_escape("alias/file.txt"));
        assert!(sb.contains(&sb.resolve("alias/file.txt")));
    }

    #[test]
    fn test_plain_outside_path_is_not_escape() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        std::fs::create_dir(&project).unwrap();
        let sb = Sandbox::new(&project, &[]);
        assert!(!sb.is_symlink_escape("../other/file.txt"));
    }

    #[test]
    fn test_archive_path_traversal() {
        assert!(archive_path_traversal("../outside"));
        assert!(archive_path_traversal("a/../../outside"));
        assert!(!archive_path_traversal("a/../inside"));
        assert!(!archive_path_traversal("/tmp/absolute"));
        assert!(!archive_path_traversal("build"));
    }

    #[test]
    fn test_relative_to_root() {
        let root = Path::new("/p");
        assert_eq!(
            relative_to_root(Path::new("/p/config/.env"), root),
            Some("config/.env".to_string())
        );
        assert_eq!(relative_to_root(Path::new("/q/x"), root), None);
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand("~/notes.txt"), format!("{}/notes.txt", home.display()));
            assert_eq!(expand("~"), home.display().to_string());
        }
        assert_eq!(expand("~other/x"), "~other/x");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(parts in prop::collection::vec("[a-z]{1,4}|\\.|\\.\\.", 0..8)) {
            let path = PathBuf::from(format!("/{}", parts.join("/")));
            let once = normalize_lexical(&path);
            prop_assert_eq!(normalize_lexical(&once), once.clone());
            prop_assert!(once.components().all(|c| !matches!(c, Component::ParentDir | Component::CurDir)));
        }
    }
}
