//! Type definitions for the guardian policy configuration.
//!
//! Every section is optional in the YAML document. A missing section, or a
//! missing field inside a section, takes the built-in default shown here, so
//! an empty file behaves exactly like the shipped policy.

use serde::{Deserialize, Serialize};

/// The complete policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardianConfig {
    /// Sandbox boundaries.
    pub directories: DirectoriesConfig,
    /// Git operation classification.
    pub git: GitConfig,
    /// Patterns that defeat the other checks.
    pub bypass_prevention: BypassPreventionConfig,
    /// Download classification by file extension.
    pub download_protection: DownloadProtectionConfig,
    /// Archive extraction rules.
    pub unpack_protection: UnpackProtectionConfig,
    /// Glob patterns for files that must not be read or modified.
    pub protected_paths: ProtectedPathsConfig,
    /// Diagnostic log and audit trail.
    pub logging: LoggingConfig,
}

/// Sandbox boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Explicit project root. Auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
    /// Extra directories that count as inside the sandbox.
    pub allowed_paths: Vec<String>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            allowed_paths: strings(&["/dev/null"]),
        }
    }
}

/// Git operation classification lists.
///
/// Each entry is `"<subcommand> [flags...]"`; see the pattern matcher in the
/// `guardian` crate for the subset semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    pub hard_blocked: Vec<String>,
    pub confirm_required: Vec<String>,
    pub allowed: Vec<String>,
    pub ci_auto_allow: Vec<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            hard_blocked: strings(&["push --force", "push -f"]),
            confirm_required: strings(&[
                "reset --hard",
                "branch -D",
                "clean -f",
                "clean -fd",
                "clean -fx",
                "reflog expire",
                "stash drop",
                "stash clear",
                "checkout --force",
                "checkout -f",
                "rebase --onto",
                "filter-branch",
                "update-ref -d",
            ]),
            allowed: strings(&["clean --dry-run", "clean -n"]),
            ci_auto_allow: strings(&["clean -f", "clean -fd", "reset --hard"]),
        }
    }
}

/// Bypass prevention patterns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BypassPreventionConfig {
    /// Command names that are never allowed (e.g. `eval`).
    pub hard_blocked: Vec<String>,
    /// Block `$cmd args` style invocations.
    pub block_variable_as_command: bool,
    /// Shells that may not appear on the receiving end of a pipe.
    pub block_shell_pipe_targets: Vec<String>,
    /// Raw substrings that indicate inline shell execution.
    pub block_shell_exec_patterns: Vec<String>,
    /// Raw substrings that mark an inline interpreter one-liner.
    pub confirm_interpreter_inline_with_network: Vec<String>,
    /// Substrings that indicate network access inside inline code.
    pub network_patterns: Vec<String>,
    /// Substrings that indicate import obfuscation inside inline code.
    pub obfuscation_patterns: Vec<String>,
    /// Substrings that indicate code execution; only reported alongside network access.
    pub rce_patterns_require_network: Vec<String>,
}

impl Default for BypassPreventionConfig {
    fn default() -> Self {
        Self {
            hard_blocked: strings(&["eval"]),
            block_variable_as_command: true,
            block_shell_pipe_targets: strings(&["sh", "bash", "zsh", "dash", "ksh", "ash", "fish"]),
            block_shell_exec_patterns: strings(&["sh -c ", "bash -c ", "zsh -c "]),
            confirm_interpreter_inline_with_network: strings(&[
                "python -c",
                "python3 -c",
                "node -e",
                "node --eval",
                "ruby -e",
                "perl -e",
                "php -r",
            ]),
            network_patterns: strings(&[
                "requests",
                "urllib",
                "http.client",
                "httpx",
                "socket",
                "fetch(",
                "axios",
                "http.get",
                "https.get",
                "Net::HTTP",
                "open-uri",
                "LWP::",
                "curl_exec",
            ]),
            obfuscation_patterns: strings(&[
                "importlib",
                "__import__",
                "base64",
                "codecs.decode",
                "fromCharCode",
                "compile(",
            ]),
            rce_patterns_require_network: strings(&[
                "exec(",
                "eval(",
                "subprocess",
                "os.system",
                "child_process",
            ]),
        }
    }
}

/// Download protection lists and toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadProtectionConfig {
    /// Extensions the agent must ask the user to download by hand.
    pub require_user_download: Vec<String>,
    /// Archive extensions: downloads are fine, extraction is checked separately.
    pub auto_download_but_check_unpack: Vec<String>,
    /// Data extensions that are always fine to download.
    pub auto_download: Vec<String>,
    pub block_pipe_to_shell: bool,
    pub track_downloaded_executables: bool,
    /// Downloaded-files record, relative to the project root unless absolute.
    pub downloaded_files_metadata: String,
    pub detect_binary_by_magic: bool,
    pub git_tracked_allow: bool,
    pub file_command_fallback: bool,
}

impl Default for DownloadProtectionConfig {
    fn default() -> Self {
        Self {
            require_user_download: strings(&[
                ".sh", ".bash", ".zsh", ".py", ".pl", ".rb", ".ps1", ".bat", ".cmd", ".exe",
                ".msi", ".dll", ".so", ".dylib", ".bin", ".run", ".app", ".dmg", ".pkg",
                ".deb", ".rpm", ".apk", ".jar", ".appimage", ".AppImage",
            ]),
            auto_download_but_check_unpack: strings(&[
                ".zip", ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz",
                ".gz", ".bz2", ".xz", ".7z", ".rar",
            ]),
            auto_download: strings(&[
                ".json", ".yaml", ".yml", ".toml", ".xml", ".csv", ".tsv", ".txt", ".md",
                ".html", ".pdf", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".parquet",
            ]),
            block_pipe_to_shell: true,
            track_downloaded_executables: true,
            downloaded_files_metadata: ".claude/hooks/security-guardian/.downloaded.json".into(),
            detect_binary_by_magic: true,
            git_tracked_allow: true,
            file_command_fallback: true,
        }
    }
}

/// Archive extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnpackProtectionConfig {
    pub check_extracted_files: bool,
    pub check_archive_path_traversal: bool,
    /// Raw substrings that block an extraction outright.
    pub blocked_patterns: Vec<String>,
}

impl Default for UnpackProtectionConfig {
    fn default() -> Self {
        Self {
            check_extracted_files: true,
            check_archive_path_traversal: true,
            blocked_patterns: strings(&["--absolute-names", "--transform", "--xform"]),
        }
    }
}

/// Protected path globs. A leading `!` negates a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtectedPathsConfig {
    pub no_modify: Vec<String>,
    pub no_read_content: Vec<String>,
}

impl Default for ProtectedPathsConfig {
    fn default() -> Self {
        Self {
            no_modify: strings(&[
                ".git/*",
                ".claude/settings.json",
                ".claude/settings.local.json",
                ".claude/hooks/*",
            ]),
            no_read_content: strings(&[
                ".env",
                ".env.*",
                "!.env.example",
                "!.env.template",
                "!.env.sample",
                "**/*.pem",
                "**/*.key",
                "**/id_rsa",
                "**/id_ed25519",
                "**/id_ecdsa",
                "**/.npmrc",
                "**/.pypirc",
                "**/credentials.json",
                "**/secrets.yaml",
                "**/secrets.yml",
                "**/*.keystore",
            ]),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Write an audit entry for every block/confirm decision.
    pub log_blocked: bool,
    pub log_directory: String,
    /// Include a summary of the tool input in audit entries.
    pub log_content: bool,
    pub max_log_size_mb: u64,
    pub max_log_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_blocked: true,
            log_directory: "${HOME}/.claude/logs/security-guardian".into(),
            log_content: false,
            max_log_size_mb: 10,
            max_log_files: 5,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: GuardianConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GuardianConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: GuardianConfig =
            serde_yaml::from_str("git:\n  hard_blocked: [\"reset --hard\"]\n").unwrap();
        assert_eq!(config.git.hard_blocked, vec!["reset --hard".to_string()]);
        assert_eq!(config.git.allowed, GitConfig::default().allowed);
        assert_eq!(config.bypass_prevention, BypassPreventionConfig::default());
    }

    #[test]
    fn test_toggle_override() {
        let config: GuardianConfig = serde_yaml::from_str(
            "bypass_prevention:\n  block_variable_as_command: false\n",
        )
        .unwrap();
        assert!(!config.bypass_prevention.block_variable_as_command);
        assert_eq!(config.bypass_prevention.hard_blocked, vec!["eval".to_string()]);
    }

    #[test]
    fn test_defaults_protect_git_and_env() {
        let config = GuardianConfig::default();
        assert!(config.protected_paths.no_modify.contains(&".git/*".to_string()));
        assert!(config.protected_paths.no_read_content.contains(&".env".to_string()));
        assert!(
            config
                .protected_paths
                .no_read_content
                .contains(&"!.env.example".to_string())
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = GuardianConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: GuardianConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }
}
