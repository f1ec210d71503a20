//! Structured audit logging for flagged decisions.
//!
//! Writes JSON Lines entries to `<log_directory>/audit.jsonl`. The file is
//! rotated by size (`audit.jsonl.1`, `audit.jsonl.2`, ...).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use guardian_config::LoggingConfig;
use serde::Serialize;
use tracing::{Level, instrument, warn};

use crate::decision::{Decision, DecisionStatus};
use crate::hooks::HookInput;
use crate::paths;

const AUDIT_FILE: &str = "audit.jsonl";
const SUMMARY_LIMIT: usize = 200;

/// A single audit log entry.
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    /// Unix timestamp with millisecond precision (e.g. `1706123456.789`).
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    tool_name: &'a str,
    status: DecisionStatus,
    check: &'a str,
    reason: &'a str,
    /// Only present when `log_content` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_input_summary: Option<String>,
}

/// Path of the audit log for a logging configuration.
pub fn log_path(config: &LoggingConfig) -> PathBuf {
    PathBuf::from(paths::expand(&config.log_directory)).join(AUDIT_FILE)
}

/// Append an audit entry for a flagged decision.
///
/// Does nothing unless logging and `log_blocked` are enabled. Failures are
/// logged and swallowed.
#[instrument(level = Level::TRACE, skip_all)]
pub fn log_decision(config: &LoggingConfig, input: &HookInput, decision: &Decision) {
    if !config.enabled || !config.log_blocked || decision.is_allowed() {
        return;
    }

    let entry = AuditEntry {
        timestamp: unix_timestamp(),
        session_id: input.session_id.as_deref(),
        tool_name: &input.tool_name,
        status: decision.status,
        check: &decision.check,
        reason: &decision.reason,
        tool_input_summary: config
            .log_content
            .then(|| summarize(&input.tool_input.to_string())),
    };

    let path = log_path(config);
    let max_bytes = config.max_log_size_mb.saturating_mul(1024 * 1024);
    if let Err(e) = rotate_if_needed(&path, max_bytes, config.max_log_files) {
        warn!(error = %e, path = %path.display(), "Failed to rotate audit log");
    }
    if let Err(e) = append_entry(&path, &entry) {
        warn!(error = %e, path = %path.display(), "Failed to write audit log entry");
    }
}

fn summarize(input: &str) -> String {
    if input.len() <= SUMMARY_LIMIT {
        return input.to_string();
    }
    let truncate_at = input
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= SUMMARY_LIMIT)
        .last()
        .unwrap_or(0);
    format!("{}...", &input[..truncate_at])
}

/// Current time as `<secs>.<millis>` since the Unix epoch.
pub fn unix_timestamp() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}

fn rotated(path: &Path, generation: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

/// Shifts `path` to `path.1` (and older generations up) once it exceeds
/// `max_bytes`. Keeps at most `max_files` rotated files.
fn rotate_if_needed(path: &Path, max_bytes: u64, max_files: u32) -> std::io::Result<()> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if max_bytes == 0 || size < max_bytes {
        return Ok(());
    }

    if max_files == 0 {
        return fs::remove_file(path);
    }

    let oldest = rotated(path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for generation in (1..max_files).rev() {
        let from = rotated(path, generation);
        if from.exists() {
            fs::rename(&from, rotated(path, generation + 1))?;
        }
    }
    fs::rename(path, rotated(path, 1))
}

fn append_entry(path: &Path, entry: &AuditEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry).map_err(std::io::Error::other)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path) -> LoggingConfig {
        LoggingConfig {
            log_directory: dir.to_string_lossy().into_owned(),
            ..LoggingConfig::default()
        }
    }

    fn input() -> HookInput {
        let mut input = HookInput::new("Bash", serde_json::json!({"command": "git push --force"}));
        input.session_id = Some("s-1".into());
        input
    }

    #[test]
    fn test_log_decision_writes_entry() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path());
        let decision = Decision::block("git_check", "Destructive git operation blocked: push --force", "g");

        log_decision(&config, &input(), &decision);

        let contents = fs::read_to_string(tmp.path().join(AUDIT_FILE)).unwrap();
        let entry: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(entry["tool_name"], "Bash");
        assert_eq!(entry["status"], "block");
        assert_eq!(entry["check"], "git_check");
        assert_eq!(entry["session_id"], "s-1");
        assert!(entry.get("tool_input_summary").is_none());
    }

    #[test]
    fn test_log_content_includes_summary() {
        let tmp = TempDir::new().unwrap();
        let config = LoggingConfig {
            log_content: true,
            ..config(tmp.path())
        };
        log_decision(&config, &input(), &Decision::confirm("c", "r", "g"));

        let contents = fs::read_to_string(tmp.path().join(AUDIT_FILE)).unwrap();
        let entry: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert!(entry["tool_input_summary"].as_str().unwrap().contains("git push --force"));
    }

    #[test]
    fn test_disabled_or_allowed_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let disabled = LoggingConfig {
            enabled: false,
            ..config(tmp.path())
        };
        log_decision(&disabled, &input(), &Decision::block("c", "r", "g"));
        log_decision(&config(tmp.path()), &input(), &Decision::allow());
        assert!(!tmp.path().join(AUDIT_FILE).exists());
    }

    #[test]
    fn test_rotation_keeps_generations() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(AUDIT_FILE);

        for round in 0..4 {
            fs::write(&path, format!("round {round}\n")).unwrap();
            rotate_if_needed(&path, 1, 2).unwrap();
        }

        assert!(!path.exists());
        assert_eq!(fs::read_to_string(rotated(&path, 1)).unwrap(), "round 3\n");
        assert_eq!(fs::read_to_string(rotated(&path, 2)).unwrap(), "round 2\n");
        assert!(!rotated(&path, 3).exists());
    }

    #[test]
    fn test_small_file_not_rotated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(AUDIT_FILE);
        fs::write(&path, "x\n").unwrap();
        rotate_if_needed(&path, 1024, 5).unwrap();
        assert!(path.exists());
        rotate_if_needed(&tmp.path().join("missing"), 1, 5).unwrap();
    }

    #[test]
    fn test_summarize_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let summary = summarize(&long);
        assert!(summary.ends_with("..."));
        assert!(summary.len() <= SUMMARY_LIMIT + 3);
    }
}
