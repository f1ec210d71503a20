//! Download commands and the record of what they fetched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audit::unix_timestamp;
use crate::command::{CommandGraph, ParsedCommand, pipes_into};
use crate::decision::Decision;
use crate::guidance;

use super::{Check, CheckContext};

const NAME: &str = "download_check";

const URL_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];

/// Classifies downloads by the extension of the file they produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadCheck;

impl Check for DownloadCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_command(&self, ctx: &CheckContext, _raw: &str, graph: &CommandGraph) -> Decision {
        let config = &ctx.config.download_protection;

        if config.block_pipe_to_shell
            && pipes_into(graph, &ctx.config.bypass_prevention.block_shell_pipe_targets)
        {
            return Decision::block(
                NAME,
                guidance::render("download.pipe_shell", &[]),
                guidance::render("download.pipe_shell.guidance", &[]),
            );
        }

        graph
            .iter()
            .filter_map(Download::from_command)
            .map(|download| check_download(ctx, &download))
            .find(|d| !d.is_allowed())
            .unwrap_or_else(Decision::allow)
    }
}

/// A download command with its source and destination.
#[derive(Debug, Clone)]
struct Download<'a> {
    cmd: &'a ParsedCommand,
    url: &'a str,
    output: Option<&'a str>,
}

impl<'a> Download<'a> {
    fn from_command(cmd: &'a ParsedCommand) -> Option<Self> {
        let output_flags = output_flags(cmd.program())?;
        let url = cmd
            .args
            .iter()
            .find(|arg| URL_SCHEMES.iter().any(|scheme| arg.starts_with(scheme)))?;
        Some(Self {
            cmd,
            url: url.as_str(),
            output: output_path(&cmd.words, output_flags),
        })
    }

    /// Extension of the produced file, output path preferred.
    fn extension(&self) -> Option<String> {
        self.output
            .and_then(|out| suffixes(file_name(out)))
            .or_else(|| suffixes(url_file_name(self.url)?))
    }

    /// The path the file lands at, before resolution.
    fn destination(&self) -> Option<&'a str> {
        self.output
            .or_else(|| url_file_name(self.url).filter(|name| !name.is_empty()))
    }

    fn command_text(&self) -> String {
        if self.cmd.raw_text.is_empty() {
            std::iter::once(self.cmd.command.as_str())
                .chain(self.cmd.words.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            self.cmd.raw_text.clone()
        }
    }
}

/// How a download tool names its output file.
#[derive(Debug, Clone, Copy)]
struct OutputFlags {
    short: char,
    long: &'static str,
    /// Other short options that consume a value, ending a flag cluster.
    valued: &'static str,
}

/// Output flags per supported download tool.
fn output_flags(program: &str) -> Option<OutputFlags> {
    let flags = match program {
        "curl" => OutputFlags {
            short: 'o',
            long: "--output",
            valued: "AbcCdDeEFHKmPQrtTuUwxXyYz",
        },
        "wget" => OutputFlags {
            short: 'O',
            long: "--output-document",
            valued: "aABDeiIlNoPQRtTUwX",
        },
        "aria2c" => OutputFlags {
            short: 'o',
            long: "--out",
            valued: "acdijklsux",
        },
        "fetch" => OutputFlags {
            short: 'o',
            long: "--output",
            valued: "iNST",
        },
        _ => return None,
    };
    Some(flags)
}

/// Output path from `-o FILE`, `-oFILE`, `-o=FILE`, a cluster such as
/// `-fsSLo FILE`, `--output FILE` or `--output=FILE`.
fn output_path<'a>(words: &'a [String], flags: OutputFlags) -> Option<&'a str> {
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        if word == flags.long {
            return iter.next().map(String::as_str);
        }
        if let Some(value) = word
            .strip_prefix(flags.long)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value);
        }
        if word.starts_with("--") {
            continue;
        }
        let Some(cluster) = word.strip_prefix('-') else {
            continue;
        };
        for (idx, c) in cluster.char_indices() {
            if c == flags.short {
                let rest = &cluster[idx + c.len_utf8()..];
                return match rest.strip_prefix('=').unwrap_or(rest) {
                    "" => iter.next().map(String::as_str),
                    value => Some(value),
                };
            }
            if flags.valued.contains(c) {
                break;
            }
        }
    }
    None
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Last path segment of a URL, without query or fragment. `None` when the
/// URL has no path.
fn url_file_name(url: &str) -> Option<&str> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = without_scheme.find(['?', '#']).unwrap_or(without_scheme.len());
    let (_, path) = without_scheme[..end].split_once('/')?;
    Some(file_name(path))
}

/// Every suffix of a file name joined (`a.tar.gz` gives `.tar.gz`). Leading
/// dots belong to the stem; a trailing dot means no suffix.
fn suffixes(name: &str) -> Option<String> {
    if name.is_empty() || name.ends_with('.') {
        return None;
    }
    let stem_start = name.trim_start_matches('.');
    let (_, rest) = stem_start.split_once('.')?;
    Some(format!(".{rest}"))
}

fn ends_with_any(extension: &str, list: &[String]) -> bool {
    list.iter()
        .any(|ext| !ext.is_empty() && extension.ends_with(ext.as_str()))
}

fn check_download(ctx: &CheckContext, download: &Download<'_>) -> Decision {
    let config = &ctx.config.download_protection;
    let extension = download.extension();
    debug!(url = download.url, ?extension, "classifying download");

    if let Some(ext) = extension.as_deref() {
        if ends_with_any(ext, &config.require_user_download) {
            return Decision::block(
                NAME,
                guidance::render("download.executable", &[("extension", ext)]),
                guidance::render(
                    "download.executable.guidance",
                    &[("command", &download.command_text())],
                ),
            );
        }
        if ends_with_any(ext, &config.auto_download)
            || ends_with_any(ext, &config.auto_download_but_check_unpack)
        {
            return Decision::allow();
        }
    }

    if config.track_downloaded_executables
        && let Some(destination) = download.destination()
    {
        let resolved = ctx.sandbox.resolve(destination);
        record_download(&ctx.download_record, &resolved, download.url);
    }

    Decision::allow()
}

/// One recorded download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub url: String,
    #[serde(default)]
    pub downloaded_at: String,
    #[serde(default)]
    pub checked_binary: bool,
}

/// Resolved output path to download entry, persisted as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadRecord {
    entries: BTreeMap<String, DownloadEntry>,
}

impl DownloadRecord {
    /// Loads the record. A missing or unreadable file is an empty record.
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            debug!(error = %e, path = %path.display(), "ignoring corrupt download record");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn insert(&mut self, resolved: &Path, url: &str) {
        self.entries.insert(
            resolved.to_string_lossy().into_owned(),
            DownloadEntry {
                url: url.to_string(),
                downloaded_at: unix_timestamp(),
                checked_binary: false,
            },
        );
    }

    pub fn contains(&self, resolved: &Path) -> bool {
        self.entries.contains_key(resolved.to_string_lossy().as_ref())
    }

    pub fn get(&self, resolved: &Path) -> Option<&DownloadEntry> {
        self.entries.get(resolved.to_string_lossy().as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Adds a download to the record at `record_path`. Failures are logged and
/// otherwise ignored.
pub fn record_download(record_path: &Path, resolved: &Path, url: &str) {
    let mut record = DownloadRecord::load(record_path);
    record.insert(resolved, url);
    if let Err(e) = record.save(record_path) {
        warn!(error = %e, path = %record_path.display(), "Failed to save download record");
    }
}
