//! Bounded external commands.
//!
//! Subprocesses are never waited on without a deadline. Callers treat every
//! error from this module as "no determination" and carry on.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Deadline for every subprocess.
pub const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit state and captured stdout of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
}

/// Runs `program` with `args`, killing it once `timeout` elapses.
///
/// Stdout is drained on a helper thread so a chatty child cannot block on a
/// full pipe while we poll.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {program}"))?;

    let stdout_pipe = child
        .stdout
        .take()
        .context("child stdout was not captured")?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::BufReader::new(stdout_pipe).read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    if let Err(e) = child.kill() {
                        warn!("failed to kill {program} after timeout: {e}");
                    }
                    let _ = child.wait();
                    anyhow::bail!("{program} timed out after {timeout:?}");
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e).with_context(|| format!("waiting for {program}")),
        }
    };

    let stdout = reader.join().unwrap_or_default();
    Ok(CommandOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
    })
}

/// Runs `file -b` on a path and returns its description.
pub fn file_type(path: &Path) -> Result<String> {
    let path_arg = path.to_string_lossy();
    let output = run_with_timeout("file", &["-b", path_arg.as_ref()], None, SUBPROCESS_TIMEOUT)?;
    if !output.success {
        anyhow::bail!("file -b exited unsuccessfully for {}", path.display());
    }
    Ok(output.stdout.trim().to_string())
}

/// True if a `file -b` description names something runnable.
pub fn describes_executable(description: &str) -> bool {
    let lower = description.to_lowercase();
    ["executable", "script", "elf", "mach-o", "pe32"]
        .iter()
        .any(|kind| lower.contains(kind))
}

/// Executable formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Elf,
    Pe,
    MachO32,
    MachO64,
    MachOUniversal,
    Shebang,
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryKind::Elf => "ELF executable",
            BinaryKind::Pe => "Windows PE executable",
            BinaryKind::MachO32 => "Mach-O 32-bit",
            BinaryKind::MachO64 => "Mach-O 64-bit",
            BinaryKind::MachOUniversal => "Mach-O universal",
            BinaryKind::Shebang => "script with shebang",
        };
        f.write_str(name)
    }
}

const MAGIC: &[(&[u8], BinaryKind)] = &[
    (b"\x7fELF", BinaryKind::Elf),
    (b"MZ", BinaryKind::Pe),
    (b"\xfe\xed\xfa\xce", BinaryKind::MachO32),
    (b"\xfe\xed\xfa\xcf", BinaryKind::MachO64),
    (b"\xca\xfe\xba\xbe", BinaryKind::MachOUniversal),
    (b"#!", BinaryKind::Shebang),
];

/// Classifies a header by its magic bytes.
pub fn classify_header(header: &[u8]) -> Option<BinaryKind> {
    MAGIC
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|(_, kind)| *kind)
}

/// Reads the first bytes of a file and classifies them.
pub fn sniff_magic(path: &Path) -> Option<BinaryKind> {
    let mut header = [0u8; 8];
    let read = File::open(path).and_then(|mut f| f.read(&mut header));
    match read {
        Ok(n) => classify_header(&header[..n]),
        Err(e) => {
            debug!("could not read header of {}: {e}", path.display());
            None
        }
    }
}
