use std::io::{Read, Write};

use serde::Deserialize;

use crate::decision::Decision;

/// The hook request received from the agent host via stdin.
///
/// Only `tool_name` and `tool_input` drive decisions; the rest is kept for
/// logging.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

impl HookInput {
    /// Parse from any reader (for testability)
    pub fn from_reader(reader: impl Read) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Parse from stdin (convenience wrapper for production)
    pub fn from_stdin() -> anyhow::Result<Self> {
        Self::from_reader(std::io::stdin().lock())
    }

    /// Builds a request for a single tool invocation.
    pub fn new(tool_name: impl Into<String>, tool_input: serde_json::Value) -> Self {
        Self {
            session_id: None,
            cwd: None,
            hook_event_name: None,
            tool_name: tool_name.into(),
            tool_input,
        }
    }

    /// Get typed tool input based on tool_name
    pub fn typed_tool_input(&self) -> ToolInput {
        fn typed<T: for<'de> Deserialize<'de>>(
            value: &serde_json::Value,
            wrap: fn(T) -> ToolInput,
        ) -> ToolInput {
            serde_json::from_value(value.clone())
                .map(wrap)
                .unwrap_or_else(|_| ToolInput::Unknown(value.clone()))
        }

        match self.tool_name.as_str() {
            "Bash" => typed(&self.tool_input, ToolInput::Bash),
            "Read" => typed(&self.tool_input, ToolInput::Read),
            "Write" => typed(&self.tool_input, ToolInput::Write),
            "Edit" | "MultiEdit" => typed(&self.tool_input, ToolInput::Edit),
            "NotebookEdit" => typed(&self.tool_input, ToolInput::NotebookEdit),
            "Glob" => typed(&self.tool_input, ToolInput::Glob),
            "Grep" => typed(&self.tool_input, ToolInput::Grep),
            _ => ToolInput::Unknown(self.tool_input.clone()),
        }
    }
}

/// Tool-specific input variants
#[derive(Debug, Clone)]
pub enum ToolInput {
    Bash(BashInput),
    Read(FileInput),
    Write(FileInput),
    Edit(FileInput),
    NotebookEdit(NotebookInput),
    Glob(SearchInput),
    Grep(SearchInput),
    Unknown(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BashInput {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Read, Write, Edit and MultiEdit all name their target `file_path`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileInput {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotebookInput {
    pub notebook_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Writes the rendered decision for the host and returns the exit code.
///
/// Allow writes nothing.
pub fn emit(decision: &Decision, mut writer: impl Write) -> anyhow::Result<i32> {
    if !decision.is_allowed() {
        writeln!(writer, "{}", decision.render())?;
    }
    Ok(decision.exit_code())
}

/// Exit codes for hook responses
pub mod exit_code {
    /// Success - the tool call proceeds
    pub const SUCCESS: i32 = 0;
    /// Blocking error - stderr message fed back to the agent
    pub const BLOCKING_ERROR: i32 = 2;
}
