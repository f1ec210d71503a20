//! Guardian library: policy enforcement for coding-agent tool invocations.
//!
//! The agent host calls the `guardian hook` binary before every tool use.
//! This crate decides whether the invocation is allowed, blocked, or needs
//! the user's confirmation, and explains itself when it says no.
//!
//! # Modules
//!
//! - [`hooks`]: Input types and exit codes for the hook protocol.
//! - [`command`]: Shell command parsing into a [`command::CommandGraph`].
//! - [`paths`]: Path resolution and the sandbox boundary.
//! - [`pattern`]: Git operation patterns and their classification.
//! - [`checks`]: The eight policy checks and the order they run in.
//! - [`handlers`]: Per-tool dispatch into the check pipelines.
//! - [`decision`] and [`guidance`]: Outcomes and the messages attached to them.
//! - [`audit`]: JSONL audit log of flagged decisions.
//!
//! # Example
//!
//! ```no_run
//! use guardian::checks::CheckContext;
//! use guardian::handlers::handle_pre_tool_use;
//! use guardian::hooks::{self, HookInput};
//!
//! let (config, _) = guardian_config::load_effective(&guardian_config::ConfigLocator::new()).unwrap();
//! let ctx = CheckContext::new(config);
//! let input = HookInput::from_stdin().unwrap();
//! let decision = handle_pre_tool_use(&input, &ctx);
//! let code = hooks::emit(&decision, std::io::stderr()).unwrap();
//! std::process::exit(code);
//! ```

pub mod audit;
pub mod checks;
pub mod command;
pub mod decision;
pub mod errors;
pub mod git;
pub mod guidance;
pub mod handlers;
pub mod hooks;
pub mod paths;
pub mod pattern;
pub mod style;
pub mod subprocess;
pub mod tracing_init;

pub use checks::CheckContext;
pub use decision::{Decision, DecisionStatus};
pub use hooks::{HookInput, ToolInput};
