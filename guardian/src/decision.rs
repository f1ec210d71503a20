//! The tri-state outcome of a check and its rendering for the agent.

use std::fmt;

use serde::Serialize;

use crate::guidance;
use crate::hooks::exit_code;

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Allow,
    Block,
    Confirm,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionStatus::Allow => "allow",
            DecisionStatus::Block => "block",
            DecisionStatus::Confirm => "confirm",
        };
        f.write_str(s)
    }
}

/// A decision with its explanation.
///
/// `reason` and `guidance` are never empty unless the status is Allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub status: DecisionStatus,
    pub reason: String,
    pub guidance: String,
    /// Name of the check that produced the decision.
    pub check: String,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            status: DecisionStatus::Allow,
            reason: String::new(),
            guidance: String::new(),
            check: String::new(),
        }
    }

    pub fn block(check: &str, reason: impl Into<String>, guidance: impl Into<String>) -> Self {
        Self::flagged(DecisionStatus::Block, check, reason.into(), guidance.into())
    }

    pub fn confirm(check: &str, reason: impl Into<String>, guidance: impl Into<String>) -> Self {
        Self::flagged(DecisionStatus::Confirm, check, reason.into(), guidance.into())
    }

    fn flagged(status: DecisionStatus, check: &str, reason: String, guidance: String) -> Self {
        let reason = if reason.trim().is_empty() {
            format!("Operation flagged by {check}")
        } else {
            reason
        };
        let guidance = if guidance.trim().is_empty() {
            guidance::render("default", &[])
        } else {
            guidance
        };
        Self {
            status,
            reason,
            guidance,
            check: check.to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.status == DecisionStatus::Allow
    }

    pub fn is_blocked(&self) -> bool {
        self.status == DecisionStatus::Block
    }

    pub fn needs_confirmation(&self) -> bool {
        self.status == DecisionStatus::Confirm
    }

    /// Process exit code for the hook protocol.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            DecisionStatus::Allow => exit_code::SUCCESS,
            DecisionStatus::Block | DecisionStatus::Confirm => exit_code::BLOCKING_ERROR,
        }
    }

    /// The message shown to the agent. Empty for Allow.
    pub fn render(&self) -> String {
        let banner = match self.status {
            DecisionStatus::Allow => return String::new(),
            DecisionStatus::Block => "🛡️ Security Guardian: Operation blocked",
            DecisionStatus::Confirm => "⚠️ Security Guardian: Confirmation required",
        };

        let mut parts = vec![banner.to_string(), String::new(), format!("Reason: {}", self.reason)];
        if !self.guidance.is_empty() {
            parts.push(String::new());
            parts.push(format!("Guidance: {}", self.guidance));
        }
        if !self.check.is_empty() {
            parts.push(String::new());
            parts.push(format!("Check: {}", self.check));
        }
        parts.join("\n")
    }
}

/// Consumes decisions lazily and returns the first non-Allow decision.
pub fn first_flagged<I>(decisions: I) -> Decision
where
    I: IntoIterator<Item = Decision>,
{
    decisions
        .into_iter()
        .find(|d| !d.is_allowed())
        .unwrap_or_else(Decision::allow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_block() {
        let d = Decision::block("git_check", "Destructive git operation blocked: push --force", "Use lease");
        assert_eq!(
            d.render(),
            "🛡️ Security Guardian: Operation blocked\n\nReason: Destructive git operation blocked: push --force\n\nGuidance: Use lease\n\nCheck: git_check"
        );
        assert_eq!(d.exit_code(), 2);
    }

    #[test]
    fn test_render_confirm_banner() {
        let d = Decision::confirm("bypass_check", "network", "verify");
        assert!(d.render().starts_with("⚠️ Security Guardian: Confirmation required"));
        assert!(d.needs_confirmation());
        assert_eq!(d.exit_code(), 2);
    }

    #[test]
    fn test_allow_renders_nothing() {
        let d = Decision::allow();
        assert_eq!(d.render(), "");
        assert_eq!(d.exit_code(), 0);
    }

    #[test]
    fn test_empty_reason_and_guidance_get_fallbacks() {
        let d = Decision::block("directory_check", "", "  ");
        assert!(!d.reason.is_empty());
        assert_eq!(d.guidance, "Ask the user how to proceed.");
    }

    #[test]
    fn test_first_flagged_short_circuits() {
        let mut evaluated = 0;
        let decisions = (0..5).map(|i| {
            evaluated += 1;
            if i == 1 {
                Decision::confirm("second", "r", "g")
            } else {
                Decision::allow()
            }
        });
        let d = first_flagged(decisions);
        assert_eq!(d.check, "second");
        assert_eq!(evaluated, 2);
    }

    #[test]
    fn test_serializes_lowercase_status() {
        let json = serde_json::to_string(&Decision::block("c", "r", "g")).unwrap();
        assert!(json.contains("\"status\":\"block\""));
    }
}
