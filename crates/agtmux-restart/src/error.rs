//! Structured, machine-parseable restart failures.

use std::collections::BTreeMap;
use std::fmt;

use agtmux_health::AgentType;
use serde::{Deserialize, Serialize};

/// Longest `lastOutput` carried in error details.
pub const LAST_OUTPUT_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SoftExitFailed,
    ShellNotConfirmed,
    PanePidUnavailable,
    ChildLookupFailed,
    HardKillFailed,
    HardKillUnconfirmed,
    LaunchFailed,
    CaptureFailed,
    Cancelled,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftExitFailed => "SOFT_EXIT_FAILED",
            Self::ShellNotConfirmed => "SHELL_NOT_CONFIRMED",
            Self::PanePidUnavailable => "PANE_PID_UNAVAILABLE",
            Self::ChildLookupFailed => "CHILD_LOOKUP_FAILED",
            Self::HardKillFailed => "HARD_KILL_FAILED",
            Self::HardKillUnconfirmed => "HARD_KILL_UNCONFIRMED",
            Self::LaunchFailed => "LAUNCH_FAILED",
            Self::CaptureFailed => "CAPTURE_FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// What an operator should do next.
    pub fn recovery_hint(self) -> &'static str {
        match self {
            Self::SoftExitFailed => {
                "agent ignored its exit sequence; retry with --hard-kill or stop it manually"
            }
            Self::ShellNotConfirmed => {
                "pane did not return to a shell prompt; inspect the pane or retry with --hard-kill"
            }
            Self::PanePidUnavailable => "tmux did not report a pane pid; check the pane still exists",
            Self::ChildLookupFailed => "process table unavailable; check that ps or pgrep is installed",
            Self::HardKillFailed => {
                "SIGKILL was refused; check process ownership and kill the agent manually"
            }
            Self::HardKillUnconfirmed => {
                "agent was killed but no shell prompt appeared; inspect the pane manually"
            }
            Self::LaunchFailed => "could not type the launch command; start the agent manually",
            Self::CaptureFailed => "pane output could not be captured; check the pane still exists",
            Self::Cancelled => {
                "deadline reached mid-restart; inspect the pane before retrying with a longer --deadline-secs"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    /// Reading the pane before any decision.
    Assess,
    Exit,
    Verify,
    HardKill,
    Launch,
    Warmup,
    Prompt,
}

impl RestartPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assess => "assess",
            Self::Exit => "exit",
            Self::Verify => "verify",
            Self::HardKill => "hard_kill",
            Self::Launch => "launch",
            Self::Warmup => "warmup",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(rename = "childPID", skip_serializing_if = "Option::is_none")]
    pub child_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,
    /// Every protocol action tried before the failure, in order.
    pub attempted_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_method: Option<String>,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code} during {phase} on {pane}: {message}")]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
    pub phase: RestartPhase,
    pub pane: String,
    pub details: ErrorDetails,
    pub recovery_hint: String,
}

impl StructuredError {
    pub fn new(
        code: ErrorCode,
        phase: RestartPhase,
        pane: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            phase,
            pane: pane.into(),
            details: ErrorDetails::default(),
            recovery_hint: code.recovery_hint().to_string(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }
}

/// Keep the trailing `LAST_OUTPUT_MAX_CHARS` characters, where the most
/// recent output is.
pub fn truncate_output(text: &str) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= LAST_OUTPUT_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - LAST_OUTPUT_MAX_CHARS).collect()
}
