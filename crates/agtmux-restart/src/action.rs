//! Per-pane restart results and the invocation summary.

use agtmux_health::{AgentType, WorkRecommendation, WorkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StructuredError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestartActionKind {
    Restarted,
    Skipped,
    Waiting,
    Failed,
    WouldRestart,
}

/// Classifier snapshot taken before deciding, plus whether a restart is
/// permitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheck {
    pub agent_type: AgentType,
    pub is_working: bool,
    pub is_idle: bool,
    pub is_rate_limited: bool,
    pub is_context_low: bool,
    pub confidence: f64,
    pub recommendation: WorkRecommendation,
    pub allowed: bool,
    pub reason: String,
}

impl PreCheck {
    /// A working agent, or a plain shell with no agent in it, may only be
    /// restarted when forced.
    pub fn evaluate(status: &WorkStatus, force: bool) -> Self {
        let (allowed, reason) = match (status.is_working, force) {
            (true, false) => (false, "agent is working".to_string()),
            (true, true) => (true, "agent is working; restart forced".to_string()),
            (false, false) if status.agent_type == AgentType::User => {
                (false, "plain shell, no agent to restart".to_string())
            }
            (false, _) => (true, status.reason.clone()),
        };
        Self {
            agent_type: status.agent_type,
            is_working: status.is_working,
            is_idle: status.is_idle,
            is_rate_limited: status.is_rate_limited,
            is_context_low: status.is_context_low,
            confidence: status.confidence,
            recommendation: status.recommendation,
            allowed,
            reason,
        }
    }

    /// Pre-check for a pane that could not be classified at all.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            agent_type: AgentType::Unknown,
            is_working: false,
            is_idle: false,
            is_rate_limited: false,
            is_context_low: false,
            confidence: 0.0,
            recommendation: WorkRecommendation::Unknown,
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Audit trail of one executed restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartSequence {
    pub exit_method: String,
    pub exit_duration_ms: u64,
    pub shell_confirmed: bool,
    /// Launch command was delivered. Independent of prompt delivery.
    pub agent_launched: bool,
    pub agent_type: AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_kill_used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_kill_result: Option<HardKillResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardKillResult {
    Killed,
    /// The shell had no child left to kill.
    NoChild,
}

/// Best-effort reclassification after launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostState {
    pub agent_type: AgentType,
    pub is_working: bool,
    pub is_idle: bool,
    pub confidence: f64,
    pub recommendation: WorkRecommendation,
}

impl From<&WorkStatus> for PostState {
    fn from(s: &WorkStatus) -> Self {
        Self {
            agent_type: s.agent_type,
            is_working: s.is_working,
            is_idle: s.is_idle,
            confidence: s.confidence,
            recommendation: s.recommendation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartAction {
    #[serde(rename = "paneID")]
    pub pane_id: String,
    pub action: RestartActionKind,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub pre_check: PreCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_sequence: Option<RestartSequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_state: Option<PostState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_info: Option<WaitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_error: Option<StructuredError>,
}

impl RestartAction {
    /// `FAILED` action for a pane that never reached a decision.
    pub fn failed_unassessed(err: StructuredError) -> Self {
        let mut action = Self::decided(
            &err.pane,
            RestartActionKind::Failed,
            err.message.clone(),
            PreCheck::unavailable(err.message.clone()),
        );
        action.structured_error = Some(err);
        action
    }

    pub(crate) fn decided(
        pane_id: &str,
        action: RestartActionKind,
        reason: impl Into<String>,
        pre_check: PreCheck,
    ) -> Self {
        Self {
            pane_id: pane_id.to_string(),
            action,
            reason: reason.into(),
            warning: None,
            pre_check,
            restart_sequence: None,
            post_state: None,
            wait_info: None,
            structured_error: None,
        }
    }
}

/// Counts per outcome for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartSummary {
    pub restarted: usize,
    pub skipped: usize,
    pub waiting: usize,
    pub failed: usize,
    pub would_restart: usize,
    pub total: usize,
}

impl RestartSummary {
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a RestartAction>) -> Self {
        let mut summary = Self::default();
        for a in actions {
            summary.total += 1;
            match a.action {
                RestartActionKind::Restarted => summary.restarted += 1,
                RestartActionKind::Skipped => summary.skipped += 1,
                RestartActionKind::Waiting => summary.waiting += 1,
                RestartActionKind::Failed => summary.failed += 1,
                RestartActionKind::WouldRestart => summary.would_restart += 1,
            }
        }
        summary
    }

    /// True when no pane failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
