//! JSON output envelope shared by every command.

use agtmux_health::{
    AgentType, HealthCheck, HealthGrade, HealthScoreResult, HealthState, ScoreRecommendation,
    UsageSnapshot, WorkStatus,
};
use agtmux_restart::{RestartAction, RestartSummary};
use agtmux_tmux::{TmuxError, TmuxPaneInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collect::PaneObservation;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<P> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub session: Option<String>,
    pub data: Data<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Data<P> {
    pub panes: Vec<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RestartSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: &'static str,
    pub message: String,
}

impl<P: Serialize> Envelope<P> {
    pub fn ok(session: Option<String>, panes: Vec<P>, summary: Option<RestartSummary>) -> Self {
        let success = summary.is_none_or(|s| s.is_success());
        Self {
            success,
            timestamp: Utc::now(),
            session,
            data: Data { panes, summary },
            error: None,
        }
    }

    /// Clear `success` when some pane could not be handled.
    #[must_use]
    pub fn partial(mut self, any_failed: bool) -> Self {
        self.success &= !any_failed;
        self
    }

    pub fn print(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

impl Envelope<serde_json::Value> {
    pub fn failure(session: Option<String>, err: &anyhow::Error) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            session,
            data: Data {
                panes: Vec::new(),
                summary: None,
            },
            error: Some(EnvelopeError {
                code: error_code(err),
                message: format!("{err:#}"),
            }),
        }
    }
}

/// Stable code for a command-level failure.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<TmuxError>() {
        Some(e) if e.is_missing_target() => "NOT_FOUND",
        Some(TmuxError::NotFound) => "TMUX_UNAVAILABLE",
        Some(TmuxError::NoServer(_)) => "TMUX_NO_SERVER",
        Some(_) => "TMUX_ERROR",
        None => "INTERNAL",
    }
}

// ─── Pane reports ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneReport {
    #[serde(rename = "paneID")]
    pub pane_id: String,
    pub target: String,
    pub agent_type: AgentType,
    pub work_status: WorkStatus,
    pub health_state: HealthState,
    pub score: u8,
    pub grade: HealthGrade,
    pub recommendation: ScoreRecommendation,
    pub recommendation_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_detail: Option<HealthScoreResult>,
}

impl PaneReport {
    pub fn new(
        obs: &PaneObservation,
        score: HealthScoreResult,
        usage: Option<UsageSnapshot>,
        verbose: bool,
    ) -> Self {
        Self {
            pane_id: obs.pane.pane_id.clone(),
            target: obs.pane.target(),
            agent_type: obs.agent_type,
            work_status: obs.status.clone(),
            health_state: obs.health.health_state,
            score: score.score,
            grade: score.grade,
            recommendation: score.recommendation,
            recommendation_reason: score.recommendation_reason.clone(),
            usage,
            health: verbose.then(|| obs.health.clone()),
            score_detail: verbose.then_some(score),
        }
    }
}

/// A selected pane whose output could not be read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneFailure {
    #[serde(rename = "paneID")]
    pub pane_id: String,
    pub target: String,
    pub error: EnvelopeError,
}

impl PaneFailure {
    pub fn capture_failed(pane: &TmuxPaneInfo, message: &str) -> Self {
        Self {
            pane_id: pane.pane_id.clone(),
            target: pane.target(),
            error: EnvelopeError {
                code: "CAPTURE_FAILED",
                message: format!("capture failed: {message}"),
            },
        }
    }
}

/// One pane in a report: scored, or failed with its error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaneEntry {
    Report(Box<PaneReport>),
    Failed(PaneFailure),
}

impl PaneEntry {
    pub fn report(&self) -> Option<&PaneReport> {
        match self {
            Self::Report(r) => Some(&**r),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneRestartReport {
    #[serde(flatten)]
    pub pane: PaneEntry,
    pub restart: RestartAction,
}
