use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Agent type ──────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
    Cursor,
    Windsurf,
    Aider,
    /// A plain user shell, not an agent.
    User,
    #[default]
    Unknown,
}

impl AgentType {
    pub const AGENTS: [Self; 6] = [
        Self::Claude,
        Self::Codex,
        Self::Gemini,
        Self::Cursor,
        Self::Windsurf,
        Self::Aider,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::Aider => "aider",
            Self::User => "user",
            Self::Unknown => "unknown",
        }
    }

    /// True for the coding agents the registry knows how to exit and launch.
    pub fn is_agent(self) -> bool {
        !matches!(self, Self::User | Self::Unknown)
    }

    /// Usage-quota provider key for this agent type.
    pub fn provider(self) -> Option<&'static str> {
        match self {
            Self::Claude => Some("anthropic"),
            Self::Codex => Some("openai"),
            Self::Gemini => Some("google"),
            _ => None,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Work status ─────────────────────────────────────────────────

/// Classifier opinion on what to do with a pane right now.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRecommendation {
    DoNotInterrupt,
    SafeToRestart,
    ContextLowContinue,
    RateLimitedWait,
    ErrorState,
    #[default]
    Unknown,
}

impl WorkRecommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DoNotInterrupt => "DO_NOT_INTERRUPT",
            Self::SafeToRestart => "SAFE_TO_RESTART",
            Self::ContextLowContinue => "CONTEXT_LOW_CONTINUE",
            Self::RateLimitedWait => "RATE_LIMITED_WAIT",
            Self::ErrorState => "ERROR_STATE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for WorkRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable classification snapshot for one pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkStatus {
    pub agent_type: AgentType,
    pub is_working: bool,
    pub is_idle: bool,
    pub is_rate_limited: bool,
    pub is_context_low: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_remaining: Option<f64>,
    pub confidence: f64,
    pub work_indicators: Vec<String>,
    pub limit_indicators: Vec<String>,
    pub error_indicators: Vec<String>,
    pub recommendation: WorkRecommendation,
    pub reason: String,
}

// ─── Health state machine ────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
    RateLimited,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output-activity level used by the stall check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Active,
    Idle,
    Quiet,
    Stalled,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCheckResult {
    pub running: bool,
    pub crashed: bool,
    /// `-1` when no exit status could be read from the pane.
    pub exit_status: i32,
    #[serde(rename = "childPID", skip_serializing_if = "Option::is_none")]
    pub child_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_state: Option<String>,
    #[serde(rename = "memoryKB", skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StallCheckResult {
    pub stalled: bool,
    pub activity_state: ActivityLevel,
    /// Changed lines per second since the previous sample.
    pub velocity: f64,
    pub idle_seconds: i64,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCheckResult {
    pub has_errors: bool,
    pub rate_limited: bool,
    pub patterns: Vec<String>,
    pub wait_seconds: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    #[serde(rename = "paneID")]
    pub pane_id: String,
    pub agent_type: AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_check: Option<ProcessCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_check: Option<StallCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_check: Option<ErrorCheckResult>,
    pub health_state: HealthState,
    pub confidence: f64,
    pub reason: String,
    pub checked_at: DateTime<Utc>,
}

// ─── Health score ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            50..=69 => Self::D,
            _ => Self::F,
        }
    }
}

impl fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

/// Six-way action recommendation derived from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreRecommendation {
    Healthy,
    Monitor,
    RestartRecommended,
    RestartUrgent,
    WaitForReset,
    SwitchAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScoreResult {
    pub score: u8,
    pub grade: HealthGrade,
    pub issues: Vec<String>,
    pub recommendation: ScoreRecommendation,
    pub recommendation_reason: String,
}

// ─── Provider usage ──────────────────────────────────────────────

/// Account usage for one provider as reported by the quota collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub provider: String,
    pub percent_used: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    #[serde(default = "default_operational")]
    pub operational: bool,
}

fn default_operational() -> bool {
    true
}
