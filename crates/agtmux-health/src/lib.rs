//! agtmux-health: pure agent health engine.
//! Activity tracking, signal matching, agent registry and detection, work
//! classification, health-state fusion and scoring. No IO, no async.

pub mod activity;
pub mod agents;
pub mod classify;
pub mod detect;
pub mod health;
pub mod patterns;
pub mod score;
pub mod types;

pub use activity::{ActivityDelta, ActivityTracker, PaneActivitySample, content_hash};
pub use agents::{
    AgentProfile, ExitStep, PromptStyle, idle_prompt, last_non_blank_line,
    looks_like_shell_prompt, profile, strip_padding,
};
pub use classify::classify;
pub use detect::{PaneMeta, detect_agent_type};
pub use health::{
    ProcessObservation, check_errors, check_process, check_stall, evaluate_health,
};
pub use patterns::{SignalCategory, SignalTable, parse_context_remaining, parse_wait_seconds};
pub use score::score;
pub use types::*;
