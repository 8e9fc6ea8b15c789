//! Health-State Machine and the sub-check builders that feed it.
//!
//! `evaluate_health` is stateless: the same three sub-results always give
//! the same [`HealthCheck`]. The builders turn raw observations (process
//! snapshot, activity delta, captured text) into those sub-results.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::activity::ActivityDelta;
use crate::classify::{WORK_WINDOW_LINES, tail_lines};
use crate::patterns::{SignalCategory, SignalTable, parse_wait_seconds};
use crate::types::{
    ActivityLevel, AgentType, ErrorCheckResult, HealthCheck, HealthState, ProcessCheckResult,
    StallCheckResult,
};

/// Unchanged output for this long while not at a prompt counts as a stall.
pub const STALL_THRESHOLD_SECS: i64 = 120;
/// Idle longer than this degrades health even without a stall.
pub const EXTENDED_IDLE_SECS: i64 = 300;
/// Factor applied when any sub-check is missing.
pub const MISSING_CHECK_FACTOR: f64 = 0.8;
/// Stall confidence below this scales the overall confidence.
pub const LOW_STALL_CONFIDENCE: f64 = 0.7;

// ─── Process check ───────────────────────────────────────────────

/// What the OS reported about the pane's foreground child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessObservation {
    pub child_pid: Option<u32>,
    /// Run state name, e.g. `sleeping`, `zombie`.
    pub child_state: Option<String>,
    pub child_alive: bool,
    pub memory_kb: Option<u64>,
}

static EXIT_STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:exit(?:ed)?(?: with)? (?:code|status)|exit status)[:= ]\s*(-?\d+)")
        .expect("exit status regex must compile")
});

/// Last exit status printed in `text`, if any.
pub fn parse_exit_status(text: &str) -> Option<i32> {
    EXIT_STATUS_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .last()
}

pub fn check_process(
    agent_type: AgentType,
    observation: &ProcessObservation,
    text: &str,
) -> ProcessCheckResult {
    let running = observation.child_pid.is_some() && observation.child_alive;
    let crashed = agent_type.is_agent() && !running;
    let exit_status = parse_exit_status(text).unwrap_or(-1);

    let reason = match (running, observation.child_pid, crashed) {
        (true, Some(pid), _) => format!("child {pid} running"),
        (false, Some(pid), true) => format!(
            "{agent_type} child {pid} is {}",
            observation.child_state.as_deref().unwrap_or("not alive")
        ),
        (false, None, true) => format!("no {agent_type} process under pane shell"),
        _ => "no agent process expected".to_string(),
    };

    ProcessCheckResult {
        running,
        crashed,
        exit_status,
        child_pid: observation.child_pid,
        process_state: observation.child_state.clone(),
        memory_kb: observation.memory_kb,
        reason,
    }
}

// ─── Stall check ─────────────────────────────────────────────────

pub fn check_stall(delta: &ActivityDelta, at_prompt: bool, now: DateTime<Utc>) -> StallCheckResult {
    let idle_seconds = (now - delta.last_change).num_seconds().max(0);

    let (activity_state, stalled, confidence, reason) = if delta.first_sample {
        (
            ActivityLevel::Unknown,
            false,
            0.5,
            "first sample, no history".to_string(),
        )
    } else if delta.changed {
        (
            ActivityLevel::Active,
            false,
            0.9,
            format!("{} new lines", delta.delta_lines),
        )
    } else if at_prompt {
        (
            ActivityLevel::Idle,
            false,
            0.8,
            format!("at prompt, unchanged for {idle_seconds}s"),
        )
    } else if idle_seconds >= STALL_THRESHOLD_SECS {
        let extra_minutes = (idle_seconds - STALL_THRESHOLD_SECS) / 60;
        (
            ActivityLevel::Stalled,
            true,
            (0.7 + 0.05 * extra_minutes as f64).min(0.95),
            format!("no output for {idle_seconds}s"),
        )
    } else {
        (
            ActivityLevel::Quiet,
            false,
            0.6,
            format!("quiet for {idle_seconds}s"),
        )
    };

    StallCheckResult {
        stalled,
        activity_state,
        velocity: delta.velocity,
        idle_seconds,
        confidence,
        reason,
    }
}

// ─── Error check ─────────────────────────────────────────────────

/// Rate-limit patterns over the whole capture, error patterns over the
/// same bottom window the classifier uses.
pub fn check_errors(text: &str) -> ErrorCheckResult {
    let table = SignalTable::builtin();
    let limits = table.all_matches(SignalCategory::RateLimit, text);
    let errors = table.all_matches(SignalCategory::Error, &tail_lines(text, WORK_WINDOW_LINES));

    let rate_limited = !limits.is_empty();
    let has_errors = rate_limited || !errors.is_empty();
    let wait_seconds = if rate_limited { parse_wait_seconds(text) } else { 0 };
    let patterns: Vec<String> = limits
        .iter()
        .chain(errors.iter())
        .map(|m| m.label.to_string())
        .collect();

    let reason = if rate_limited && wait_seconds > 0 {
        format!("rate limited, wait {wait_seconds}s")
    } else if rate_limited {
        "rate limited".to_string()
    } else if has_errors {
        patterns.join(", ")
    } else {
        "no error patterns".to_string()
    };

    ErrorCheckResult {
        has_errors,
        rate_limited,
        patterns,
        wait_seconds,
        reason,
    }
}

// ─── State machine ───────────────────────────────────────────────

/// Fuse the sub-checks. First matching rule wins:
/// crash, error, rate limit, stall, extended idle, healthy.
pub fn evaluate_health(
    pane_id: &str,
    agent_type: AgentType,
    process: Option<ProcessCheckResult>,
    stall: Option<StallCheckResult>,
    error: Option<ErrorCheckResult>,
    checked_at: DateTime<Utc>,
) -> HealthCheck {
    let (health_state, reason) = decide(process.as_ref(), stall.as_ref(), error.as_ref());

    let mut confidence = 1.0;
    if process.is_none() || stall.is_none() || error.is_none() {
        confidence *= MISSING_CHECK_FACTOR;
    }
    if let Some(s) = &stall
        && s.confidence < LOW_STALL_CONFIDENCE
    {
        confidence *= s.confidence;
    }

    HealthCheck {
        pane_id: pane_id.to_string(),
        agent_type,
        process_check: process,
        stall_check: stall,
        error_check: error,
        health_state,
        confidence,
        reason,
        checked_at,
    }
}

fn decide(
    process: Option<&ProcessCheckResult>,
    stall: Option<&StallCheckResult>,
    error: Option<&ErrorCheckResult>,
) -> (HealthState, String) {
    if let Some(p) = process
        && p.crashed
    {
        return (HealthState::Unhealthy, "agent crashed".to_string());
    }
    if let Some(e) = error
        && e.has_errors
    {
        if !e.rate_limited {
            return (
                HealthState::Unhealthy,
                format!("error detected: {}", e.patterns.join(", ")),
            );
        }
        return (HealthState::RateLimited, e.reason.clone());
    }
    if let Some(s) = stall {
        if s.stalled {
            return (HealthState::Degraded, format!("agent stalled: {}", s.reason));
        }
        if s.idle_seconds > EXTENDED_IDLE_SECS {
            return (
                HealthState::Degraded,
                "idle for extended period".to_string(),
            );
        }
    }
    (HealthState::Healthy, "all checks passed".to_string())
}
