//! Work-State Classifier: captured pane text to [`WorkStatus`].

use crate::agents;
use crate::patterns::{SignalCategory, SignalMatch, SignalTable, parse_context_remaining};
use crate::types::{AgentType, WorkRecommendation, WorkStatus};

/// Lines from the bottom scanned for work and error indicators.
pub const WORK_WINDOW_LINES: usize = 15;
/// Remaining-context percentage below which the agent is context-low.
pub const CONTEXT_LOW_THRESHOLD: f64 = 20.0;
pub const NO_SIGNAL_CONFIDENCE: f64 = 0.3;
pub const UNKNOWN_AGENT_PENALTY: f64 = 0.2;

/// Classify one capture. Pure: identical inputs give identical output.
pub fn classify(agent_type: AgentType, text: &str) -> WorkStatus {
    classify_with(SignalTable::builtin(), agent_type, text)
}

pub fn classify_with(table: &SignalTable, agent_type: AgentType, text: &str) -> WorkStatus {
    let tail = tail_lines(text, WORK_WINDOW_LINES);

    let rate_limit = table.first_match(SignalCategory::RateLimit, text);
    let work = table.all_matches(SignalCategory::Working, &tail);
    let errors = table.all_matches(SignalCategory::Error, &tail);
    let prompt = agents::idle_prompt(agent_type, text);
    let context_remaining = parse_context_remaining(text);

    let is_rate_limited = rate_limit.is_some();
    let is_working = !work.is_empty() && !is_rate_limited;
    let is_idle = prompt.is_some() && !is_working;
    let is_context_low = context_remaining.is_some_and(|pct| pct < CONTEXT_LOW_THRESHOLD);

    let (recommendation, confidence, reason) = if let Some(m) = &rate_limit {
        (
            WorkRecommendation::RateLimitedWait,
            m.weight,
            format!("rate limit detected: {}", m.text),
        )
    } else if is_working {
        let weight = max_weight(&work);
        if is_context_low {
            (
                WorkRecommendation::ContextLowContinue,
                weight,
                format!("working with low context ({})", format_percent(context_remaining)),
            )
        } else {
            (
                WorkRecommendation::DoNotInterrupt,
                weight,
                format!("agent is working ({})", labels(&work)),
            )
        }
    } else if !errors.is_empty() {
        (
            WorkRecommendation::ErrorState,
            max_weight(&errors),
            format!("error output detected ({})", labels(&errors)),
        )
    } else if let Some(p) = &prompt {
        (
            WorkRecommendation::SafeToRestart,
            p.weight,
            format!("idle at prompt: {}", p.line),
        )
    } else {
        (
            WorkRecommendation::Unknown,
            NO_SIGNAL_CONFIDENCE,
            "no work, idle or limit signals".to_string(),
        )
    };

    let confidence = if agent_type == AgentType::Unknown {
        confidence - UNKNOWN_AGENT_PENALTY
    } else {
        confidence
    };

    WorkStatus {
        agent_type,
        is_working,
        is_idle,
        is_rate_limited,
        is_context_low,
        context_remaining,
        confidence: confidence.clamp(0.0, 1.0),
        work_indicators: evidence(&work),
        limit_indicators: rate_limit.map(|m| m.text).into_iter().collect(),
        error_indicators: evidence(&errors),
        recommendation,
        reason,
    }
}

/// The bottom `n` lines of `text`, in order, ignoring pane-height padding.
pub fn tail_lines(text: &str, n: usize) -> String {
    let mut lines: Vec<&str> = agents::strip_padding(text).lines().rev().take(n).collect();
    lines.reverse();
    lines.join("\n")
}

fn max_weight(matches: &[SignalMatch]) -> f64 {
    matches.iter().map(|m| m.weight).fold(0.0, f64::max)
}

fn labels(matches: &[SignalMatch]) -> String {
    matches.iter().map(|m| m.label).collect::<Vec<_>>().join(", ")
}

fn evidence(matches: &[SignalMatch]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(matches.len());
    for m in matches {
        if !out.contains(&m.text) {
            out.push(m.text.clone());
        }
    }
    out
}

/// Round to the nearest integer percent.
pub(crate) fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}%", v.round()),
        None => "unknown".to_string(),
    }
}
