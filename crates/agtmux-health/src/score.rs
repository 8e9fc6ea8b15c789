//! Health-Score Engine: deduction-based 0-100 score, letter grade and a
//! recommendation.
//!
//! Usage thresholds here (95/80/60 for deductions, 90 for switching
//! accounts) are separate from the health state machine and are not
//! meant to agree with it.

use crate::classify::format_percent;
use crate::types::{
    AgentType, HealthGrade, HealthScoreResult, ScoreRecommendation, UsageSnapshot,
    WorkRecommendation, WorkStatus,
};

pub const BASE_SCORE: i32 = 100;

pub const DEDUCT_RATE_LIMITED: i32 = 50;
pub const DEDUCT_ERROR_STATE: i32 = 40;
pub const DEDUCT_CONTEXT_LOW_IDLE: i32 = 25;
pub const DEDUCT_CONTEXT_LOW_WORKING: i32 = 10;
pub const DEDUCT_UNKNOWN_AGENT: i32 = 15;
pub const DEDUCT_LOW_CONFIDENCE: i32 = 10;

/// `(minimum percent used, deduction)`, highest first.
pub const USAGE_DEDUCTIONS: [(f64, i32); 3] = [(95.0, 30), (80.0, 15), (60.0, 5)];
pub const SWITCH_ACCOUNT_USAGE: f64 = 90.0;

pub const LOW_CONFIDENCE: f64 = 0.5;
pub const URGENT_UNKNOWN_CONFIDENCE: f64 = 0.3;

pub fn score(status: &WorkStatus, usage: Option<&UsageSnapshot>) -> HealthScoreResult {
    let error_state = status.recommendation == WorkRecommendation::ErrorState;
    let unknown_agent = status.agent_type == AgentType::Unknown;

    let mut total = BASE_SCORE;
    let mut issues = Vec::new();
    let mut deduct = |points: i32, issue: String| {
        total -= points;
        issues.push(issue);
    };

    if status.is_rate_limited {
        deduct(DEDUCT_RATE_LIMITED, "rate limited".to_string());
    }
    if error_state {
        deduct(DEDUCT_ERROR_STATE, "error state".to_string());
    }
    if status.is_context_low {
        let pct = format_percent(status.context_remaining);
        if status.is_idle {
            deduct(DEDUCT_CONTEXT_LOW_IDLE, format!("context low while idle ({pct} left)"));
        } else if status.is_working {
            deduct(
                DEDUCT_CONTEXT_LOW_WORKING,
                format!("context low while working ({pct} left)"),
            );
        }
    }
    if unknown_agent {
        deduct(DEDUCT_UNKNOWN_AGENT, "unknown agent type".to_string());
    }
    if let Some(u) = usage
        && let Some(&(_, points)) = USAGE_DEDUCTIONS
            .iter()
            .find(|(min, _)| u.percent_used >= *min)
    {
        deduct(
            points,
            format!(
                "{} usage at {}",
                u.provider,
                format_percent(Some(u.percent_used))
            ),
        );
    }
    if status.confidence < LOW_CONFIDENCE {
        deduct(
            DEDUCT_LOW_CONFIDENCE,
            format!("low confidence ({})", format_percent(Some(status.confidence * 100.0))),
        );
    }

    let score = total.clamp(0, BASE_SCORE) as u8;

    let (recommendation, recommendation_reason) = if status.is_rate_limited {
        (
            ScoreRecommendation::WaitForReset,
            "rate limited; wait for the limit to reset".to_string(),
        )
    } else if error_state {
        (
            ScoreRecommendation::RestartUrgent,
            "agent is in an error state".to_string(),
        )
    } else if let Some(u) = usage.filter(|u| u.percent_used >= SWITCH_ACCOUNT_USAGE) {
        (
            ScoreRecommendation::SwitchAccount,
            format!(
                "{} usage at {}",
                u.provider,
                format_percent(Some(u.percent_used))
            ),
        )
    } else if status.is_context_low && status.is_idle {
        (
            ScoreRecommendation::RestartRecommended,
            "context low and agent idle".to_string(),
        )
    } else if unknown_agent && status.confidence < URGENT_UNKNOWN_CONFIDENCE {
        (
            ScoreRecommendation::RestartUrgent,
            "unknown agent with very low confidence".to_string(),
        )
    } else if score >= 70 {
        (ScoreRecommendation::Healthy, format!("score {score}"))
    } else if score >= 50 {
        (ScoreRecommendation::Monitor, format!("score {score}"))
    } else {
        (ScoreRecommendation::RestartRecommended, format!("score {score}"))
    };

    HealthScoreResult {
        score,
        grade: HealthGrade::from_score(score),
        issues,
        recommendation,
        recommendation_reason,
    }
}
