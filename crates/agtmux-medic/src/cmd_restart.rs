//! `agtmux-medic restart`: assess target panes, then restart them one by one.

use std::time::Duration;

use agtmux_restart::{
    ErrorCode, RestartAction, RestartOptions, RestartOrchestrator, RestartPhase, RestartSummary,
    StructuredError, WaitInfo,
};
use agtmux_tmux::{ProcessInspector, TmuxCommandRunner};
use tokio_util::sync::CancellationToken;

use crate::cmd_health::{Assessment, PaneOutcome, assess, pane_entry};
use crate::config::{CollectOptions, UsageOptions};
use crate::envelope::{Envelope, PaneRestartReport};

/// Wait details for a rate-limited pane: the parsed wait from its output
/// and the provider reset time, when either is known.
pub fn wait_info(assessment: &Assessment) -> Option<WaitInfo> {
    let status = &assessment.observation.status;
    if !status.is_rate_limited {
        return None;
    }
    let wait_seconds = Some(assessment.observation.wait_seconds()).filter(|w| *w > 0);
    let resets_at = assessment.usage.as_ref().and_then(|u| u.resets_at);
    let reason = match status.limit_indicators.first() {
        Some(hit) => format!("rate limited: {hit}"),
        None => "rate limited".to_string(),
    };
    Some(WaitInfo {
        wait_seconds,
        resets_at,
        reason,
    })
}

/// Cancel `token` once `deadline` elapses. The returned handle should be
/// aborted when the work finishes first.
fn arm_deadline(token: CancellationToken, deadline: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        tracing::warn!(deadline_secs = deadline.as_secs(), "deadline reached, cancelling restarts");
        token.cancel();
    })
}

pub async fn cmd_restart(
    runner: &impl TmuxCommandRunner,
    inspector: &impl ProcessInspector,
    collect: &CollectOptions,
    usage: &UsageOptions,
    options: RestartOptions,
    deadline: Option<Duration>,
    verbose: bool,
) -> anyhow::Result<Envelope<PaneRestartReport>> {
    let cancel = CancellationToken::new();
    let timer = deadline.map(|d| arm_deadline(cancel.clone(), d));

    let assessed = assess(runner, inspector, collect, usage).await;
    let assessed = match assessed {
        Ok(a) => a,
        Err(e) => {
            if let Some(t) = timer {
                t.abort();
            }
            return Err(e);
        }
    };

    let orchestrator = RestartOrchestrator::new(runner, inspector, options).with_cancel(cancel);
    let mut reports = Vec::with_capacity(assessed.len());
    for outcome in &assessed {
        let pane_id = outcome.pane_id();
        let action = match outcome {
            PaneOutcome::Assessed(assessment) => {
                let wait = wait_info(assessment);
                orchestrator
                    .restart(pane_id, &assessment.observation.status, wait)
                    .await
            }
            PaneOutcome::Unreadable { error, .. } => {
                RestartAction::failed_unassessed(StructuredError::new(
                    ErrorCode::CaptureFailed,
                    RestartPhase::Assess,
                    pane_id,
                    format!("capture failed: {error}"),
                ))
            }
        };
        tracing::info!(pane_id = %pane_id, action = ?action.action, "pane done");
        reports.push(PaneRestartReport {
            pane: pane_entry(outcome, verbose),
            restart: action,
        });
    }
    if let Some(t) = timer {
        t.abort();
    }

    let summary = RestartSummary::from_actions(reports.iter().map(|r| &r.restart));
    tracing::info!(
        restarted = summary.restarted,
        skipped = summary.skipped,
        waiting = summary.waiting,
        failed = summary.failed,
        "restart finished"
    );
    Ok(Envelope::ok(collect.session.clone(), reports, Some(summary)))
}
