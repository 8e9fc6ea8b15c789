//! `agtmux-medic health`: classify, check and score every target pane.

use agtmux_health::{HealthScoreResult, UsageSnapshot, score};
use agtmux_tmux::{ProcessInspector, TmuxCommandRunner, TmuxPaneInfo};
use chrono::Utc;

use crate::collect::{Collector, PaneObservation, select_targets};
use crate::config::{CollectOptions, UsageOptions};
use crate::envelope::{Envelope, PaneEntry, PaneFailure, PaneReport};
use crate::usage::{Usage, lookup_usage};

/// One pane after collection, usage lookup and scoring.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub observation: PaneObservation,
    pub usage: Option<UsageSnapshot>,
    pub score: HealthScoreResult,
}

/// What happened to one selected pane.
#[derive(Debug, Clone)]
pub enum PaneOutcome {
    Assessed(Box<Assessment>),
    /// The pane was listed but its output could not be read.
    Unreadable { pane: TmuxPaneInfo, error: String },
}

impl PaneOutcome {
    pub fn pane_id(&self) -> &str {
        match self {
            Self::Assessed(a) => &a.observation.pane.pane_id,
            Self::Unreadable { pane, .. } => &pane.pane_id,
        }
    }
}

/// Select targets, then observe and score each one in order. Target
/// errors abort before any pane is read; a pane that cannot be captured
/// stays in the result as [`PaneOutcome::Unreadable`].
pub async fn assess(
    runner: &impl TmuxCommandRunner,
    inspector: &impl ProcessInspector,
    collect: &CollectOptions,
    usage: &UsageOptions,
) -> anyhow::Result<Vec<PaneOutcome>> {
    let targets = select_targets(runner, collect)?;
    tracing::info!(panes = targets.len(), "targets selected");

    let collector = Collector::new(runner, inspector, collect.lines);
    let provider = Usage::from_options(usage);
    let now = Utc::now();

    let mut outcomes = Vec::with_capacity(targets.len());
    for pane in targets {
        let observation = match collector.observe(&pane, now) {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!(pane_id = %pane.pane_id, error = %e, "capture failed");
                outcomes.push(PaneOutcome::Unreadable {
                    pane,
                    error: e.to_string(),
                });
                continue;
            }
        };
        let snapshot = lookup_usage(&provider, observation.agent_type, usage.timeout).await;
        let score = score(&observation.status, snapshot.as_ref());
        outcomes.push(PaneOutcome::Assessed(Box::new(Assessment {
            observation,
            usage: snapshot,
            score,
        })));
    }
    Ok(outcomes)
}

/// Report entry for one outcome.
pub fn pane_entry(outcome: &PaneOutcome, verbose: bool) -> PaneEntry {
    match outcome {
        PaneOutcome::Assessed(a) => PaneEntry::Report(Box::new(PaneReport::new(
            &a.observation,
            a.score.clone(),
            a.usage.clone(),
            verbose,
        ))),
        PaneOutcome::Unreadable { pane, error } => {
            PaneEntry::Failed(PaneFailure::capture_failed(pane, error))
        }
    }
}

pub async fn cmd_health(
    runner: &impl TmuxCommandRunner,
    inspector: &impl ProcessInspector,
    collect: &CollectOptions,
    usage: &UsageOptions,
    verbose: bool,
) -> anyhow::Result<Envelope<PaneEntry>> {
    let panes: Vec<PaneEntry> = assess(runner, inspector, collect, usage)
        .await?
        .iter()
        .map(|o| pane_entry(o, verbose))
        .collect();
    let any_failed = panes.iter().any(PaneEntry::is_failed);
    Ok(Envelope::ok(collect.session.clone(), panes, None).partial(any_failed))
}
