//! Target selection and per-pane signal collection.
//!
//! Each pane is captured once, its agent type detected, its output
//! classified, and the activity, process and error checks fused into a
//! health verdict.

use std::collections::HashSet;

use agtmux_health::{
    ActivityTracker, AgentType, HealthCheck, PaneMeta, ProcessObservation, WorkStatus,
    check_errors, check_process, check_stall, classify, detect_agent_type, evaluate_health,
    idle_prompt, strip_padding,
};
use agtmux_tmux::{
    ProcessInspector, ProcessMap, TmuxCommandRunner, TmuxError, TmuxPaneInfo, capture_pane,
    immediate_child, list_panes, list_session_panes,
};
use chrono::{DateTime, Utc};

use crate::config::CollectOptions;

/// Capture lines handed to agent detection.
const DETECT_CAPTURE_LINES: usize = 20;

// ─── Target selection ───────────────────────────────────────────

fn is_control_pane(pane: &TmuxPaneInfo, control_pane: Option<&str>) -> bool {
    pane.pane_index == 0 || control_pane.is_some_and(|id| pane.pane_id == id)
}

/// Resolve the panes to operate on. Explicit panes must all exist;
/// otherwise every non-control pane is selected. Errors before any pane
/// is touched.
pub fn select_targets(
    runner: &impl TmuxCommandRunner,
    opts: &CollectOptions,
) -> Result<Vec<TmuxPaneInfo>, TmuxError> {
    let panes = match &opts.session {
        Some(session) => list_session_panes(runner, session)?,
        None => list_panes(runner)?,
    };

    if opts.panes.is_empty() {
        return Ok(panes
            .into_iter()
            .filter(|p| !is_control_pane(p, opts.control_pane.as_deref()))
            .collect());
    }

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(opts.panes.len());
    for wanted in &opts.panes {
        let pane = panes
            .iter()
            .find(|p| p.pane_id == *wanted || p.target() == *wanted)
            .ok_or_else(|| TmuxError::PaneNotFound(wanted.clone()))?;
        if seen.insert(pane.pane_id.clone()) {
            selected.push(pane.clone());
        }
    }
    Ok(selected)
}

// ─── Collection ─────────────────────────────────────────────────

/// Everything learned about one pane in one pass.
#[derive(Debug, Clone)]
pub struct PaneObservation {
    pub pane: TmuxPaneInfo,
    pub agent_type: AgentType,
    pub status: WorkStatus,
    pub health: HealthCheck,
}

impl PaneObservation {
    /// Parsed wait from rate-limit text, zero when none.
    pub fn wait_seconds(&self) -> u64 {
        self.health
            .error_check
            .as_ref()
            .map_or(0, |e| e.wait_seconds)
    }
}

/// Collects observations with one process-table snapshot per invocation.
pub struct Collector<'a, R> {
    runner: &'a R,
    tracker: ActivityTracker,
    processes: Option<ProcessMap>,
    lines: u32,
}

impl<'a, R: TmuxCommandRunner> Collector<'a, R> {
    pub fn new(runner: &'a R, inspector: &impl ProcessInspector, lines: u32) -> Self {
        let processes = match inspector.snapshot() {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(error = %e, "process table unavailable, skipping process checks");
                None
            }
        };
        Self {
            runner,
            tracker: ActivityTracker::new(),
            processes,
            lines,
        }
    }

    pub fn observe(
        &self,
        pane: &TmuxPaneInfo,
        now: DateTime<Utc>,
    ) -> Result<PaneObservation, TmuxError> {
        let text = capture_pane(self.runner, &pane.pane_id, self.lines)?;
        let (process, child_args) = self.process_observation(pane);

        let meta = PaneMeta {
            pane_title: pane.pane_title.clone(),
            current_cmd: pane.current_cmd.clone(),
            process_hint: child_args,
            capture_lines: strip_padding(&text)
                .lines()
                .rev()
                .take(DETECT_CAPTURE_LINES)
                .map(str::to_string)
                .collect(),
        };
        let agent_type = detect_agent_type(&meta);
        let status = classify(agent_type, &text);

        let delta = self.tracker.observe(&pane.pane_id, &text, now);
        let at_prompt = idle_prompt(agent_type, &text).is_some();
        let stall = check_stall(&delta, at_prompt, now);
        let process = process.map(|obs| check_process(agent_type, &obs, &text));
        let errors = check_errors(&text);
        let health = evaluate_health(
            &pane.pane_id,
            agent_type,
            process,
            Some(stall),
            Some(errors),
            now,
        );

        tracing::debug!(
            pane_id = %pane.pane_id,
            agent = %agent_type,
            recommendation = ?status.recommendation,
            health = ?health.health_state,
            "pane observed"
        );
        Ok(PaneObservation {
            pane: pane.clone(),
            agent_type,
            status,
            health,
        })
    }

    /// Process facts for the pane's shell child, plus the child's command
    /// line for detection. `None` when the table or the shell is unknown.
    fn process_observation(&self, pane: &TmuxPaneInfo) -> (Option<ProcessObservation>, Option<String>) {
        let (Some(map), Some(shell_pid)) = (self.processes.as_ref(), pane.pane_pid) else {
            return (None, None);
        };
        if pane.dead || !map.contains_key(&shell_pid) {
            return (Some(ProcessObservation::default()), None);
        }
        match immediate_child(map, shell_pid) {
            Some(child) => (
                Some(ProcessObservation {
                    child_pid: Some(child.pid),
                    child_state: Some(child.state.as_str().to_string()),
                    child_alive: child.state.is_alive(),
                    memory_kb: Some(child.rss_kb),
                }),
                Some(child.args.clone()),
            ),
            None => (Some(ProcessObservation::default()), None),
        }
    }
}
