//! Resolve parsed CLI flags into the typed option structs the commands use.

use std::path::PathBuf;
use std::time::Duration;

use agtmux_restart::{HardKillMode, RestartOptions};

use crate::cli::{RestartOpts, TargetOpts, UsageOpts};

/// Default lines of pane output captured per pane.
pub const DEFAULT_CAPTURE_LINES: u32 = 50;
/// Default bound on a single usage lookup.
pub const DEFAULT_USAGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which panes to look at and how much of each to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    pub session: Option<String>,
    /// Explicit pane ids or targets. Empty means every non-control pane.
    pub panes: Vec<String>,
    pub lines: u32,
    /// Pane hosting this process (`$TMUX_PANE`), never targeted implicitly.
    pub control_pane: Option<String>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            session: None,
            panes: Vec::new(),
            lines: DEFAULT_CAPTURE_LINES,
            control_pane: None,
        }
    }
}

impl CollectOptions {
    pub fn resolve(opts: &TargetOpts, control_pane: Option<String>) -> Self {
        Self {
            session: opts.session.clone().filter(|s| !s.is_empty()),
            panes: opts
                .panes
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            lines: opts.lines.max(1),
            control_pane: control_pane.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageSource {
    Disabled,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageOptions {
    pub source: UsageSource,
    pub timeout: Duration,
}

impl Default for UsageOptions {
    fn default() -> Self {
        Self {
            source: UsageSource::Disabled,
            timeout: DEFAULT_USAGE_TIMEOUT,
        }
    }
}

impl UsageOptions {
    /// No file or `--no-usage` both mean scoring runs without usage.
    pub fn resolve(opts: &UsageOpts) -> Self {
        let source = match (&opts.usage_file, opts.no_usage) {
            (Some(path), false) => UsageSource::File(path.clone()),
            _ => UsageSource::Disabled,
        };
        Self {
            source,
            timeout: Duration::from_millis(opts.usage_timeout_ms),
        }
    }
}

/// `--hard-kill-only` wins over `--hard-kill`.
pub fn hard_kill_mode(hard_kill: bool, hard_kill_only: bool) -> HardKillMode {
    match (hard_kill, hard_kill_only) {
        (_, true) => HardKillMode::Only,
        (true, false) => HardKillMode::Fallback,
        (false, false) => HardKillMode::Disabled,
    }
}

pub fn restart_options(opts: &RestartOpts) -> RestartOptions {
    RestartOptions {
        force: opts.force,
        dry_run: opts.dry_run,
        prompt: opts.prompt.clone().filter(|p| !p.trim().is_empty()),
        hard_kill: hard_kill_mode(opts.hard_kill, opts.hard_kill_only),
        warmup: Duration::from_secs(opts.warmup_secs),
        capture_lines: opts.target.lines.max(1),
        ..RestartOptions::default()
    }
}

pub fn deadline(opts: &RestartOpts) -> Option<Duration> {
    opts.deadline_secs.map(Duration::from_secs)
}
