//! OS process inspection and forceful termination.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TmuxError;

// ─── Process-table types ─────────────────────────────────────────

/// Coarse run state from the first character of `ps` STAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Sleeping,
    DiskWait,
    Stopped,
    Zombie,
    Dead,
    Idle,
    Unknown,
}

impl RunState {
    pub fn from_stat(stat: &str) -> Self {
        match stat.chars().next() {
            Some('R') => Self::Running,
            Some('S') => Self::Sleeping,
            Some('D') => Self::DiskWait,
            Some('T') | Some('t') => Self::Stopped,
            Some('Z') => Self::Zombie,
            Some('X') => Self::Dead,
            Some('I') => Self::Idle,
            _ => Self::Unknown,
        }
    }

    /// Zombie and dead processes no longer execute anything.
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::Zombie | Self::Dead)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::DiskWait => "disk_wait",
            Self::Stopped => "stopped",
            Self::Zombie => "zombie",
            Self::Dead => "dead",
            Self::Idle => "idle",
            Self::Unknown => "unknown",
        }
    }
}

/// One entry from `ps -eo pid=,ppid=,stat=,rss=,args=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub state: RunState,
    /// Resident set size in KiB.
    pub rss_kb: u64,
    pub args: String,
}

/// Snapshot of all running processes on the host, keyed by PID.
pub type ProcessMap = HashMap<u32, ProcessInfo>;

/// Immediate child of `ppid`. When a shell has several children the oldest
/// (lowest PID) is the one the shell launched in the foreground.
pub fn immediate_child(map: &ProcessMap, ppid: u32) -> Option<&ProcessInfo> {
    map.values()
        .filter(|p| p.ppid == ppid)
        .min_by_key(|p| p.pid)
}

// ─── Inspector seam ──────────────────────────────────────────────

/// OS process operations. Enables mock injection for testing.
pub trait ProcessInspector: Send + Sync {
    /// Full process table.
    fn snapshot(&self) -> Result<ProcessMap, TmuxError>;

    /// PIDs whose parent is `ppid`, found by searching rather than by
    /// walking a snapshot.
    fn children_by_parent(&self, ppid: u32) -> Result<Vec<u32>, TmuxError>;

    /// Send an unblockable termination signal.
    fn force_kill(&self, pid: u32) -> Result<(), TmuxError>;
}

impl<T: ProcessInspector + ?Sized> ProcessInspector for &T {
    fn snapshot(&self) -> Result<ProcessMap, TmuxError> {
        (**self).snapshot()
    }

    fn children_by_parent(&self, ppid: u32) -> Result<Vec<u32>, TmuxError> {
        (**self).children_by_parent(ppid)
    }

    fn force_kill(&self, pid: u32) -> Result<(), TmuxError> {
        (**self).force_kill(pid)
    }
}

/// Resolve the immediate child of `shell_pid`: process-tree inspection
/// first, parent-PID search when the table is unavailable or does not
/// contain the shell.
pub fn resolve_child_pid(
    inspector: &impl ProcessInspector,
    shell_pid: u32,
) -> Result<Option<u32>, TmuxError> {
    if let Ok(map) = inspector.snapshot()
        && map.contains_key(&shell_pid)
    {
        return Ok(immediate_child(&map, shell_pid).map(|p| p.pid));
    }
    Ok(inspector
        .children_by_parent(shell_pid)?
        .into_iter()
        .min())
}

/// Host implementation backed by `ps`, `pgrep` and `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessInspector for SystemProcesses {
    fn snapshot(&self) -> Result<ProcessMap, TmuxError> {
        let output = std::process::Command::new("ps")
            .args(["-eo", "pid=,ppid=,stat=,rss=,args="])
            .output()?;
        if !output.status.success() {
            return Err(TmuxError::ProcessFailed(format!(
                "ps exit code {}",
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn children_by_parent(&self, ppid: u32) -> Result<Vec<u32>, TmuxError> {
        let output = std::process::Command::new("pgrep")
            .args(["-P", &ppid.to_string()])
            .output()?;
        // pgrep exits 1 when nothing matched.
        match output.status.code() {
            Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter_map(|l| l.trim().parse().ok())
                .collect()),
            code => Err(TmuxError::ProcessFailed(format!(
                "pgrep exit code {}",
                code.unwrap_or(-1)
            ))),
        }
    }

    #[cfg(unix)]
    fn force_kill(&self, pid: u32) -> Result<(), TmuxError> {
        let raw = libc::pid_t::try_from(pid).map_err(|_| TmuxError::SignalFailed {
            pid,
            detail: "pid out of range".to_string(),
        })?;
        if raw <= 1 {
            return Err(TmuxError::SignalFailed {
                pid,
                detail: "refusing to signal init or process group".to_string(),
            });
        }
        // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
        let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        // Exited between lookup and signal: the goal is already reached.
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(TmuxError::SignalFailed {
            pid,
            detail: err.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn force_kill(&self, pid: u32) -> Result<(), TmuxError> {
        Err(TmuxError::SignalFailed {
            pid,
            detail: "signals are unsupported on this platform".to_string(),
        })
    }
}

fn parse_ps_output(output: &str) -> ProcessMap {
    output
        .lines()
        .filter_map(parse_ps_line)
        .map(|info| (info.pid, info))
        .collect()
}

fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let rest = line.trim();
    if rest.is_empty() {
        return None;
    }
    let (pid, rest) = split_token(rest);
    let (ppid, rest) = split_token(rest);
    let (stat, rest) = split_token(rest);
    let (rss, args) = split_token(rest);
    Some(ProcessInfo {
        pid: pid.parse().ok()?,
        ppid: ppid.parse().ok()?,
        state: RunState::from_stat(stat),
        rss_kb: rss.parse().unwrap_or(0),
        args: args.to_string(),
    })
}

/// Split off the first whitespace-delimited token.
fn split_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| c.is_ascii_whitespace()).unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}
