//! Scripted tmux and process-table fakes shared by the command tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use agtmux_tmux::{ProcessInfo, ProcessInspector, ProcessMap, RunState, TmuxCommandRunner, TmuxError};

/// One `list-panes` row in `LIST_PANES_FORMAT` order.
pub fn pane_line(session: &str, window: u32, index: u32, id: &str, cmd: &str, pid: u32) -> String {
    format!("{session}\t{window}\t{index}\t{id}\t{cmd}\thost\t0\t0\t{pid}")
}

fn target_arg<'a>(args: &[&'a str]) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == "-t")
        .and_then(|i| args.get(i + 1).copied())
}

#[derive(Default)]
pub struct FakeTmux {
    panes: Vec<String>,
    /// Per-pane capture script; the last entry repeats.
    captures: Mutex<HashMap<String, VecDeque<String>>>,
    /// Panes that are listed but cannot be captured.
    refused: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTmux {
    pub fn with_panes(panes: &[String]) -> Self {
        Self {
            panes: panes.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_capture(self, pane: &str, text: &str) -> Self {
        self.captures
            .lock()
            .expect("lock")
            .entry(pane.to_string())
            .or_default()
            .push_back(text.to_string());
        self
    }

    pub fn with_refused_capture(mut self, pane: &str) -> Self {
        self.refused.insert(pane.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn pane_field(&self, pane: &str, field: usize) -> Option<String> {
        self.panes.iter().find_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            let target = format!("{}:{}.{}", parts[0], parts[1], parts[2]);
            (parts[3] == pane || target == pane).then(|| parts[field].to_string())
        })
    }

    fn next_capture(&self, pane: &str) -> String {
        let mut captures = self.captures.lock().expect("lock");
        let Some(queue) = captures.get_mut(pane) else {
            return String::new();
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

impl TmuxCommandRunner for FakeTmux {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        self.calls.lock().expect("lock").push(args.join(" "));
        match args.first().copied() {
            Some("list-panes") if args.contains(&"-s") => {
                let session = target_arg(args).unwrap_or_default();
                let rows: Vec<&String> = self
                    .panes
                    .iter()
                    .filter(|l| l.split('\t').next() == Some(session))
                    .collect();
                if rows.is_empty() {
                    return Err(TmuxError::SessionNotFound(session.to_string()));
                }
                Ok(rows.iter().map(|l| format!("{l}\n")).collect())
            }
            Some("list-panes") => Ok(self.panes.iter().map(|l| format!("{l}\n")).collect()),
            Some("capture-pane") => {
                let pane = target_arg(args).unwrap_or_default();
                if self.refused.contains(pane) {
                    return Err(TmuxError::PaneNotFound(pane.to_string()));
                }
                Ok(self.next_capture(pane))
            }
            Some("display-message") => {
                let pane = target_arg(args).unwrap_or_default();
                self.pane_field(pane, 8)
                    .map(|pid| format!("{pid}\n"))
                    .ok_or_else(|| TmuxError::PaneNotFound(pane.to_string()))
            }
            _ => Ok(String::new()),
        }
    }
}

/// Process table that loses a child once it is killed.
#[derive(Default)]
pub struct FakeProcesses {
    map: Mutex<ProcessMap>,
    fail: bool,
    killed: Mutex<Vec<u32>>,
}

impl FakeProcesses {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn insert(&self, pid: u32, ppid: u32, args: &str) {
        self.map.lock().expect("lock").insert(
            pid,
            ProcessInfo {
                pid,
                ppid,
                state: RunState::Sleeping,
                rss_kb: 1024,
                args: args.to_string(),
            },
        );
    }

    pub fn with_shell(self, shell: u32) -> Self {
        self.insert(shell, 1, "-zsh");
        self
    }

    pub fn with_child(self, shell: u32, child: u32, args: &str) -> Self {
        self.insert(shell, 1, "-zsh");
        self.insert(child, shell, args);
        self
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().expect("lock").clone()
    }
}

impl ProcessInspector for FakeProcesses {
    fn snapshot(&self) -> Result<ProcessMap, TmuxError> {
        if self.fail {
            return Err(TmuxError::ProcessFailed("ps unavailable".into()));
        }
        Ok(self.map.lock().expect("lock").clone())
    }

    fn children_by_parent(&self, ppid: u32) -> Result<Vec<u32>, TmuxError> {
        if self.fail {
            return Err(TmuxError::ProcessFailed("pgrep unavailable".into()));
        }
        Ok(self
            .map
            .lock()
            .expect("lock")
            .values()
            .filter(|p| p.ppid == ppid)
            .map(|p| p.pid)
            .collect())
    }

    fn force_kill(&self, pid: u32) -> Result<(), TmuxError> {
        self.killed.lock().expect("lock").push(pid);
        self.map.lock().expect("lock").remove(&pid);
        Ok(())
    }
}
