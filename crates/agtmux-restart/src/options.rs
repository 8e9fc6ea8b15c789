use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether and how the forceful path may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardKillMode {
    /// Graceful exit only; its failure is terminal.
    #[default]
    Disabled,
    /// Graceful exit first, SIGKILL when it or the shell check fails.
    Fallback,
    /// Skip graceful exit and go straight to SIGKILL.
    Only,
}

/// Fixed protocol waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolTimings {
    /// After the exit sequence, before looking for a shell prompt.
    pub verify_delay: Duration,
    /// After SIGKILL, before looking for a shell prompt.
    pub post_kill_delay: Duration,
    /// After warm-up, before typing the follow-up prompt.
    pub prompt_delay: Duration,
    /// Lines captured when checking for a shell prompt.
    pub verify_lines: u32,
}

impl Default for ProtocolTimings {
    fn default() -> Self {
        Self {
            verify_delay: Duration::from_secs(3),
            post_kill_delay: Duration::from_secs(1),
            prompt_delay: Duration::from_millis(500),
            verify_lines: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOptions {
    /// Restart even when the agent is working or rate limited.
    pub force: bool,
    pub dry_run: bool,
    /// Typed into the new agent after warm-up.
    pub prompt: Option<String>,
    pub hard_kill: HardKillMode,
    pub warmup: Duration,
    /// Lines captured for the post-launch reclassification.
    pub capture_lines: u32,
    pub timings: ProtocolTimings,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            prompt: None,
            hard_kill: HardKillMode::Disabled,
            warmup: Duration::from_secs(6),
            capture_lines: 50,
            timings: ProtocolTimings::default(),
        }
    }
}
