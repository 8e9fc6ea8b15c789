//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "agtmux-medic",
    version,
    about = "Health checks and safe restarts for coding agents in tmux panes"
)]
pub struct Cli {
    /// tmux server socket path
    #[arg(long, global = true, env = "AGTMUX_MEDIC_TMUX_SOCKET")]
    pub tmux_socket: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify each target pane and report health and score (JSON)
    Health(HealthOpts),
    /// Restart unhealthy agents that are safe to interrupt (JSON)
    Restart(RestartOpts),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetOpts {
    /// Session to operate on (default: every session)
    #[arg(long, env = "AGTMUX_MEDIC_SESSION")]
    pub session: Option<String>,

    /// Comma-separated pane ids or targets (default: all non-control panes)
    #[arg(long, value_delimiter = ',', env = "AGTMUX_MEDIC_PANES")]
    pub panes: Vec<String>,

    /// Lines of pane output to capture
    #[arg(long, default_value_t = 50, env = "AGTMUX_MEDIC_LINES")]
    pub lines: u32,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UsageOpts {
    /// JSON file with provider usage snapshots
    #[arg(long, env = "AGTMUX_MEDIC_USAGE_FILE")]
    pub usage_file: Option<PathBuf>,

    /// Skip provider usage lookup
    #[arg(long, env = "AGTMUX_MEDIC_NO_USAGE")]
    pub no_usage: bool,

    /// Usage lookup timeout in milliseconds
    #[arg(long, default_value_t = 2000, env = "AGTMUX_MEDIC_USAGE_TIMEOUT_MS")]
    pub usage_timeout_ms: u64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct HealthOpts {
    #[command(flatten)]
    pub target: TargetOpts,

    #[command(flatten)]
    pub usage: UsageOpts,

    /// Include the full health check and score breakdown
    #[arg(long, short = 'v', env = "AGTMUX_MEDIC_VERBOSE")]
    pub verbose: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RestartOpts {
    #[command(flatten)]
    pub target: TargetOpts,

    #[command(flatten)]
    pub usage: UsageOpts,

    /// Restart even when the agent is working or rate limited
    #[arg(long, env = "AGTMUX_MEDIC_FORCE")]
    pub force: bool,

    /// Decide only; never send keys or signals
    #[arg(long, env = "AGTMUX_MEDIC_DRY_RUN")]
    pub dry_run: bool,

    /// Prompt to type into the relaunched agent
    #[arg(long, env = "AGTMUX_MEDIC_PROMPT")]
    pub prompt: Option<String>,

    /// Fall back to SIGKILL when the graceful exit fails
    #[arg(long, env = "AGTMUX_MEDIC_HARD_KILL")]
    pub hard_kill: bool,

    /// Skip the graceful exit and SIGKILL the agent directly
    #[arg(long, env = "AGTMUX_MEDIC_HARD_KILL_ONLY")]
    pub hard_kill_only: bool,

    /// Seconds to wait after launch before the prompt
    #[arg(long, default_value_t = 6, env = "AGTMUX_MEDIC_WARMUP_SECS")]
    pub warmup_secs: u64,

    /// Abort remaining work after this many seconds
    #[arg(long, env = "AGTMUX_MEDIC_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Include the full health check and score breakdown
    #[arg(long, short = 'v', env = "AGTMUX_MEDIC_VERBOSE")]
    pub verbose: bool,
}
