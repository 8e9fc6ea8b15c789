//! agtmux-medic: health checks and safe restarts for AI coding agents
//! running in tmux panes. Output is a JSON envelope on stdout; logs go to
//! stderr.

use clap::Parser;

use agtmux_tmux::{SystemProcesses, TmuxExecutor};

mod cli;
mod cmd_health;
mod cmd_restart;
mod collect;
mod config;
mod envelope;
#[cfg(test)]
mod testing;
mod usage;

use config::{CollectOptions, UsageOptions};
use envelope::Envelope;

/// Exit status when a command completes but some pane failed.
const EXIT_PARTIAL: i32 = 1;
/// Exit status for input errors and other command-level failures.
const EXIT_ERROR: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("AGTMUX_MEDIC_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let runner = match &args.tmux_socket {
        Some(path) => TmuxExecutor::default().with_socket_path(path),
        None => TmuxExecutor::default(),
    };
    let inspector = SystemProcesses;

    let target = match &args.command {
        cli::Command::Health(opts) => &opts.target,
        cli::Command::Restart(opts) => &opts.target,
    };
    let collect = CollectOptions::resolve(target, std::env::var("TMUX_PANE").ok());

    let outcome = match &args.command {
        cli::Command::Health(opts) => {
            let usage = UsageOptions::resolve(&opts.usage);
            match cmd_health::cmd_health(&runner, &inspector, &collect, &usage, opts.verbose).await
            {
                Ok(env) => env.print().map(|()| env.success),
                Err(e) => Err(e),
            }
        }
        cli::Command::Restart(opts) => {
            let usage = UsageOptions::resolve(&opts.usage);
            let options = config::restart_options(opts);
            let result = cmd_restart::cmd_restart(
                &runner,
                &inspector,
                &collect,
                &usage,
                options,
                config::deadline(opts),
                opts.verbose,
            )
            .await;
            match result {
                Ok(env) => env.print().map(|()| env.success),
                Err(e) => Err(e),
            }
        }
    };

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(EXIT_PARTIAL),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            Envelope::failure(collect.session.clone(), &e).print()?;
            std::process::exit(EXIT_ERROR);
        }
    }
}
