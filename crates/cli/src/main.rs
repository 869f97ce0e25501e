// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! foreman: tick-driven orchestration scheduler for agent pools.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fm_client::HttpServerClient;
use fm_core::SystemClock;
use fm_engine::{
    run_tick, verify_install_path, ConfigDir, Scheduler, SchedulerConfig, SchedulerDeps,
    ShellTools, TickOutcome,
};
use fm_storage::RuntimeDir;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "foreman", version, about = "Orchestration scheduler for agent pools")]
struct Cli {
    /// Root of the project the agents work on.
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Base URL of the task metadata server.
    #[arg(long, global = true, default_value = "http://127.0.0.1:7777")]
    server_url: String,

    /// Shell command used to launch a worker.
    #[arg(long, global = true, default_value = "foreman-worker")]
    worker_command: String,

    /// Command the run_tests step executes in a task worktree.
    #[arg(long, global = true)]
    test_command: Option<String>,

    /// Claim lease duration in seconds.
    #[arg(long, global = true, default_value_t = 900)]
    lease_duration: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one tick and exit.
    Tick,
    /// Run ticks forever on an interval.
    Run {
        /// Seconds between ticks.
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let project_root = match cli.project_root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine working directory")?,
    };
    let config_root = project_root.join(".foreman");
    let runtime = RuntimeDir::new(config_root.join("runtime"));

    // A scheduler binary living inside an agent worktree means a worker
    // could update the scheduler underneath itself; refuse to run.
    verify_install_path(&runtime).context("install-path integrity check failed")?;

    let mut config = SchedulerConfig::new(&project_root);
    config.worker_command = cli.worker_command;
    config.test_command = cli.test_command;
    config.lease_duration_seconds = cli.lease_duration;

    let deps = SchedulerDeps {
        clock: SystemClock,
        client: HttpServerClient::new(&cli.server_url),
        tools: ShellTools,
    };
    let mut scheduler = Scheduler::new(deps, ConfigDir::new(&config_root), runtime, config)
        .context("scheduler startup failed")?;

    match cli.command {
        Command::Tick => match run_tick(&mut scheduler)? {
            TickOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
            TickOutcome::LockHeld => {
                // A second invocation exits quietly.
                Ok(ExitCode::SUCCESS)
            }
        },
        Command::Run { interval } => loop {
            match run_tick(&mut scheduler) {
                Ok(_) => {}
                Err(e) => tracing::error!("tick failed: {e}"),
            }
            std::thread::sleep(Duration::from_secs(interval));
        },
    }
}
