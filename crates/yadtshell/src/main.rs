//! CLI entry point for the fleet orchestrator: wires the status pipeline,
//! planner and executor together behind the eight verbs spec.md §6 names.

mod config;
mod exit;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use yadt_exec::{outcome_to_result, Executor, ExecutorConfig};
use yadt_plan::{Command, PlanOptions, Planner};
use yadt_status::{load_registry, HttpBroadcastClient, PipelineConfig, StatusPipeline};

use config::TargetConfig;

/// Top-level CLI arguments: one verb plus the flags that apply to any of
/// them.
#[derive(Parser)]
#[command(name = "yadtshell")]
#[command(about = "Fleet SSH deployment orchestrator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    verb: Verb,

    /// Message attached to lock/ignore (`-m`); required for those verbs.
    #[arg(short = 'm', long)]
    message: Option<String>,

    /// Verbose logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Executor parallelism (`-p N`).
    #[arg(short = 'p', long = "parallel", default_value_t = 10)]
    parallelism: usize,

    /// Skip the status re-probe after executing actions.
    #[arg(long)]
    no_final_status: bool,

    /// Downgrade an unreachable host's probe failure to an UnreachableHost
    /// placeholder instead of failing the run.
    #[arg(long)]
    ignore_unreachable_hosts: bool,

    /// Force the operation past normally-blocking policy checks.
    #[arg(long)]
    force: bool,

    /// Path to the fleet's target config (default `yadtshell.yaml`).
    #[arg(long, default_value = "yadtshell.yaml")]
    config: PathBuf,
}

/// The eight verbs spec.md §6 names.
#[derive(Subcommand)]
enum Verb {
    /// Probe every configured host and persist the registry snapshot.
    Status,
    /// Stop, update, reboot-wait, start, per selected host.
    Update {
        /// Glob selector, e.g. `host://*`.
        selector: String,
    },
    /// Start selected services, dependencies first.
    Start {
        /// Glob selector, e.g. `service://web01/*`.
        selector: String,
    },
    /// Stop selected services, dependents first.
    Stop {
        /// Glob selector.
        selector: String,
    },
    /// Advisory-lock selected hosts.
    Lock {
        /// Glob selector, e.g. `host://*`.
        selector: String,
    },
    /// Reverse a lock.
    Unlock {
        /// Glob selector.
        selector: String,
    },
    /// Administratively ignore selected hosts or services.
    Ignore {
        /// Glob selector.
        selector: String,
    },
    /// Reverse an ignore.
    Unignore {
        /// Glob selector.
        selector: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    smol::block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let target = match TargetConfig::load(&cli.config) {
        Ok(t) => t,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(exit::EXIT_USAGE as u8);
        }
    };

    let (command, selector) = match &cli.verb {
        Verb::Status => (Command::Status, "host://*".to_string()),
        Verb::Update { selector } => (Command::Update, selector.clone()),
        Verb::Start { selector } => (Command::Start, selector.clone()),
        Verb::Stop { selector } => (Command::Stop, selector.clone()),
        Verb::Lock { selector } => (Command::Lock, selector.clone()),
        Verb::Unlock { selector } => (Command::Unlock, selector.clone()),
        Verb::Ignore { selector } => (Command::Ignore, selector.clone()),
        Verb::Unignore { selector } => (Command::Unignore, selector.clone()),
    };

    if command == Command::Status {
        let registry = match run_status(&cli, &target).await {
            Ok(r) => r,
            Err(code) => return ExitCode::from(code as u8),
        };
        info!("status complete, {} components", registry.len());
        return ExitCode::from(exit::EXIT_SUCCESS as u8);
    }

    // The registry is built by the status pipeline and is read-only for
    // the rest of a run: every other verb loads the snapshot a prior
    // `status` left behind instead of re-probing the fleet.
    let registry = match load_registry(&target.out_dir) {
        Ok(r) => r,
        Err(yadt_status::Error::NoSnapshot { .. }) => {
            error!("no status snapshot found; run `status` first");
            return ExitCode::from(exit::EXIT_USAGE as u8);
        }
        Err(e) => {
            error!("{e}");
            return ExitCode::from(exit::EXIT_STATUS_FAILED as u8);
        }
    };

    let options = PlanOptions { message: cli.message.clone(), force: cli.force };
    let plan = match Planner::new().plan(command, &selector, &registry, &options) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(exit::exit_for_plan_error(&e) as u8);
        }
    };

    let executor = Executor::new(ExecutorConfig {
        concurrency: cli.parallelism,
        ssh_poll_delay: Duration::from_secs(5),
    });
    let outcome = executor.run(&plan, &registry).await;
    for failed in &outcome.failed {
        error!(verb = %failed.key.0, uri = %failed.key.1, exit_code = ?failed.exit_code, reason = %failed.reason, "action did not succeed");
    }
    if let Err(e) = outcome_to_result(&outcome) {
        error!("{e}");
        return ExitCode::from(exit::exit_for_exec_error(&e) as u8);
    }

    if !cli.no_final_status {
        if let Err(code) = run_status(&cli, &target).await {
            return ExitCode::from(code as u8);
        }
    }

    ExitCode::from(exit::EXIT_SUCCESS as u8)
}

async fn run_status(cli: &Cli, target: &TargetConfig) -> Result<yadt_registry::Registry, i32> {
    let pipeline_config = PipelineConfig {
        ignore_unreachable_hosts: cli.ignore_unreachable_hosts,
        out_dir: target.out_dir.clone(),
        log_file: target.log_file.clone(),
    };
    let mut pipeline = StatusPipeline::new(pipeline_config);
    if let Some(base) = &target.broadcast_base {
        pipeline = pipeline.with_broadcast(Arc::new(HttpBroadcastClient::new(base.clone())));
    }

    pipeline.run(&target.hosts).await.map_err(|e| {
        error!("{e}");
        exit::EXIT_STATUS_FAILED
    })
}
