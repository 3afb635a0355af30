mod cli;
mod config;
mod runner;
mod utils;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use env_logger::Builder;
use log::{LevelFilter, debug, error, info, warn};
use tokio::time::sleep;

use crate::cli::parse;
use crate::config::defs::{RunnerError, StopPolicy};
use crate::runner::cleanup::{CleanOptions, CleanStrategy, clean, list_runs};
use crate::runner::registry::RunnerRegistry;
use crate::runner::runner::RunnerState;
use crate::utils::command::CommandLine;
use crate::utils::env::{bootstrap, resolve_nextflow_bin};

// How often the drain loop polls while a run is live.
const DRAIN_INTERVAL_MS: u64 = 200;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n BEAR Runner\n-------------\n");

    let launch_dir = resolve_launch_dir(&args.dir)?;
    info!("The launch directory is {:?}\n", launch_dir);

    let module = args.module.clone();
    match module.as_str() {
        "run" => run_module(args, launch_dir).await,
        "clean" => clean_module(args, launch_dir).await,
        _ => Err(anyhow!("Invalid module: {} (expected 'run' or 'clean')", module)),
    }
}

fn resolve_launch_dir(dir: &Option<String>) -> Result<PathBuf> {
    let launch_dir = match dir {
        Some(d) => {
            let path = PathBuf::from(d);
            if path.is_absolute() {
                path
            } else {
                env::current_dir()?.join(path)
            }
        }
        None => env::current_dir()?,
    };
    if !launch_dir.is_dir() {
        return Err(anyhow!(
            "Launch directory does not exist: {}",
            launch_dir.display()
        ));
    }
    Ok(launch_dir)
}

/// Runs the trailing command under the given namespace, streaming its log
/// to stdout until it reaches a terminal state. Ctrl-C requests a stop and
/// keeps draining; the forced kill lands after the grace period.
async fn run_module(args: cli::Arguments, launch_dir: PathBuf) -> Result<()> {
    if args.cmd.is_empty() {
        return Err(anyhow!("No command given. Pass it after '--'."));
    }

    let mut builder = CommandLine::builder(args.cmd[0].as_str())
        .args(args.cmd[1..].iter().cloned())
        .cwd(&launch_dir);
    // Overlay the resolved orchestrator environment when we have one; a
    // non-Nextflow command still runs fine without it.
    match bootstrap(&launch_dir) {
        Ok(nf_env) => builder = builder.envs(&nf_env.vars),
        Err(RunnerError::NextflowNotFound) => {
            debug!("nextflow not found; running without an orchestrator environment")
        }
        Err(e) => return Err(e.into()),
    }
    let cmd = builder.build()?;

    let registry = RunnerRegistry::new();
    registry.start(&args.namespace, &cmd)?;
    let policy = StopPolicy::with_grace(Duration::from_secs(args.grace_secs));

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                warn!("Stop requested; interrupting the run.");
                registry.stop(&args.namespace, policy)?;
            }
            _ = sleep(Duration::from_millis(DRAIN_INTERVAL_MS)) => {}
        }

        let out = registry.drain(&args.namespace);
        for line in &out.lines {
            println!("{line}");
        }
        match out.state {
            RunnerState::Finished(0) => {
                info!("Run finished successfully.");
                return Ok(());
            }
            RunnerState::Finished(code) => {
                error!("Run finished with code {}.", code);
                std::process::exit(code.clamp(1, 255));
            }
            RunnerState::Failed(msg) => {
                error!("Run failed: {}", msg);
                std::process::exit(1);
            }
            _ => {}
        }
    }
}

/// Cleans one run, the latest run, or every known run in the launch
/// directory, reporting which strategy did the work.
async fn clean_module(args: cli::Arguments, launch_dir: PathBuf) -> Result<()> {
    let nextflow_bin = resolve_nextflow_bin()?;
    let mut opts = CleanOptions::new(nextflow_bin);
    opts.keep_logs = args.keep_logs;

    let targets: Vec<String> = match &args.run_name {
        Some(run_name) => vec![run_name.clone()],
        None => {
            let mut runs = list_runs(&launch_dir, &opts).await?;
            if runs.is_empty() {
                info!("No runs found by nextflow log.");
                return Ok(());
            }
            if args.all_runs {
                runs.reverse(); // newest first
                runs
            } else {
                runs.pop().into_iter().collect()
            }
        }
    };

    let mut cleaned = 0usize;
    let mut failures = Vec::new();
    for run_name in &targets {
        match clean(run_name, &launch_dir, &opts).await {
            Ok(report) => {
                cleaned += 1;
                match report.strategy {
                    CleanStrategy::Native => info!("Cleaned: {}", run_name),
                    CleanStrategy::Fallback => {
                        info!("Cleaned (fallback): {}", run_name);
                        for path in &report.removed {
                            info!("  removed {}", path.display());
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to clean {}: {}", run_name, e);
                failures.push(run_name.clone());
            }
        }
    }

    if failures.is_empty() {
        info!("Cleaned {} run(s).", cleaned);
        Ok(())
    } else if cleaned > 0 {
        Err(anyhow!(
            "Partial cleanup: {} ok, {} failed.",
            cleaned,
            failures.len()
        ))
    } else {
        Err(anyhow!("Failed to clean {} run(s).", failures.len()))
    }
}
