use clap::Parser;

use crate::config::defs::DEFAULT_STOP_GRACE_SECS;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bear-runner", version, about = "Async runner and cleanup core for Nextflow/Bactopia front-ends")]
pub struct Arguments {
    #[arg(short, long, help = "Module to run: 'run' or 'clean'")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'd', long = "dir", help = "Launch directory for the run or cleanup. Defaults to the current working directory.")]
    pub dir: Option<String>,

    #[arg(short = 'n', long = "namespace", default_value = "main", help = "Job slot the run is keyed under")]
    pub namespace: String,

    #[arg(long = "grace-secs", default_value_t = DEFAULT_STOP_GRACE_SECS, help = "Seconds between Ctrl-C and the forced kill")]
    pub grace_secs: u64,

    #[arg(long = "run-name", help = "Nextflow run name to clean; defaults to the most recent run")]
    pub run_name: Option<String>,

    #[arg(long = "all-runs", default_value_t = false, help = "Clean every run nextflow log knows about")]
    pub all_runs: bool,

    #[arg(short = 'k', long = "keep-logs", default_value_t = false, help = "Keep task log files when cleaning")]
    pub keep_logs: bool,

    #[arg(last = true, help = "Command to execute, e.g. -- nextflow run bactopia/bactopia ...")]
    pub cmd: Vec<String>,
}

pub fn parse() -> Arguments {
    Arguments::parse()
}
