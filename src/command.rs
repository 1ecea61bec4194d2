use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod run;

pub use run::run;


#[derive(Debug, Parser)]
#[command(name = "clutch", version, about = "Run batches of test threads and report on them")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}


#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every thread of a plan concurrently and report the results
    Run {
        /// YAML thread plan
        plan: PathBuf,
        /// Overrides the plan's timeout, in seconds
        #[arg(long)]
        timeout: Option<f64>,
        /// Overrides the plan's worker count
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the performance parameters of a benchmark
    Params {
        /// YAML performance configuration
        config: PathBuf,
        /// ior or mdtest
        benchmark: String,
    },
}
