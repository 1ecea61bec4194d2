use anyhow::Context;
use clap::Parser;
use std::path::Path;
use tokio::runtime::Handle;

use crate::command::{Cli, Command};
use crate::config::{seconds, ThreadPlan};
use crate::performance::{Benchmark, PerformanceConfig, PerformanceTest};
use crate::process::{self, CmdResult};
use crate::runner::TaskRunner;
use crate::tasks::TaskOutcome;


pub async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();
    crate::log::init(args.verbose);

    match args.command {
        Command::Run { plan, timeout, workers } => {
            run_plan(&plan, timeout, workers).await?;
        }
        Command::Params { config, benchmark } => {
            params(&config, &benchmark)?;
        }
    }
    Ok(())
}


async fn run_plan(
    path: &Path,
    timeout: Option<f64>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let plan = ThreadPlan::load(path)
        .with_context(|| format!("Failed to load thread plan {}", path.display()))?;
    let timeout = match timeout {
        Some(value) => Some(seconds(value)?),
        None => plan.timeout()?,
    };

    let handle = Handle::current();
    let mut runner = TaskRunner::new(move |kwargs| process::run_kwargs(&handle, kwargs), timeout);
    if let Some(workers) = workers.or(plan.workers) {
        runner = runner.with_workers(workers);
    }
    for kwargs in plan.threads {
        runner.add(kwargs);
    }

    let outcomes = runner.run().await;
    if runner.check(&outcomes) {
        anyhow::bail!("{} of {} threads failed", failures(&outcomes), outcomes.len());
    }
    Ok(())
}


fn params(path: &Path, benchmark: &str) -> anyhow::Result<()> {
    let benchmark: Benchmark = benchmark.parse()?;
    let config = PerformanceConfig::load(path)
        .with_context(|| format!("Failed to load performance config {}", path.display()))?;

    PerformanceTest::new(config, ()).print_performance_params(benchmark)?;
    Ok(())
}


fn failures(outcomes: &[TaskOutcome<CmdResult>]) -> usize {
    outcomes.iter().filter(|outcome| !outcome.passed()).count()
}

