// Integration tests running real commands through the task runner.
//
// Run with: cargo test --test command_threads -- --nocapture

#![cfg(unix)]

use clutch::process;
use clutch::{Kwargs, MemorySink, TaskError, TaskRunner, ThreadPlan};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

fn command_runner(timeout: Option<Duration>, sink: Arc<MemorySink>) -> TaskRunner<clutch::CmdResult> {
    let handle = Handle::current();
    TaskRunner::new(move |kwargs| process::run_kwargs(&handle, kwargs), timeout).with_log(sink)
}

fn command(parts: &[&str]) -> Kwargs {
    Kwargs::new().with("args", parts.to_vec())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reports_command_results() {
    let sink = Arc::new(MemorySink::new());
    let mut runner = command_runner(None, sink.clone());
    runner.add(command(&["sh", "-c", "echo hello"]));
    runner.add(command(&["sh", "-c", "echo oops >&2; exit 2"]));

    let outcomes = runner.run().await;
    assert_eq!(outcomes.len(), 2);
    assert!(runner.check(&outcomes));

    let lines = sink.lines();
    assert!(lines.contains(&"    command:     sh -c echo hello".to_string()));
    assert!(lines.contains(&"    exit_status: 0".to_string()));
    assert!(lines.contains(&"      hello".to_string()));

    let failed_at = lines
        .iter()
        .position(|line| line == "Results from threads that failed:")
        .unwrap();
    assert!(lines[failed_at..]
        .iter()
        .any(|line| line.contains("failed with exit status: 2")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_commands_time_out_while_fast_ones_pass() {
    let sink = Arc::new(MemorySink::new());
    let mut runner = command_runner(Some(Duration::from_millis(500)), sink);
    runner.add(command(&["true"]));
    runner.add(command(&["sleep", "2"]));
    runner.add(command(&["echo", "fast"]));

    let outcomes = runner.run().await;
    assert_eq!(outcomes.len(), 3);

    let mut indices: Vec<usize> = outcomes.iter().map(|outcome| outcome.index).collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2]);

    for outcome in outcomes.iter() {
        if outcome.index == 1 {
            assert!(matches!(outcome.error(), Some(TaskError::TimedOut { .. })));
        } else {
            assert!(outcome.passed(), "{}", outcome.index);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_timeouts_come_from_kwargs() {
    let sink = Arc::new(MemorySink::new());
    let mut runner = command_runner(None, sink);
    runner.add(command(&["sleep", "5"]).with("timeout", 0.2));
    runner.add(command(&["sleep", "5"]).with("timeout", 0.2).with("ignore_status", true));

    let outcomes = runner.run().await;
    let strict = outcomes.iter().find(|outcome| outcome.index == 0).unwrap();
    assert!(!strict.passed());
    let lenient = outcomes.iter().find(|outcome| outcome.index == 1).unwrap();
    assert!(lenient.value().unwrap().interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plan_file_drives_a_batch() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "timeout: 10\nworkers: 2\nthreads:\n  - args: [echo, one]\n  - args: [echo, two]\n  - args: [echo, three]\n"
    )
    .unwrap();

    let plan = ThreadPlan::load(file.path()).unwrap();
    let sink = Arc::new(MemorySink::new());
    let mut runner = command_runner(plan.timeout().unwrap(), sink.clone())
        .with_workers(plan.workers.unwrap());
    for kwargs in plan.threads {
        runner.add(kwargs);
    }
    assert_eq!(runner.count(), 3);

    assert!(!runner.check_run().await);
    assert!(sink.contains("Submitting 3 threads ..."));
    assert!(sink.contains("      three"));
}
