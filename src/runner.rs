use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

use crate::kwargs::Kwargs;
use crate::log::{LogSink, TracingSink};
use crate::tasks::{TaskError, TaskOutcome, TaskSpec};


/// A blocking method run once per set of keyword arguments.
pub type TaskMethod<T> = dyn Fn(&Kwargs) -> anyhow::Result<T> + Send + Sync;


/// Runs a method concurrently, once per added set of keyword arguments.
///
/// Every invocation gets its own outcome. A failing or panicking invocation
/// never stops the others, and an invocation that outlives the timeout keeps
/// running in the background while the runner records it as timed out.
pub struct TaskRunner<T> {
    method: Arc<TaskMethod<T>>,
    timeout: Option<Duration>,
    workers: usize,
    log: Arc<dyn LogSink>,
    pending: Vec<TaskSpec>,
}

impl<T: Send + 'static> TaskRunner<T> {
    pub fn new<F>(method: F, timeout: Option<Duration>) -> Self
    where
        F: Fn(&Kwargs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            method: Arc::new(method),
            timeout,
            workers: default_workers(),
            log: Arc::new(TracingSink),
            pending: vec![],
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue one invocation of the method with the given arguments.
    pub fn add(&mut self, kwargs: Kwargs) {
        self.pending.push(TaskSpec {
            index: self.pending.len(),
            kwargs,
        });
    }

    /// Number of queued invocations.
    pub fn count(&self) -> usize {
        self.pending.len()
    }

    /// Run every queued invocation and collect one outcome per invocation.
    ///
    /// Outcomes are in completion order. Invocations still running when the
    /// timeout expires are appended last as [`TaskError::TimedOut`]. The queue
    /// is drained, so a second call without new `add`s returns nothing.
    pub async fn run(&mut self) -> Vec<TaskOutcome<T>> {
        let specs = std::mem::take(&mut self.pending);
        let total = specs.len();
        self.log.write_line(&format!("Submitting {} threads ...", total));

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let permits = Arc::new(Semaphore::new(self.workers));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        for spec in specs.iter() {
            let method = self.method.clone();
            let permits = permits.clone();
            let sender = sender.clone();
            let index = spec.index;
            let kwargs = spec.kwargs.clone();
            tokio::spawn(async move {
                // Held until the invocation returns, even once nobody is waiting.
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                tracing::debug!("Starting thread {}", index);
                let result = tokio::task::spawn_blocking(move || invoke(&*method, &kwargs))
                    .await
                    .unwrap_or_else(|err| Err(join_failure(err)));
                if sender.send((index, result)).is_err() {
                    tracing::debug!("Thread {} finished after the runner stopped waiting", index);
                }
            });
        }
        drop(sender);

        let mut slots: Vec<Option<TaskSpec>> = specs.into_iter().map(Some).collect();
        let mut outcomes = Vec::with_capacity(total);
        let mut timed_out = false;
        while outcomes.len() < total {
            let received = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, receiver.recv()).await {
                        Ok(received) => received,
                        Err(_) => {
                            timed_out = true;
                            break;
                        }
                    }
                }
                None => receiver.recv().await,
            };

            let Some((index, result)) = received else {
                break;
            };
            match slots.get_mut(index).and_then(Option::take) {
                Some(spec) => outcomes.push(TaskOutcome::new(spec, result)),
                None => tracing::warn!("Ignoring duplicate result for thread {}", index),
            }
        }

        let unfinished = total - outcomes.len();
        if unfinished > 0 {
            tracing::warn!("{} of {} threads did not finish", unfinished, total);
        }
        for spec in slots.into_iter().flatten() {
            let err = match (timed_out, self.timeout) {
                (true, Some(timeout)) => TaskError::TimedOut {
                    unfinished,
                    total,
                    timeout,
                },
                _ => TaskError::Lost,
            };
            outcomes.push(TaskOutcome::new(spec, Err(err)));
        }

        outcomes
    }
}

impl<T: fmt::Display> TaskRunner<T> {
    /// Write a report of the outcomes to the log sink.
    ///
    /// Returns `true` when at least one outcome failed, `false` when every
    /// thread passed.
    pub fn check(&self, outcomes: &[TaskOutcome<T>]) -> bool {
        let (passed, failed): (Vec<_>, Vec<_>) =
            outcomes.iter().partition(|outcome| outcome.passed());

        self.log.write_line("Results from threads that passed:");
        for outcome in passed {
            self.report(outcome);
        }

        if !failed.is_empty() {
            self.log.write_line("Results from threads that failed:");
            for outcome in failed.iter() {
                self.report(outcome);
            }
        }

        !failed.is_empty()
    }

    fn report(&self, outcome: &TaskOutcome<T>) {
        for line in outcome.to_string().lines() {
            self.log.write_line(line);
        }
    }
}

impl<T: fmt::Display + Send + 'static> TaskRunner<T> {
    /// [`TaskRunner::run`] followed by [`TaskRunner::check`].
    pub async fn check_run(&mut self) -> bool {
        let outcomes = self.run().await;
        self.check(&outcomes)
    }
}


fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(32)
}


fn invoke<T>(method: &TaskMethod<T>, kwargs: &Kwargs) -> Result<T, TaskError> {
    method(kwargs).map_err(|err| TaskError::Failed(format!("{:#}", err)))
}


fn join_failure(err: tokio::task::JoinError) -> TaskError {
    match err.try_into_panic() {
        Ok(payload) => TaskError::Panicked(panic_message(payload.as_ref())),
        Err(err) => TaskError::Failed(err.to_string()),
    }
}


fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
