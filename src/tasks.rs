use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::kwargs::Kwargs;


/// One pending invocation: its submission index and the arguments to pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub index: usize,
    pub kwargs: Kwargs,
}


/// Why an invocation did not produce a value.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("{unfinished} (of {total}) threads unfinished after timeout of {timeout:?}")]
    TimedOut {
        unfinished: usize,
        total: usize,
        timeout: Duration,
    },
    #[error("thread exited without reporting a result")]
    Lost,
}


/// The recorded result of running one [`TaskSpec`].
#[derive(Clone, Debug)]
pub struct TaskOutcome<T> {
    pub index: usize,
    pub kwargs: Kwargs,
    pub result: Result<T, TaskError>,
}

impl<T> TaskOutcome<T> {
    pub fn new(spec: TaskSpec, result: Result<T, TaskError>) -> Self {
        Self {
            index: spec.index,
            kwargs: spec.kwargs,
            result,
        }
    }

    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.result.as_ref().err()
    }
}

impl<T: fmt::Display> fmt::Display for TaskOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Thread {} results:", self.index)?;
        writeln!(f, "  args: {}", self.kwargs)?;
        write!(f, "  result:")?;
        let body = match &self.result {
            Ok(value) => value.to_string(),
            Err(err) => err.to_string(),
        };
        for line in body.lines() {
            write!(f, "\n    {}", line)?;
        }
        Ok(())
    }
}
