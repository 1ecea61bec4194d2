pub mod command;
pub mod config;
mod error;
pub mod kwargs;
pub mod log;
pub mod performance;
pub mod process;
pub mod runner;
pub mod tasks;

pub use config::ThreadPlan;
pub use error::Error;
pub use kwargs::Kwargs;
pub use log::{LogSink, MemorySink, TracingSink};
pub use process::CmdResult;
pub use runner::TaskRunner;
pub use tasks::{TaskError, TaskOutcome, TaskSpec};
