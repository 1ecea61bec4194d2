use std::sync::Arc;


#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("Command failed: {0}")]
    CommandFailed(Arc<std::io::Error>),
    #[error("Command is empty")]
    EmptyCommand,
    #[error("Command `{command}` failed with exit status: {}", status_text(.status))]
    ExitFailure {
        command: String,
        status: Option<i32>,
    },
    #[error("Missing argument: {0}")]
    MissingArgument(String),
    #[error("Invalid argument {name}")]
    InvalidArgument {
        name: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("Arguments must be a mapping, got: {0}")]
    InvalidArguments(String),
    #[error("Invalid cmd: {0}")]
    InvalidBenchmark(String),
    #[error("No client hosts configured")]
    NoClients,
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(f64),
    #[error("Test failed: {0}")]
    TestFailed(String),
    #[error("Invalid configuration: {0}")]
    Config(Arc<serde_yaml::Error>),
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(Arc::new(err))
    }
}


pub(crate) fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
