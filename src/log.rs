//! Where task reports are written.
//!
//! The runner never talks to a global logger directly. It writes report lines
//! to a [`LogSink`], which by default forwards them to `tracing`.

use parking_lot::Mutex;


pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}


/// Forwards report lines to `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "clutch::report", "{}", line);
    }
}


/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}


/// Install the process-wide `tracing` subscriber for the given verbosity.
pub fn init(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    // The report target stays at info so `check` output is always visible.
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clutch={},clutch::report=info", level)));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.write_line("first");
        sink.write_line("second");
        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert!(sink.contains("sec"));
        assert!(!sink.contains("third"));
    }
}
