use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::seconds;
use crate::error::{status_text, Error};
use crate::kwargs::Kwargs;

const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// What a finished (or interrupted) command left behind.
#[derive(Clone, Debug, PartialEq)]
pub struct CmdResult {
    pub command: String,
    pub exit_status: Option<i32>,
    pub duration: Duration,
    pub interrupted: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0) && !self.interrupted
    }

    /// Turn a failing exit status into an error.
    pub fn check_status(self) -> Result<Self, Error> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ExitFailure {
                command: self.command,
                status: self.exit_status,
            })
        }
    }
}

impl fmt::Display for CmdResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "command:     {}", self.command)?;
        writeln!(f, "exit_status: {}", status_text(&self.exit_status))?;
        writeln!(f, "duration:    {:.3}", self.duration.as_secs_f64())?;
        writeln!(f, "interrupted: {}", self.interrupted)?;
        write!(f, "stdout:")?;
        for line in self.stdout.lines() {
            write!(f, "\n  {}", line)?;
        }
        write!(f, "\nstderr:")?;
        for line in self.stderr.lines() {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}


/// Run a command to completion, killing it if it outlives `timeout`.
pub async fn run(args: &[String], timeout: Option<Duration>) -> Result<CmdResult, Error> {
    let (program, rest) = args.split_first().ok_or(Error::EmptyCommand)?;
    let command = args.join(" ");
    tracing::debug!("Running: {}", command);

    let started = Instant::now();
    let mut process = tokio::process::Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| Error::CommandFailed(Arc::new(err)))?;

    let stdout = process.stdout.take().map(|pipe| collect_lines(pipe, "stdout"));
    let stderr = process.stderr.take().map(|pipe| collect_lines(pipe, "stderr"));

    let waited = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, process.wait()).await.ok(),
        None => Some(process.wait().await),
    };

    let (status, interrupted) = match waited {
        Some(status) => (status, false),
        None => {
            tracing::warn!("Command timed out after {:?}: {}", timeout.unwrap_or_default(), command);
            // Already exited between the timeout and the kill is fine.
            if let Err(err) = process.start_kill() {
                tracing::debug!("Failed to kill {}: {}", command, err);
            }
            (process.wait().await, true)
        }
    };
    let status = status.map_err(|err| Error::CommandFailed(Arc::new(err)))?;

    // Children of a killed command can keep the pipes open.
    let grace = interrupted.then_some(OUTPUT_GRACE);
    let (stdout, stderr) =
        futures::future::join(join_output(stdout, grace), join_output(stderr, grace)).await;

    Ok(CmdResult {
        command,
        exit_status: status.code(),
        duration: started.elapsed(),
        interrupted,
        stdout,
        stderr,
    })
}


/// Task method that runs the command described by `kwargs`.
///
/// Recognised arguments: `args` (list of strings, required), `timeout`
/// (seconds) and `ignore_status` (keep non-zero exits as successes).
pub fn run_kwargs(handle: &Handle, kwargs: &Kwargs) -> anyhow::Result<CmdResult> {
    let args: Vec<String> = kwargs.get("args")?;
    let timeout = kwargs.get_opt::<f64>("timeout")?.map(seconds).transpose()?;
    let ignore_status = kwargs.get_opt::<bool>("ignore_status")?.unwrap_or(false);

    let result = handle.block_on(run(&args, timeout))?;
    if ignore_status {
        Ok(result)
    } else {
        Ok(result.check_status()?)
    }
}


fn collect_lines<R>(pipe: R, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        let mut output = String::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::trace!("{}: {}", stream, line);
                    output.push_str(&line);
                    output.push('\n');
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!("Stopped reading {}: {}", stream, err);
                    break;
                }
            }
        }
        output
    })
}


async fn join_output(handle: Option<JoinHandle<String>>, grace: Option<Duration>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match grace {
        Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(output) => output.unwrap_or_default(),
            Err(_) => {
                handle.abort();
                String::new()
            }
        },
        None => handle.await.unwrap_or_default(),
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_output_and_status() {
        let result = run(&args(&["sh", "-c", "echo out; echo err >&2; exit 3"]), None)
            .await
            .unwrap();
        assert_eq!(result.command, "sh -c echo out; echo err >&2; exit 3");
        assert_eq!(result.exit_status, Some(3));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.interrupted);
        assert!(!result.success());
        assert!(matches!(
            result.check_status(),
            Err(Error::ExitFailure { status: Some(3), .. })
        ));
    }

    #[tokio::test]
    async fn timeout_interrupts_the_command() {
        let result = run(&args(&["sleep", "5"]), Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(result.interrupted);
        assert!(result.duration < Duration::from_secs(5));
        assert!(result.check_status().is_err());
    }

    #[tokio::test]
    async fn empty_and_missing_commands() {
        assert!(matches!(run(&[], None).await, Err(Error::EmptyCommand)));
        assert!(matches!(
            run(&args(&["/nonexistent/clutch-binary"]), None).await,
            Err(Error::CommandFailed(_))
        ));
    }

    #[test]
    fn report_layout() {
        let result = CmdResult {
            command: "ior -w".to_string(),
            exit_status: Some(0),
            duration: Duration::from_millis(1500),
            interrupted: false,
            stdout: "line one\nline two\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(
            result.to_string(),
            "command:     ior -w\n\
             exit_status: 0\n\
             duration:    1.500\n\
             interrupted: false\n\
             stdout:\n  line one\n  line two\n\
             stderr:"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn kwargs_adapter_runs_on_blocking_threads() {
        let handle = Handle::current();
        let kwargs = Kwargs::new()
            .with("args", vec!["sh", "-c", "exit 1"])
            .with("ignore_status", true);
        let result = tokio::task::spawn_blocking(move || run_kwargs(&handle, &kwargs))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.exit_status, Some(1));

        let handle = Handle::current();
        let kwargs = Kwargs::new().with("args", vec!["sh", "-c", "exit 1"]);
        let err = tokio::task::spawn_blocking(move || run_kwargs(&handle, &kwargs))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("exit status: 1"));
    }
}
