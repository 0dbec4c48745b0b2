//! Equation notation bridge: converts LaTeX into the editor's native
//! equation notation through an external converter.
//!
//! Conversion never fails from the caller's point of view. Any problem
//! (spawn error, non-zero exit, empty output, timeout) returns the input
//! unchanged and logs a warning.

use std::process::Stdio;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ConverterConfig;

pub trait EquationBridge: Send + Sync {
    fn convert(&self, text: &str, timeout: Duration) -> String;
}

/// Returns its input; used when no converter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBridge;

impl EquationBridge for PassthroughBridge {
    fn convert(&self, text: &str, _timeout: Duration) -> String {
        text.to_string()
    }
}

#[derive(Debug, Error)]
enum BridgeError {
    #[error("failed to run converter: {0}")]
    Io(#[from] std::io::Error),

    #[error("converter exited with {0}")]
    Exit(std::process::ExitStatus),

    #[error("converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("converter produced no output")]
    Empty,

    #[error("converter thread panicked")]
    Panicked,
}

/// Runs an external converter with the text on stdin and reads the result
/// from stdout.
#[derive(Debug, Clone)]
pub struct CommandBridge {
    program: String,
    args: Vec<String>,
}

impl CommandBridge {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Blocking entry point. Drives a private current-thread runtime; from
    /// inside a running runtime that happens on a scoped thread, since
    /// `block_on` cannot nest.
    fn run(&self, text: &str, limit: Duration) -> Result<String, BridgeError> {
        let block = || -> Result<String, BridgeError> {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(self.run_async(text, limit))
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            thread::scope(|s| s.spawn(block).join().unwrap_or(Err(BridgeError::Panicked)))
        } else {
            block()
        }
    }

    async fn run_async(&self, text: &str, limit: Duration) -> Result<String, BridgeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        // Input is fed while stdout drains, so a chatty converter cannot
        // stall the writer. A converter may also exit without reading it.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!(error = %e, "converter closed stdin early");
                }
            }
        };
        let exchange = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        // Dropping the exchange on expiry drops the child, which kills it.
        let output = timeout(limit, exchange)
            .await
            .map_err(|_| BridgeError::Timeout(limit))??;
        if !output.status.success() {
            return Err(BridgeError::Exit(output.status));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let converted = stdout.trim();
        if converted.is_empty() {
            return Err(BridgeError::Empty);
        }
        Ok(converted.to_string())
    }
}

impl EquationBridge for CommandBridge {
    fn convert(&self, text: &str, timeout: Duration) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self.run(text, timeout) {
            Ok(converted) => {
                debug!(input = text, output = %converted, "equation converted");
                converted
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "equation conversion failed; keeping input");
                text.to_string()
            }
        }
    }
}
