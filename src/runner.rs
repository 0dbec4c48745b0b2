//! Script runner: normalize, interpret, then feed the composer one operation
//! at a time.
//!
//! Execution can start at any operation index so a session can resume a
//! script after reattaching to its target.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use layout_script::{plan, ArgumentError, Normalizer, OpName, ParseFailure, Plan, Step, Tier};

use crate::composer::{ComposeError, Composer};
use crate::target::DocumentTarget;

/// Outcome of a completed script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub tier: Tier,
    /// Operations applied to the document.
    pub applied: usize,
    pub reattached: bool,
    pub normalized: String,
}

#[derive(Debug, Error)]
pub enum RunError {
    /// Neither interpreter tier could read the script.
    #[error("script could not be interpreted: {0}")]
    Unparseable(#[from] ParseFailure),

    #[error("{operation} (operation {index}) failed: {cause}")]
    OperationFailed {
        operation: OpName,
        index: usize,
        cause: String,
    },

    /// Not a failure: the run stopped on request. Applied effects remain.
    #[error("cancelled after {applied} operation(s)")]
    Cancelled { applied: usize },

    #[error("could not attach to document: {0}")]
    Attach(String),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}

/// Why a step stopped execution.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Compose(ComposeError::Cancelled))
    }

    pub fn is_session_unavailable(&self) -> bool {
        matches!(self, StepError::Compose(e) if e.is_session_unavailable())
    }
}

/// Execution stopped at `index`; operations before it were applied.
#[derive(Debug)]
pub struct Halt {
    pub index: usize,
    pub operation: OpName,
    pub error: StepError,
}

/// A script ready to execute.
#[derive(Debug, Clone)]
pub struct PreparedScript {
    pub normalized: String,
    pub plan: Plan,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    normalizer: Normalizer,
}

impl ScriptRunner {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn prepare(&self, script: &str) -> Result<PreparedScript, RunError> {
        let normalized = self.normalizer.run(script);
        let plan = plan(&normalized)?;
        debug!(tier = ?plan.tier, steps = plan.steps.len(), "script prepared");
        Ok(PreparedScript { normalized, plan })
    }

    /// Apply `steps[from..]`. An argument error stops the script like any
    /// other operation failure.
    pub fn execute<T: DocumentTarget + ?Sized>(
        &self,
        composer: &mut Composer<'_, T>,
        steps: &[Step],
        from: usize,
    ) -> Result<(), Halt> {
        for (index, step) in steps.iter().enumerate().skip(from) {
            let halt = |operation: OpName, error: StepError| Halt { index, operation, error };
            match step {
                Ok(op) => composer.apply(op).map_err(|e| halt(op.name(), e.into()))?,
                Err(e) => return Err(halt(e.op(), e.clone().into())),
            }
        }
        info!(operations = steps.len().saturating_sub(from), "script applied");
        Ok(())
    }
}
