//! Document session: owns the attached target and the composition state.
//!
//! A session runs one script at a time. Before each script it probes the
//! attached document and reattaches when the target is gone or a different
//! document is requested. A lost session during a script is reattached once
//! per failing operation and the script resumes at that operation.

use std::sync::Arc;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::composer::{ComposeSettings, Composer, CompositionState};
use crate::equation::EquationBridge;
use crate::runner::{RunError, RunReport, ScriptRunner};
use crate::target::{DocumentTarget, TargetConnector, TargetError};

pub struct Session {
    connector: Box<dyn TargetConnector>,
    target: Option<Box<dyn DocumentTarget>>,
    document: Option<String>,
    state: CompositionState,
    settings: ComposeSettings,
    bridge: Arc<dyn EquationBridge>,
    runner: ScriptRunner,
}

impl Session {
    pub fn new(connector: Box<dyn TargetConnector>, settings: ComposeSettings, bridge: Arc<dyn EquationBridge>) -> Self {
        Self {
            connector,
            target: None,
            document: None,
            state: CompositionState::default(),
            settings,
            bridge,
            runner: ScriptRunner::default(),
        }
    }

    pub fn with_runner(mut self, runner: ScriptRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn state(&self) -> &CompositionState {
        &self.state
    }

    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    /// Attach to the editor, optionally to a named open document. Switching
    /// documents starts from a fresh composition state.
    pub fn attach(&mut self, document: Option<&str>) -> Result<(), TargetError> {
        self.target = None;
        let target = self.connector.connect(document)?;
        if document.is_some() && document != self.document.as_deref() {
            self.state = CompositionState::default();
            self.document = document.map(str::to_string);
        }
        self.target = Some(target);
        info!(document = document.unwrap_or("<active>"), "attached to document target");
        Ok(())
    }

    /// Drop the target handle. The next script attaches again.
    pub fn close(&mut self) {
        if self.target.take().is_some() {
            info!("document session closed");
        }
    }

    fn ensure_attached(&mut self, document: Option<&str>) -> Result<(), TargetError> {
        let healthy = match self.target.as_mut() {
            None => false,
            Some(target) => match target.document_identity() {
                Ok(identity) => document.map_or(true, |wanted| identity.as_deref() == Some(wanted)),
                Err(e) => {
                    warn!(error = %e, "document target unreachable");
                    false
                }
            },
        };
        if healthy {
            return Ok(());
        }
        self.attach(document)
    }

    /// Normalize, interpret and type one script into the attached document.
    pub fn run_script(
        &mut self,
        script: &str,
        document: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("typing", %run_id).entered();

        let prepared = self.runner.prepare(script)?;
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled { applied: 0 });
        }
        self.ensure_attached(document)
            .map_err(|e| RunError::Attach(e.to_string()))?;

        let steps = &prepared.plan.steps;
        let mut from = 0;
        let mut reattached_at: Option<usize> = None;
        loop {
            let Some(target) = self.target.as_deref_mut() else {
                return Err(RunError::Attach("no document target attached".to_string()));
            };
            let mut composer = Composer::new(target, &mut self.state, &self.settings, self.bridge.as_ref(), cancel);
            let halt = match self.runner.execute(&mut composer, steps, from) {
                Ok(()) => {
                    info!(tier = ?prepared.plan.tier, applied = steps.len(), "script typed");
                    return Ok(RunReport {
                        tier: prepared.plan.tier,
                        applied: steps.len(),
                        reattached: reattached_at.is_some(),
                        normalized: prepared.normalized,
                    });
                }
                Err(halt) => halt,
            };

            if halt.error.is_cancelled() {
                info!(applied = halt.index, "script cancelled");
                return Err(RunError::Cancelled { applied: halt.index });
            }
            let failed = |cause: String| RunError::OperationFailed {
                operation: halt.operation,
                index: halt.index,
                cause,
            };
            if !halt.error.is_session_unavailable() || reattached_at == Some(halt.index) {
                warn!(operation = %halt.operation, index = halt.index, error = %halt.error, "operation failed");
                return Err(failed(halt.error.to_string()));
            }

            warn!(operation = %halt.operation, index = halt.index, "document session lost; reattaching");
            if let Err(e) = self.attach(document) {
                return Err(failed(format!("{} (reattach failed: {e})", halt.error)));
            }
            reattached_at = Some(halt.index);
            from = halt.index;
        }
    }
}
