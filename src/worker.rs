//! Background typing worker.
//!
//! One thread owns the `Session` and types queued scripts strictly in
//! submission order. Requests and events travel over crossbeam channels so
//! the controller never blocks on the document.
//!
//! Cancellation uses an epoch counter alongside the run's `CancelToken`:
//! cancelling bumps the epoch and trips the token. The running script stops
//! at its next checkpoint, and every request queued under an older epoch is
//! reported cancelled without touching the document.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

use layout_script::Tier;

use crate::cancel::CancelToken;
use crate::runner::RunError;
use crate::session::Session;

/// One script to type, tagged with the caller's item index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingRequest {
    pub index: usize,
    pub script: String,
    /// Open document to type into; the active document when `None`.
    pub document: Option<String>,
}

impl TypingRequest {
    pub fn new(index: usize, script: impl Into<String>) -> Self {
        Self {
            index,
            script: script.into(),
            document: None,
        }
    }

    pub fn in_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TypingEvent {
    Started {
        index: usize,
    },
    Finished {
        index: usize,
        applied: usize,
        tier: Tier,
        reattached: bool,
    },
    Cancelled {
        index: usize,
        applied: usize,
    },
    Failed {
        index: usize,
        error: String,
    },
}

impl TypingEvent {
    pub fn index(&self) -> usize {
        match self {
            TypingEvent::Started { index }
            | TypingEvent::Finished { index, .. }
            | TypingEvent::Cancelled { index, .. }
            | TypingEvent::Failed { index, .. } => *index,
        }
    }

    /// True for the last event a request produces.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TypingEvent::Started { .. })
    }
}

#[derive(Debug, Error)]
#[error("typing worker has stopped")]
pub struct WorkerStopped;

/// Cancels the running script and everything queued so far. Cheap to clone
/// and usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    epoch: Arc<AtomicU64>,
    token: CancelToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

struct Queued {
    request: TypingRequest,
    epoch: u64,
}

pub struct TypingWorker {
    sender: Option<Sender<Queued>>,
    events: Receiver<TypingEvent>,
    cancel: CancelHandle,
    handle: Option<JoinHandle<Session>>,
}

impl TypingWorker {
    /// Start the worker thread. It runs until the worker is shut down or
    /// dropped, then hands the session back.
    pub fn spawn(session: Session) -> io::Result<Self> {
        let (sender, requests) = unbounded::<Queued>();
        let (event_tx, events) = unbounded::<TypingEvent>();
        let cancel = CancelHandle::default();
        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("typing-worker".to_string())
            .spawn(move || worker_loop(session, requests, event_tx, worker_cancel))?;
        Ok(Self {
            sender: Some(sender),
            events,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, request: TypingRequest) -> Result<(), WorkerStopped> {
        let sender = self.sender.as_ref().ok_or(WorkerStopped)?;
        let queued = Queued {
            request,
            epoch: self.cancel.epoch(),
        };
        sender.send(queued).map_err(|_| WorkerStopped)
    }

    pub fn cancel(&self) {
        info!("cancelling typing queue");
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn events(&self) -> &Receiver<TypingEvent> {
        &self.events
    }

    /// Finish the queued work and return the session.
    pub fn shutdown(mut self) -> Option<Session> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Session> {
        drop(self.sender.take());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(session) => Some(session),
            Err(_) => {
                warn!("typing worker panicked");
                None
            }
        }
    }
}

impl Drop for TypingWorker {
    fn drop(&mut self) {
        if let Some(mut session) = self.stop() {
            session.close();
        }
    }
}

fn worker_loop(
    mut session: Session,
    requests: Receiver<Queued>,
    events: Sender<TypingEvent>,
    cancel: CancelHandle,
) -> Session {
    // Sends fail only when the controller dropped its receiver; keep typing.
    let emit = |event: TypingEvent| {
        let _ = events.send(event);
    };

    for Queued { request, epoch } in requests.iter() {
        let index = request.index;
        if epoch != cancel.epoch() {
            debug!(index, "dropping request queued before cancellation");
            emit(TypingEvent::Cancelled { index, applied: 0 });
            continue;
        }
        cancel.token.reset();
        // A cancel landing between the check and the reset must still count.
        if epoch != cancel.epoch() {
            emit(TypingEvent::Cancelled { index, applied: 0 });
            continue;
        }

        emit(TypingEvent::Started { index });
        let event = match session.run_script(&request.script, request.document.as_deref(), &cancel.token) {
            Ok(report) => TypingEvent::Finished {
                index,
                applied: report.applied,
                tier: report.tier,
                reattached: report.reattached,
            },
            Err(RunError::Cancelled { applied }) => TypingEvent::Cancelled { index, applied },
            Err(e) => {
                warn!(index, error = %e, "typing failed");
                TypingEvent::Failed {
                    index,
                    error: e.to_string(),
                }
            }
        };
        emit(event);
    }
    debug!("typing worker stopped");
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization_tagged() {
        let event = TypingEvent::Cancelled { index: 2, applied: 5 };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "cancelled", "index": 2, "applied": 5})
        );
        assert!(event.is_terminal());
        assert!(!TypingEvent::Started { index: 0 }.is_terminal());
    }

    #[test]
    fn test_cancel_bumps_epoch_and_trips_token() {
        let handle = CancelHandle::default();
        let observer = handle.clone();
        handle.cancel();
        assert_eq!(observer.epoch(), 1);
        assert!(observer.token.is_cancelled());
    }
}
