//! Typing worker: ordered execution, events, cancellation epochs.

use crossbeam_channel::{bounded, Receiver, Sender};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use layout_typist::layout_script::Tier;
use layout_typist::target::{CellFormat, CharShape, Command, Direction, EquationSpec, ParaShape};
use layout_typist::{
    ComposeSettings, DocumentTarget, MemoryConnector, MemoryDocument, PassthroughBridge, Session, SharedDocument,
    TargetConnector, TargetError, TypingEvent, TypingRequest, TypingWorker,
};

const WAIT: Duration = Duration::from_secs(5);

fn memory_worker(doc: &SharedDocument) -> TypingWorker {
    let session = Session::new(
        Box::new(MemoryConnector::new(doc.clone())),
        ComposeSettings::default(),
        Arc::new(PassthroughBridge),
    );
    TypingWorker::spawn(session).unwrap()
}

/// Collect events until `terminal` requests have finished one way or another.
fn collect(worker: &TypingWorker, terminal: usize) -> Vec<TypingEvent> {
    let mut events = Vec::new();
    let mut done = 0;
    while done < terminal {
        let event = worker.events().recv_timeout(WAIT).expect("worker event");
        done += usize::from(event.is_terminal());
        events.push(event);
    }
    events
}

#[test]
fn test_requests_typed_in_order() {
    let doc = SharedDocument::new(MemoryDocument::new("w.hwp"));
    let worker = memory_worker(&doc);
    worker.submit(TypingRequest::new(0, "insert_text('a')")).unwrap();
    worker
        .submit(TypingRequest::new(1, "insert_enter()\ninsert_text('b')"))
        .unwrap();

    let events = collect(&worker, 2);
    assert_eq!(
        events,
        vec![
            TypingEvent::Started { index: 0 },
            TypingEvent::Finished {
                index: 0,
                applied: 1,
                tier: Tier::Primary,
                reattached: false,
            },
            TypingEvent::Started { index: 1 },
            TypingEvent::Finished {
                index: 1,
                applied: 2,
                tier: Tier::Primary,
                reattached: false,
            },
        ]
    );
    assert_eq!(doc.text(), "a\nb");
}

#[test]
fn test_failure_does_not_stop_the_worker() {
    let doc = SharedDocument::new(MemoryDocument::new("w.hwp"));
    let worker = memory_worker(&doc);
    worker
        .submit(TypingRequest::new(0, "insert_text('a')").in_document("other.hwp"))
        .unwrap();
    worker.submit(TypingRequest::new(1, "insert_text('b')")).unwrap();

    let events = collect(&worker, 2);
    assert!(matches!(&events[1], TypingEvent::Failed { index: 0, error } if error.contains("other.hwp")));
    assert!(matches!(events[3], TypingEvent::Finished { index: 1, .. }));
    assert_eq!(doc.text(), "b");
}

#[test]
fn test_shutdown_returns_session() {
    let doc = SharedDocument::new(MemoryDocument::new("w.hwp"));
    let worker = memory_worker(&doc);
    worker.submit(TypingRequest::new(0, "insert_text('a')")).unwrap();
    collect(&worker, 1);

    let session = worker.shutdown().expect("session");
    assert!(session.is_attached());
    assert!(!session.state().line_start);
}

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

/// Blocks the first text run until the test releases it.
struct GatedTarget {
    inner: SharedDocument,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl DocumentTarget for GatedTarget {
    fn insert_text(&mut self, text: &str) -> Result<(), TargetError> {
        if let Some((entered, release)) = self.gate.take() {
            let _ = entered.send(());
            let _ = release.recv_timeout(WAIT);
        }
        self.inner.insert_text(text)
    }

    fn run(&mut self, command: Command) -> Result<bool, TargetError> {
        self.inner.run(command)
    }

    fn apply_char_shape(&mut self, shape: &CharShape) -> Result<(), TargetError> {
        self.inner.apply_char_shape(shape)
    }

    fn apply_para_shape(&mut self, shape: &ParaShape) -> Result<(), TargetError> {
        self.inner.apply_para_shape(shape)
    }

    fn apply_cell_format(&mut self, format: &CellFormat) -> Result<(), TargetError> {
        self.inner.apply_cell_format(format)
    }

    fn create_table(&mut self, rows: u32, cols: u32) -> Result<(), TargetError> {
        self.inner.create_table(rows, cols)
    }

    fn create_equation(&mut self, spec: &EquationSpec) -> Result<(), TargetError> {
        self.inner.create_equation(spec)
    }

    fn set_object_anchor(&mut self, treat_as_char: bool) -> Result<(), TargetError> {
        self.inner.set_object_anchor(treat_as_char)
    }

    fn insert_fragment(&mut self, path: &Path) -> Result<bool, TargetError> {
        self.inner.insert_fragment(path)
    }

    fn find_text(&mut self, needle: &str, direction: Direction) -> Result<bool, TargetError> {
        self.inner.find_text(needle, direction)
    }

    fn document_identity(&mut self) -> Result<Option<String>, TargetError> {
        self.inner.document_identity()
    }
}

struct GatedConnector {
    document: SharedDocument,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl TargetConnector for GatedConnector {
    fn connect(&mut self, _document: Option<&str>) -> Result<Box<dyn DocumentTarget>, TargetError> {
        Ok(Box::new(GatedTarget {
            inner: self.document.clone(),
            gate: self.gate.take(),
        }))
    }
}

#[test]
fn test_cancel_drains_queue_then_worker_keeps_serving() {
    let doc = SharedDocument::new(MemoryDocument::new("w.hwp"));
    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);
    let session = Session::new(
        Box::new(GatedConnector {
            document: doc.clone(),
            gate: Some((entered_tx, release_rx)),
        }),
        ComposeSettings::default(),
        Arc::new(PassthroughBridge),
    );
    let worker = TypingWorker::spawn(session).unwrap();

    worker
        .submit(TypingRequest::new(0, "insert_text('a')\ninsert_text('b')"))
        .unwrap();
    worker.submit(TypingRequest::new(1, "insert_text('x')")).unwrap();
    worker.submit(TypingRequest::new(2, "insert_text('y')")).unwrap();

    entered_rx.recv_timeout(WAIT).expect("first text run reached the target");
    worker.cancel();
    release_tx.send(()).unwrap();

    let events = collect(&worker, 3);
    assert_eq!(
        events,
        vec![
            TypingEvent::Started { index: 0 },
            TypingEvent::Cancelled { index: 0, applied: 1 },
            TypingEvent::Cancelled { index: 1, applied: 0 },
            TypingEvent::Cancelled { index: 2, applied: 0 },
        ]
    );

    worker.submit(TypingRequest::new(3, "insert_text('z')")).unwrap();
    let events = collect(&worker, 1);
    assert!(matches!(events[1], TypingEvent::Finished { index: 3, applied: 1, .. }));
    assert_eq!(doc.text(), "az");
}

#[test]
fn test_cancel_handle_works_from_another_thread() {
    let doc = SharedDocument::new(MemoryDocument::new("w.hwp"));
    let worker = memory_worker(&doc);
    let handle = worker.cancel_handle();
    std::thread::spawn(move || handle.cancel()).join().unwrap();

    // Submitted after the cancel: a new epoch, typed normally.
    worker.submit(TypingRequest::new(0, "insert_text('a')")).unwrap();
    let events = collect(&worker, 1);
    assert!(matches!(events[1], TypingEvent::Finished { index: 0, .. }));
}
