//! layout-typist: types repaired layout scripts into a document-editing target
//!
//! The script model, normalizer and interpreter tiers live in the
//! `layout-script` crate. This crate owns everything that touches a document:
//! - `target`: the primitive command surface and an in-memory document
//! - `composer`: composition state and operation-to-primitive translation
//! - `runner`/`session`: script execution, reattach-and-resume
//! - `worker`: the background typing worker with cancellation epochs
//! - `generation`: bounded-concurrency script generation fan-out
//! - `config`: env and YAML configuration

pub mod cancel;
pub mod composer;
pub mod config;
pub mod equation;
pub mod generation;
pub mod runner;
pub mod session;
pub mod target;
pub mod worker;

pub use cancel::CancelToken;
pub use composer::{ComposeError, ComposeSettings, Composer, CompositionState, PendingAlignment};
pub use config::{ConfigError, ConverterConfig, TypistConfig};
pub use equation::{CommandBridge, EquationBridge, PassthroughBridge};
pub use generation::{generate_all, GenerationRequest, ScriptGenerator};
pub use runner::{PreparedScript, RunError, RunReport, ScriptRunner};
pub use session::Session;
pub use target::memory::{MemoryConnector, MemoryDocument, SharedDocument};
pub use target::{DocumentTarget, TargetConnector, TargetError};
pub use worker::{CancelHandle, TypingEvent, TypingRequest, TypingWorker};

// Re-export the script layer so callers need a single dependency
pub use layout_script;
