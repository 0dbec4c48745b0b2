//! layout-script: script model, normalizer and interpreter tiers for layout scripts
//!
//! This crate contains the pure script logic with NO document target dependencies:
//! - Operation vocabulary and typed operations (OpName, Arg, Operation)
//! - Quote-aware lexical helpers shared by every stage
//! - The ordered, idempotent normalizer pass pipeline
//! - Nom-based primary parser over the closed call vocabulary
//! - Tolerant fallback scanner for scripts the primary parser rejects
//!
//! Dispatching operations into a document (composition state, primitives,
//! sessions) lives in the `layout-typist` crate.

pub mod ast;
pub mod error;
pub mod fallback;
pub mod lexical;
pub mod normalizer;
pub mod parser;
pub mod source;

// Re-export commonly used types
pub use ast::{
    Arg, EquationStyle, Invocation, OpName, Operation, Placeholder, TableSpec, TemplateFlavor,
    TemplateKind, Zone,
};
pub use error::{ArgumentError, ParseFailure};
pub use fallback::TolerantScanner;
pub use normalizer::{normalize, Normalizer};
pub use parser::{parse_script, ScriptParser};
pub use source::{plan, OperationSource, Plan, Step, Tier};
