//! Document Target: the primitive action surface the composer drives.
//!
//! A target is an attached editing session on one document. Every method is
//! a single primitive call; sequencing, fallbacks and state live in the
//! composer. `memory` provides an in-process target used by tests and the
//! CLI dry run.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error text that means the session behind a target is gone.
pub const UNAVAILABLE_MARKERS: [&str; 4] = [
    "RPC server is unavailable",
    "RPC 서버를 사용할 수 없습니다",
    "0x800706BA",
    "-2147023174",
];

// ============================================================================
// Named commands
// ============================================================================

/// Named editor commands executed with `DocumentTarget::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    BreakPara,
    ParagraphShapeAlignLeft,
    ParagraphShapeAlignRight,
    ParagraphShapeAlignCenter,
    ParagraphShapeAlignJustify,
    MoveDocBegin,
    MoveDown,
    MoveRight,
    MoveToCell,
    CloseEx,
    TableRightCell,
    TableLowerCell,
    TableLeftCell,
    Delete,
    DeleteBack,
    Cancel,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::BreakPara => "BreakPara",
            Command::ParagraphShapeAlignLeft => "ParagraphShapeAlignLeft",
            Command::ParagraphShapeAlignRight => "ParagraphShapeAlignRight",
            Command::ParagraphShapeAlignCenter => "ParagraphShapeAlignCenter",
            Command::ParagraphShapeAlignJustify => "ParagraphShapeAlignJustify",
            Command::MoveDocBegin => "MoveDocBegin",
            Command::MoveDown => "MoveDown",
            Command::MoveRight => "MoveRight",
            Command::MoveToCell => "MoveToCell",
            Command::CloseEx => "CloseEx",
            Command::TableRightCell => "TableRightCell",
            Command::TableLowerCell => "TableLowerCell",
            Command::TableLeftCell => "TableLeftCell",
            Command::Delete => "Delete",
            Command::DeleteBack => "DeleteBack",
            Command::Cancel => "Cancel",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Shapes and object specs
// ============================================================================

/// Character formatting. `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharShape {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_ratio: Option<i64>,
}

impl CharShape {
    pub fn font(face_name: &str, size_pt: f64) -> Self {
        Self {
            face_name: Some(face_name.to_string()),
            size_pt: Some(size_pt),
            ..Self::default()
        }
    }

    /// Overlay the `Some` fields of `other` onto `self`.
    pub fn merge(&mut self, other: &CharShape) {
        if other.face_name.is_some() {
            self.face_name.clone_from(&other.face_name);
        }
        self.size_pt = other.size_pt.or(self.size_pt);
        self.bold = other.bold.or(self.bold);
        self.underline = other.underline.or(self.underline);
        self.width_ratio = other.width_ratio.or(self.width_ratio);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParaShape {
    pub line_spacing_percent: u32,
    pub space_before: u32,
    pub space_after: u32,
}

impl ParaShape {
    /// Tight spacing used inside containers and table cells.
    pub fn compact() -> Self {
        Self {
            line_spacing_percent: 100,
            space_before: 0,
            space_after: 0,
        }
    }
}

/// Formatting for the active table cell or cell block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationSpec {
    pub text: String,
    pub font_name: String,
    /// Font size in hundredths of a point.
    pub base_unit: u32,
    pub treat_as_char: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The attached session is gone; the caller may reattach once.
    #[error("document session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("{action} failed: {message}")]
    Action { action: String, message: String },

    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

impl TargetError {
    /// Classify a failed primitive by its error text.
    pub fn action(action: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        if UNAVAILABLE_MARKERS.iter().any(|m| message.contains(m)) {
            TargetError::SessionUnavailable(message)
        } else {
            TargetError::Action {
                action: action.into(),
                message,
            }
        }
    }

    pub fn is_session_unavailable(&self) -> bool {
        matches!(self, TargetError::SessionUnavailable(_))
    }
}

// ============================================================================
// Traits
// ============================================================================

/// An attached editing session. Owned by one session at a time.
pub trait DocumentTarget: Send {
    /// Insert a text run at the cursor, replacing any selection.
    fn insert_text(&mut self, text: &str) -> Result<(), TargetError>;

    /// Execute a named command. `Ok(false)` means the command ran but had
    /// nothing to act on (no enclosing cell, nothing to delete).
    fn run(&mut self, command: Command) -> Result<bool, TargetError>;

    fn apply_char_shape(&mut self, shape: &CharShape) -> Result<(), TargetError>;

    fn apply_para_shape(&mut self, shape: &ParaShape) -> Result<(), TargetError>;

    fn apply_cell_format(&mut self, format: &CellFormat) -> Result<(), TargetError>;

    /// Create a table at the cursor, leaving the cursor in its first cell.
    fn create_table(&mut self, rows: u32, cols: u32) -> Result<(), TargetError>;

    /// Create an equation object at the cursor and select it.
    fn create_equation(&mut self, spec: &EquationSpec) -> Result<(), TargetError>;

    /// Anchor the selected object as a character (or float it).
    fn set_object_anchor(&mut self, treat_as_char: bool) -> Result<(), TargetError>;

    /// Insert an external fragment at the cursor. `Ok(false)` when the
    /// fragment cannot be loaded.
    fn insert_fragment(&mut self, path: &Path) -> Result<bool, TargetError>;

    /// Search from the cursor and select the first match.
    fn find_text(&mut self, needle: &str, direction: Direction) -> Result<bool, TargetError>;

    /// Name of the attached document, `None` when the session cannot tell.
    fn document_identity(&mut self) -> Result<Option<String>, TargetError>;
}

/// Attaches to a running editor, optionally to a named open document.
pub trait TargetConnector: Send {
    fn connect(&mut self, document: Option<&str>) -> Result<Box<dyn DocumentTarget>, TargetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_classification() {
        let err = TargetError::action("InsertText", "call failed: The RPC server is unavailable. (0x800706BA)");
        assert!(err.is_session_unavailable());

        let err = TargetError::action("InsertText", "RPC 서버를 사용할 수 없습니다");
        assert!(err.is_session_unavailable());

        let err = TargetError::action("CloseEx", "no enclosing table");
        assert_eq!(err.to_string(), "CloseEx failed: no enclosing table");
        assert!(!err.is_session_unavailable());
    }

    #[test]
    fn test_char_shape_merge() {
        let mut shape = CharShape::font("HyhwpEQ", 8.0);
        shape.merge(&CharShape {
            bold: Some(true),
            ..CharShape::default()
        });
        assert_eq!(shape.face_name.as_deref(), Some("HyhwpEQ"));
        assert_eq!(shape.bold, Some(true));
        assert_eq!(shape.underline, None);
    }
}
