//! Composition state: the contextual flags that decide how the next
//! operation is typed. Owned by one session; never shared across threads.

use serde::{Deserialize, Serialize};

use crate::target::Command;

/// One-shot paragraph alignment for the next line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAlignment {
    #[default]
    None,
    Right,
    Justify,
}

impl PendingAlignment {
    pub fn command(self) -> Option<Command> {
        match self {
            PendingAlignment::None => None,
            PendingAlignment::Right => Some(Command::ParagraphShapeAlignRight),
            PendingAlignment::Justify => Some(Command::ParagraphShapeAlignJustify),
        }
    }

    pub fn is_set(self) -> bool {
        self != PendingAlignment::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionState {
    /// Nothing has been typed on the current line yet.
    pub line_start: bool,
    pub inside_container: bool,
    /// The next token is the first on a container line and gets one leading space.
    pub container_line_start: bool,
    pub pending_alignment: PendingAlignment,
    /// Alignment applied to the current line; reverted to left at the next break.
    pub line_alignment: PendingAlignment,
    pub last_was_equation: bool,
    pub bold: bool,
    pub underline: bool,
    pub has_written_first_line: bool,
}

impl Default for CompositionState {
    fn default() -> Self {
        Self {
            line_start: true,
            inside_container: false,
            container_line_start: false,
            pending_alignment: PendingAlignment::None,
            line_alignment: PendingAlignment::None,
            last_was_equation: false,
            bold: false,
            underline: false,
            has_written_first_line: false,
        }
    }
}

impl CompositionState {
    /// Consume the pending alignment if the cursor is at line start.
    pub(crate) fn take_alignment(&mut self) -> PendingAlignment {
        if !self.line_start {
            return PendingAlignment::None;
        }
        let alignment = std::mem::take(&mut self.pending_alignment);
        if alignment.is_set() {
            self.line_alignment = alignment;
        }
        alignment
    }

    /// Auto-indent applies at the start of every line after the first,
    /// outside containers.
    pub(crate) fn wants_indent(&self) -> bool {
        !self.inside_container && self.line_start && self.has_written_first_line
    }

    pub(crate) fn mark_written(&mut self) {
        self.line_start = false;
        self.has_written_first_line = true;
    }

    pub(crate) fn leave_container(&mut self) {
        self.inside_container = false;
        self.container_line_start = false;
    }
}
