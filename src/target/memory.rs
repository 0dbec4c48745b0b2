//! In-process document target.
//!
//! The document is a flat run of units: characters, equation objects and
//! table delimiters. Tables nest and are stored row-major as cells separated
//! by `CellBreak`. Rendering shows equations as `$..$` and tables as
//! `[cell|cell]`, which is also the markup accepted for registered fragments.
//!
//! Every primitive call is logged, and faults can be injected to simulate a
//! session that dies or an action the editor rejects.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{
    CellFormat, CharShape, Command, Direction, DocumentTarget, EquationSpec, ParaShape, TargetConnector, TargetError,
};

/// Fragment markup for the templates the composer knows about.
pub const STANDARD_FRAGMENTS: [(&str, &str); 5] = [
    ("header.hwp", "@@@\n[###]\n&&&"),
    ("box.hwp", "@@@\n[###]\n&&&"),
    ("box_white.hwp", "@@@\n[###]\n&&&"),
    ("box_template_noheader.hwp", "[]\n"),
    ("box_template.hwp", "[< 보 기 >\n]\n"),
];

const UNAVAILABLE: &str = "The RPC server is unavailable. (0x800706BA)";

const MAX_TABLE_CELLS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum Unit {
    Char(char),
    Equation(String),
    TableOpen { cols: u32 },
    CellBreak,
    TableClose,
}

impl Unit {
    fn render(&self, out: &mut String) {
        match self {
            Unit::Char(c) => out.push(*c),
            Unit::Equation(text) => {
                out.push('$');
                out.push_str(text);
                out.push('$');
            }
            Unit::TableOpen { .. } => out.push('['),
            Unit::CellBreak => out.push('|'),
            Unit::TableClose => out.push(']'),
        }
    }

    /// Stand-in used when searching: only characters can match.
    fn search_char(&self) -> Option<char> {
        match self {
            Unit::Char(c) => Some(*c),
            _ => None,
        }
    }
}

fn parse_markup(markup: &str) -> Vec<Unit> {
    markup
        .chars()
        .map(|c| match c {
            '[' => Unit::TableOpen { cols: 1 },
            '|' => Unit::CellBreak,
            ']' => Unit::TableClose,
            c => Unit::Char(c),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

/// One logged primitive call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Primitive {
    InsertText { text: String },
    Run { command: Command },
    CharShape { shape: CharShape },
    ParaShape { shape: ParaShape },
    CellFormat { format: CellFormat },
    CreateTable { rows: u32, cols: u32 },
    CreateEquation { spec: EquationSpec },
    ObjectAnchor { treat_as_char: bool },
    InsertFragment { name: String },
    FindText { needle: String, direction: Direction },
}

/// Injected failure, counted in primitive calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The session dies after `after` further primitive calls succeed.
    Disconnect { after: usize },
    /// The call following `after` successful calls fails once with `message`.
    Reject { after: usize, message: String },
}

#[derive(Debug, Default)]
pub struct MemoryDocument {
    name: String,
    units: Vec<Unit>,
    cursor: usize,
    selection: Option<(usize, usize)>,
    fragments: HashMap<String, Vec<Unit>>,
    alignment: Alignment,
    char_shape: CharShape,
    log: Vec<Primitive>,
    fault: Option<Fault>,
    calls_since_fault: usize,
    disconnected: bool,
    attachments: usize,
}

impl MemoryDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A document with every standard template fragment registered.
    pub fn with_standard_fragments(name: impl Into<String>) -> Self {
        let mut doc = Self::new(name);
        for (file, markup) in STANDARD_FRAGMENTS {
            doc.register_fragment(file, markup);
        }
        doc
    }

    /// Register fragment markup under a file name; lookups ignore directories.
    pub fn register_fragment(&mut self, file_name: &str, markup: &str) {
        self.fragments.insert(file_name.to_string(), parse_markup(markup));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            unit.render(&mut out);
        }
        out
    }

    pub fn log(&self) -> &[Primitive] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_text(&self) -> Option<String> {
        let (start, end) = self.selection?;
        let mut out = String::new();
        for unit in &self.units[start..end] {
            unit.render(&mut out);
        }
        Some(out)
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn char_shape(&self) -> &CharShape {
        &self.char_shape
    }

    pub fn inject(&mut self, fault: Fault) {
        self.fault = Some(fault);
        self.calls_since_fault = 0;
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Bring a dead session back, as restarting the editor would.
    pub fn revive(&mut self) {
        self.disconnected = false;
        self.fault = None;
    }

    pub fn attachments(&self) -> usize {
        self.attachments
    }

    // ------------------------------------------------------------------------
    // Fault gate
    // ------------------------------------------------------------------------

    fn gate(&mut self, action: &str) -> Result<(), TargetError> {
        if self.disconnected {
            return Err(TargetError::SessionUnavailable(UNAVAILABLE.to_string()));
        }
        let tripped = match &self.fault {
            Some(Fault::Disconnect { after }) | Some(Fault::Reject { after, .. }) => self.calls_since_fault >= *after,
            None => false,
        };
        if !tripped {
            self.calls_since_fault += 1;
            return Ok(());
        }
        debug!(action, fault = ?self.fault, "injected fault tripped");
        match self.fault.take() {
            Some(Fault::Reject { message, .. }) => Err(TargetError::action(action, message)),
            _ => {
                self.disconnected = true;
                Err(TargetError::SessionUnavailable(UNAVAILABLE.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Buffer editing
    // ------------------------------------------------------------------------

    fn delete_selection(&mut self) -> bool {
        match self.selection.take() {
            Some((start, end)) => {
                self.units.drain(start..end);
                self.cursor = start;
                true
            }
            None => false,
        }
    }

    fn insert_units(&mut self, units: Vec<Unit>) {
        self.delete_selection();
        let count = units.len();
        self.units.splice(self.cursor..self.cursor, units);
        self.cursor += count;
    }

    // ------------------------------------------------------------------------
    // Table structure
    // ------------------------------------------------------------------------

    /// The `TableOpen` of the table enclosing `pos`.
    fn enclosing_open(&self, pos: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in (0..pos).rev() {
            match self.units[i] {
                Unit::TableClose => depth += 1,
                Unit::TableOpen { .. } if depth == 0 => return Some(i),
                Unit::TableOpen { .. } => depth -= 1,
                _ => {}
            }
        }
        None
    }

    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open + 1..self.units.len() {
            match self.units[i] {
                Unit::TableOpen { .. } => depth += 1,
                Unit::TableClose if depth == 0 => return Some(i),
                Unit::TableClose => depth -= 1,
                _ => {}
            }
        }
        None
    }

    /// Start position of every cell of the table opened at `open`.
    fn cell_starts(&self, open: usize) -> Vec<usize> {
        let mut starts = vec![open + 1];
        let mut depth = 0usize;
        for i in open + 1..self.units.len() {
            match self.units[i] {
                Unit::TableOpen { .. } => depth += 1,
                Unit::TableClose if depth == 0 => break,
                Unit::TableClose => depth -= 1,
                Unit::CellBreak if depth == 0 => starts.push(i + 1),
                _ => {}
            }
        }
        starts
    }

    /// Move by `delta` cells within the enclosing table.
    fn move_cells(&mut self, delta: impl FnOnce(usize, u32) -> Option<usize>) -> bool {
        let Some(open) = self.enclosing_open(self.cursor) else {
            return false;
        };
        let Unit::TableOpen { cols } = self.units[open] else {
            return false;
        };
        let starts = self.cell_starts(open);
        let current = starts.iter().rposition(|&s| s <= self.cursor).unwrap_or(0);
        match delta(current, cols).and_then(|target| starts.get(target)) {
            Some(&start) => {
                self.cursor = start;
                true
            }
            None => false,
        }
    }

    fn command(&mut self, command: Command) -> bool {
        match command {
            Command::BreakPara => {
                self.insert_units(vec![Unit::Char('\n')]);
                true
            }
            Command::ParagraphShapeAlignLeft => self.align(Alignment::Left),
            Command::ParagraphShapeAlignRight => self.align(Alignment::Right),
            Command::ParagraphShapeAlignCenter => self.align(Alignment::Center),
            Command::ParagraphShapeAlignJustify => self.align(Alignment::Justify),
            Command::MoveDocBegin => {
                self.selection = None;
                self.cursor = 0;
                true
            }
            Command::MoveRight => {
                self.selection = None;
                self.cursor = (self.cursor + 1).min(self.units.len());
                true
            }
            Command::MoveDown => {
                self.selection = None;
                self.move_down();
                true
            }
            Command::MoveToCell => {
                let Some(open) = (0..self.cursor)
                    .rev()
                    .find(|&i| matches!(self.units[i], Unit::TableOpen { .. }))
                else {
                    return false;
                };
                self.selection = None;
                let starts = self.cell_starts(open);
                self.cursor = match starts.get(1) {
                    Some(next) => next - 1,
                    None => self.matching_close(open).unwrap_or(self.units.len()),
                };
                true
            }
            Command::CloseEx => {
                let Some(close) = self.enclosing_open(self.cursor).and_then(|open| self.matching_close(open)) else {
                    return false;
                };
                self.selection = None;
                self.cursor = close + 1;
                true
            }
            Command::TableRightCell => self.move_cells(|current, _| Some(current + 1)),
            Command::TableLeftCell => self.move_cells(|current, _| current.checked_sub(1)),
            Command::TableLowerCell => self.move_cells(|current, cols| Some(current + cols as usize)),
            Command::Delete => {
                if self.delete_selection() {
                    return true;
                }
                if self.cursor < self.units.len() {
                    self.units.remove(self.cursor);
                    true
                } else {
                    false
                }
            }
            Command::DeleteBack => {
                if self.delete_selection() {
                    return true;
                }
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.units.remove(self.cursor);
                    true
                } else {
                    false
                }
            }
            Command::Cancel => {
                self.selection = None;
                true
            }
        }
    }

    fn align(&mut self, alignment: Alignment) -> bool {
        self.alignment = alignment;
        true
    }

    /// Start of the next line at the cursor's nesting level, or the end of
    /// the enclosing cell when there is none.
    fn move_down(&mut self) {
        let mut depth = 0usize;
        for i in self.cursor..self.units.len() {
            match self.units[i] {
                Unit::TableOpen { .. } => depth += 1,
                Unit::TableClose | Unit::CellBreak if depth == 0 => {
                    self.cursor = i;
                    return;
                }
                Unit::TableClose => depth -= 1,
                Unit::Char('\n') if depth == 0 => {
                    self.cursor = i + 1;
                    return;
                }
                _ => {}
            }
        }
        self.cursor = self.units.len();
    }

    fn find(&mut self, needle: &str, direction: Direction) -> bool {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() || needle.len() > self.units.len() {
            return false;
        }
        let matches_at = |start: usize| {
            needle
                .iter()
                .enumerate()
                .all(|(k, c)| self.units[start + k].search_char() == Some(*c))
        };
        let last_start = self.units.len() - needle.len();
        let found = match direction {
            Direction::Forward => (self.cursor..=last_start).find(|&s| matches_at(s)),
            Direction::Backward => {
                let upper = self.cursor.checked_sub(needle.len());
                upper.and_then(|u| (0..=u.min(last_start)).rev().find(|&s| matches_at(s)))
            }
        };
        let Some(start) = found else {
            return false;
        };
        let end = start + needle.len();
        self.selection = Some((start, end));
        self.cursor = match direction {
            Direction::Forward => end,
            Direction::Backward => start,
        };
        true
    }
}

impl DocumentTarget for MemoryDocument {
    fn insert_text(&mut self, text: &str) -> Result<(), TargetError> {
        self.gate("InsertText")?;
        self.log.push(Primitive::InsertText { text: text.to_string() });
        self.insert_units(text.chars().map(Unit::Char).collect());
        Ok(())
    }

    fn run(&mut self, command: Command) -> Result<bool, TargetError> {
        self.gate(command.as_str())?;
        self.log.push(Primitive::Run { command });
        Ok(self.command(command))
    }

    fn apply_char_shape(&mut self, shape: &CharShape) -> Result<(), TargetError> {
        self.gate("CharShape")?;
        self.log.push(Primitive::CharShape { shape: shape.clone() });
        self.char_shape.merge(shape);
        Ok(())
    }

    fn apply_para_shape(&mut self, shape: &ParaShape) -> Result<(), TargetError> {
        self.gate("ParagraphShape")?;
        self.log.push(Primitive::ParaShape { shape: *shape });
        Ok(())
    }

    fn apply_cell_format(&mut self, format: &CellFormat) -> Result<(), TargetError> {
        self.gate("CellBorderFill")?;
        self.log.push(Primitive::CellFormat { format: *format });
        if self.enclosing_open(self.cursor).is_none() {
            return Err(TargetError::action("CellBorderFill", "cursor is not in a table"));
        }
        Ok(())
    }

    fn create_table(&mut self, rows: u32, cols: u32) -> Result<(), TargetError> {
        self.gate("TableCreate")?;
        self.log.push(Primitive::CreateTable { rows, cols });
        let cells = match rows.checked_mul(cols) {
            Some(cells) if (1..=MAX_TABLE_CELLS).contains(&cells) => cells as usize,
            _ => return Err(TargetError::action("TableCreate", format!("unsupported table size {rows}x{cols}"))),
        };
        self.delete_selection();
        let mut units = Vec::with_capacity(cells + 2);
        units.push(Unit::TableOpen { cols });
        units.extend(std::iter::repeat(Unit::CellBreak).take(cells - 1));
        units.push(Unit::TableClose);
        let start = self.cursor;
        let end = start + units.len();
        self.units.splice(start..start, units);
        if self.units.get(end) != Some(&Unit::Char('\n')) {
            self.units.insert(end, Unit::Char('\n'));
        }
        self.cursor = start + 1;
        Ok(())
    }

    fn create_equation(&mut self, spec: &EquationSpec) -> Result<(), TargetError> {
        self.gate("EquationCreate")?;
        self.log.push(Primitive::CreateEquation { spec: spec.clone() });
        self.delete_selection();
        self.units.insert(self.cursor, Unit::Equation(spec.text.clone()));
        self.selection = Some((self.cursor, self.cursor + 1));
        Ok(())
    }

    fn set_object_anchor(&mut self, treat_as_char: bool) -> Result<(), TargetError> {
        self.gate("ShapeObject")?;
        self.log.push(Primitive::ObjectAnchor { treat_as_char });
        match self.selection {
            Some((start, _)) if matches!(self.units[start], Unit::Equation(_)) => Ok(()),
            _ => Err(TargetError::action("ShapeObject", "no object selected")),
        }
    }

    fn insert_fragment(&mut self, path: &Path) -> Result<bool, TargetError> {
        self.gate("InsertFile")?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.log.push(Primitive::InsertFragment { name: name.clone() });
        match self.fragments.get(&name) {
            Some(units) => {
                let units = units.clone();
                self.insert_units(units);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_text(&mut self, needle: &str, direction: Direction) -> Result<bool, TargetError> {
        self.gate("RepeatFind")?;
        self.log.push(Primitive::FindText {
            needle: needle.to_string(),
            direction,
        });
        Ok(self.find(needle, direction))
    }

    fn document_identity(&mut self) -> Result<Option<String>, TargetError> {
        if self.disconnected {
            return Err(TargetError::SessionUnavailable(UNAVAILABLE.to_string()));
        }
        Ok(Some(self.name.clone()))
    }
}

// ============================================================================
// Shared handle and connector
// ============================================================================

/// A document shared between a session and an observer (tests, CLI).
#[derive(Debug, Clone, Default)]
pub struct SharedDocument(Arc<Mutex<MemoryDocument>>);

impl SharedDocument {
    pub fn new(document: MemoryDocument) -> Self {
        Self(Arc::new(Mutex::new(document)))
    }

    fn lock(&self) -> MutexGuard<'_, MemoryDocument> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the document locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut MemoryDocument) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn text(&self) -> String {
        self.lock().text()
    }

    pub fn log(&self) -> Vec<Primitive> {
        self.lock().log().to_vec()
    }
}

impl DocumentTarget for SharedDocument {
    fn insert_text(&mut self, text: &str) -> Result<(), TargetError> {
        self.lock().insert_text(text)
    }

    fn run(&mut self, command: Command) -> Result<bool, TargetError> {
        self.lock().run(command)
    }

    fn apply_char_shape(&mut self, shape: &CharShape) -> Result<(), TargetError> {
        self.lock().apply_char_shape(shape)
    }

    fn apply_para_shape(&mut self, shape: &ParaShape) -> Result<(), TargetError> {
        self.lock().apply_para_shape(shape)
    }

    fn apply_cell_format(&mut self, format: &CellFormat) -> Result<(), TargetError> {
        self.lock().apply_cell_format(format)
    }

    fn create_table(&mut self, rows: u32, cols: u32) -> Result<(), TargetError> {
        self.lock().create_table(rows, cols)
    }

    fn create_equation(&mut self, spec: &EquationSpec) -> Result<(), TargetError> {
        self.lock().create_equation(spec)
    }

    fn set_object_anchor(&mut self, treat_as_char: bool) -> Result<(), TargetError> {
        self.lock().set_object_anchor(treat_as_char)
    }

    fn insert_fragment(&mut self, path: &Path) -> Result<bool, TargetError> {
        self.lock().insert_fragment(path)
    }

    fn find_text(&mut self, needle: &str, direction: Direction) -> Result<bool, TargetError> {
        self.lock().find_text(needle, direction)
    }

    fn document_identity(&mut self) -> Result<Option<String>, TargetError> {
        self.lock().document_identity()
    }
}

/// Connects sessions to one shared in-memory document.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    document: SharedDocument,
    revive: bool,
}

impl MemoryConnector {
    pub fn new(document: SharedDocument) -> Self {
        Self { document, revive: true }
    }

    /// Reattaching does not bring a dead session back.
    pub fn without_revive(mut self) -> Self {
        self.revive = false;
        self
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }
}

impl TargetConnector for MemoryConnector {
    fn connect(&mut self, document: Option<&str>) -> Result<Box<dyn DocumentTarget>, TargetError> {
        self.document.with(|doc| {
            if self.revive {
                doc.revive();
            }
            if doc.is_disconnected() {
                return Err(TargetError::SessionUnavailable(UNAVAILABLE.to_string()));
            }
            if let Some(name) = document {
                if name != doc.name() {
                    return Err(TargetError::DocumentNotFound(name.to_string()));
                }
            }
            doc.attachments += 1;
            Ok(())
        })?;
        Ok(Box::new(self.document.clone()))
    }
}
