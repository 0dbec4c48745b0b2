//! Composition engine: turns typed operations into primitive call sequences
//! against a document target, driven by `CompositionState`.
//!
//! Every primitive call is preceded by a cancellation check. Primitives come
//! in two strengths:
//! - required: any target error fails the operation
//! - best effort (alignment, shapes, cursor probes): a rejected action reads
//!   as "not done", but a lost session and cancellation still propagate
//!
//! The engine holds no state of its own; callers own the target and the
//! state and lend them for each operation.

mod state;
mod table;

pub use state::{CompositionState, PendingAlignment};

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use layout_script::{EquationStyle, Operation, Placeholder, TemplateFlavor, TemplateKind, Zone};

use crate::cancel::CancelToken;
use crate::config::TypistConfig;
use crate::equation::EquationBridge;
use crate::target::{
    CellFormat, CharShape, Command, Direction, DocumentTarget, EquationSpec, ParaShape, TargetError,
};

/// Template used by `insert_box` when present.
pub const PLAIN_CONTAINER_TEMPLATE: &str = "box_template_noheader.hwp";
/// Template used by `insert_view_box` when present.
pub const FRAMED_CONTAINER_TEMPLATE: &str = "box_template.hwp";
/// Header written into a framed container built without its template.
pub const FRAMED_LABEL: &str = "< 보 기 >";

const EQUATION_INDENT: &str = "  ";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("{0}")]
    Invalid(String),

    #[error("template not found: {}", .0.display())]
    TemplateMissing(PathBuf),
}

impl ComposeError {
    pub fn is_session_unavailable(&self) -> bool {
        matches!(self, ComposeError::Target(e) if e.is_session_unavailable())
    }
}

/// Values the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub template_dir: PathBuf,
    pub equation_font: String,
    pub equation_size_pt: f64,
    pub box_font_size_pt: f64,
    pub equation_timeout: Duration,
}

impl ComposeSettings {
    pub fn from_config(config: &TypistConfig) -> Self {
        Self {
            template_dir: config.template_dir.clone(),
            equation_font: config.equation_font.clone(),
            equation_size_pt: config.equation_size_pt,
            box_font_size_pt: config.box_font_size_pt,
            equation_timeout: config.converter.timeout(),
        }
    }
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self::from_config(&TypistConfig::default())
    }
}

pub struct Composer<'a, T: DocumentTarget + ?Sized> {
    target: &'a mut T,
    state: &'a mut CompositionState,
    settings: &'a ComposeSettings,
    bridge: &'a dyn EquationBridge,
    cancel: &'a CancelToken,
}

impl<'a, T: DocumentTarget + ?Sized> Composer<'a, T> {
    pub fn new(
        target: &'a mut T,
        state: &'a mut CompositionState,
        settings: &'a ComposeSettings,
        bridge: &'a dyn EquationBridge,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            target,
            state,
            settings,
            bridge,
            cancel,
        }
    }

    pub fn state(&self) -> &CompositionState {
        self.state
    }

    /// Apply one operation. When the session is lost mid-operation the state
    /// is restored, so the operation can be replayed after reattaching.
    pub fn apply(&mut self, op: &Operation) -> Result<(), ComposeError> {
        self.checkpoint()?;
        debug!(op = %op.name(), "applying operation");
        let before = self.state.clone();
        let result = self.dispatch(op);
        if matches!(&result, Err(e) if e.is_session_unavailable()) {
            *self.state = before;
        }
        result
    }

    fn dispatch(&mut self, op: &Operation) -> Result<(), ComposeError> {
        match op {
            Operation::InsertText { text } => self.insert_text(text),
            Operation::InsertEquation { text, style } => self.insert_equation(text, style),
            Operation::InsertLatexEquation { latex, style } => {
                let text = self.bridge.convert(latex, self.settings.equation_timeout);
                self.insert_equation(&text, style)
            }
            Operation::BreakLine => self.break_line(),
            Operation::InsertParagraph => {
                self.break_line()?;
                self.insert_space()
            }
            // Legacy spacer: accepted, types nothing.
            Operation::InsertSmallParagraph => Ok(()),
            Operation::InsertSpace => self.insert_space(),
            Operation::OpenContainer => self.open_container(false),
            Operation::OpenFramedContainer => self.open_container(true),
            Operation::CloseContainer => self.close_container(),
            Operation::InsertTemplate { template } => self.insert_template(*template),
            Operation::FocusPlaceholder { placeholder } => self.focus_placeholder(placeholder),
            Operation::InsertTable(spec) => self.insert_table(spec),
            Operation::SetBold { enabled } => {
                self.char_shape(&CharShape {
                    bold: Some(*enabled),
                    ..CharShape::default()
                })?;
                self.state.bold = *enabled;
                Ok(())
            }
            Operation::SetUnderline { enabled } => {
                let enabled = enabled.unwrap_or(!self.state.underline);
                self.char_shape(&CharShape {
                    underline: Some(enabled),
                    ..CharShape::default()
                })?;
                self.state.underline = enabled;
                Ok(())
            }
            Operation::SetCharWidthRatio { percent } => self.char_shape(&CharShape {
                width_ratio: Some(*percent),
                ..CharShape::default()
            }),
            Operation::SetBorderInvisible => {
                self.checkpoint()?;
                self.target.apply_cell_format(&CellFormat {
                    margins: None,
                    border_color: Some(0xFF_FF_FF),
                })?;
                Ok(())
            }
            Operation::AlignRightNextLine => {
                self.state.pending_alignment = PendingAlignment::Right;
                Ok(())
            }
            Operation::AlignJustifyNextLine => {
                self.state.pending_alignment = PendingAlignment::Justify;
                Ok(())
            }
        }
    }

    // ========================================================================
    // Primitive helpers
    // ========================================================================

    fn checkpoint(&self) -> Result<(), ComposeError> {
        if self.cancel.is_cancelled() {
            return Err(ComposeError::Cancelled);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ComposeError> {
        if text.is_empty() {
            return Ok(());
        }
        self.checkpoint()?;
        self.target.insert_text(text)?;
        Ok(())
    }

    fn run(&mut self, command: Command) -> Result<bool, ComposeError> {
        self.checkpoint()?;
        Ok(self.target.run(command)?)
    }

    fn try_run(&mut self, command: Command) -> Result<bool, ComposeError> {
        match self.run(command) {
            Err(ComposeError::Target(TargetError::Action { message, .. })) => {
                debug!(%command, %message, "best-effort command rejected");
                Ok(false)
            }
            other => other,
        }
    }

    fn best_effort(
        &mut self,
        what: &'static str,
        f: impl FnOnce(&mut T) -> Result<(), TargetError>,
    ) -> Result<(), ComposeError> {
        self.checkpoint()?;
        match f(&mut *self.target) {
            Err(e) if !e.is_session_unavailable() => {
                debug!(what, error = %e, "best-effort primitive failed");
                Ok(())
            }
            other => Ok(other?),
        }
    }

    fn char_shape(&mut self, shape: &CharShape) -> Result<(), ComposeError> {
        self.checkpoint()?;
        self.target.apply_char_shape(shape)?;
        Ok(())
    }

    fn box_text_style(&mut self) -> Result<(), ComposeError> {
        let shape = CharShape::font(&self.settings.equation_font, self.settings.box_font_size_pt);
        self.best_effort("box text style", |t| t.apply_char_shape(&shape))
    }

    fn compact_paragraph(&mut self) -> Result<(), ComposeError> {
        self.best_effort("compact paragraph", |t| t.apply_para_shape(&ParaShape::compact()))
    }

    fn insert_fragment(&mut self, path: &Path) -> Result<bool, ComposeError> {
        self.checkpoint()?;
        Ok(self.target.insert_fragment(path)?)
    }

    /// Select the first needle found searching forward from the cursor.
    fn find_any(&mut self, needles: &[String]) -> Result<bool, ComposeError> {
        for needle in needles {
            self.checkpoint()?;
            match self.target.find_text(needle, Direction::Forward) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_session_unavailable() => return Err(e.into()),
                Err(e) => debug!(needle = %needle, error = %e, "search failed"),
            }
        }
        Ok(false)
    }

    /// Apply the pending one-shot alignment if the cursor is at line start.
    fn apply_pending_alignment(&mut self) -> Result<PendingAlignment, ComposeError> {
        let alignment = self.state.take_alignment();
        if let Some(command) = alignment.command() {
            self.try_run(command)?;
        }
        Ok(alignment)
    }

    // ========================================================================
    // Text and breaks
    // ========================================================================

    fn insert_text(&mut self, text: &str) -> Result<(), ComposeError> {
        if text.is_empty() {
            return Ok(());
        }
        let text = match text.strip_prefix("\\t").or_else(|| text.strip_prefix("/t")) {
            Some(rest) => format!("\t{rest}"),
            None => text.to_string(),
        };
        if self.state.line_start && text.starts_with('\t') && self.state.has_written_first_line {
            self.break_line()?;
        }

        let alignment = self.apply_pending_alignment()?;
        let mut run = text.as_str();
        if alignment == PendingAlignment::Right {
            run = run.trim_start_matches([' ', '\t']);
        }
        if self.state.last_was_equation {
            run = run.strip_prefix(' ').unwrap_or(run);
        }
        let indented;
        // a run that brings its own space leaves the flag for the next one
        if self.state.inside_container && self.state.container_line_start && !run.starts_with(' ') {
            self.state.container_line_start = false;
            indented = format!(" {run}");
            run = &indented;
        }

        self.text(run)?;
        self.state.mark_written();
        self.state.last_was_equation = false;
        Ok(())
    }

    fn insert_space(&mut self) -> Result<(), ComposeError> {
        self.text(" ")?;
        self.state.mark_written();
        self.state.last_was_equation = false;
        Ok(())
    }

    fn break_line(&mut self) -> Result<(), ComposeError> {
        self.run(Command::BreakPara)?;
        self.after_break()
    }

    fn after_break(&mut self) -> Result<(), ComposeError> {
        if self.state.inside_container {
            self.state.container_line_start = false;
        }
        self.state.line_start = true;
        self.state.last_was_equation = false;
        if std::mem::take(&mut self.state.line_alignment).is_set() {
            self.try_run(Command::ParagraphShapeAlignLeft)?;
        }
        Ok(())
    }

    // ========================================================================
    // Equations
    // ========================================================================

    fn insert_equation(&mut self, text: &str, style: &EquationStyle) -> Result<(), ComposeError> {
        let mut content = text;
        if self.state.line_start && content.starts_with('\t') {
            self.insert_text("\t")?;
            content = content.trim_start_matches('\t');
        }

        let alignment = self.apply_pending_alignment()?;
        if alignment != PendingAlignment::Right && self.state.wants_indent() {
            self.text(EQUATION_INDENT)?;
            self.state.line_start = false;
        }

        let ensure_newline = style.ensure_newline.unwrap_or(false);
        let content = content.trim();
        if !content.is_empty() {
            let size_pt = style.font_size_pt.unwrap_or(self.settings.equation_size_pt);
            let spec = EquationSpec {
                text: content.to_string(),
                font_name: self.settings.equation_font.clone(),
                base_unit: (size_pt.max(0.0) * 100.0).round() as u32,
                treat_as_char: style.treat_as_char.unwrap_or(true),
            };
            self.checkpoint()?;
            self.target.create_equation(&spec)?;
            self.checkpoint()?;
            self.target.set_object_anchor(spec.treat_as_char)?;
            self.run(Command::Cancel)?;
            self.run(Command::MoveRight)?;
            if ensure_newline {
                self.break_line()?;
            }
        }

        self.state.has_written_first_line = true;
        self.state.line_start = ensure_newline && !content.is_empty();
        // The trailing break belongs to the equation: the next text run still
        // follows an equation.
        self.state.last_was_equation = true;
        Ok(())
    }

    // ========================================================================
    // Containers
    // ========================================================================

    fn open_container(&mut self, framed: bool) -> Result<(), ComposeError> {
        let template = if framed {
            FRAMED_CONTAINER_TEMPLATE
        } else {
            PLAIN_CONTAINER_TEMPLATE
        };
        let path = self.settings.template_dir.join(template);
        if self.insert_fragment(&path)? {
            if !self.try_run(Command::MoveToCell)? {
                warn!(template, "cursor did not enter template cell; creating container directly");
                self.raw_container()?;
            }
        } else {
            debug!(template, "container template unavailable; creating container directly");
            if !self.state.pending_alignment.is_set() && self.state.wants_indent() {
                self.text(" ")?;
            }
            self.raw_container()?;
            if framed {
                self.try_run(Command::ParagraphShapeAlignCenter)?;
                self.box_text_style()?;
                self.text(FRAMED_LABEL)?;
                self.run(Command::BreakPara)?;
                self.try_run(Command::ParagraphShapeAlignLeft)?;
            }
        }

        self.state.inside_container = true;
        self.state.container_line_start = true;
        self.state.mark_written();
        self.box_text_style()?;
        self.compact_paragraph()?;
        if framed {
            self.try_run(Command::ParagraphShapeAlignJustify)?;
        }
        Ok(())
    }

    fn raw_container(&mut self) -> Result<(), ComposeError> {
        self.checkpoint()?;
        self.target.create_table(1, 1)?;
        self.try_run(Command::MoveToCell)?;
        Ok(())
    }

    fn close_container(&mut self) -> Result<(), ComposeError> {
        let closed = if self.try_run(Command::CloseEx)? {
            self.try_run(Command::MoveDown)?;
            true
        } else if self.try_run(Command::TableLowerCell)? {
            self.try_run(Command::MoveDown)?;
            true
        } else {
            false
        };
        self.state.leave_container();
        if !closed {
            return Err(ComposeError::Invalid("cursor is not inside a container".to_string()));
        }
        self.state.line_start = true;
        self.state.last_was_equation = false;
        Ok(())
    }

    // ========================================================================
    // Templates and placeholders
    // ========================================================================

    fn insert_template(&mut self, kind: TemplateKind) -> Result<(), ComposeError> {
        let path = self.settings.template_dir.join(kind.file_name());
        if !self.insert_fragment(&path)? {
            return Err(ComposeError::TemplateMissing(path));
        }
        if kind.flavor() == TemplateFlavor::Plain {
            // A stale after marker would capture a later after-zone focus.
            self.try_run(Command::MoveDocBegin)?;
            if self.find_any(&Zone::After.marker_variants())? {
                self.try_run(Command::Delete)?;
            }
            self.try_run(Command::MoveDocBegin)?;
        }
        Ok(())
    }

    fn focus_placeholder(&mut self, placeholder: &Placeholder) -> Result<(), ComposeError> {
        let (zone, needles) = match placeholder {
            Placeholder::Zone(zone) => (Some(*zone), zone.marker_variants().to_vec()),
            Placeholder::Custom(marker) => (None, vec![marker.clone()]),
        };

        let mut found = self.find_any(&needles)?;
        if !found {
            if zone == Some(Zone::After) {
                debug!("after marker already consumed; typing at cursor");
                self.enter_zone(zone);
                return Ok(());
            }
            self.try_run(Command::MoveDocBegin)?;
            found = self.find_any(&needles)?;
        }

        if found {
            if !self.try_run(Command::Delete)? {
                self.try_run(Command::DeleteBack)?;
            }
        } else if zone == Some(Zone::Inside) && self.try_run(Command::MoveToCell)? {
            debug!("inside marker missing; entered container cell directly");
        } else {
            warn!(marker = %needles[0], "placeholder not found; typing at cursor");
        }
        self.enter_zone(zone);
        Ok(())
    }

    fn enter_zone(&mut self, zone: Option<Zone>) {
        self.state.line_start = true;
        self.state.last_was_equation = false;
        match zone {
            Some(Zone::Inside) => {
                self.state.inside_container = true;
                self.state.container_line_start = true;
            }
            Some(Zone::Before) | Some(Zone::After) => self.state.leave_container(),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::PassthroughBridge;
    use crate::target::memory::{MemoryDocument, Primitive};
    use pretty_assertions::assert_eq;

    struct Harness {
        doc: MemoryDocument,
        state: CompositionState,
        settings: ComposeSettings,
        cancel: CancelToken,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                doc: MemoryDocument::with_standard_fragments("test.hwp"),
                state: CompositionState::default(),
                settings: ComposeSettings::default(),
                cancel: CancelToken::new(),
            }
        }

        fn apply(&mut self, ops: &[Operation]) -> Result<(), ComposeError> {
            let mut composer = Composer::new(
                &mut self.doc,
                &mut self.state,
                &self.settings,
                &PassthroughBridge,
                &self.cancel,
            );
            ops.iter().try_for_each(|op| composer.apply(op))
        }
    }

    fn text(s: &str) -> Operation {
        Operation::InsertText { text: s.to_string() }
    }

    fn equation(s: &str) -> Operation {
        Operation::InsertEquation {
            text: s.to_string(),
            style: EquationStyle::default(),
        }
    }

    fn focus(zone: Zone) -> Operation {
        Operation::FocusPlaceholder {
            placeholder: Placeholder::Zone(zone),
        }
    }

    #[test]
    fn test_equation_indent_after_first_line() {
        let mut h = Harness::new();
        h.apply(&[text("1. 문제"), Operation::BreakLine, equation("x^2"), text(" 의 값")])
            .unwrap();
        assert_eq!(h.doc.text(), "1. 문제\n  $x^2$의 값");
        assert!(h.doc.log().iter().any(|p| matches!(
            p,
            Primitive::CreateEquation { spec } if spec.base_unit == 800 && spec.font_name == "HyhwpEQ"
        )));
    }

    #[test]
    fn test_first_line_equation_not_indented() {
        let mut h = Harness::new();
        h.apply(&[equation("a+b")]).unwrap();
        assert_eq!(h.doc.text(), "$a+b$");
        assert!(h.state.last_was_equation);
    }

    #[test]
    fn test_right_alignment_is_one_shot() {
        let mut h = Harness::new();
        h.apply(&[
            text("body"),
            Operation::BreakLine,
            Operation::AlignRightNextLine,
            text("  [3점]"),
            Operation::BreakLine,
            text("next"),
        ])
        .unwrap();
        assert_eq!(h.doc.text(), "body\n[3점]\nnext");
        let aligns: Vec<Command> = h
            .doc
            .log()
            .iter()
            .filter_map(|p| match p {
                Primitive::Run { command } if command.as_str().starts_with("ParagraphShapeAlign") => Some(*command),
                _ => None,
            })
            .collect();
        assert_eq!(
            aligns,
            vec![Command::ParagraphShapeAlignRight, Command::ParagraphShapeAlignLeft]
        );
    }

    #[test]
    fn test_tab_prefix_breaks_before() {
        let mut h = Harness::new();
        h.apply(&[text("a"), Operation::BreakLine, text("\\tindented")]).unwrap();
        assert_eq!(h.doc.text(), "a\n\n\tindented");
    }

    #[test]
    fn test_container_line_gets_one_space() {
        let mut h = Harness::new();
        h.apply(&[
            Operation::OpenContainer,
            text("first"),
            Operation::BreakLine,
            text("second"),
            Operation::CloseContainer,
            text("after"),
        ])
        .unwrap();
        assert_eq!(h.doc.text(), "[ first\nsecond]\nafter");
        assert!(!h.state.inside_container);
    }

    #[test]
    fn test_container_spaced_run_keeps_line_start() {
        let mut h = Harness::new();
        h.apply(&[Operation::OpenContainer, text(" a")]).unwrap();
        assert!(h.state.container_line_start);
        h.apply(&[text("b"), Operation::CloseContainer]).unwrap();
        assert_eq!(h.doc.text(), "[ a b]\n");
    }

    #[test]
    fn test_raw_framed_container_writes_label() {
        let mut h = Harness::new();
        h.doc = MemoryDocument::new("bare.hwp");
        h.apply(&[Operation::OpenFramedContainer, text("ㄱ. a"), Operation::CloseContainer])
            .unwrap();
        assert_eq!(h.doc.text(), "[< 보 기 >\n ㄱ. a]\n");
    }

    #[test]
    fn test_close_without_container_fails() {
        let mut h = Harness::new();
        let err = h.apply(&[text("x"), Operation::CloseContainer]).unwrap_err();
        assert!(matches!(err, ComposeError::Invalid(_)));
    }

    #[test]
    fn test_header_template_zones() {
        let mut h = Harness::new();
        h.apply(&[
            Operation::InsertTemplate {
                template: TemplateKind::Header,
            },
            focus(Zone::Before),
            text("조건"),
            focus(Zone::Inside),
            text("ㄱ. a"),
            Operation::CloseContainer,
            focus(Zone::After),
            text("① ㄱ"),
        ])
        .unwrap();
        assert_eq!(h.doc.text(), "조건\n[ ㄱ. a]\n① ㄱ");
    }

    #[test]
    fn test_plain_template_after_marker_cleaned() {
        let mut h = Harness::new();
        h.apply(&[
            Operation::InsertTemplate {
                template: TemplateKind::Box,
            },
            focus(Zone::Before),
            text("q"),
            focus(Zone::Inside),
            text("c"),
            Operation::CloseContainer,
            focus(Zone::After),
            text("① 1"),
        ])
        .unwrap();
        assert_eq!(h.doc.text(), "q\n[ c]\n① 1");
    }

    #[test]
    fn test_missing_template_fails() {
        let mut h = Harness::new();
        h.doc = MemoryDocument::new("bare.hwp");
        let err = h
            .apply(&[Operation::InsertTemplate {
                template: TemplateKind::Header,
            }])
            .unwrap_err();
        assert!(matches!(err, ComposeError::TemplateMissing(p) if p.ends_with("header.hwp")));
    }

    #[test]
    fn test_underline_toggles() {
        let mut h = Harness::new();
        h.apply(&[Operation::SetUnderline { enabled: None }]).unwrap();
        assert!(h.state.underline);
        h.apply(&[Operation::SetUnderline { enabled: None }]).unwrap();
        assert!(!h.state.underline);
        assert_eq!(h.doc.char_shape().underline, Some(false));
    }

    #[test]
    fn test_cancelled_before_any_primitive() {
        let mut h = Harness::new();
        h.cancel.cancel();
        let err = h.apply(&[text("x")]).unwrap_err();
        assert!(matches!(err, ComposeError::Cancelled));
        assert!(h.doc.log().is_empty());
    }

    #[test]
    fn test_equation_with_newline_still_trims_next_space() {
        let mut h = Harness::new();
        let eq = Operation::InsertEquation {
            text: "x".to_string(),
            style: EquationStyle {
                ensure_newline: Some(true),
                ..EquationStyle::default()
            },
        };
        h.apply(&[eq]).unwrap();
        assert!(h.state.line_start);
        assert!(h.state.last_was_equation);
        h.apply(&[text(" y")]).unwrap();
        assert_eq!(h.doc.text(), "$x$\ny");
        assert!(!h.state.last_was_equation);
    }

    #[test]
    fn test_space_after_equation_kept() {
        let mut h = Harness::new();
        h.apply(&[equation("x"), Operation::InsertSpace, text("y")]).unwrap();
        assert_eq!(h.doc.text(), "$x$ y");
    }
}
