//! Table insertion: creation, cell filling and leaving the table.

use tracing::warn;

use layout_script::{EquationStyle, TableSpec};

use super::{ComposeError, Composer, PendingAlignment};
use crate::target::{CellFormat, CharShape, Command, DocumentTarget, ParaShape};

/// Cell values with this prefix are typed as equations.
pub const EQUATION_CELL_PREFIX: &str = "EQ:";

impl<T: DocumentTarget + ?Sized> Composer<'_, T> {
    pub(super) fn insert_table(&mut self, spec: &TableSpec) -> Result<(), ComposeError> {
        let (rows, cols) = match (u32::try_from(spec.rows), u32::try_from(spec.cols)) {
            (Ok(rows), Ok(cols)) if rows > 0 && cols > 0 => (rows, cols),
            _ => {
                return Err(ComposeError::Invalid(format!(
                    "table needs at least one row and one column, got {}x{}",
                    spec.rows, spec.cols
                )))
            }
        };

        if self.state.pending_alignment == PendingAlignment::None && self.state.wants_indent() {
            self.text(" ")?;
        }
        self.checkpoint()?;
        self.target.create_table(rows, cols)?;
        self.state.mark_written();
        let zero_margins = CellFormat {
            margins: Some(0),
            border_color: None,
        };
        self.best_effort("cell margins", |t| t.apply_cell_format(&zero_margins))?;

        self.fill_cells(spec, rows as usize, cols as usize)?;

        if spec.exit_after {
            self.exit_table()?;
            self.try_run(Command::ParagraphShapeAlignLeft)?;
            self.state.line_start = true;
            self.state.last_was_equation = false;
        }
        Ok(())
    }

    fn fill_cells(&mut self, spec: &TableSpec, rows: usize, cols: usize) -> Result<(), ComposeError> {
        for (r, row) in spec.cells.iter().take(rows).enumerate() {
            let mut moved_right = 0;
            for (c, value) in row.iter().take(cols).enumerate() {
                self.cell_style(spec.align_center)?;
                if let Some(equation) = value.strip_prefix(EQUATION_CELL_PREFIX) {
                    self.insert_equation(equation.trim(), &EquationStyle::default())?;
                } else {
                    self.insert_text(value)?;
                }
                if c + 1 < cols {
                    self.try_run(Command::TableRightCell)?;
                    moved_right += 1;
                }
            }
            if r + 1 < rows {
                self.try_run(Command::TableLowerCell)?;
                for _ in 0..moved_right {
                    self.try_run(Command::TableLeftCell)?;
                }
            }
        }
        Ok(())
    }

    fn cell_style(&mut self, align_center: bool) -> Result<(), ComposeError> {
        let shape = CharShape::font(&self.settings.equation_font, self.settings.box_font_size_pt);
        self.best_effort("cell text style", |t| t.apply_char_shape(&shape))?;
        self.best_effort("cell paragraph", |t| t.apply_para_shape(&ParaShape::compact()))?;
        if align_center {
            self.try_run(Command::ParagraphShapeAlignCenter)?;
        }
        Ok(())
    }

    /// Leave the table without adding a blank line. Failure is logged; the
    /// table itself is already complete.
    fn exit_table(&mut self) -> Result<(), ComposeError> {
        if self.try_run(Command::CloseEx)? {
            self.try_run(Command::MoveDown)?;
            return Ok(());
        }
        if self.try_run(Command::TableLowerCell)? && self.try_run(Command::CloseEx)? {
            self.try_run(Command::MoveDown)?;
            return Ok(());
        }
        warn!("could not leave table; cursor stays in its last cell");
        Ok(())
    }
}
