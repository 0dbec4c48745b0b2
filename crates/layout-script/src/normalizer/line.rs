//! Line classification for the line-stage passes.

use crate::ast::{OpName, Placeholder, TemplateKind, Zone};
use crate::lexical::{self, split_call};

pub const ENTER: &str = "insert_enter()";
pub const SPACE: &str = "insert_space()";
pub const OPEN_BOX: &str = "insert_box()";
pub const EXIT_BOX: &str = "exit_box()";
pub const ALIGN_RIGHT: &str = "set_align_right_next_line()";
pub const ALIGN_JUSTIFY: &str = "set_align_justify_next_line()";

pub fn focus_line(zone: Zone) -> String {
    lexical::render_call(OpName::FocusPlaceholder, zone.marker())
}

/// What a normalized line does, as far as layout passes care.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// `insert_template(..)`; `None` when the name is not a known fragment.
    Template(Option<TemplateKind>),
    Focus(Placeholder),
    /// `insert_box()` or `insert_view_box()`.
    Open(OpName),
    Exit,
    Break,
    Text(String),
    Equation(String),
    AlignRight,
    AlignJustify,
    Space,
    Other,
}

impl Line {
    pub fn classify(line: &str) -> Self {
        let Some(parts) = split_call(line) else {
            return Line::Other;
        };
        let Some(name) = OpName::from_name(parts.name) else {
            return Line::Other;
        };
        let literal = || lexical::single_literal(parts.args);
        match name {
            OpName::InsertTemplate => Line::Template(literal().and_then(|n| TemplateKind::from_name(&n))),
            OpName::FocusPlaceholder => literal().map_or(Line::Other, |m| Line::Focus(Placeholder::from_marker(&m))),
            OpName::InsertBox | OpName::InsertViewBox => Line::Open(name),
            OpName::ExitBox => Line::Exit,
            OpName::InsertEnter => Line::Break,
            OpName::InsertText => literal().map_or(Line::Other, Line::Text),
            OpName::InsertEquation | OpName::InsertLatexEquation => literal().map_or(Line::Other, Line::Equation),
            OpName::SetAlignRightNextLine => Line::AlignRight,
            OpName::SetAlignJustifyNextLine => Line::AlignJustify,
            OpName::InsertSpace => Line::Space,
            _ => Line::Other,
        }
    }

    pub fn zone(&self) -> Option<Zone> {
        match self {
            Line::Focus(Placeholder::Zone(zone)) => Some(*zone),
            _ => None,
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Line::Break)
    }

    /// Decoded literal of a text or equation insertion.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Line::Text(v) | Line::Equation(v) => Some(v),
            _ => None,
        }
    }
}

pub fn classify(line: &str) -> Line {
    Line::classify(line)
}

pub fn is_break(line: &str) -> bool {
    classify(line).is_break()
}

/// Drop trailing paragraph breaks.
pub fn pop_breaks(out: &mut Vec<String>) {
    while out.last().is_some_and(|l| is_break(l)) {
        out.pop();
    }
}

/// Enumerated list-item glyph (`ㄱ.` .. `ㄹ.`) at the start of a literal.
pub fn is_list_item(literal: &str) -> bool {
    let t = literal.trim_start();
    ["ㄱ.", "ㄴ.", "ㄷ.", "ㄹ."].iter().any(|g| t.starts_with(g))
}

/// Choice glyph content (`①` and friends).
pub fn is_choice(literal: &str) -> bool {
    literal.contains('①')
}

/// Split lines into template segments: everything before the first template
/// line, then one segment per template line up to the next.
pub fn segments(lines: &[String]) -> Vec<std::ops::Range<usize>> {
    let mut starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| matches!(classify(l), Line::Template(_)))
        .map(|(i, _)| i)
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    let mut ranges = Vec::with_capacity(starts.len());
    for (n, start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(lines.len());
        ranges.push(*start..end);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_lines() {
        assert_eq!(classify("insert_template('header.hwp')"), Line::Template(Some(TemplateKind::Header)));
        assert_eq!(classify("insert_template('x.hwp')"), Line::Template(None));
        assert_eq!(classify("focus_placeholder('＃＃＃')"), Line::Focus(Placeholder::Zone(Zone::Inside)));
        assert_eq!(classify("insert_text('a')"), Line::Text("a".to_string()));
        assert_eq!(classify("insert_latex_equation('x')"), Line::Equation("x".to_string()));
        assert_eq!(classify("insert_view_box()"), Line::Open(OpName::InsertViewBox));
        assert_eq!(classify("insert_text(name)"), Line::Other);
        assert_eq!(classify("# comment"), Line::Other);
    }

    #[test]
    fn test_focus_line_renders_marker() {
        assert_eq!(focus_line(Zone::After), "focus_placeholder('&&&')");
    }

    #[test]
    fn test_segments() {
        let lines: Vec<String> = ["insert_text('a')", "insert_template('box.hwp')", "insert_enter()", "insert_template('header.hwp')"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(segments(&lines), vec![0..1, 1..3, 3..4]);
        assert_eq!(segments(&lines[1..]), vec![0..2, 2..3]);
        assert_eq!(segments(&[]), vec![0..0]);
    }
}
