//! Line layout passes: score lines, tab indicators and choice glyphs.

use once_cell::sync::Lazy;
use regex::Regex;

use super::line::{classify, Line, ALIGN_RIGHT, ENTER, SPACE};
use crate::ast::OpName;
use crate::lexical::render_call;

static SCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[\s*(\d+)\s*점\s*\]\s*$").unwrap());

/// Point value of a score literal such as `[3점]`.
pub fn score_points(literal: &str) -> Option<u32> {
    SCORE.captures(literal).and_then(|c| c[1].parse().ok())
}

// ============================================================================
// Pass 14: score lines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterScore {
    Idle,
    /// Score written; the next line must start after exactly one break.
    AwaitingBreak,
    /// The break was emitted; further breaks are swallowed.
    Collapsing,
}

pub fn isolate_score_lines(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    let mut state = AfterScore::Idle;
    for line in lines {
        let kind = classify(&line);
        if let Some(points) = kind.literal().and_then(score_points) {
            while out
                .last()
                .is_some_and(|l| matches!(classify(l), Line::Break | Line::AlignRight))
            {
                out.pop();
            }
            if out.last().is_some_and(|l| classify(l) != Line::Exit) {
                out.push(ENTER.to_string());
            }
            out.push(ALIGN_RIGHT.to_string());
            out.push(render_call(OpName::InsertText, &format!("[{points}점]")));
            state = AfterScore::AwaitingBreak;
            continue;
        }
        match (kind, state) {
            (Line::Break, AfterScore::AwaitingBreak) => {
                out.push(ENTER.to_string());
                state = AfterScore::Collapsing;
                continue;
            }
            (Line::Break, AfterScore::Collapsing) => continue,
            (Line::Break, AfterScore::Idle) => {}
            (Line::Exit | Line::Focus(_) | Line::Template(_), _) => state = AfterScore::Idle,
            (_, AfterScore::AwaitingBreak) => {
                out.push(ENTER.to_string());
                state = AfterScore::Idle;
            }
            _ => state = AfterScore::Idle,
        }
        out.push(line);
    }
    out
}

// ============================================================================
// Pass 15: tab indicators
// ============================================================================

fn is_tab_indicator(literal: &str) -> bool {
    matches!(literal, "\t" | "\\t" | "/t")
}

/// A tab only matters as the left indent of an equation.
pub fn prune_tab_indicators(lines: Vec<String>) -> Vec<String> {
    let kinds: Vec<Line> = lines.iter().map(|l| classify(l)).collect();
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| match &kinds[i] {
            Line::Text(v) if is_tab_indicator(v) && !matches!(kinds.get(i + 1), Some(Line::Equation(_))) => {
                SPACE.to_string()
            }
            _ => line,
        })
        .collect()
}

// ============================================================================
// Pass 16: choice glyphs
// ============================================================================

const CHOICE_GLYPHS: [char; 10] = ['①', '②', '③', '④', '⑤', '⑥', '⑦', '⑧', '⑨', '⑩'];

pub fn strip_choice_leading_space(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| match classify(&line) {
            Line::Text(v) if v.starts_with(char::is_whitespace) && is_single_glyph(v.trim()) => {
                render_call(OpName::InsertText, v.trim())
            }
            _ => line,
        })
        .collect()
}

fn is_single_glyph(value: &str) -> bool {
    let mut chars = value.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if CHOICE_GLYPHS.contains(&c))
}
