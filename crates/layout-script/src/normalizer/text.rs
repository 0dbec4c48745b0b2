//! Text-stage passes: they see the script as one string and repair its
//! physical shape before it is cut into logical lines.

use crate::ast::OpName;
use crate::lexical::{call_at, close_open_call, mentions_call, QuoteState};

/// Calls whose literal may legitimately span several physical lines.
const TEXT_CALLS: [OpName; 3] = [OpName::InsertText, OpName::InsertEquation, OpName::InsertLatexEquation];

const CODE_MARKERS: [&str; 3] = ["[CODE]", "[/CODE]", "CODE"];

// ============================================================================
// Pass 1: line endings and indentation
// ============================================================================

pub fn canonicalize_whitespace(text: &str) -> String {
    let unified = text
        .replace("\r\n", "\n")
        .replace(['\r', '\u{2028}', '\u{2029}'], "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let indent = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ============================================================================
// Pass 2: code fences
// ============================================================================

/// Fence and `[CODE]` marker lines are dropped wherever they appear; they
/// are never part of a script.
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|l| {
            let t = l.trim();
            !t.starts_with("```") && !CODE_MARKERS.contains(&t)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Pass 3: literals broken across lines
// ============================================================================

fn has_text_call(line: &str) -> bool {
    line.char_indices()
        .filter_map(|(i, _)| call_at(line, i))
        .any(|site| TEXT_CALLS.contains(&site.name))
}

pub fn join_multiline_literals(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let mut line = lines[i].to_string();
        i += 1;
        if !has_text_call(&line) {
            out.push(line);
            continue;
        }
        let mut state = QuoteState::scan(&line);
        while state.in_quote() && i < lines.len() {
            let next = lines[i].trim();
            i += 1;
            line.push(' ');
            line.push_str(next);
            state.feed(' ');
            state.feed_str(next);
        }
        if state.in_quote() {
            close_open_call(&mut line, &state);
        }
        out.push(line);
    }
    out.join("\n")
}

// ============================================================================
// Pass 4: newlines inside a call
// ============================================================================

/// One call per logical line: raw newlines inside a call's parentheses become
/// single spaces. A newline outside quotes that is followed by another call
/// closes the unterminated call instead of swallowing its neighbour.
pub fn fold_call_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut call: Option<QuoteState> = None;
    let mut pos = 0;
    while let Some(c) = text[pos..].chars().next() {
        let width = c.len_utf8();
        let Some(state) = call.as_mut() else {
            if c == '#' {
                let end = text[pos..].find('\n').map_or(text.len(), |n| pos + n);
                out.push_str(&text[pos..end]);
                pos = end;
                continue;
            }
            if let Some(site) = call_at(text, pos) {
                out.push_str(&text[pos..=site.open]);
                let mut state = QuoteState::default();
                state.feed('(');
                call = Some(state);
                pos = site.open + 1;
                continue;
            }
            out.push(c);
            pos += width;
            continue;
        };

        if c == '\n' {
            let rest = &text[pos + 1..];
            let next_start = rest.len() - rest.trim_start_matches([' ', '\t']).len();
            if !state.in_quote() && call_at(&rest[next_start..], 0).is_some() {
                close_open_call(&mut out, state);
                out.push('\n');
                call = None;
            } else {
                out.push(' ');
            }
            pos += 1 + next_start;
            continue;
        }
        out.push(c);
        state.feed(c);
        if !state.in_quote() && state.parens == 0 {
            call = None;
        }
        pos += width;
    }
    if let Some(state) = call {
        close_open_call(&mut out, &state);
    }
    out
}

// ============================================================================
// Pass 5: unterminated literal at end of line
// ============================================================================

pub fn close_unterminated_quotes(text: &str) -> String {
    text.lines()
        .map(|line| {
            let mut line = line.to_string();
            if mentions_call(&line) {
                let state = QuoteState::scan(&line);
                if state.in_quote() {
                    close_open_call(&mut line, &state);
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
