//! Fallback interpreter tier: a tolerant scanner for scripts the grammar
//! rejects.
//!
//! The scanner looks for vocabulary calls anywhere in the text outside string
//! literals and the argument lists of other calls, captures each argument list with quote and depth awareness (running to the end of input
//! when the call is never closed) and coerces the arguments. Well-formed
//! argument lists go through the same literal grammar and coercion as the
//! primary tier; anything else gets a best-effort reading per parameter.
//! A call whose arguments cannot be coerced is logged and skipped.

use tracing::{debug, warn};

use crate::ast::{Arg, Invocation, OpName, Operation};
use crate::error::{ArgumentError, ParseFailure};
use crate::lexical::{identifier_len, is_boundary, is_ident_char, matching_paren, scan_string, split_top_level, unescape};
use crate::parser::parse_arguments;
use crate::source::{OperationSource, Step, Tier};

#[derive(Debug, Clone)]
pub struct TolerantScanner {
    /// Vocabulary names, longest first.
    names: Vec<OpName>,
}

impl Default for TolerantScanner {
    fn default() -> Self {
        let mut names = OpName::ALL.to_vec();
        names.sort_by_key(|n| std::cmp::Reverse(n.as_str().len()));
        Self { names }
    }
}

impl TolerantScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest vocabulary name starting at `pos`, followed by `(`.
    fn call_at(&self, text: &str, pos: usize) -> Option<(OpName, usize)> {
        if !is_boundary(text, pos) {
            return None;
        }
        let rest = &text[pos..];
        self.names.iter().copied().find_map(|name| {
            let after = rest.strip_prefix(name.as_str())?;
            if after.starts_with(is_ident_char) {
                return None;
            }
            let trimmed = after.trim_start_matches([' ', '\t']);
            trimmed
                .starts_with('(')
                .then(|| (name, text.len() - trimmed.len()))
        })
    }

    /// Every vocabulary call in `script`, in order, with its raw arguments.
    pub fn calls<'a>(&self, script: &'a str) -> Vec<(OpName, &'a str)> {
        let mut calls = Vec::new();
        let mut pos = 0;
        while let Some(c) = script[pos..].chars().next() {
            if c == '#' {
                pos = line_end(script, pos);
                continue;
            }
            let Some((name, open)) = self.call_at(script, pos) else {
                pos = skip_inert(script, pos).unwrap_or(pos + c.len_utf8());
                continue;
            };
            match matching_paren(script, open) {
                Some(end) => {
                    calls.push((name, &script[open + 1..end - 1]));
                    pos = end;
                }
                None => {
                    calls.push((name, &script[open + 1..]));
                    pos = script.len();
                }
            }
        }
        calls
    }

    pub fn scan(&self, script: &str) -> Result<Vec<Operation>, ParseFailure> {
        let calls = self.calls(script);
        if calls.is_empty() && !script.trim().is_empty() {
            return Err(ParseFailure::at(script, 0, "no operation calls found"));
        }
        let mut ops = Vec::with_capacity(calls.len());
        for (name, raw) in calls {
            match coerce(name, raw) {
                Ok(op) => ops.push(op),
                Err(error) => warn!(%error, raw, "skipping call with unusable arguments"),
            }
        }
        Ok(ops)
    }
}

fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |n| pos + n)
}

/// End of the string literal or non-vocabulary call starting at `pos`, or of
/// the plain word there. Names inside literals and foreign calls are inert;
/// an unterminated one runs to the end of its line.
fn skip_inert(text: &str, pos: usize) -> Option<usize> {
    if !is_boundary(text, pos) {
        return None;
    }
    let rest = &text[pos..];
    let raw_prefix = rest.starts_with(['r', 'R']) && rest[1..].starts_with(['\'', '"']);
    if rest.starts_with(['\'', '"']) || raw_prefix {
        return Some(scan_string(rest).map_or_else(|| line_end(text, pos), |(_, used)| pos + used));
    }
    let len = identifier_len(rest);
    if len == 0 {
        return None;
    }
    let trimmed = rest[len..].trim_start_matches([' ', '\t']);
    if !trimmed.starts_with('(') {
        return Some(pos + len);
    }
    let open = text.len() - trimmed.len();
    debug!(name = &rest[..len], "skipping call outside the vocabulary");
    Some(matching_paren(text, open).unwrap_or_else(|| line_end(text, open)))
}

impl OperationSource for TolerantScanner {
    fn tier(&self) -> Tier {
        Tier::Fallback
    }

    fn produce(&self, script: &str) -> Result<Vec<Step>, ParseFailure> {
        Ok(self.scan(script)?.into_iter().map(Ok).collect())
    }
}

// ============================================================================
// Coercion
// ============================================================================

fn coerce(name: OpName, raw: &str) -> Result<Operation, ArgumentError> {
    let invocation = match parse_arguments(raw) {
        Ok((args, kwargs)) => Invocation { name, args, kwargs },
        Err(failure) => {
            debug!(%name, %failure, "reading arguments loosely");
            loose_invocation(name, raw)?
        }
    };
    Operation::from_invocation(&invocation)
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Bool,
    Int,
    Float,
    Cells,
}

fn param_kinds(name: OpName) -> &'static [Kind] {
    match name {
        OpName::InsertText | OpName::InsertTemplate | OpName::FocusPlaceholder => &[Kind::Str],
        OpName::InsertEquation | OpName::InsertLatexEquation => &[Kind::Str, Kind::Float, Kind::Bool, Kind::Bool],
        OpName::InsertTable => &[Kind::Int, Kind::Int, Kind::Cells, Kind::Bool, Kind::Bool],
        OpName::SetBold | OpName::SetUnderline => &[Kind::Bool],
        OpName::SetCharWidthRatio => &[Kind::Int],
        _ => &[],
    }
}

/// Split `key=value` from a raw argument; `==` is not a keyword.
fn keyword(part: &str) -> Option<(&str, &str)> {
    let len = identifier_len(part);
    if len == 0 {
        return None;
    }
    let rest = part[len..].trim_start().strip_prefix('=')?;
    (!rest.starts_with('=')).then(|| (&part[..len], rest.trim()))
}

fn loose_invocation(name: OpName, raw: &str) -> Result<Invocation, ArgumentError> {
    let params = name.params();
    let kinds = param_kinds(name);
    if kinds.is_empty() {
        return Ok(Invocation::new(name, Vec::new()));
    }
    // a single string parameter takes the whole text, commas included
    let parts: Vec<&str> = if kinds.len() == 1 && matches!(kinds[0], Kind::Str) {
        vec![raw.trim()]
    } else {
        split_top_level(raw, &[',']).into_iter().map(str::trim).collect()
    };

    let mut slots: Vec<Option<&str>> = vec![None; params.len()];
    let mut next = 0;
    for part in parts {
        match keyword(part).and_then(|(k, v)| params.iter().position(|p| *p == k).map(|i| (i, v))) {
            Some((idx, value)) => slots[idx] = Some(value),
            None if next < slots.len() => {
                slots[next] = Some(part);
                next += 1;
            }
            None => {}
        }
    }

    let mut args = Vec::with_capacity(slots.len());
    for (idx, (slot, kind)) in slots.iter().zip(kinds).enumerate() {
        let arg = match slot {
            None => Arg::None,
            Some(text) => loose_value(name, params[idx], *kind, text)?,
        };
        args.push(arg);
    }
    while args.last() == Some(&Arg::None) {
        args.pop();
    }
    Ok(Invocation::new(name, args))
}

fn loose_value(op: OpName, param: &'static str, kind: Kind, text: &str) -> Result<Arg, ArgumentError> {
    let type_error = |expected: &'static str| ArgumentError::Type {
        op,
        param,
        expected,
        found: format!("{text:?}"),
    };
    let text = text.trim();
    match kind {
        Kind::Str => Ok(Arg::Str(loose_string(text))),
        Kind::Bool if text.is_empty() || text.eq_ignore_ascii_case("none") => Ok(Arg::None),
        Kind::Bool => Ok(Arg::Bool(text.to_lowercase().contains("true"))),
        Kind::Int => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Arg::Int(v.trunc() as i64))
            .ok_or_else(|| type_error("int")),
        Kind::Float => text
            .parse::<f64>()
            .map(Arg::Float)
            .map_err(|_| type_error("float")),
        Kind::Cells => match parse_arguments(text) {
            Ok((mut args, kwargs)) if args.len() == 1 && kwargs.is_empty() => Ok(args.remove(0)),
            _ => Err(type_error("list")),
        },
    }
}

/// A quoted literal, the rest of an unterminated one, or the raw text.
fn loose_string(text: &str) -> String {
    if let Some((value, _)) = scan_string(text) {
        return value;
    }
    let body = text.strip_prefix(['r', 'R']).filter(|b| b.starts_with(['\'', '"'])).unwrap_or(text);
    match body.chars().next() {
        Some(q @ ('\'' | '"')) => {
            let inner = &body[1..];
            unescape(inner.strip_suffix(q).unwrap_or(inner))
        }
        _ => text.to_string(),
    }
}
