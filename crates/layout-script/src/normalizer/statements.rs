//! Statement-level passes: one call per line (pass 7) and text that is
//! really an equation (pass 8).

use tracing::debug;

use super::layout::score_points;
use super::line::{classify, Line};
use super::notation::{canonical_primes, looks_like_equation};
use crate::ast::OpName;
use crate::lexical::{render_call, split_call, split_top_level};

/// Pass 7: `insert_text('a') + insert_text('b')` (or `;`-joined calls)
/// become one call per line. Lines with fewer than two calls are left alone.
pub fn split_concatenated_calls(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let parts: Vec<&str> = split_top_level(&line, &['+', ';'])
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let calls = parts.iter().filter(|p| split_call(p).is_some()).count();
        if calls < 2 {
            out.push(line);
            continue;
        }
        out.extend(parts.into_iter().map(str::to_string));
    }
    out
}

/// Pass 8: promote `insert_text` literals written in equation notation.
pub fn promote_math_text(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| match classify(&line) {
            Line::Text(value) if looks_like_equation(&value) && score_points(&value).is_none() => {
                let promoted = render_call(OpName::InsertEquation, &canonical_primes(&value));
                debug!(from = %line, to = %promoted, "promoted text to equation");
                promoted
            }
            _ => line,
        })
        .collect()
}
