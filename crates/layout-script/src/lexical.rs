//! Quote-aware lexical helpers shared by the normalizer passes and both
//! interpreter tiers.
//!
//! Everything here works on raw script text and never fails: helpers return
//! `Option` when the text does not have the expected shape.

use crate::ast::OpName;

// ============================================================================
// Quote tracking
// ============================================================================

/// Incremental quote/escape/bracket state over a character stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteState {
    quote: Option<char>,
    escaped: bool,
    pub parens: usize,
    pub brackets: usize,
}

impl QuoteState {
    pub fn scan(text: &str) -> Self {
        let mut state = Self::default();
        state.feed_str(text);
        state
    }

    pub fn feed(&mut self, c: char) {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return;
        }
        match c {
            '\'' | '"' => self.quote = Some(c),
            '(' => self.parens += 1,
            ')' => self.parens = self.parens.saturating_sub(1),
            '[' => self.brackets += 1,
            ']' => self.brackets = self.brackets.saturating_sub(1),
            _ => {}
        }
    }

    pub fn feed_str(&mut self, text: &str) {
        text.chars().for_each(|c| self.feed(c));
    }

    /// The quote character of a literal still open, if any.
    pub fn open_quote(&self) -> Option<char> {
        self.quote
    }

    pub fn in_quote(&self) -> bool {
        self.quote.is_some()
    }

    pub fn at_top_level(&self) -> bool {
        self.quote.is_none() && self.parens == 0 && self.brackets == 0
    }

    /// True when the stream ends with an unpaired backslash inside a literal.
    pub fn escaped(&self) -> bool {
        self.escaped
    }
}

/// Close whatever `state` says is still open at the end of `text`: the
/// literal (with its own quote style), then brackets, then parentheses.
pub fn close_open_call(text: &mut String, state: &QuoteState) {
    if let Some(q) = state.open_quote() {
        if state.escaped() {
            text.pop();
        }
        text.push(q);
    }
    for _ in 0..state.brackets {
        text.push(']');
    }
    for _ in 0..state.parens {
        text.push(')');
    }
}

// ============================================================================
// String literals
// ============================================================================

/// Scan one string literal at the start of `src` (optional `r` prefix).
/// Returns the decoded value and the number of bytes consumed.
pub fn scan_string(src: &str) -> Option<(String, usize)> {
    let (raw, body) = match src.chars().next()? {
        'r' | 'R' => (true, 1),
        _ => (false, 0),
    };
    let mut chars = src.get(body..)?.char_indices();
    let (_, q) = chars.next()?;
    if q != '\'' && q != '"' {
        return None;
    }
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => return None,
            c if c == q => {
                let inner = &src[body + 1..body + i];
                let value = if raw { inner.to_string() } else { unescape(inner) };
                return Some((value, body + i + c.len_utf8()));
            }
            _ => {}
        }
    }
    None
}

/// Decode the escapes a literal may carry. Unknown escapes keep the backslash.
pub fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render `value` as a literal: single quotes unless the value contains a
/// single quote and no double quote.
pub fn quote(value: &str) -> String {
    let q = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(q);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

// ============================================================================
// Identifiers and calls
// ============================================================================

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte length of the identifier at the start of `text` (0 if none).
pub fn identifier_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !is_ident_char(*c))
        .map_or(text.len(), |(i, _)| i)
}

/// True when `pos` is not preceded by an identifier character.
pub fn is_boundary(text: &str, pos: usize) -> bool {
    text.get(..pos)
        .and_then(|head| head.chars().next_back())
        .map_or(true, |c| !is_ident_char(c))
}

/// A vocabulary call found in raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// Byte offset of the operation name.
    pub start: usize,
    pub name: OpName,
    /// Byte offset of the opening parenthesis.
    pub open: usize,
}

/// A vocabulary call starting exactly at `pos`, if there is one.
pub fn call_at(text: &str, pos: usize) -> Option<CallSite> {
    if !is_boundary(text, pos) {
        return None;
    }
    let rest = text.get(pos..)?;
    let len = identifier_len(rest);
    let name = OpName::from_name(&rest[..len])?;
    let after = &rest[len..];
    let trimmed = after.trim_start_matches([' ', '\t']);
    trimmed.starts_with('(').then(|| CallSite {
        start: pos,
        name,
        open: pos + len + (after.len() - trimmed.len()),
    })
}

/// True when `line` contains a vocabulary call anywhere.
pub fn mentions_call(line: &str) -> bool {
    line.char_indices().any(|(i, _)| call_at(line, i).is_some())
}

/// Byte offset one past the parenthesis closing the one at `open`; `None`
/// when the text ends first.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut state = QuoteState::default();
    for (i, c) in text.get(open..)?.char_indices() {
        state.feed(c);
        if c == ')' && !state.in_quote() && state.parens == 0 {
            return Some(open + i + 1);
        }
    }
    None
}

/// A statement of the exact form `name(args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallParts<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

pub fn split_call(line: &str) -> Option<CallParts<'_>> {
    let line = line.trim();
    let name_len = identifier_len(line);
    if name_len == 0 {
        return None;
    }
    let rest = line[name_len..].trim_start();
    let open = line.len() - rest.len();
    if !rest.starts_with('(') {
        return None;
    }
    let close = matching_paren(line, open)?;
    (close == line.len()).then(|| CallParts {
        name: &line[..name_len],
        args: &line[open + 1..close - 1],
    })
}

/// Leading string literal of an argument list plus the text after it, which
/// is empty or starts with a comma.
pub fn first_literal(args: &str) -> Option<(String, &str)> {
    let trimmed = args.trim_start();
    let (value, used) = scan_string(trimmed)?;
    let rest = &trimmed[used..];
    let after = rest.trim_start();
    (after.is_empty() || after.starts_with(',')).then_some((value, rest))
}

/// The decoded value when the argument list is exactly one string literal.
pub fn single_literal(args: &str) -> Option<String> {
    first_literal(args).and_then(|(value, rest)| rest.trim().is_empty().then_some(value))
}

/// Decoded literal of a whole-line `name('...')` call.
pub fn call_literal(line: &str, name: OpName) -> Option<String> {
    let parts = split_call(line)?;
    (parts.name == name.as_str()).then(|| single_literal(parts.args)).flatten()
}

pub fn render_call(name: OpName, value: &str) -> String {
    format!("{name}({})", quote(value))
}

/// Rewrite the leading literal of a call to one of `names` through `f`.
/// The line is re-rendered only when the decoded value actually changes.
pub fn rewrite_call_literal(line: &str, names: &[OpName], f: impl Fn(&str) -> String) -> String {
    let Some(parts) = split_call(line) else {
        return line.to_string();
    };
    let Some(name) = OpName::from_name(parts.name).filter(|n| names.contains(n)) else {
        return line.to_string();
    };
    let Some((value, rest)) = first_literal(parts.args) else {
        return line.to_string();
    };
    let rewritten = f(&value);
    if rewritten == value {
        return line.to_string();
    }
    format!("{name}({}{rest})", quote(&rewritten))
}

/// Split at any of `seps` outside literals, parentheses and brackets.
pub fn split_top_level<'a>(line: &'a str, seps: &[char]) -> Vec<&'a str> {
    let mut state = QuoteState::default();
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in line.char_indices() {
        if state.at_top_level() && seps.contains(&c) {
            parts.push(&line[start..i]);
            start = i + c.len_utf8();
            continue;
        }
        state.feed(c);
    }
    parts.push(&line[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_state_respects_other_style() {
        let state = QuoteState::scan(r#"insert_text("it's"#);
        assert_eq!(state.open_quote(), Some('"'));
        assert_eq!(state.parens, 1);

        let state = QuoteState::scan(r"insert_text('a\'b')");
        assert!(state.at_top_level());
    }

    #[test]
    fn test_close_open_call() {
        let mut line = String::from(r"insert_text('abc\");
        let state = QuoteState::scan(&line);
        close_open_call(&mut line, &state);
        assert_eq!(line, "insert_text('abc')");

        let mut line = String::from("insert_table(1, 2, ['a', 'b");
        let state = QuoteState::scan(&line);
        close_open_call(&mut line, &state);
        assert_eq!(line, "insert_table(1, 2, ['a', 'b'])");
    }

    #[test]
    fn test_scan_string_escapes() {
        assert_eq!(scan_string(r"'a\nb' tail"), Some(("a\nb".to_string(), 6)));
        assert_eq!(scan_string(r"r'\frac'"), Some((r"\frac".to_string(), 8)));
        assert_eq!(scan_string(r"'\pi'"), Some((r"\pi".to_string(), 5)));
        assert_eq!(scan_string("'open"), None);
    }

    #[test]
    fn test_quote_picks_style() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("F'=ma"), "\"F'=ma\"");
        assert_eq!(quote("both ' and \""), r#"'both \' and "'"#);
        assert_eq!(quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_quote_unescape_agree() {
        for value in ["x", "it's", "say \"hi\"", "tab\there", r"back\slash", "mix ' \""] {
            let rendered = quote(value);
            assert_eq!(unescape(&rendered[1..rendered.len() - 1]), value);
        }
    }

    #[test]
    fn test_call_detection_requires_boundary() {
        assert!(mentions_call("  insert_text ('a')"));
        assert!(!mentions_call("my_insert_text('a')"));
        assert!(!mentions_call("insert_text"));
        let site = call_at("x = insert_enter()", 4).unwrap();
        assert_eq!(site.name, OpName::InsertEnter);
        assert_eq!(site.open, 16);
    }

    #[test]
    fn test_split_call() {
        let parts = split_call("insert_text('a(b')").unwrap();
        assert_eq!(parts.name, "insert_text");
        assert_eq!(parts.args, "'a(b'");
        assert_eq!(split_call("insert_text('a') + insert_text('b')"), None);
        assert_eq!(call_literal("insert_text(\"x\")", OpName::InsertText), Some("x".to_string()));
    }

    #[test]
    fn test_rewrite_keeps_unchanged_lines() {
        let line = "insert_equation( 'x' , font_size_pt=10)";
        assert_eq!(rewrite_call_literal(line, &[OpName::InsertEquation], |v| v.to_string()), line);
        assert_eq!(
            rewrite_call_literal(line, &[OpName::InsertEquation], |v| format!("{v}'")),
            "insert_equation(\"x'\" , font_size_pt=10)"
        );
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("insert_text('a+b') + insert_text('c;d'); insert_enter()", &['+', ';']),
            vec!["insert_text('a+b') ", " insert_text('c;d')", " insert_enter()"]
        );
    }
}
