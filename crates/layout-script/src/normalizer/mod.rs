//! Script normalizer: an ordered pipeline of pure, idempotent passes.
//!
//! The first passes repair the physical text (line endings, fences, broken
//! literals, calls spread over several lines). After that the script is cut
//! into trimmed, non-empty logical lines and the remaining passes rewrite the
//! line list: splitting joined calls, promoting equations, ordering
//! placeholder zones, shaping containers and score lines.
//!
//! Every pass is total: a line it cannot classify is passed through
//! unchanged. Late passes move lines next to patterns earlier passes already
//! tidied, so [`Normalizer::run`] repeats the table until the script stops
//! changing. Running the whole pipeline on its own output changes nothing.

pub mod containers;
pub mod dual;
pub mod layout;
pub mod line;
pub mod notation;
pub mod statements;
pub mod text;
pub mod zones;

use tracing::{debug, warn};

pub type TextPass = fn(&str) -> String;
pub type LinePass = fn(Vec<String>) -> Vec<String>;

#[derive(Clone, Copy)]
pub enum PassFn {
    /// Operates on the raw script text.
    Text(TextPass),
    /// Operates on trimmed, non-empty logical lines.
    Lines(LinePass),
}

/// A named normalization step.
#[derive(Clone, Copy)]
pub struct Pass {
    pub name: &'static str,
    pub apply: PassFn,
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass").field("name", &self.name).finish()
    }
}

const fn text(name: &'static str, f: TextPass) -> Pass {
    Pass {
        name,
        apply: PassFn::Text(f),
    }
}

const fn lines(name: &'static str, f: LinePass) -> Pass {
    Pass {
        name,
        apply: PassFn::Lines(f),
    }
}

/// The pipeline, in required order.
pub const PASSES: [Pass; 17] = [
    text("canonicalize_whitespace", text::canonicalize_whitespace),
    text("strip_code_fences", text::strip_code_fences),
    text("join_multiline_literals", text::join_multiline_literals),
    text("fold_call_newlines", text::fold_call_newlines),
    text("close_unterminated_quotes", text::close_unterminated_quotes),
    text("normalize_equation_notation", notation::normalize_equation_notation),
    lines("split_concatenated_calls", statements::split_concatenated_calls),
    lines("promote_math_text", statements::promote_math_text),
    lines("order_placeholders", zones::order_placeholders),
    lines("split_dual_content", dual::split_dual_content),
    lines("compact_container_breaks", containers::compact_container_breaks),
    lines("drop_break_after_exit", containers::drop_break_after_exit),
    lines("close_open_containers", containers::close_open_containers),
    lines("isolate_score_lines", layout::isolate_score_lines),
    lines("prune_tab_indicators", layout::prune_tab_indicators),
    lines("strip_choice_leading_space", layout::strip_choice_leading_space),
    lines("place_after_zone", zones::place_after_zone),
];

/// Rounds of the full pass table before giving up on a fixed point.
pub const MAX_ROUNDS: usize = 8;

fn to_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs a sequence of passes over a script.
#[derive(Debug, Clone)]
pub struct Normalizer {
    passes: Vec<Pass>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            passes: PASSES.to_vec(),
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline restricted to the named passes, keeping pipeline order.
    pub fn only(names: &[&str]) -> Self {
        Self {
            passes: PASSES.iter().copied().filter(|p| names.contains(&p.name)).collect(),
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Apply the passes until the script reaches a fixed point.
    pub fn run(&self, script: &str) -> String {
        let mut current = self.run_once(script);
        for round in 1..MAX_ROUNDS {
            let next = self.run_once(&current);
            if next == current {
                return current;
            }
            debug!(round, "normalizer output still changing");
            current = next;
        }
        warn!(rounds = MAX_ROUNDS, "normalizer did not settle");
        current
    }

    /// One pass over the table.
    pub fn run_once(&self, script: &str) -> String {
        let mut text = script.to_string();
        let mut staged: Option<Vec<String>> = None;
        for pass in &self.passes {
            match pass.apply {
                PassFn::Text(f) => {
                    let input = staged.take().map_or(text, |l| l.join("\n"));
                    let output = f(&input);
                    if output != input {
                        debug!(pass = pass.name, "normalizer pass rewrote script");
                    }
                    text = output;
                }
                PassFn::Lines(f) => {
                    let input = staged.take().unwrap_or_else(|| to_lines(&text));
                    let before = input.len();
                    let output = f(input);
                    if output.len() != before {
                        debug!(pass = pass.name, before, after = output.len(), "normalizer pass changed line count");
                    }
                    staged = Some(output);
                    text = String::new();
                }
            }
        }
        match staged {
            Some(lines) => lines.join("\n"),
            None => text,
        }
    }
}

/// Normalize a script with the full pipeline.
pub fn normalize(script: &str) -> String {
    Normalizer::default().run(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pass_order() {
        let names: Vec<&str> = PASSES.iter().map(|p| p.name).collect();
        assert_eq!(names.first(), Some(&"canonicalize_whitespace"));
        assert_eq!(names.last(), Some(&"place_after_zone"));
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn test_normalize_fenced_script() {
        let raw = "```python\ninsert_text('a') + insert_text('b')\n\n\ninsert_enter()\n```";
        assert_eq!(normalize(raw), "insert_text('a')\ninsert_text('b')\ninsert_enter()");
    }

    #[test]
    fn test_only_runs_selected_passes() {
        let normalizer = Normalizer::only(&["strip_code_fences"]);
        assert_eq!(normalizer.passes().len(), 1);
        assert_eq!(normalizer.run("```\ninsert_enter()\n```"), "insert_enter()");
    }

    #[test]
    fn test_after_zone_move_settles_score_breaks() {
        let raw = "insert_template('header.hwp')\ninsert_text('ㄱ. a')\nfocus_placeholder('@@@')\ninsert_text('[3점]')";
        let once = normalize(raw);
        assert_eq!(normalize(&once), once);
        assert!(once.ends_with("set_align_right_next_line()\ninsert_text('[3점]')"));
    }

    #[test]
    fn test_after_zone_move_settles_exit_breaks() {
        let raw = "insert_template('box.hwp')\ninsert_box()\ninsert_text('a')\nexit_box()\nfocus_placeholder('&&&')\ninsert_enter()\ninsert_text('b')";
        let once = normalize(raw);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_run_once_is_a_single_round() {
        let raw = "insert_text('a')\ninsert_enter()";
        assert_eq!(Normalizer::new().run_once(raw), normalize(raw));
    }

    #[test]
    fn test_empty_script() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\r\n  \n"), "");
    }
}
