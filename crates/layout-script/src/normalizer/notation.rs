//! Equation notation rules: prime canonicalization (pass 6) and the
//! "this text is really an equation" heuristic used by pass 8.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::OpName;
use crate::lexical::rewrite_call_literal;

const EQUATION_CALLS: [OpName; 2] = [OpName::InsertEquation, OpName::InsertLatexEquation];

// ============================================================================
// Prime patterns
// ============================================================================

static ESCAPED_PRIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\\+prime\b").unwrap());
static SUPERSCRIPT_PRIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^\s*\{\s*prime\s*\}|\^\s*prime\b").unwrap());
static ESCAPED_APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\+'").unwrap());
static ROMAN_BACKSLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brm\s*([A-Za-z])\s*\\([^A-Za-z]|$)").unwrap());
static ROMAN_F_APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brm\s*F\s*'").unwrap());
static ROMAN_F_PRIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\brm\s*F\s*prime\b").unwrap());
static ROMAN_SPACED_APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brm\s+([A-Za-z])'").unwrap());

const F_PRIME: &str = "rm F prime";

/// Map every prime spelling onto the apostrophe form; `rm F'` becomes the
/// fixed `rm F prime` spelling the equation engine renders correctly.
pub fn canonical_primes(value: &str) -> String {
    let s = value.replace(['′', '’'], "'");
    let s = ESCAPED_PRIME.replace_all(&s, "'");
    let s = SUPERSCRIPT_PRIME.replace_all(&s, "'");
    let s = ESCAPED_APOSTROPHE.replace_all(&s, "'");
    let s = ROMAN_BACKSLASH.replace_all(&s, "rm${1}'${2}");
    let s = bare_backslash_primes(&s);
    let s = ROMAN_F_APOSTROPHE.replace_all(&s, F_PRIME);
    let s = ROMAN_F_PRIME.replace_all(&s, F_PRIME);
    ROMAN_SPACED_APOSTROPHE.replace_all(&s, "rm${1}'").into_owned()
}

/// `f\` and `f\ ` used as a prime: a backslash after a letter that does not
/// start a command.
fn bare_backslash_primes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let after_letter = i > 0 && chars[i - 1].is_ascii_alphabetic();
            let before_letter = chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic());
            if c == '\\' && after_letter && !before_letter {
                '\''
            } else {
                c
            }
        })
        .collect()
}

/// Pass 6: canonical primes inside equation literals only.
pub fn normalize_equation_notation(text: &str) -> String {
    text.lines()
        .map(|line| rewrite_call_literal(line, &EQUATION_CALLS, canonical_primes))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Equation heuristic
// ============================================================================

const STRONG_MARKERS: [&str; 18] = [
    "{rm", "rm ", "{bold", "bold ", "vec{", "CDOT", "dint", "curl", "div", "LEFT", "RIGHT", "over", "sqrt", "it ",
    "SIM", "DEG", "ANGLE", "pi",
];

static EQUATION_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[=^_{}()]|CDOT|LEFT|RIGHT|dint|curl|div|vec|rm|bold").unwrap());

/// True when a text literal is written in the equation notation.
pub fn looks_like_equation(value: &str) -> bool {
    let s = value.trim();
    !s.is_empty() && STRONG_MARKERS.iter().any(|m| s.contains(m)) && EQUATION_SYNTAX.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prime_spellings() {
        assert_eq!(canonical_primes("f′(x)"), "f'(x)");
        assert_eq!(canonical_primes(r"f\prime (x)"), "f' (x)");
        assert_eq!(canonical_primes(r"f\\PRIME"), "f'");
        assert_eq!(canonical_primes("y^{prime}"), "y'");
        assert_eq!(canonical_primes("y ^ prime = 0"), "y ' = 0");
        assert_eq!(canonical_primes(r"g\'"), "g'");
        assert_eq!(canonical_primes(r"f\ (x)"), "f' (x)");
        assert_eq!(canonical_primes(r"\sqrt"), r"\sqrt");
        assert_eq!(canonical_primes("{rm F}^{prime}=ma"), "{rm F}'=ma");
    }

    #[test]
    fn test_roman_f_prime() {
        assert_eq!(canonical_primes("rm F ' = ma"), "rm F prime = ma");
        assert_eq!(canonical_primes(r"rmF\ =ma"), "rm F prime =ma");
        assert_eq!(canonical_primes("RM f PRIME"), "rm F prime");
        assert_eq!(canonical_primes("rm  x'"), "rmx'");
    }

    #[test]
    fn test_canonical_primes_is_stable() {
        for raw in ["{rm F}^{prime}", r"rm F\", "a\\\\b", r"x\'\prime", "rm G '", "f’’"] {
            let once = canonical_primes(raw);
            assert_eq!(canonical_primes(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_notation_only_touches_equation_calls() {
        let text = "insert_text('y^{prime}')\ninsert_equation('y^{prime}')";
        assert_eq!(
            normalize_equation_notation(text),
            "insert_text('y^{prime}')\ninsert_equation(\"y'\")"
        );
    }

    #[test]
    fn test_looks_like_equation() {
        assert!(looks_like_equation("{rm F}^{prime}=ma"));
        assert!(looks_like_equation("sqrt {2} over 2"));
        assert!(looks_like_equation("a CDOT b"));
        assert!(!looks_like_equation("다음 물음에 답하시오."));
        assert!(!looks_like_equation("a = b"));
        assert!(!looks_like_equation("   "));
    }
}
