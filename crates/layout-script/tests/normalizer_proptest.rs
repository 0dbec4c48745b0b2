//! Property tests: the normalizer and both tiers are total over arbitrary
//! generator output.

use layout_script::lexical::{mentions_call, QuoteState};
use layout_script::{normalize, plan};
use proptest::prelude::*;

/// Fragments generators tend to emit, including broken ones.
fn arb_fragment() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("insert_text('"),
        Just("insert_equation("),
        Just("insert_latex_equation(r'"),
        Just("insert_table(2, 2, [['a', "),
        Just("insert_template('header.hwp')"),
        Just("insert_template('box.hwp')"),
        Just("focus_placeholder('###')"),
        Just("focus_placeholder('&&&')"),
        Just("focus_placeholder('@@@')"),
        Just("insert_box()"),
        Just("exit_box()"),
        Just("insert_enter()"),
        Just("ㄱ. "),
        Just("① "),
        Just("[3점]"),
        Just("{rm F}^{prime}"),
        Just("x^2 = 1"),
        Just("')"),
        Just("'"),
        Just("\""),
        Just("\\"),
        Just("("),
        Just(")"),
        Just("["),
        Just(" + "),
        Just("; "),
        Just("\n"),
        Just("```"),
        Just("# "),
        Just("word"),
    ]
}

fn arb_script() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..40).prop_map(|parts| parts.concat())
}

/// Well-formed lines without templates or containers.
fn arb_flat_line() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("insert_enter()"),
        Just("insert_text('a')"),
        Just("insert_text('[3점]')"),
        Just("insert_equation('x')"),
        Just("insert_space()"),
    ]
}

/// Well-formed lines mixing templates, zones, containers and score lines.
fn arb_layout_line() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("insert_template('header.hwp')"),
        Just("insert_template('box.hwp')"),
        Just("insert_template('box_white.hwp')"),
        Just("focus_placeholder('@@@')"),
        Just("focus_placeholder('###')"),
        Just("focus_placeholder('&&&')"),
        Just("insert_box()"),
        Just("insert_view_box()"),
        Just("exit_box()"),
        Just("insert_enter()"),
        Just("insert_text('q')"),
        Just("insert_text('조건: a')"),
        Just("insert_text('옳은 것만을 고른 것은?')"),
        Just("insert_text('ㄱ. a')"),
        Just("insert_text('ㄴ. b')"),
        Just("insert_text('① 1 ② 2')"),
        Just("insert_text('[3점]')"),
        Just("set_align_justify_next_line()"),
        Just("set_align_right_next_line()"),
    ]
}

proptest! {
    #[test]
    fn normalize_and_plan_never_panic(script in any::<String>()) {
        let normalized = normalize(&script);
        let _ = plan(&normalized);
    }

    #[test]
    fn normalize_and_plan_never_panic_on_fragments(script in arb_script()) {
        let normalized = normalize(&script);
        let _ = plan(&normalized);
    }

    #[test]
    fn call_lines_have_closed_literals(script in arb_script()) {
        let normalized = normalize(&script);
        for line in normalized.lines().filter(|l| mentions_call(l)) {
            prop_assert!(!QuoteState::scan(line).in_quote(), "open literal in {:?}", line);
        }
    }

    #[test]
    fn flat_scripts_normalize_idempotently(parts in prop::collection::vec(arb_flat_line(), 0..20)) {
        let once = normalize(&parts.join("\n"));
        prop_assert_eq!(normalize(&once), once);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn layout_scripts_normalize_idempotently(parts in prop::collection::vec(arb_layout_line(), 0..24)) {
        let once = normalize(&parts.join("\n"));
        prop_assert_eq!(normalize(&once), once);
    }
}
