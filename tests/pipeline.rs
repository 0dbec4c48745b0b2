//! End-to-end: raw generated text through normalizer, interpreter and
//! composer into the in-memory document.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

use layout_typist::layout_script::Tier;
use layout_typist::{
    CancelToken, ComposeSettings, MemoryConnector, MemoryDocument, PassthroughBridge, RunError, RunReport, Session,
    SharedDocument,
};

fn session(doc: &SharedDocument) -> Session {
    Session::new(
        Box::new(MemoryConnector::new(doc.clone())),
        ComposeSettings::default(),
        Arc::new(PassthroughBridge),
    )
}

fn type_script(script: &str) -> (String, Result<RunReport, RunError>) {
    let doc = SharedDocument::new(MemoryDocument::with_standard_fragments("question.hwp"));
    let mut session = session(&doc);
    let outcome = session.run_script(script, None, &CancelToken::new());
    (doc.text(), outcome)
}

#[test]
fn test_fenced_concatenated_script() {
    let script = "```python\ninsert_text('1. 다음 중 옳은 것은?') + insert_enter()\ninsert_text('① 가')\n```";
    let (text, outcome) = type_script(script);
    let report = outcome.unwrap();
    assert_eq!(report.tier, Tier::Primary);
    assert_eq!(report.applied, 3);
    assert_eq!(text, "1. 다음 중 옳은 것은?\n① 가");
}

#[test]
fn test_unclosed_container_is_closed() {
    let script = "insert_box()\ninsert_text('조건')\ninsert_enter()\ninsert_enter()";
    let (text, outcome) = type_script(script);
    let report = outcome.unwrap();
    assert!(report.normalized.ends_with("exit_box()"));
    assert_eq!(text, "[ 조건]\n");
}

#[test]
fn test_table_with_equation_cell() {
    let script = "insert_text('표')\ninsert_enter()\ninsert_table(2, 2, ['1', 'EQ: x^2', '3', '4'])\ninsert_text('끝')";
    let (text, outcome) = type_script(script);
    outcome.unwrap();
    assert_eq!(text, "표\n [1|$x^2$|3|4]\n끝");
}

#[test]
fn test_structural_damage_uses_fallback_tier() {
    let (text, outcome) = type_script("insert_text('a') oops\ninsert_enter()\ninsert_text('b')");
    let report = outcome.unwrap();
    assert_eq!(report.tier, Tier::Fallback);
    assert_eq!(text, "a\nb");
}

#[test]
fn test_header_template_flow() {
    let script = "insert_template('header.hwp')\n\
                  focus_placeholder('@@@')\n\
                  insert_text('조건')\n\
                  focus_placeholder('###')\n\
                  insert_text('ㄱ. a')\n\
                  exit_box()\n\
                  focus_placeholder('&&&')\n\
                  insert_text('① ㄱ')";
    let (text, outcome) = type_script(script);
    outcome.unwrap();
    assert_eq!(text, "조건\n[ ㄱ. a]\n① ㄱ");
}

#[test]
fn test_empty_script_types_nothing() {
    let (text, outcome) = type_script("```\n```");
    assert_eq!(outcome.unwrap().applied, 0);
    assert_eq!(text, "");
}

#[test]
fn test_invalid_argument_stops_the_script() {
    let (text, outcome) = type_script("insert_text('a')\ninsert_table(0, 2)\ninsert_text('b')");
    match outcome.unwrap_err() {
        RunError::OperationFailed { index, .. } => assert_eq!(index, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(text, "a");
}

fn call() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z가-힣 ]{0,6}".prop_map(|s| format!("insert_text('{s}')")),
        "[a-z^0-9+ ]{0,6}".prop_map(|s| format!("insert_equation('{s}')")),
        Just("insert_enter()".to_string()),
        Just("insert_space()".to_string()),
        Just("insert_box()".to_string()),
        Just("insert_view_box()".to_string()),
        Just("exit_box()".to_string()),
        Just("insert_template('box.hwp')".to_string()),
        Just("focus_placeholder('###')".to_string()),
        Just("focus_placeholder('&&&')".to_string()),
        Just("set_align_right_next_line()".to_string()),
        Just("set_table_border_white()".to_string()),
        (-1i64..4, -1i64..4).prop_map(|(r, c)| format!("insert_table({r}, {c}, ['a', 'EQ: x'])")),
        "[(),'\"+ a-z]{0,8}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_arbitrary_scripts_never_panic(calls in prop::collection::vec(call(), 0..12)) {
        let script = calls.join("\n");
        let (text, outcome) = type_script(&script);
        if let Err(RunError::Unparseable(_)) = outcome {
            prop_assert_eq!(text, "");
        }
    }
}
