//! Pass 10: condition text and list items sharing one header container.
//!
//! When everything was typed into the header template's inside zone, the
//! block is split: condition text goes into a plain container of its own,
//! the question sentence stays outside any container, and only the list
//! items remain in the header's container. The question boundary is a
//! phrase heuristic and can misclassify unusual wording.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::line::{classify, focus_line, is_list_item, Line, ALIGN_JUSTIFY, ENTER, EXIT_BOX, OPEN_BOX};
use crate::ast::{OpName, Placeholder, TemplateKind, Zone};
use crate::lexical::split_call;

static QUESTION_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(이에\s*대한|것은\s*\??|것만을|옳은|옳지|<\s*보\s*기\s*>|보기>|바르게|짝지은|대로\s*고|고른|맞게|맞는|틀린|아닌|설명으로)",
    )
    .unwrap()
});

/// Paragraph-like spacing calls skipped while scanning for the question.
fn is_spacing(line: &str) -> bool {
    match split_call(line).and_then(|p| OpName::from_name(p.name)) {
        Some(OpName::InsertEnter | OpName::InsertParagraph | OpName::InsertSmallParagraph) => true,
        _ => line.trim().is_empty(),
    }
}

/// Formatting-only calls that belong to whichever section surrounds them.
fn is_formatting(line: &str) -> bool {
    matches!(classify(line), Line::AlignJustify)
        || split_call(line).is_some_and(|p| p.name == OpName::SetBold.as_str())
}

fn is_content(line: &Line) -> bool {
    matches!(line, Line::Text(_) | Line::Equation(_))
}

pub fn split_dual_content(lines: Vec<String>) -> Vec<String> {
    let classified: Vec<Line> = lines.iter().map(|l| classify(l)).collect();
    let Some(header) = classified.iter().position(|l| *l == Line::Template(Some(TemplateKind::Header))) else {
        return lines;
    };
    if classified.iter().any(|l| matches!(l, Line::Open(OpName::InsertBox))) {
        return lines;
    }
    let Some(inside) = classified
        .iter()
        .enumerate()
        .skip(header + 1)
        .find(|(_, l)| l.zone() == Some(Zone::Inside))
        .map(|(i, _)| i)
    else {
        return lines;
    };
    let end = classified
        .iter()
        .enumerate()
        .skip(inside + 1)
        .find(|(_, l)| matches!(l, Line::Exit | Line::Template(_) | Line::Focus(Placeholder::Zone(_))))
        .map_or(lines.len(), |(i, _)| i);

    let Some(first_item) = (inside + 1..end).find(|&i| matches!(&classified[i], Line::Text(v) if is_list_item(v))) else {
        return lines;
    };
    if !(inside + 1..first_item).any(|i| is_content(&classified[i])) {
        return lines;
    }

    // scan backward from the first item for the question sentence
    let mut question_start = first_item;
    let mut found_question = false;
    let mut i = first_item;
    while i > inside + 1 {
        i -= 1;
        if is_spacing(&lines[i]) {
            continue;
        }
        if is_formatting(&lines[i]) {
            if found_question {
                question_start = i;
            }
            continue;
        }
        match classified[i].literal() {
            Some(v) if QUESTION_TAIL.is_match(v) => {
                question_start = i;
                found_question = true;
            }
            _ => break,
        }
    }
    while question_start > inside + 1 && is_spacing(&lines[question_start - 1]) {
        question_start -= 1;
    }
    let mut condition_end = question_start;
    while condition_end > inside + 1 && is_spacing(&lines[condition_end - 1]) {
        condition_end -= 1;
    }
    if !(inside + 1..condition_end).any(|i| is_content(&classified[i])) {
        return lines;
    }
    debug!(condition_end, question_start, first_item, "splitting condition text out of header container");

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    out.extend_from_slice(&lines[..inside]);
    out.push(OPEN_BOX.to_string());
    out.extend_from_slice(&lines[inside + 1..condition_end]);
    out.push(EXIT_BOX.to_string());

    let mut has_question = false;
    for j in question_start..first_item {
        if matches!(classified[j], Line::AlignJustify) {
            continue;
        }
        has_question |= is_content(&classified[j]);
        out.push(lines[j].clone());
    }
    if has_question && !out.last().is_some_and(|l| is_spacing(l)) {
        out.push(ENTER.to_string());
    }

    out.push(focus_line(Zone::Inside));
    out.push(ALIGN_JUSTIFY.to_string());
    out.extend_from_slice(&lines[first_item..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_splits_condition_question_and_items() {
        let input = lines(&[
            "insert_template('header.hwp')",
            "focus_placeholder('@@@')",
            "focus_placeholder('###')",
            "set_align_justify_next_line()",
            "insert_text('ⓐ 조건 문장')",
            "insert_enter()",
            "insert_text('이에 대한 설명으로 옳은 것만을 고른 것은?')",
            "insert_enter()",
            "insert_text('ㄱ. 첫째')",
            "insert_enter()",
            "insert_text('ㄴ. 둘째')",
            "exit_box()",
            "focus_placeholder('&&&')",
        ]);
        assert_eq!(
            split_dual_content(input),
            lines(&[
                "insert_template('header.hwp')",
                "focus_placeholder('@@@')",
                "insert_box()",
                "set_align_justify_next_line()",
                "insert_text('ⓐ 조건 문장')",
                "exit_box()",
                "insert_enter()",
                "insert_text('이에 대한 설명으로 옳은 것만을 고른 것은?')",
                "insert_enter()",
                "focus_placeholder('###')",
                "set_align_justify_next_line()",
                "insert_text('ㄱ. 첫째')",
                "insert_enter()",
                "insert_text('ㄴ. 둘째')",
                "exit_box()",
                "focus_placeholder('&&&')",
            ])
        );
    }

    #[test]
    fn test_untouched_without_condition_text() {
        let input = lines(&[
            "insert_template('header.hwp')",
            "focus_placeholder('###')",
            "insert_text('옳은 것만을 고른 것은?')",
            "insert_text('ㄱ. a')",
            "exit_box()",
        ]);
        assert_eq!(split_dual_content(input.clone()), input);
    }

    #[test]
    fn test_untouched_when_plain_box_exists() {
        let input = lines(&[
            "insert_template('header.hwp')",
            "insert_box()",
            "focus_placeholder('###')",
            "insert_text('조건')",
            "insert_text('ㄱ. a')",
        ]);
        assert_eq!(split_dual_content(input.clone()), input);
    }
}
