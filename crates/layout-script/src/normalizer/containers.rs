//! Container passes: compaction inside containers, break elision after a
//! close, and closing plain containers the script left open.

use tracing::debug;

use super::line::{classify, pop_breaks, Line, ENTER, EXIT_BOX};
use crate::ast::Zone;

/// Nesting as the composer will see it: plain containers nest inside an
/// entered inside zone.
#[derive(Debug, Default)]
struct Nesting {
    plain_depth: usize,
    in_zone: bool,
}

impl Nesting {
    fn inside(&self) -> bool {
        self.plain_depth > 0 || self.in_zone
    }

    fn observe(&mut self, line: &Line) {
        match line {
            Line::Open(_) => self.plain_depth += 1,
            Line::Exit if self.plain_depth > 0 => self.plain_depth -= 1,
            Line::Exit => self.in_zone = false,
            Line::Focus(_) => self.in_zone = line.zone() == Some(Zone::Inside),
            Line::Template(_) => self.in_zone = false,
            _ => {}
        }
    }
}

/// Pass 11: at most one break in a row inside containers, none right before
/// the close.
pub fn compact_container_breaks(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut nesting = Nesting::default();
    for line in lines {
        let kind = classify(&line);
        match kind {
            Line::Break if nesting.inside() => {
                if out.last().is_some_and(|l| classify(l).is_break()) {
                    continue;
                }
                out.push(ENTER.to_string());
                continue;
            }
            Line::Exit if nesting.inside() => pop_breaks(&mut out),
            _ => {}
        }
        nesting.observe(&kind);
        out.push(line);
    }
    out
}

/// Pass 12: closing a container already moves below it.
pub fn drop_break_after_exit(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if classify(&line).is_break() && out.last().is_some_and(|l| classify(l) == Line::Exit) {
            continue;
        }
        out.push(line);
    }
    out
}

/// Pass 13: close plain containers before a zone transition or at the end.
pub fn close_open_containers(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut depth = 0usize;
    let close = |out: &mut Vec<String>, depth: &mut usize| {
        if *depth > 0 {
            debug!(depth = *depth, "closing unclosed plain container");
            pop_breaks(out);
            out.extend(std::iter::repeat(EXIT_BOX.to_string()).take(*depth));
            *depth = 0;
        }
    };
    for line in lines {
        match classify(&line) {
            Line::Open(_) => depth += 1,
            Line::Exit => depth = depth.saturating_sub(1),
            Line::Template(_) => close(&mut out, &mut depth),
            l if l.zone().is_some() => close(&mut out, &mut depth),
            _ => {}
        }
        out.push(line);
    }
    close(&mut out, &mut depth);
    out
}
