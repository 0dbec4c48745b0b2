//! Placeholder zone passes.
//!
//! Templates carry before/inside/after markers that must be consumed exactly
//! once and in that order. Scripts request them in any order, forget some and
//! repeat others; [`order_placeholders`] rewrites the request stream so the
//! composer only ever sees forward transitions, and [`place_after_zone`]
//! settles where the after zone is entered once the content is known.

use std::collections::BTreeSet;

use tracing::debug;

use super::line::{classify, focus_line, is_choice, is_list_item, pop_breaks, segments, Line, EXIT_BOX, OPEN_BOX};
use crate::ast::{Placeholder, TemplateFlavor, TemplateKind, Zone};

/// Zones reachable without a template: a pre-existing inside marker.
const AMBIENT_ZONES: &[Zone] = &[Zone::Inside];

// ============================================================================
// Pass 9: placeholder ordering
// ============================================================================

struct ZoneWalker {
    out: Vec<String>,
    template: Option<TemplateKind>,
    zones: &'static [Zone],
    current: Option<Zone>,
    consumed: BTreeSet<Zone>,
    /// Inside a template's inside zone.
    in_container: bool,
    /// Open `insert_box()` / `insert_view_box()` containers.
    plain_depth: usize,
    /// Header and plain templates requested together.
    dual: bool,
    /// Inside requests still ahead in the current header segment.
    inside_requests: usize,
}

impl ZoneWalker {
    fn new(dual: bool) -> Self {
        Self {
            out: Vec::new(),
            template: None,
            zones: AMBIENT_ZONES,
            current: None,
            consumed: BTreeSet::new(),
            in_container: false,
            plain_depth: 0,
            dual,
            inside_requests: 0,
        }
    }

    fn start_segment(&mut self, template: Option<TemplateKind>, inside_requests: usize) {
        self.template = template;
        self.zones = template.map_or(AMBIENT_ZONES, TemplateKind::zones);
        self.current = None;
        self.consumed.clear();
        self.inside_requests = inside_requests;
    }

    fn close_containers(&mut self) {
        for _ in 0..self.plain_depth {
            self.out.push(EXIT_BOX.to_string());
        }
        self.plain_depth = 0;
        if self.in_container {
            self.out.push(EXIT_BOX.to_string());
            self.in_container = false;
        }
    }

    fn enter(&mut self, zone: Zone) {
        self.out.push(focus_line(zone));
        self.consumed.insert(zone);
        self.current = Some(zone);
        self.in_container = zone == Zone::Inside;
    }

    /// Move forward to `zone`, consuming every skipped marker on the way.
    fn advance_to(&mut self, zone: Zone) {
        self.close_containers();
        let skipped: Vec<Zone> = self
            .zones
            .iter()
            .copied()
            .filter(|z| *z < zone && !self.consumed.contains(z))
            .collect();
        for z in skipped {
            debug!(zone = ?z, "consuming skipped zone");
            self.out.push(focus_line(z));
            self.consumed.insert(z);
            if z == Zone::Inside {
                self.out.push(EXIT_BOX.to_string());
            }
        }
        self.enter(zone);
    }

    fn focus(&mut self, zone: Zone, line: String) {
        if self.template.is_none() {
            if zone == Zone::Inside {
                self.out.push(line);
                self.in_container = true;
            } else {
                debug!(zone = ?zone, "dropping zone request without template");
            }
            return;
        }
        if zone == Zone::Inside {
            self.inside_requests = self.inside_requests.saturating_sub(1);
        }
        if !self.zones.contains(&zone) {
            debug!(zone = ?zone, "template has no such zone");
            return;
        }
        if self.consumed.contains(&zone) {
            if self.in_container && self.current.is_some_and(|c| zone < c) {
                self.close_containers();
            }
            debug!(zone = ?zone, "dropping repeated zone request");
            return;
        }
        // header + plain template: the first of several inside requests
        // becomes a plain container ahead of the header's own one
        if self.dual
            && zone == Zone::Inside
            && self.inside_requests >= 1
            && self.plain_depth == 0
            && self.current <= Some(Zone::Before)
        {
            debug!("routing first inside request to a plain container");
            self.out.push(OPEN_BOX.to_string());
            self.plain_depth += 1;
            return;
        }
        self.advance_to(zone);
    }

    fn content(&mut self, literal: &str, line: String) {
        let heuristics = self.template.is_some() && self.plain_depth == 0;
        if heuristics && is_list_item(literal) && self.current < Some(Zone::Inside) && self.zones.contains(&Zone::Inside) {
            let justify = matches!(self.out.last().map(|l| classify(l)), Some(Line::AlignJustify));
            let hoisted = if justify { self.out.pop() } else { None };
            debug!("list item before inside zone; entering it");
            self.advance_to(Zone::Inside);
            self.out.extend(hoisted);
        } else if heuristics && is_choice(literal) && self.current < Some(Zone::After) && self.zones.contains(&Zone::After) {
            debug!("choice before after zone; entering it");
            self.advance_to(Zone::After);
        }
        self.out.push(line);
    }

    fn process(&mut self, line: String, lookahead: &[String]) {
        match classify(&line) {
            Line::Template(kind) => {
                if self.dual && kind.is_some_and(|k| k.flavor() == TemplateFlavor::Plain) {
                    debug!(line = %line, "dropping plain template combined with header");
                    return;
                }
                self.close_containers();
                let inside_requests = lookahead
                    .iter()
                    .map(|l| classify(l))
                    .take_while(|l| !self.is_segment_start(l))
                    .filter(|l| l.zone() == Some(Zone::Inside))
                    .count();
                self.start_segment(kind, inside_requests);
                self.out.push(line);
                if kind.is_some() {
                    self.enter(Zone::Before);
                }
            }
            Line::Focus(Placeholder::Zone(zone)) => self.focus(zone, line),
            Line::Open(_) => {
                self.plain_depth += 1;
                self.out.push(line);
            }
            Line::Exit => {
                if self.plain_depth > 0 {
                    self.plain_depth -= 1;
                } else {
                    self.in_container = false;
                }
                self.out.push(line);
            }
            Line::Text(literal) | Line::Equation(literal) => self.content(&literal, line),
            _ => self.out.push(line),
        }
    }

    fn is_segment_start(&self, line: &Line) -> bool {
        match line {
            Line::Template(kind) => !(self.dual && kind.is_some_and(|k| k.flavor() == TemplateFlavor::Plain)),
            _ => false,
        }
    }
}

/// Pass 9: canonical before→inside→after consumption per template.
pub fn order_placeholders(lines: Vec<String>) -> Vec<String> {
    let templates: Vec<TemplateKind> = lines
        .iter()
        .filter_map(|l| match classify(l) {
            Line::Template(kind) => kind,
            _ => None,
        })
        .collect();
    let dual = templates.contains(&TemplateKind::Header)
        && templates.iter().any(|k| k.flavor() == TemplateFlavor::Plain);

    let mut walker = ZoneWalker::new(dual);
    for (i, line) in lines.iter().enumerate() {
        walker.process(line.clone(), &lines[i + 1..]);
    }
    walker.out
}

// ============================================================================
// Pass 17: after-zone placement
// ============================================================================

/// Index of the `exit_box()` closing the container entered at `from`.
fn closing_exit(lines: &[String], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, line) in lines.iter().enumerate().skip(from + 1) {
        match classify(line) {
            Line::Open(_) => depth += 1,
            Line::Exit if depth == 0 => return Some(i),
            Line::Exit => depth -= 1,
            Line::Template(_) => return None,
            _ => {}
        }
    }
    None
}

fn place_in_segment(mut seg: Vec<String>) -> Vec<String> {
    let template = match seg.first().map(|l| classify(l)) {
        Some(Line::Template(Some(kind))) => Some(kind),
        _ => None,
    };
    let is_after = |l: &String| classify(l).zone() == Some(Zone::After);
    let last_choice = seg
        .iter()
        .rposition(|l| classify(l).literal().is_some_and(is_choice));

    if let Some(last) = last_choice {
        let mut kept = Vec::with_capacity(seg.len());
        for (i, line) in seg.into_iter().enumerate() {
            if i > last && is_after(&line) {
                debug!("dropping after-zone request behind the choices");
                continue;
            }
            kept.push(line);
        }
        return kept;
    }

    seg.retain(|l| !is_after(l));
    let Some(kind) = template.filter(|k| k.zones().contains(&Zone::After)) else {
        return seg;
    };
    debug!(template = %kind, "moving after-zone request behind the container");
    let inside = seg.iter().position(|l| classify(l).zone() == Some(Zone::Inside));
    match inside.map(|i| (i, closing_exit(&seg, i))) {
        Some((_, Some(exit))) => seg.insert(exit + 1, focus_line(Zone::After)),
        Some((_, None)) => {
            pop_breaks(&mut seg);
            seg.push(EXIT_BOX.to_string());
            seg.push(focus_line(Zone::After));
        }
        None => {
            pop_breaks(&mut seg);
            seg.push(focus_line(Zone::Inside));
            seg.push(EXIT_BOX.to_string());
            seg.push(focus_line(Zone::After));
        }
    }
    seg
}

/// Pass 17: with choices, after-zone requests behind the last choice are
/// redundant; without choices the after zone is entered right after the
/// template's own container closes.
pub fn place_after_zone(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for range in segments(&lines) {
        out.extend(place_in_segment(lines[range].to_vec()));
    }
    out
}
