//! Script model: the closed operation vocabulary, literal argument values and
//! the typed `Operation` handed to the composer.
//!
//! ## Layers
//!
//! ```text
//! script text → Invocation (name + raw literal args) → Operation (typed, defaults applied)
//! ```
//!
//! Both interpreter tiers produce `Invocation`s; `Operation::from_invocation`
//! is the single place where argument binding and coercion happen, so the
//! tiers cannot drift apart on argument semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ArgumentError;
use crate::lexical;

// ============================================================================
// Vocabulary
// ============================================================================

/// Every operation name a layout script may call. Anything else is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpName {
    InsertText,
    InsertEquation,
    InsertLatexEquation,
    InsertEnter,
    InsertParagraph,
    InsertSmallParagraph,
    InsertSpace,
    InsertBox,
    InsertViewBox,
    ExitBox,
    InsertTemplate,
    FocusPlaceholder,
    InsertTable,
    SetBold,
    SetUnderline,
    SetTableBorderWhite,
    SetAlignRightNextLine,
    SetAlignJustifyNextLine,
    SetCharWidthRatio,
}

impl OpName {
    pub const ALL: [OpName; 19] = [
        OpName::InsertText,
        OpName::InsertEquation,
        OpName::InsertLatexEquation,
        OpName::InsertEnter,
        OpName::InsertParagraph,
        OpName::InsertSmallParagraph,
        OpName::InsertSpace,
        OpName::InsertBox,
        OpName::InsertViewBox,
        OpName::ExitBox,
        OpName::InsertTemplate,
        OpName::FocusPlaceholder,
        OpName::InsertTable,
        OpName::SetBold,
        OpName::SetUnderline,
        OpName::SetTableBorderWhite,
        OpName::SetAlignRightNextLine,
        OpName::SetAlignJustifyNextLine,
        OpName::SetCharWidthRatio,
    ];

    /// The name as written in scripts.
    pub fn as_str(self) -> &'static str {
        match self {
            OpName::InsertText => "insert_text",
            OpName::InsertEquation => "insert_equation",
            OpName::InsertLatexEquation => "insert_latex_equation",
            OpName::InsertEnter => "insert_enter",
            OpName::InsertParagraph => "insert_paragraph",
            OpName::InsertSmallParagraph => "insert_small_paragraph",
            OpName::InsertSpace => "insert_space",
            OpName::InsertBox => "insert_box",
            OpName::InsertViewBox => "insert_view_box",
            OpName::ExitBox => "exit_box",
            OpName::InsertTemplate => "insert_template",
            OpName::FocusPlaceholder => "focus_placeholder",
            OpName::InsertTable => "insert_table",
            OpName::SetBold => "set_bold",
            OpName::SetUnderline => "set_underline",
            OpName::SetTableBorderWhite => "set_table_border_white",
            OpName::SetAlignRightNextLine => "set_align_right_next_line",
            OpName::SetAlignJustifyNextLine => "set_align_justify_next_line",
            OpName::SetCharWidthRatio => "set_char_width_ratio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == name)
    }

    /// Parameter names in positional order.
    pub fn params(self) -> &'static [&'static str] {
        const EQUATION_KEYWORDS: [&str; 3] = ["font_size_pt", "treat_as_char", "ensure_newline"];
        match self {
            OpName::InsertText => &["text"],
            OpName::InsertEquation => &["text", EQUATION_KEYWORDS[0], EQUATION_KEYWORDS[1], EQUATION_KEYWORDS[2]],
            OpName::InsertLatexEquation => &["latex", EQUATION_KEYWORDS[0], EQUATION_KEYWORDS[1], EQUATION_KEYWORDS[2]],
            OpName::InsertTemplate => &["name"],
            OpName::FocusPlaceholder => &["marker"],
            OpName::InsertTable => &["rows", "cols", "cell_data", "align_center", "exit_after"],
            OpName::SetBold | OpName::SetUnderline => &["enabled"],
            OpName::SetCharWidthRatio => &["percent"],
            OpName::InsertEnter
            | OpName::InsertParagraph
            | OpName::InsertSmallParagraph
            | OpName::InsertSpace
            | OpName::InsertBox
            | OpName::InsertViewBox
            | OpName::ExitBox
            | OpName::SetTableBorderWhite
            | OpName::SetAlignRightNextLine
            | OpName::SetAlignJustifyNextLine => &[],
        }
    }

    /// Operations whose first argument is a string literal.
    pub fn takes_text(self) -> bool {
        matches!(
            self,
            OpName::InsertText
                | OpName::InsertEquation
                | OpName::InsertLatexEquation
                | OpName::InsertTemplate
                | OpName::FocusPlaceholder
        )
    }
}

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Literal values
// ============================================================================

/// A literal argument value as written in a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Arg>),
}

impl Arg {
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::None => "NoneType",
            Arg::Bool(_) => "bool",
            Arg::Int(_) => "int",
            Arg::Float(_) => "float",
            Arg::Str(_) => "str",
            Arg::List(_) => "list",
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::None => f.write_str("None"),
            Arg::Bool(true) => f.write_str("True"),
            Arg::Bool(false) => f.write_str("False"),
            Arg::Int(i) => write!(f, "{i}"),
            Arg::Float(v) => write!(f, "{v:?}"),
            Arg::Str(s) => f.write_str(&lexical::quote(s)),
            Arg::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// One call statement: a vocabulary name with its literal arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub name: OpName,
    pub args: Vec<Arg>,
    pub kwargs: Vec<(String, Arg)>,
}

impl Invocation {
    pub fn new(name: OpName, args: Vec<Arg>) -> Self {
        Self {
            name,
            args,
            kwargs: Vec::new(),
        }
    }
}

// ============================================================================
// Zones and templates
// ============================================================================

/// Semantic insertion zone bound to a placeholder marker in a template.
/// Declaration order is the canonical consumption order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Before,
    Inside,
    After,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Before, Zone::Inside, Zone::After];

    /// Canonical ASCII marker text.
    pub fn marker(self) -> &'static str {
        match self {
            Zone::Before => "@@@",
            Zone::Inside => "###",
            Zone::After => "&&&",
        }
    }

    fn glyphs(self) -> (char, char) {
        match self {
            Zone::Before => ('@', '＠'),
            Zone::Inside => ('#', '＃'),
            Zone::After => ('&', '＆'),
        }
    }

    /// Marker spellings that may appear in a document: ASCII, full-width,
    /// and both of those with single spaces between the glyphs.
    pub fn marker_variants(self) -> [String; 4] {
        let (ascii, wide) = self.glyphs();
        let run = |c: char| c.to_string().repeat(3);
        let spaced = |c: char| [c, c, c].iter().map(char::to_string).collect::<Vec<_>>().join(" ");
        [run(ascii), run(wide), spaced(ascii), spaced(wide)]
    }

    pub fn from_marker(text: &str) -> Option<Zone> {
        let text = text.trim();
        Zone::ALL
            .into_iter()
            .find(|zone| zone.marker_variants().iter().any(|v| v == text))
    }
}

/// Target of a `focus_placeholder` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    Zone(Zone),
    Custom(String),
}

impl Placeholder {
    pub fn from_marker(text: &str) -> Self {
        match Zone::from_marker(text) {
            Some(zone) => Placeholder::Zone(zone),
            None => Placeholder::Custom(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFlavor {
    /// Header fragment with its own framed list container.
    Framed,
    /// Plain container fragment; its after marker is cleaned on insertion.
    Plain,
}

/// The fixed set of pre-authored template fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Header,
    Box,
    BoxWhite,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [TemplateKind::Header, TemplateKind::Box, TemplateKind::BoxWhite];

    pub fn file_name(self) -> &'static str {
        match self {
            TemplateKind::Header => "header.hwp",
            TemplateKind::Box => "box.hwp",
            TemplateKind::BoxWhite => "box_white.hwp",
        }
    }

    /// Resolve a script-supplied name. Directory prefixes, case and a missing
    /// extension are tolerated.
    pub fn from_name(name: &str) -> Option<Self> {
        let base = name.trim().rsplit(['/', '\\']).next().unwrap_or_default().to_lowercase();
        let base = if base.ends_with(".hwp") {
            base
        } else {
            format!("{base}.hwp")
        };
        Self::ALL.into_iter().find(|kind| kind.file_name() == base)
    }

    pub fn flavor(self) -> TemplateFlavor {
        match self {
            TemplateKind::Header => TemplateFlavor::Framed,
            TemplateKind::Box | TemplateKind::BoxWhite => TemplateFlavor::Plain,
        }
    }

    /// Zones whose markers the fragment carries.
    pub fn zones(self) -> &'static [Zone] {
        &Zone::ALL
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

// ============================================================================
// Typed operations
// ============================================================================

/// Per-call overrides for equation objects. `None` means configured default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquationStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treat_as_char: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensure_newline: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub rows: i64,
    pub cols: i64,
    /// Row-major cell values; `EQ:`-prefixed values are equations.
    pub cells: Vec<Vec<String>>,
    pub align_center: bool,
    pub exit_after: bool,
}

/// A fully coerced operation, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    InsertText { text: String },
    InsertEquation { text: String, style: EquationStyle },
    InsertLatexEquation { latex: String, style: EquationStyle },
    BreakLine,
    InsertParagraph,
    InsertSmallParagraph,
    InsertSpace,
    OpenContainer,
    OpenFramedContainer,
    CloseContainer,
    InsertTemplate { template: TemplateKind },
    FocusPlaceholder { placeholder: Placeholder },
    InsertTable(TableSpec),
    SetBold { enabled: bool },
    SetUnderline { enabled: Option<bool> },
    SetBorderInvisible,
    AlignRightNextLine,
    AlignJustifyNextLine,
    SetCharWidthRatio { percent: i64 },
}

impl Operation {
    pub fn name(&self) -> OpName {
        match self {
            Operation::InsertText { .. } => OpName::InsertText,
            Operation::InsertEquation { .. } => OpName::InsertEquation,
            Operation::InsertLatexEquation { .. } => OpName::InsertLatexEquation,
            Operation::BreakLine => OpName::InsertEnter,
            Operation::InsertParagraph => OpName::InsertParagraph,
            Operation::InsertSmallParagraph => OpName::InsertSmallParagraph,
            Operation::InsertSpace => OpName::InsertSpace,
            Operation::OpenContainer => OpName::InsertBox,
            Operation::OpenFramedContainer => OpName::InsertViewBox,
            Operation::CloseContainer => OpName::ExitBox,
            Operation::InsertTemplate { .. } => OpName::InsertTemplate,
            Operation::FocusPlaceholder { .. } => OpName::FocusPlaceholder,
            Operation::InsertTable(_) => OpName::InsertTable,
            Operation::SetBold { .. } => OpName::SetBold,
            Operation::SetUnderline { .. } => OpName::SetUnderline,
            Operation::SetBorderInvisible => OpName::SetTableBorderWhite,
            Operation::AlignRightNextLine => OpName::SetAlignRightNextLine,
            Operation::AlignJustifyNextLine => OpName::SetAlignJustifyNextLine,
            Operation::SetCharWidthRatio { .. } => OpName::SetCharWidthRatio,
        }
    }

    /// Bind and coerce an invocation's arguments against its signature.
    pub fn from_invocation(inv: &Invocation) -> Result<Self, ArgumentError> {
        let bound = Bound::new(inv)?;
        let op = match inv.name {
            OpName::InsertText => Operation::InsertText {
                text: bound.string(0)?,
            },
            OpName::InsertEquation => Operation::InsertEquation {
                text: bound.string(0)?,
                style: bound.equation_style()?,
            },
            OpName::InsertLatexEquation => Operation::InsertLatexEquation {
                latex: bound.string(0)?,
                style: bound.equation_style()?,
            },
            OpName::InsertEnter => Operation::BreakLine,
            OpName::InsertParagraph => Operation::InsertParagraph,
            OpName::InsertSmallParagraph => Operation::InsertSmallParagraph,
            OpName::InsertSpace => Operation::InsertSpace,
            OpName::InsertBox => Operation::OpenContainer,
            OpName::InsertViewBox => Operation::OpenFramedContainer,
            OpName::ExitBox => Operation::CloseContainer,
            OpName::InsertTemplate => {
                let name = bound.string(0)?;
                let template = TemplateKind::from_name(&name).ok_or_else(|| ArgumentError::Invalid {
                    op: inv.name,
                    message: format!("unknown template '{name}'"),
                })?;
                Operation::InsertTemplate { template }
            }
            OpName::FocusPlaceholder => Operation::FocusPlaceholder {
                placeholder: Placeholder::from_marker(&bound.string(0)?),
            },
            OpName::InsertTable => {
                let rows = bound.int(0)?.ok_or(ArgumentError::Missing { op: inv.name, param: "rows" })?;
                let cols = bound.int(1)?.ok_or(ArgumentError::Missing { op: inv.name, param: "cols" })?;
                let cells = match bound.get(2) {
                    Some(arg) => table_cells(inv.name, arg, cols)?,
                    None => Vec::new(),
                };
                Operation::InsertTable(TableSpec {
                    rows,
                    cols,
                    cells,
                    align_center: bound.bool(3)?.unwrap_or(false),
                    exit_after: bound.bool(4)?.unwrap_or(true),
                })
            }
            OpName::SetBold => Operation::SetBold {
                enabled: bound.bool(0)?.unwrap_or(true),
            },
            OpName::SetUnderline => Operation::SetUnderline {
                enabled: bound.bool(0)?,
            },
            OpName::SetTableBorderWhite => Operation::SetBorderInvisible,
            OpName::SetAlignRightNextLine => Operation::AlignRightNextLine,
            OpName::SetAlignJustifyNextLine => Operation::AlignJustifyNextLine,
            OpName::SetCharWidthRatio => Operation::SetCharWidthRatio {
                percent: bound.int(0)?.unwrap_or(100),
            },
        };
        Ok(op)
    }
}

// ============================================================================
// Argument binding
// ============================================================================

/// Positional and keyword arguments resolved onto parameter slots.
struct Bound<'a> {
    op: OpName,
    slots: Vec<Option<&'a Arg>>,
}

impl<'a> Bound<'a> {
    fn new(inv: &'a Invocation) -> Result<Self, ArgumentError> {
        let params = inv.name.params();
        if inv.args.len() > params.len() {
            return Err(ArgumentError::TooMany {
                op: inv.name,
                max: params.len(),
                given: inv.args.len(),
            });
        }
        let mut slots: Vec<Option<&Arg>> = vec![None; params.len()];
        for (slot, arg) in slots.iter_mut().zip(&inv.args) {
            *slot = Some(arg);
        }
        for (keyword, arg) in &inv.kwargs {
            let idx = params
                .iter()
                .position(|p| p == keyword)
                .ok_or_else(|| ArgumentError::UnknownKeyword {
                    op: inv.name,
                    keyword: keyword.clone(),
                })?;
            if slots[idx].is_some() {
                return Err(ArgumentError::Duplicate {
                    op: inv.name,
                    param: params[idx],
                });
            }
            slots[idx] = Some(arg);
        }
        Ok(Self { op: inv.name, slots })
    }

    /// Slot value with `None` literals treated as absent.
    fn get(&self, idx: usize) -> Option<&'a Arg> {
        self.slots.get(idx).copied().flatten().filter(|a| !matches!(a, Arg::None))
    }

    fn param(&self, idx: usize) -> &'static str {
        self.op.params().get(idx).copied().unwrap_or("?")
    }

    fn type_error(&self, idx: usize, expected: &'static str, found: &Arg) -> ArgumentError {
        ArgumentError::Type {
            op: self.op,
            param: self.param(idx),
            expected,
            found: found.type_name().to_string(),
        }
    }

    fn string(&self, idx: usize) -> Result<String, ArgumentError> {
        match self.slots.get(idx).copied().flatten() {
            Some(Arg::Str(s)) => Ok(s.clone()),
            Some(other) => Err(self.type_error(idx, "str", other)),
            None => Err(ArgumentError::Missing {
                op: self.op,
                param: self.param(idx),
            }),
        }
    }

    fn bool(&self, idx: usize) -> Result<Option<bool>, ArgumentError> {
        match self.get(idx) {
            None => Ok(None),
            Some(Arg::Bool(b)) => Ok(Some(*b)),
            Some(Arg::Int(i)) => Ok(Some(*i != 0)),
            Some(other) => Err(self.type_error(idx, "bool", other)),
        }
    }

    fn int(&self, idx: usize) -> Result<Option<i64>, ArgumentError> {
        match self.get(idx) {
            None => Ok(None),
            Some(Arg::Int(i)) => Ok(Some(*i)),
            Some(Arg::Float(v)) if v.is_finite() => Ok(Some(v.trunc() as i64)),
            Some(other) => Err(self.type_error(idx, "int", other)),
        }
    }

    fn float(&self, idx: usize) -> Result<Option<f64>, ArgumentError> {
        match self.get(idx) {
            None => Ok(None),
            Some(Arg::Int(i)) => Ok(Some(*i as f64)),
            Some(Arg::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(self.type_error(idx, "float", other)),
        }
    }

    fn equation_style(&self) -> Result<EquationStyle, ArgumentError> {
        Ok(EquationStyle {
            font_size_pt: self.float(1)?,
            treat_as_char: self.bool(2)?,
            ensure_newline: self.bool(3)?,
        })
    }
}

fn table_cells(op: OpName, arg: &Arg, cols: i64) -> Result<Vec<Vec<String>>, ArgumentError> {
    let Arg::List(items) = arg else {
        return Err(ArgumentError::Type {
            op,
            param: "cell_data",
            expected: "list",
            found: arg.type_name().to_string(),
        });
    };
    let nested = items.iter().filter(|item| matches!(item, Arg::List(_))).count();
    if nested == 0 {
        // flat list: chunk into rows of `cols`
        let width = usize::try_from(cols).unwrap_or(1).max(1);
        let values = items.iter().map(|item| cell_text(op, item)).collect::<Result<Vec<_>, _>>()?;
        return Ok(values.chunks(width).map(<[String]>::to_vec).collect());
    }
    if nested != items.len() {
        return Err(ArgumentError::Invalid {
            op,
            message: "cell_data mixes rows and single values".to_string(),
        });
    }
    items
        .iter()
        .map(|row| match row {
            Arg::List(cells) => cells.iter().map(|cell| cell_text(op, cell)).collect(),
            _ => Ok(Vec::new()),
        })
        .collect()
}

fn cell_text(op: OpName, arg: &Arg) -> Result<String, ArgumentError> {
    match arg {
        Arg::Str(s) => Ok(s.clone()),
        Arg::Int(i) => Ok(i.to_string()),
        Arg::Float(v) => Ok(format!("{v:?}")),
        Arg::Bool(_) => Ok(arg.to_string()),
        Arg::None => Ok(String::new()),
        Arg::List(_) => Err(ArgumentError::Invalid {
            op,
            message: "cell values must be scalars".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> Arg {
        Arg::Str(v.to_string())
    }

    #[test]
    fn test_vocabulary_round_trip() {
        for op in OpName::ALL {
            assert_eq!(OpName::from_name(op.as_str()), Some(op));
        }
        assert_eq!(OpName::from_name("print"), None);
    }

    #[test]
    fn test_zone_marker_variants() {
        assert_eq!(Zone::from_marker("@@@"), Some(Zone::Before));
        assert_eq!(Zone::from_marker("＃＃＃"), Some(Zone::Inside));
        assert_eq!(Zone::from_marker("& & &"), Some(Zone::After));
        assert_eq!(Zone::from_marker("＠ ＠ ＠"), Some(Zone::Before));
        assert_eq!(Zone::from_marker("@@"), None);
        assert!(Zone::Before < Zone::Inside && Zone::Inside < Zone::After);
    }

    #[test]
    fn test_template_name_resolution() {
        assert_eq!(TemplateKind::from_name("header.hwp"), Some(TemplateKind::Header));
        assert_eq!(TemplateKind::from_name("templates/Box_White.hwp"), Some(TemplateKind::BoxWhite));
        assert_eq!(TemplateKind::from_name("box"), Some(TemplateKind::Box));
        assert_eq!(TemplateKind::from_name("footer.hwp"), None);
    }

    #[test]
    fn test_bold_defaults_to_true() {
        let op = Operation::from_invocation(&Invocation::new(OpName::SetBold, vec![])).unwrap();
        assert_eq!(op, Operation::SetBold { enabled: true });
    }

    #[test]
    fn test_underline_without_argument_is_toggle() {
        let op = Operation::from_invocation(&Invocation::new(OpName::SetUnderline, vec![Arg::None])).unwrap();
        assert_eq!(op, Operation::SetUnderline { enabled: None });
    }

    #[test]
    fn test_table_keywords_and_flat_cells() {
        let inv = Invocation {
            name: OpName::InsertTable,
            args: vec![Arg::Int(2), Arg::Int(2)],
            kwargs: vec![
                ("cell_data".to_string(), Arg::List(vec![s("a"), s("b"), Arg::Int(3), s("EQ:x^2")])),
                ("align_center".to_string(), Arg::Bool(true)),
            ],
        };
        let op = Operation::from_invocation(&inv).unwrap();
        assert_eq!(
            op,
            Operation::InsertTable(TableSpec {
                rows: 2,
                cols: 2,
                cells: vec![
                    vec!["a".to_string(), "b".to_string()],
                    vec!["3".to_string(), "EQ:x^2".to_string()],
                ],
                align_center: true,
                exit_after: true,
            })
        );
    }

    #[test]
    fn test_char_width_accepts_float() {
        let op = Operation::from_invocation(&Invocation::new(OpName::SetCharWidthRatio, vec![Arg::Float(90.7)])).unwrap();
        assert_eq!(op, Operation::SetCharWidthRatio { percent: 90 });
    }

    #[test]
    fn test_binding_errors() {
        let too_many = Invocation::new(OpName::InsertText, vec![s("a"), s("b")]);
        assert!(matches!(
            Operation::from_invocation(&too_many),
            Err(ArgumentError::TooMany { max: 1, given: 2, .. })
        ));

        let wrong_type = Invocation::new(OpName::InsertText, vec![Arg::Int(3)]);
        assert!(matches!(
            Operation::from_invocation(&wrong_type),
            Err(ArgumentError::Type { expected: "str", .. })
        ));

        let unknown = Invocation {
            name: OpName::SetBold,
            args: vec![],
            kwargs: vec![("bold".to_string(), Arg::Bool(true))],
        };
        assert!(matches!(
            Operation::from_invocation(&unknown),
            Err(ArgumentError::UnknownKeyword { .. })
        ));

        let template = Invocation::new(OpName::InsertTemplate, vec![s("footer.hwp")]);
        assert!(matches!(
            Operation::from_invocation(&template),
            Err(ArgumentError::Invalid { .. })
        ));
    }

    #[test]
    fn test_custom_placeholder_kept_verbatim() {
        let op = Operation::from_invocation(&Invocation::new(OpName::FocusPlaceholder, vec![s("%%%")])).unwrap();
        assert_eq!(
            op,
            Operation::FocusPlaceholder {
                placeholder: Placeholder::Custom("%%%".to_string())
            }
        );
    }
}
