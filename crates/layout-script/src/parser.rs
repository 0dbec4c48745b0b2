//! Primary interpreter tier: a nom grammar over call statements.
//!
//! ## Grammar
//!
//! ```text
//! script    := blank (call end blank)*
//! call      := ident '(' (argument (',' argument)* ','?)? ')'
//! argument  := ident '=' value | value
//! value     := string | number | list | tuple | helper-call | constant
//! end       := [ \t]* comment? ('\n' | ';' | EOF)
//! ```
//!
//! Only the closed vocabulary produces invocations; other call names are
//! parsed, logged and skipped. Pure helpers (`len`, `min`, `max`, `abs`,
//! `sum`, `range`) are evaluated in argument position. Any other text is a
//! structural [`ParseFailure`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, multispace1, space0},
    combinator::{all_consuming, cut, eof, map, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError as NomParseError, VerboseError, VerboseErrorKind},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use tracing::debug;

use crate::ast::{Arg, Invocation, OpName, Operation};
use crate::error::ParseFailure;
use crate::lexical::scan_string;
use crate::source::{OperationSource, Step, Tier};

/// Upper bound for `range(..)` results.
const RANGE_LIMIT: i64 = 10_000;

/// Deepest list, tuple or helper nesting accepted in argument position.
pub const MAX_NESTING: usize = 64;

// ============================================================================
// Public API
// ============================================================================

/// Parse a normalized script into vocabulary invocations.
pub fn parse_script(source: &str) -> Result<Vec<Invocation>, ParseFailure> {
    match all_consuming(script::<VerboseError<&str>>)(source) {
        Ok((_, calls)) => Ok(calls
            .into_iter()
            .filter_map(|call| match OpName::from_name(call.name) {
                Some(name) => Some(Invocation {
                    name,
                    args: call.args,
                    kwargs: call.kwargs,
                }),
                None => {
                    debug!(name = call.name, "ignoring call outside the vocabulary");
                    None
                }
            })
            .collect()),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(failure(source, e)),
        Err(nom::Err::Incomplete(_)) => Err(ParseFailure::at(source, source.len(), "incomplete input")),
    }
}

/// Parse a bare argument list (`'a', font_size_pt=10`) with the same
/// literal grammar as full statements.
pub fn parse_arguments(text: &str) -> Result<(Vec<Arg>, Vec<(String, Arg)>), ParseFailure> {
    let parser = delimited(multispace0, |i| arguments::<VerboseError<&str>>(i, 0), multispace0);
    match all_consuming(parser)(text) {
        Ok((_, items)) => Ok(split_items(items)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(failure(text, e)),
        Err(nom::Err::Incomplete(_)) => Err(ParseFailure::at(text, text.len(), "incomplete input")),
    }
}

/// The primary interpreter tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptParser;

impl OperationSource for ScriptParser {
    fn tier(&self) -> Tier {
        Tier::Primary
    }

    fn produce(&self, script: &str) -> Result<Vec<Step>, ParseFailure> {
        let invocations = parse_script(script)?;
        Ok(invocations.iter().map(Operation::from_invocation).collect())
    }
}

fn failure(source: &str, e: VerboseError<&str>) -> ParseFailure {
    let offset = e.errors.first().map_or(0, |(rest, _)| source.len() - rest.len());
    let message = e
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some(format!("expected {ctx}")),
            _ => None,
        })
        .unwrap_or_else(|| "invalid statement".to_string());
    debug!(detail = %nom::error::convert_error(source, e), "parse failure");
    ParseFailure::at(source, offset, message)
}

// ============================================================================
// Statements
// ============================================================================

struct RawCall<'a> {
    name: &'a str,
    args: Vec<Arg>,
    kwargs: Vec<(String, Arg)>,
}

enum Item {
    Positional(Arg),
    Keyword(String, Arg),
}

fn split_items(items: Vec<Item>) -> (Vec<Arg>, Vec<(String, Arg)>) {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for item in items {
        match item {
            Item::Positional(arg) => args.push(arg),
            Item::Keyword(name, arg) => kwargs.push((name, arg)),
        }
    }
    (args, kwargs)
}

fn script<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, Vec<RawCall<'a>>, E> {
    preceded(blank, many0(terminated(|i| call(i, 0), pair(statement_end, blank))))(input)
}

fn comment<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    preceded(char('#'), take_while(|c| c != '\n'))(input)
}

/// Whitespace, comments and empty statements between calls.
fn blank<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    value(
        (),
        many0_count(alt((value((), multispace1), value((), comment), value((), char(';'))))),
    )(input)
}

fn statement_end<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    context(
        "end of statement",
        value(
            (),
            tuple((space0, opt(comment), alt((value((), char('\n')), value((), char(';')), value((), eof))))),
        ),
    )(input)
}

fn identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(alt((alpha1, tag("_"))), many0_count(alt((alphanumeric1, tag("_"))))))(input)
}

fn call<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, RawCall<'a>, E> {
    let (input, name) = identifier(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, items) = arguments(input, depth)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;
    let (args, kwargs) = split_items(items);
    Ok((input, RawCall { name, args, kwargs }))
}

fn ws<'a, O, E: NomParseError<&'a str>>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O, E>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn arguments<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Vec<Item>, E> {
    terminated(
        separated_list0(ws(char(',')), ws(|i| argument(i, depth))),
        opt(ws(char(','))),
    )(input)
}

fn argument<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Item, E> {
    alt((
        map(
            pair(terminated(identifier, ws(char('='))), |i| arg_value(i, depth)),
            |(name, arg)| Item::Keyword(name.to_string(), arg),
        ),
        map(|i| arg_value(i, depth), Item::Positional),
    ))(input)
}

// ============================================================================
// Values
// ============================================================================

fn arg_value<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Arg, E> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(E::add_context(
            input,
            "at most 64 levels of nesting",
            E::from_error_kind(input, ErrorKind::TooLarge),
        )));
    }
    alt((
        map(string_literal, Arg::Str),
        number,
        |i| list(i, depth),
        |i| tuple_value(i, depth),
        |i| word_value(i, depth),
    ))(input)
}

fn string_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    match scan_string(input) {
        Some((value, used)) => Ok((&input[used..], value)),
        None => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Char))),
    }
}

fn number<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Arg, E> {
    let (rest, text) = recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit0)))))(input)?;
    let parsed = if text.contains('.') {
        text.parse().ok().map(Arg::Float)
    } else {
        text.parse().ok().map(Arg::Int)
    };
    match parsed {
        Some(arg) => Ok((rest, arg)),
        None => Err(nom::Err::Failure(E::from_error_kind(input, ErrorKind::Digit))),
    }
}

fn items<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, (Vec<Arg>, bool), E> {
    pair(
        separated_list0(ws(char(',')), ws(|i| arg_value(i, depth))),
        map(opt(ws(char(','))), |c| c.is_some()),
    )(input)
}

fn list<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str, depth: usize) -> IResult<&'a str, Arg, E> {
    let (input, _) = char('[')(input)?;
    let (input, (values, _)) = items(input, depth + 1)?;
    let (input, _) = cut(context("closing bracket", char(']')))(input)?;
    Ok((input, Arg::List(values)))
}

/// `(a, b)` is a list; `(a)` is just `a`.
fn tuple_value<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Arg, E> {
    let (input, _) = char('(')(input)?;
    let (input, (mut values, trailing)) = items(input, depth + 1)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;
    if values.len() == 1 && !trailing {
        if let Some(single) = values.pop() {
            return Ok((input, single));
        }
    }
    Ok((input, Arg::List(values)))
}

fn word_value<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Arg, E> {
    let (rest, name) = identifier(input)?;
    let (after_space, _) = space0(rest)?;
    if after_space.starts_with('(') {
        let (rest, call) = call(input, depth + 1)?;
        if !call.kwargs.is_empty() {
            return Err(nom::Err::Failure(E::add_context(
                input,
                "positional helper arguments",
                E::from_error_kind(input, ErrorKind::Verify),
            )));
        }
        return match eval_helper(call.name, &call.args) {
            Some(arg) => Ok((rest, arg)),
            None => Err(nom::Err::Failure(E::add_context(
                input,
                "a pure helper with valid arguments",
                E::from_error_kind(input, ErrorKind::Verify),
            ))),
        };
    }
    match name {
        "True" | "true" => Ok((rest, Arg::Bool(true))),
        "False" | "false" => Ok((rest, Arg::Bool(false))),
        "None" | "null" => Ok((rest, Arg::None)),
        _ => Err(nom::Err::Failure(E::add_context(
            input,
            "a literal value",
            E::from_error_kind(input, ErrorKind::Verify),
        ))),
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

fn as_number(arg: &Arg) -> Option<f64> {
    match arg {
        Arg::Int(i) => Some(*i as f64),
        Arg::Float(v) => Some(*v),
        Arg::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Keep integer results integral.
fn numeric(values: &[&Arg], total: f64) -> Arg {
    if values.iter().all(|v| matches!(v, Arg::Int(_) | Arg::Bool(_))) {
        Arg::Int(total as i64)
    } else {
        Arg::Float(total)
    }
}

/// Arguments of `min`/`max`/`sum`: a single list is unpacked.
fn operands(args: &[Arg]) -> Vec<&Arg> {
    match args {
        [Arg::List(items)] => items.iter().collect(),
        _ => args.iter().collect(),
    }
}

fn eval_helper(name: &str, args: &[Arg]) -> Option<Arg> {
    match name {
        "len" => match args {
            [Arg::Str(s)] => Some(Arg::Int(s.chars().count() as i64)),
            [Arg::List(items)] => Some(Arg::Int(items.len() as i64)),
            _ => None,
        },
        "abs" => match args {
            [Arg::Int(i)] => i.checked_abs().map(Arg::Int),
            [Arg::Float(v)] => Some(Arg::Float(v.abs())),
            _ => None,
        },
        "min" | "max" => {
            let values = operands(args);
            let numbers = values.iter().map(|v| as_number(v)).collect::<Option<Vec<f64>>>()?;
            let pick = if name == "min" { f64::min } else { f64::max };
            let best = numbers.iter().copied().reduce(pick)?;
            let chosen = values.iter().zip(&numbers).find(|(_, n)| **n == best).map(|(v, _)| (*v).clone())?;
            Some(chosen)
        }
        "sum" => {
            let [Arg::List(items)] = args else { return None };
            let values: Vec<&Arg> = items.iter().collect();
            let total = values.iter().map(|v| as_number(v)).sum::<Option<f64>>()?;
            Some(numeric(&values, total))
        }
        "range" => {
            let bounds = args
                .iter()
                .map(|a| match a {
                    Arg::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Option<Vec<i64>>>()?;
            let (start, stop) = match bounds.as_slice() {
                [stop] => (0, *stop),
                [start, stop] => (*start, *stop),
                _ => return None,
            };
            if stop.saturating_sub(start) > RANGE_LIMIT {
                return None;
            }
            Some(Arg::List((start..stop).map(Arg::Int).collect()))
        }
        _ => None,
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
    fn test_parse_basic_script() {
        let script = "insert_text('a')\n# note\n\ninsert_enter()  # trailing\ninsert_space(); set_bold(False)";
        let calls = parse_script(script).unwrap();
        let names: Vec<OpName> = calls.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![OpName::InsertText, OpName::InsertEnter, OpName::InsertSpace, OpName::SetBold]
        );
        assert_eq!(calls[3].args, vec![Arg::Bool(false)]);
    }

    #[test]
    fn test_parse_keywords_lists_and_helpers() {
        let calls = parse_script(
            "insert_table(2, max(1, 2), cell_data=[['a', 1], ('b', None)], exit_after=false,)",
        )
        .unwrap();
        assert_eq!(calls[0].args, vec![Arg::Int(2), Arg::Int(2)]);
        assert_eq!(
            calls[0].kwargs,
            vec![
                (
                    "cell_data".to_string(),
                    Arg::List(vec![
                        Arg::List(vec![s("a"), Arg::Int(1)]),
                        Arg::List(vec![s("b"), Arg::None]),
                    ])
                ),
                ("exit_after".to_string(), Arg::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_unknown_calls_are_inert() {
        let calls = parse_script("print('hi')\ninsert_enter()").unwrap();
        assert_eq!(calls, vec![Invocation::new(OpName::InsertEnter, vec![])]);
    }

    #[test]
    fn test_structural_failures() {
        let err = parse_script("insert_enter()\ninsert_text('a' 'b')").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(parse_script("x = 1").is_err());
        assert!(parse_script("insert_text(name)").is_err());
        assert!(parse_script("insert_text('open").is_err());
        assert!(parse_script("for i in range(3):").is_err());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(eval_helper("len", &[s("가나다")]), Some(Arg::Int(3)));
        assert_eq!(eval_helper("min", &[Arg::List(vec![Arg::Int(3), Arg::Float(1.5)])]), Some(Arg::Float(1.5)));
        assert_eq!(eval_helper("sum", &[Arg::List(vec![Arg::Int(3), Arg::Int(4)])]), Some(Arg::Int(7)));
        assert_eq!(eval_helper("abs", &[Arg::Int(-4)]), Some(Arg::Int(4)));
        assert_eq!(
            eval_helper("range", &[Arg::Int(1), Arg::Int(4)]),
            Some(Arg::List(vec![Arg::Int(1), Arg::Int(2), Arg::Int(3)]))
        );
        assert_eq!(eval_helper("range", &[Arg::Int(1_000_000)]), None);
        assert_eq!(eval_helper("open", &[s("x")]), None);
    }

    #[test]
    fn test_parse_arguments() {
        let (args, kwargs) = parse_arguments(" 'x^2' , font_size_pt = 10.5 ").unwrap();
        assert_eq!(args, vec![s("x^2")]);
        assert_eq!(kwargs, vec![("font_size_pt".to_string(), Arg::Float(10.5))]);
        assert!(parse_arguments("'x' +").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("insert_table(1, 1, {}{})", "[".repeat(depth), "]".repeat(depth));
        assert!(parse_script(&nested(MAX_NESTING)).is_ok());

        let err = parse_script(&nested(MAX_NESTING + 1)).unwrap_err();
        assert!(err.message.contains("nesting"), "{err}");
        assert!(parse_script(&format!("insert_table(1, 1, {}", "[".repeat(5_000))).is_err());
        assert!(parse_arguments(&"(".repeat(5_000)).is_err());
        assert!(parse_script(&format!("insert_text({}'a'{})", "len(".repeat(200), ")".repeat(200))).is_err());
    }

    #[test]
    fn test_produce_keeps_argument_errors_in_place() {
        let steps = ScriptParser.produce("insert_text(1)\ninsert_enter()").unwrap();
        assert!(steps[0].is_err());
        assert_eq!(steps[1], Ok(Operation::BreakLine));
    }
}
