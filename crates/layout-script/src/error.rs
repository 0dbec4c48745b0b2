//! Error types for script interpretation.

use serde::Serialize;
use thiserror::Error;

use crate::ast::OpName;

/// Structural failure of the primary parser.
///
/// Never user-visible on its own: the interpreter routes it to the tolerant
/// scanner and only reports it when that tier cannot proceed either.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseFailure {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseFailure {
    /// Build a failure positioned at `offset` bytes into `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let head = source.get(..offset).unwrap_or(source);
        let line = head.matches('\n').count() + 1;
        let column = head.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// An argument list that cannot be coerced into an operation's signature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("{op}() takes at most {max} argument(s) but {given} were given")]
    TooMany { op: OpName, max: usize, given: usize },

    #[error("{op}() got an unexpected keyword argument '{keyword}'")]
    UnknownKeyword { op: OpName, keyword: String },

    #[error("{op}() got multiple values for argument '{param}'")]
    Duplicate { op: OpName, param: &'static str },

    #[error("{op}() missing required argument '{param}'")]
    Missing { op: OpName, param: &'static str },

    #[error("{op}(): argument '{param}' expected {expected}, got {found}")]
    Type {
        op: OpName,
        param: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("{op}(): {message}")]
    Invalid { op: OpName, message: String },
}

impl ArgumentError {
    pub fn op(&self) -> OpName {
        match self {
            Self::TooMany { op, .. }
            | Self::UnknownKeyword { op, .. }
            | Self::Duplicate { op, .. }
            | Self::Missing { op, .. }
            | Self::Type { op, .. }
            | Self::Invalid { op, .. } => *op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_position() {
        let source = "insert_enter()\ninsert_text('a' 'b')";
        let failure = ParseFailure::at(source, 27, "expected ')'");
        assert_eq!(failure.line, 2);
        assert_eq!(failure.column, 13);
    }

    #[test]
    fn test_argument_error_names_operation() {
        let err = ArgumentError::Missing {
            op: OpName::InsertText,
            param: "text",
        };
        assert_eq!(err.op(), OpName::InsertText);
        assert_eq!(err.to_string(), "insert_text() missing required argument 'text'");
    }
}
