//! The operation stream producer seam shared by both interpreter tiers.

use serde::Serialize;
use tracing::warn;

use crate::ast::Operation;
use crate::error::{ArgumentError, ParseFailure};
use crate::fallback::TolerantScanner;
use crate::parser::ScriptParser;

/// One coerced statement. Argument errors are kept in place so the
/// consumer can decide whether they abort the script.
pub type Step = Result<Operation, ArgumentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Fallback,
}

/// Turns normalized script text into an ordered operation stream.
pub trait OperationSource {
    fn tier(&self) -> Tier;

    fn produce(&self, script: &str) -> Result<Vec<Step>, ParseFailure>;
}

/// The operation stream for a script and the tier that produced it.
#[derive(Debug, Clone)]
pub struct Plan {
    pub tier: Tier,
    pub steps: Vec<Step>,
}

/// Interpret with the primary parser, falling back to the tolerant scanner
/// for the whole script when the primary reports a structural failure.
pub fn plan(script: &str) -> Result<Plan, ParseFailure> {
    plan_with(&ScriptParser, &TolerantScanner::new(), script)
}

pub fn plan_with(
    primary: &dyn OperationSource,
    fallback: &dyn OperationSource,
    script: &str,
) -> Result<Plan, ParseFailure> {
    match primary.produce(script) {
        Ok(steps) => Ok(Plan {
            tier: primary.tier(),
            steps,
        }),
        Err(failure) => {
            warn!(%failure, "primary parse failed; using fallback scanner");
            let steps = fallback.produce(script)?;
            Ok(Plan {
                tier: fallback.tier(),
                steps,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operation;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_prefers_primary() {
        let plan = plan("insert_text('a')\ninsert_enter()").unwrap();
        assert_eq!(plan.tier, Tier::Primary);
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn test_plan_falls_back_on_structural_failure() {
        let plan = plan("insert_text('a') oops\ninsert_enter()").unwrap();
        assert_eq!(plan.tier, Tier::Fallback);
        let ops: Vec<Operation> = plan.steps.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            ops,
            vec![
                Operation::InsertText { text: "a".to_string() },
                Operation::BreakLine
            ]
        );
    }

    #[test]
    fn test_plan_reports_failure_when_nothing_found() {
        assert!(plan("this is not a script").is_err());
    }
}
