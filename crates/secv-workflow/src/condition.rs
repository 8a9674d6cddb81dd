//! Step conditions.
//!
//! The only predicate is `<step>.success`: true when the named step has a
//! recorded result whose `success` flag is set. A step that was skipped or
//! never reached has no result, so the predicate is false.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use secv_types::ModuleResult;

/// A parsed step condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    StepSucceeded(String),
}

impl Condition {
    /// Evaluate against the results recorded so far.
    pub fn evaluate(&self, results: &HashMap<String, ModuleResult>) -> bool {
        match self {
            Condition::StepSucceeded(step) => results.get(step).is_some_and(|r| r.success),
        }
    }

    /// The step this condition depends on.
    pub fn step(&self) -> &str {
        match self {
            Condition::StepSucceeded(step) => step,
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let expr = expr.trim();
        match expr.rsplit_once('.') {
            Some((step, "success")) if !step.trim().is_empty() => {
                Ok(Condition::StepSucceeded(step.trim().to_string()))
            }
            _ => Err(format!(
                "unsupported condition '{expr}': expected '<step>.success'"
            )),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::StepSucceeded(step) => write!(f, "{step}.success"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(entries: &[(&str, bool)]) -> HashMap<String, ModuleResult> {
        entries
            .iter()
            .map(|(name, ok)| {
                let r = if *ok {
                    ModuleResult::success(*name, serde_json::Value::Null)
                } else {
                    ModuleResult::not_run(*name, "failed")
                };
                (name.to_string(), r)
            })
            .collect()
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "scan.success".parse::<Condition>().unwrap(),
            Condition::StepSucceeded("scan".into())
        );
        assert_eq!(
            "  port-scan.success ".parse::<Condition>().unwrap(),
            Condition::StepSucceeded("port-scan".into())
        );
        // Only the final `.success` is split off.
        assert_eq!(
            "stage.1.success".parse::<Condition>().unwrap().step(),
            "stage.1"
        );
    }

    #[test]
    fn test_parse_rejects_other_forms() {
        for bad in ["scan", "scan.failed", ".success", "scan.success == true", ""] {
            assert!(bad.parse::<Condition>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_evaluate() {
        let cond: Condition = "a.success".parse().unwrap();
        assert!(cond.evaluate(&results(&[("a", true)])));
        assert!(!cond.evaluate(&results(&[("a", false)])));
        assert!(!cond.evaluate(&results(&[("b", true)])));
        assert!(!cond.evaluate(&HashMap::new()));
    }

    #[test]
    fn test_display_round_trips() {
        let cond: Condition = "scan.success".parse().unwrap();
        assert_eq!(cond.to_string(), "scan.success");
    }
}
