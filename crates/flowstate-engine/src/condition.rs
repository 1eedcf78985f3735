//! Choice-rule evaluation.

use regex::Regex;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::definition::{ChoiceRule, Comparison};

/// Evaluate a choice rule against the execution context.
///
/// A `Variable` path that does not resolve is a non-match rather than an
/// error; `IsPresent` exists for explicit existence checks. Type mismatch
/// between the resolved value and the operand is likewise a non-match.
/// Deterministic and side-effect-free.
pub fn evaluate(rule: &ChoiceRule, ctx: &ExecutionContext) -> bool {
    let value = ctx.get_path(&rule.variable);

    match &rule.compare {
        Comparison::IsPresent(expected) => value.is_some() == *expected,
        compare => match value {
            Some(value) => holds(compare, value),
            None => false,
        },
    }
}

fn holds(compare: &Comparison, value: &Value) -> bool {
    match compare {
        Comparison::StringEquals(operand) => value.as_str() == Some(operand.as_str()),
        Comparison::StringMatches(pattern) => {
            value.as_str().map(|s| wildcard_match(pattern, s)).unwrap_or(false)
        }
        Comparison::NumericEquals(operand) => {
            value.as_f64().map(|n| n == *operand).unwrap_or(false)
        }
        Comparison::NumericGreaterThan(operand) => {
            value.as_f64().map(|n| n > *operand).unwrap_or(false)
        }
        Comparison::NumericGreaterThanEquals(operand) => {
            value.as_f64().map(|n| n >= *operand).unwrap_or(false)
        }
        Comparison::NumericLessThan(operand) => {
            value.as_f64().map(|n| n < *operand).unwrap_or(false)
        }
        Comparison::NumericLessThanEquals(operand) => {
            value.as_f64().map(|n| n <= *operand).unwrap_or(false)
        }
        Comparison::BooleanEquals(operand) => value.as_bool() == Some(*operand),
        // Presence handled before the value is unwrapped; reaching here
        // means the path resolved.
        Comparison::IsPresent(expected) => *expected,
    }
}

/// Match with `*` wildcards; everything else is literal.
fn wildcard_match(pattern: &str, input: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == input;
    }

    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let anchored = format!("^{}$", escaped.join(".*"));
    Regex::new(&anchored).map(|re| re.is_match(input)).unwrap_or(false)
}
