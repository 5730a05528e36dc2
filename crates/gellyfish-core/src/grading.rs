//! Pass/fail feedback for a learner's query run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compare::{compare_values_semantically, normalize_for_compare, parse_expected_value};
use crate::model::Challenge;

pub const PASSED_MESSAGE: &str = "Correct! Your result matches the expected output.";
pub const FAILED_MESSAGE: &str = "Not quite yet, your output doesn't match the expected output.";
pub const ERROR_MESSAGE: &str = "Error running query (see output).";

/// What the backend returned for a submitted query.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The query ran and produced this JSON result.
    Success(Value),
    /// The query failed; the message is shown to the learner as-is.
    Failure(String),
}

/// Feedback for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub passed: bool,
    /// Text for the output panel: the result, or the error message.
    pub output: String,
    /// One-line status for the learner.
    pub message: String,
}

/// Grade a query run against a challenge.
///
/// A run passes if the submitted query is textually the reference solution
/// (after line-ending and whitespace normalization), or if its result
/// matches the challenge's expected output semantically.
pub fn grade(challenge: &Challenge, submitted_query: &str, outcome: &QueryOutcome) -> GradeResult {
    let result = match outcome {
        QueryOutcome::Failure(message) => {
            return GradeResult {
                passed: false,
                output: format!("Error running query:\n{message}"),
                message: ERROR_MESSAGE.to_string(),
            };
        }
        QueryOutcome::Success(result) => result,
    };

    let solution = normalize_for_compare(&Value::String(challenge.solution.clone()));
    let query_matches_solution = !solution.is_empty()
        && normalize_for_compare(&Value::String(submitted_query.to_string())) == solution;
    let output_matches_expected = challenge
        .expected_output
        .as_deref()
        .is_some_and(|expected| {
            compare_values_semantically(result, &parse_expected_value(expected))
        });
    let passed = query_matches_solution || output_matches_expected;

    tracing::debug!(
        challenge = challenge.number,
        query_matches_solution,
        output_matches_expected,
        "graded query run"
    );

    GradeResult {
        passed,
        output: display_output(result),
        message: if passed {
            PASSED_MESSAGE.to_string()
        } else {
            FAILED_MESSAGE.to_string()
        },
    }
}

/// Strings are shown raw, everything else as pretty JSON.
pub fn display_output(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
