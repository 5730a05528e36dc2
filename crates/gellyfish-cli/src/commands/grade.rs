//! The `gellyfish grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;

use gellyfish_core::grading::{grade, GradeResult, QueryOutcome};
use gellyfish_core::model::Challenge;
use gellyfish_core::parser::parse_gelly_path;

use super::read_text;

pub fn execute(
    challenge_path: Option<PathBuf>,
    expected: Option<String>,
    result_path: PathBuf,
    query_path: Option<PathBuf>,
    json: bool,
    fail_on_mismatch: bool,
) -> Result<()> {
    let challenge = match (challenge_path, expected) {
        (Some(path), _) => parse_gelly_path(&path)?
            .into_new_challenge(1)
            .into_record(""),
        (None, Some(expected)) => expected_only(expected),
        (None, None) => anyhow::bail!("either --challenge or --expected is required"),
    };

    let raw = read_text(&result_path)?;
    let result: Value = serde_json::from_str(&raw)
        .with_context(|| format!("query result is not JSON: {}", result_path.display()))?;
    let query = query_path.as_deref().map(read_text).transpose()?;

    let graded = grade(
        &challenge,
        query.as_deref().unwrap_or_default(),
        &QueryOutcome::Success(result),
    );
    print_grade(&graded, json)?;

    if fail_on_mismatch && !graded.passed {
        anyhow::bail!("query result does not match the expected output");
    }
    Ok(())
}

fn expected_only(expected: String) -> Challenge {
    Challenge {
        id: String::new(),
        number: 1,
        title: String::new(),
        backstory: String::new(),
        prompt: String::new(),
        hint: String::new(),
        hint_link: String::new(),
        solution: String::new(),
        expected_output: Some(expected),
    }
}

pub(crate) fn print_grade(graded: &GradeResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(graded)?);
    } else {
        println!("{}", graded.output);
        println!();
        println!("{}", graded.message);
    }
    Ok(())
}
