//! Annotated `.gelly` challenge file parser.
//!
//! Challenge content is authored next to the reference query as line
//! comments:
//!
//! ```text
//! // title: Count the jellyfish
//! // backstory: The reef census is due.
//! // prompt: How many jellyfish are there?
//! // hint: Use count()
//! // hint link: https://docs.gadget.dev/reference/gelly
//! // expected output: count: 4
//! // solution:
//! view {
//!   count(jellyfishes)
//! }
//! ```
//!
//! Every annotation is a single line except `// solution:`, which takes all
//! following lines up to the next annotation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::NewChallenge;

/// File extension of challenge files.
pub const GELLY_EXTENSION: &str = "gelly";

/// Challenge content extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChallenge {
    pub title: String,
    pub backstory: String,
    pub prompt: String,
    pub solution: String,
    pub hint: String,
    pub hint_link: String,
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl ParsedChallenge {
    /// Turn the parsed content into a create input with the given number.
    pub fn into_new_challenge(self, number: u32) -> NewChallenge {
        NewChallenge {
            number,
            title: self.title,
            backstory: self.backstory,
            prompt: self.prompt,
            hint: self.hint,
            hint_link: self.hint_link,
            solution: self.solution,
            expected_output: self.expected_output,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Annotation {
    Title,
    Backstory,
    Prompt,
    HintLink,
    Hint,
    ExpectedOutput,
    Solution,
}

const ANNOTATIONS: &[(&str, Annotation)] = &[
    ("// title:", Annotation::Title),
    ("// backstory:", Annotation::Backstory),
    ("// prompt:", Annotation::Prompt),
    ("// hint link:", Annotation::HintLink),
    ("// hint:", Annotation::Hint),
    ("// expected output:", Annotation::ExpectedOutput),
    ("// solution:", Annotation::Solution),
];

fn match_annotation(line: &str) -> Option<(Annotation, &str)> {
    ANNOTATIONS.iter().find_map(|(prefix, annotation)| {
        line.strip_prefix(prefix)
            .map(|rest| (*annotation, rest.trim()))
    })
}

/// Parse the annotations out of a `.gelly` file's content.
///
/// Missing annotations leave their field empty; use
/// [`validate_challenges`] to report them.
pub fn parse_gelly_file(content: &str) -> ParsedChallenge {
    let mut parsed = ParsedChallenge::default();
    let mut in_solution = false;
    let mut solution_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        match match_annotation(trimmed) {
            Some((annotation, value)) => {
                in_solution = annotation == Annotation::Solution;
                let value = value.to_string();
                match annotation {
                    Annotation::Title => parsed.title = value,
                    Annotation::Backstory => parsed.backstory = value,
                    Annotation::Prompt => parsed.prompt = value,
                    Annotation::HintLink => parsed.hint_link = value,
                    Annotation::Hint => parsed.hint = value,
                    Annotation::ExpectedOutput => {
                        parsed.expected_output = (!value.is_empty()).then_some(value)
                    }
                    Annotation::Solution => {}
                }
            }
            None if in_solution => solution_lines.push(line),
            None => {}
        }
    }

    parsed.solution = solution_lines.join("\n").trim().to_string();
    parsed
}

/// Parse a single `.gelly` file from disk.
pub fn parse_gelly_path(path: &Path) -> Result<ParsedChallenge> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read challenge file: {}", path.display()))?;
    Ok(parse_gelly_file(&content))
}

/// Load every `.gelly` file in `dir` (not recursive), sorted by file name.
///
/// Unreadable files are logged and skipped.
pub fn load_gelly_directory(dir: &Path) -> Result<Vec<(PathBuf, ParsedChallenge)>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == GELLY_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut challenges = Vec::with_capacity(paths.len());
    for path in paths {
        match parse_gelly_path(&path) {
            Ok(parsed) => {
                tracing::info!("parsed challenge: {}", parsed.title);
                challenges.push((path, parsed));
            }
            Err(e) => {
                tracing::error!("skipping {}: {e:#}", path.display());
            }
        }
    }

    Ok(challenges)
}

/// Number parsed challenges from 1 in the order given.
pub fn number_challenges(parsed: Vec<ParsedChallenge>) -> Vec<NewChallenge> {
    parsed
        .into_iter()
        .zip(1u32..)
        .map(|(challenge, number)| challenge.into_new_challenge(number))
        .collect()
}

/// A warning from challenge validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Index of the challenge in the validated list.
    pub index: usize,
    /// Challenge title, if it has one.
    pub title: Option<String>,
    pub message: String,
}

/// Check parsed challenges for common authoring mistakes.
pub fn validate_challenges(challenges: &[ParsedChallenge]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen_titles = HashSet::new();

    for (index, challenge) in challenges.iter().enumerate() {
        let title = (!challenge.title.is_empty()).then(|| challenge.title.clone());
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                index,
                title: title.clone(),
                message,
            })
        };

        if challenge.title.is_empty() {
            warn("missing `// title:` annotation".into());
        } else if !seen_titles.insert(challenge.title.as_str()) {
            warn(format!("duplicate title: {}", challenge.title));
        }
        if challenge.prompt.is_empty() {
            warn("missing `// prompt:` annotation".into());
        }
        if challenge.backstory.is_empty() {
            warn("missing `// backstory:` annotation".into());
        }
        if challenge.hint.is_empty() {
            warn("missing `// hint:` annotation".into());
        }
        if challenge.hint_link.is_empty() {
            warn("missing `// hint link:` annotation".into());
        }
        if challenge.solution.is_empty() {
            warn("solution is empty".into());
        }
        if challenge.expected_output.is_none() {
            warn("no expected output; only an exact solution match will pass".into());
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"// title: Count the jellyfish
// backstory: The reef census is due.
// prompt: How many jellyfish are there?
// hint: Use count()
// hint link: https://docs.gadget.dev/reference/gelly
// expected output: count: 4
// solution:

view {
  count(jellyfishes)
}

"#;

    #[test]
    fn parse_all_annotations() {
        let parsed = parse_gelly_file(SAMPLE);
        assert_eq!(parsed.title, "Count the jellyfish");
        assert_eq!(parsed.backstory, "The reef census is due.");
        assert_eq!(parsed.prompt, "How many jellyfish are there?");
        assert_eq!(parsed.hint, "Use count()");
        assert_eq!(parsed.hint_link, "https://docs.gadget.dev/reference/gelly");
        assert_eq!(parsed.expected_output.as_deref(), Some("count: 4"));
        assert_eq!(parsed.solution, "view {\n  count(jellyfishes)\n}");
    }

    #[test]
    fn solution_stops_at_next_annotation() {
        let content = "// solution:\nview { count(foods) }\n// title: Foods\n// hint: later\n";
        let parsed = parse_gelly_file(content);
        assert_eq!(parsed.solution, "view { count(foods) }");
        assert_eq!(parsed.title, "Foods");
        assert_eq!(parsed.hint, "later");
    }

    #[test]
    fn solution_keeps_inner_indentation() {
        let content = "// solution:\n  view {\n    a\n  }\n";
        let parsed = parse_gelly_file(content);
        assert_eq!(parsed.solution, "view {\n    a\n  }");
    }

    #[test]
    fn plain_comments_outside_solution_are_ignored() {
        let parsed = parse_gelly_file("// just a note\n// title: T\n");
        assert_eq!(parsed.title, "T");
        assert!(parsed.solution.is_empty());
    }

    #[test]
    fn number_in_order() {
        let numbered = number_challenges(vec![
            parse_gelly_file("// title: A"),
            parse_gelly_file("// title: B"),
        ]);
        assert_eq!(numbered[0].number, 1);
        assert_eq!(numbered[1].number, 2);
        assert_eq!(numbered[1].title, "B");
    }

    #[test]
    fn validate_reports_problems() {
        let good = parse_gelly_file(SAMPLE);
        assert!(validate_challenges(std::slice::from_ref(&good)).is_empty());

        let warnings = validate_challenges(&[good.clone(), good, ParsedChallenge::default()]);
        assert!(warnings
            .iter()
            .any(|w| w.index == 1 && w.message.contains("duplicate title")));
        assert!(warnings
            .iter()
            .any(|w| w.index == 2 && w.message.contains("solution is empty")));
        assert!(warnings.iter().all(|w| w.index != 0));
    }

    #[test]
    fn load_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("02-second.gelly"), "// title: Second").unwrap();
        std::fs::write(dir.path().join("01-first.gelly"), "// title: First").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "// title: Nope").unwrap();

        let loaded = load_gelly_directory(dir.path()).unwrap();
        let titles: Vec<_> = loaded.iter().map(|(_, c)| c.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn load_missing_directory_fails() {
        assert!(load_gelly_directory(Path::new("/definitely/not/here")).is_err());
    }
}
