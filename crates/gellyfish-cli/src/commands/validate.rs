//! The `gellyfish validate` command.

use std::path::PathBuf;

use anyhow::Result;

use gellyfish_core::parser::{load_gelly_directory, parse_gelly_path, validate_challenges};

pub fn execute(path: PathBuf) -> Result<()> {
    let challenges: Vec<_> = if path.is_dir() {
        load_gelly_directory(&path)?
            .into_iter()
            .map(|(_, challenge)| challenge)
            .collect()
    } else {
        vec![parse_gelly_path(&path)?]
    };

    println!("{} ({} challenges)", path.display(), challenges.len());
    for (number, challenge) in (1..).zip(&challenges) {
        println!("  {number}. {}", challenge.title);
    }

    let warnings = validate_challenges(&challenges);
    for w in &warnings {
        let prefix = w
            .title
            .as_ref()
            .map(|title| format!("  [{title}]"))
            .unwrap_or_else(|| format!("  [#{}]", w.index + 1));
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All challenges valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
