//! Seed challenges from a directory of `.gelly` files.

use std::path::Path;

use anyhow::{Context, Result};
use uuid::Uuid;

use gellyfish_core::parser::{load_gelly_directory, number_challenges, validate_challenges};
use gellyfish_core::report::{SeedReport, SeededChallenge};
use gellyfish_core::traits::RecordApi;

/// Parse every `.gelly` file in `dir`, number them in file name order and
/// create them in one bulk call.
///
/// Authoring warnings are logged but do not stop the run; records the
/// backend rejects fail the whole batch.
pub async fn seed_challenges(api: &dyn RecordApi, dir: &Path) -> Result<SeedReport> {
    let run_id = Uuid::new_v4();
    let parsed: Vec<_> = load_gelly_directory(dir)?
        .into_iter()
        .map(|(_, challenge)| challenge)
        .collect();
    tracing::info!(%run_id, count = parsed.len(), dir = %dir.display(), "parsed challenge files");

    for warning in validate_challenges(&parsed) {
        tracing::warn!(
            index = warning.index,
            title = warning.title.as_deref().unwrap_or("<untitled>"),
            "{}",
            warning.message
        );
    }

    let parsed_count = parsed.len();
    if parsed_count == 0 {
        tracing::warn!("no challenge files found in {}", dir.display());
        return Ok(SeedReport {
            run_id,
            success: true,
            parsed: 0,
            created: 0,
            challenges: Vec::new(),
        });
    }

    let inputs = number_challenges(parsed);
    let created = api
        .bulk_create_challenges(&inputs)
        .await
        .context("failed to create challenges")?;

    tracing::info!(%run_id, created = created.len(), "seeded challenges");

    Ok(SeedReport {
        run_id,
        success: created.len() == parsed_count,
        parsed: parsed_count,
        created: created.len(),
        challenges: created
            .into_iter()
            .map(|c| SeededChallenge {
                id: c.id,
                number: c.number,
                title: c.title,
            })
            .collect(),
    })
}
