//! The `gellyfish run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use gellyfish_core::grading::{grade, QueryOutcome};
use gellyfish_core::progress::ProgressTracker;

use super::grade::print_grade;
use super::{read_text, Context};

pub async fn execute(
    ctx: &Context,
    number: u32,
    query_path: PathBuf,
    user: Option<String>,
) -> Result<()> {
    let config = ctx.config()?;
    let services = ctx.connect(&config, None)?;

    let challenge = services
        .records
        .find_challenge(number)
        .await
        .with_context(|| format!("failed to load challenge {number}"))?
        .with_context(|| format!("challenge {number} not found"))?;
    println!("Challenge {}: {}", challenge.number, challenge.title);
    println!("{}\n", challenge.prompt);

    let query = read_text(&query_path)?;
    let outcome = match services.queries.run_gelly(&query).await {
        Ok(result) => QueryOutcome::Success(result),
        Err(e) => QueryOutcome::Failure(format!("{e:#}")),
    };

    let graded = grade(&challenge, &query, &outcome);
    print_grade(&graded, false)?;
    if !graded.passed {
        return Ok(());
    }

    let tracker = ProgressTracker::new(
        Arc::new(ctx.local_progress(&config)),
        Arc::clone(&services.progress),
    );
    if let Some(user_id) = &user {
        let outcome = tracker.sign_in(user_id).await;
        if outcome.synced {
            println!("Synced {} local challenge(s) to your account.", outcome.count);
        }
    }

    let was_completed = tracker.refresh().await.contains(&challenge.id);
    tracker
        .mark_completed(&challenge.id, Some(&query))
        .await
        .context("failed to record progress")?;

    if !was_completed {
        let total = tracker.completed().len();
        println!("Challenge {} completed ({total} done).", challenge.number);
    }
    Ok(())
}
