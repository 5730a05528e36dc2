//! The `gellyfish progress` command.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use gellyfish_core::progress::{AccountProgressStore, ProgressStore, ProgressTracker};

use super::{read_text, Context};
use crate::ProgressAction;

pub async fn execute(ctx: &Context, action: ProgressAction) -> Result<()> {
    let config = ctx.config()?;

    match action {
        ProgressAction::List { user } => {
            let store = open_store(ctx, &config, user.as_deref())?;
            let completed = store.completed_challenges().await;
            if completed.is_empty() {
                println!("No completed challenges.");
            } else {
                println!("{} completed challenge(s):", completed.len());
                for id in &completed {
                    println!("  {id}");
                }
            }
        }
        ProgressAction::Complete {
            challenge_id,
            solution,
            user,
        } => {
            let solution = solution.as_deref().map(read_text).transpose()?;
            let store = open_store(ctx, &config, user.as_deref())?;
            store
                .mark_completed(&challenge_id, solution.as_deref())
                .await?;
            println!("Marked challenge {challenge_id} as completed.");
        }
        ProgressAction::Solution { challenge_id, user } => {
            let store = open_store(ctx, &config, user.as_deref())?;
            match store.solution(&challenge_id).await {
                Some(solution) => println!("{solution}"),
                None => println!("No solution recorded for challenge {challenge_id}."),
            }
        }
        ProgressAction::Sync { user } => {
            let services = ctx.connect(&config, None)?;
            let tracker = ProgressTracker::new(
                Arc::new(ctx.local_progress(&config)),
                Arc::clone(&services.progress),
            );
            let outcome = tracker.sign_in(&user).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.failed.is_empty() {
                eprintln!(
                    "{} challenge(s) failed to sync and were kept locally.",
                    outcome.failed.len()
                );
            }
        }
        ProgressAction::Clear => {
            ctx.local_progress(&config)
                .clear()
                .context("failed to clear local progress")?;
            println!("Cleared local progress.");
        }
    }

    Ok(())
}

/// Local store for anonymous use, account store when a user is given.
fn open_store(
    ctx: &Context,
    config: &gellyfish_client::GellyfishConfig,
    user: Option<&str>,
) -> Result<Arc<dyn ProgressStore>> {
    match user {
        Some(user_id) => {
            let services = ctx.connect(config, None)?;
            Ok(Arc::new(AccountProgressStore::new(services.progress, user_id)))
        }
        None => Ok(Arc::new(ctx.local_progress(config))),
    }
}
