//! The `gellyfish seed` command.

use std::path::PathBuf;

use anyhow::Result;

use gellyfish_admin::seed_challenges;

use super::{emit_report, Context};

pub async fn execute(ctx: &Context, dir: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = ctx.config()?;
    let services = ctx.connect(&config, None)?;

    let report = seed_challenges(services.records.as_ref(), &dir).await?;
    emit_report(&report, output.as_deref())
}
