//! The `gellyfish assign-foods` command.

use std::path::PathBuf;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use gellyfish_admin::assign_foods;

use super::{emit_report, Context};

pub async fn execute(ctx: &Context, seed: Option<u64>, output: Option<PathBuf>) -> Result<()> {
    let config = ctx.config()?;
    let services = ctx.connect(&config, None)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = assign_foods(services.records.as_ref(), &mut rng).await?;
    emit_report(&report, output.as_deref())
}
