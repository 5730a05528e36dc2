//! The `gellyfish copy-data` command.

use std::path::PathBuf;

use anyhow::Result;

use gellyfish_admin::copy::{copy_environment, Endpoint};

use super::{emit_report, Context};

pub async fn execute(
    ctx: &Context,
    from: String,
    to: String,
    output: Option<PathBuf>,
) -> Result<()> {
    if from == to {
        anyhow::bail!("source and target environment are both '{from}'");
    }

    let config = ctx.config()?;
    let source = ctx.connect(&config, Some(&from))?;
    let target = ctx.connect(&config, Some(&to))?;

    let report = copy_environment(
        Endpoint::new(&from, source.records.as_ref()),
        Endpoint::new(&to, target.records.as_ref()),
    )
    .await?;
    emit_report(&report, output.as_deref())
}
