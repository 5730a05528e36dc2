//! The `gellyfish schema` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use gellyfish_core::schema_cache::SchemaCache;

use super::Context;

pub async fn execute(ctx: &Context, models: Vec<String>, json: bool) -> Result<()> {
    let config = ctx.config()?;
    let services = ctx.connect(&config, None)?;
    let cache = SchemaCache::with_capacity(services.schemas, config.schema_cache_capacity);

    let schemas = cache.get(&models).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    for schema in &schemas {
        let mut table = Table::new();
        table.set_header(vec!["Field", "Type"]);
        for field in &schema.fields {
            table.add_row(vec![Cell::new(&field.name), Cell::new(&field.field_type)]);
        }
        println!("{}", schema.model_name);
        println!("{table}\n");
    }

    let missing: Vec<&str> = models
        .iter()
        .filter(|name| !schemas.iter().any(|s| &s.model_name == *name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        println!("No schema found for: {}", missing.join(", "));
    }

    Ok(())
}
