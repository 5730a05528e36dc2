//! The `gellyfish init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gellyfish.toml").exists() {
        println!("gellyfish.toml already exists, skipping.");
    } else {
        std::fs::write("gellyfish.toml", SAMPLE_CONFIG)?;
        println!("Created gellyfish.toml");
    }

    std::fs::create_dir_all("challenges")?;
    let example_path = std::path::Path::new("challenges/01-count-the-jellyfish.gelly");
    if example_path.exists() {
        println!("challenges/01-count-the-jellyfish.gelly already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CHALLENGE)?;
        println!("Created challenges/01-count-the-jellyfish.gelly");
    }

    println!("\nNext steps:");
    println!("  1. Edit gellyfish.toml with your environments and API keys");
    println!("  2. Run: gellyfish validate --path challenges");
    println!("  3. Run: gellyfish seed --dir challenges");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gellyfish configuration

app_id = "gelly-fish"
default_environment = "development"
storage_path = ".gellyfish/storage.json"
schema_cache_capacity = 32
request_timeout_secs = 30

[environments.development]
base_url = "https://gelly-fish--development.gadget.app"
api_key = "${GELLYFISH_DEV_API_KEY}"

[environments.production]
base_url = "https://gelly-fish.gadget.app"
api_key = "${GELLYFISH_PROD_API_KEY}"
"#;

const EXAMPLE_CHALLENGE: &str = r#"// title: Count the jellyfish
// backstory: The reef council wants a headcount before the spring bloom.
// prompt: Write a query that returns how many jellyfish live on the reef.
// hint link: https://docs.gadget.dev/guides/data-access/gelly
// hint: Gelly has a count() aggregate.
// expected output: count: 4
// solution:
view {
  count(jellyfishes)
}
"#;
