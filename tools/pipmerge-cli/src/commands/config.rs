//! Print the effective configuration.

use pipmerge_common::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
