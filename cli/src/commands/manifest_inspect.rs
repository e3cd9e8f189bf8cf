//! `a3s-store manifest inspect` command.

use a3s_store_core::StoreConfig;
use clap::Args;

#[derive(Args)]
pub struct ManifestInspectArgs {
    /// Manifest list name or digest
    pub name: String,
}

pub async fn execute(
    args: ManifestInspectArgs,
    config: &StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    let record = store.inspect(&args.name).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
