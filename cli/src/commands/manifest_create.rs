//! `a3s-store manifest create` command: build a manifest list from stored manifests.

use a3s_store_core::StoreConfig;
use clap::Args;

#[derive(Args)]
pub struct ManifestCreateArgs {
    /// Name to tag the new manifest list with
    pub name: String,

    /// Stored manifests to include (name or digest)
    #[arg(value_name = "MANIFEST")]
    pub manifests: Vec<String>,
}

pub async fn execute(
    args: ManifestCreateArgs,
    config: &StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;

    let mut children = Vec::with_capacity(args.manifests.len());
    for manifest in &args.manifests {
        let record = store.inspect(manifest).await?;
        children.push(record.digest);
    }

    let digest = store.put_index(&children).await?;
    store.tag(&args.name, &digest).await?;

    println!("{digest}");
    Ok(())
}
