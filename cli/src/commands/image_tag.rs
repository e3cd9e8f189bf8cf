//! `a3s-store tag` command: create a tag that refers to an existing manifest list.

use a3s_store_core::StoreConfig;
use clap::Args;

#[derive(Args)]
pub struct ImageTagArgs {
    /// Source name or digest
    pub source: String,

    /// Target name (new tag)
    pub target: String,
}

pub async fn execute(
    args: ImageTagArgs,
    config: &StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;

    let source = store.inspect(&args.source).await?;
    let tag = store.tag(&args.target, &source.digest).await?;

    println!("{tag}");
    Ok(())
}
