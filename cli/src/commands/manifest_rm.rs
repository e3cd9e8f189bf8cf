//! `a3s-store manifest rm` command: remove manifest lists from local storage.

use a3s_store_core::StoreConfig;
use a3s_store_runtime::{manifest_rm, RemovalRequest};
use clap::Args;

use crate::output;

use super::ExitError;

#[derive(Args)]
pub struct ManifestRmArgs {
    /// Manifest lists or image indexes to remove (name or digest)
    #[arg(required = true, value_name = "LIST")]
    pub lists: Vec<String>,

    /// Ignore manifest lists that are not known
    #[arg(short, long)]
    pub ignore: bool,
}

pub async fn execute(
    args: ManifestRmArgs,
    config: &StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    let request = RemovalRequest::new(args.lists).ignore_missing(args.ignore);

    let (report, error) = manifest_rm(&store, &request).await;

    for line in output::removal_lines(&report) {
        println!("{line}");
    }

    match error {
        Some(e) => Err(ExitError {
            code: report.exit_code,
            message: e.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
