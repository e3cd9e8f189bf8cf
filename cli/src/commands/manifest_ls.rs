//! `a3s-store manifest ls` command.

use a3s_store_core::StoreConfig;
use a3s_store_runtime::{BlobRecord, ImageReference};
use clap::Args;

use crate::output;

const HEADERS: [&str; 6] = ["NAME", "TAG", "DIGEST", "MANIFESTS", "SIZE", "CREATED"];

#[derive(Args)]
pub struct ManifestLsArgs {
    /// Only show tag names (one per line)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(
    args: ManifestLsArgs,
    config: &StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    let tags = store.list_tags().await?;

    if args.quiet {
        for (name, _) in &tags {
            println!("{name}");
        }
        return Ok(());
    }

    let mut table = output::new_table(&HEADERS);
    for (name, record) in &tags {
        let row = TagRow::new(name, record);
        table.add_row(&[
            &row.name,
            &row.tag,
            &row.digest,
            &row.manifests,
            &row.size,
            &row.created,
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Pre-computed display fields for a single tag row.
struct TagRow {
    name: String,
    tag: String,
    digest: String,
    manifests: String,
    size: String,
    created: String,
}

impl TagRow {
    fn new(name: &str, record: &BlobRecord) -> Self {
        let (repository, tag) = match ImageReference::parse(name) {
            Ok(r) => (
                format!("{}/{}", r.registry, r.repository),
                r.tag.unwrap_or_else(|| "<none>".to_string()),
            ),
            Err(_) => (name.to_string(), "<none>".to_string()),
        };

        let manifests = if record.is_index() {
            record.children.len().to_string()
        } else {
            "-".to_string()
        };

        Self {
            name: repository,
            tag,
            digest: record.digest.short().to_string(),
            manifests,
            size: output::format_bytes(record.size_bytes),
            created: output::format_ago(&record.created_at),
        }
    }
}
