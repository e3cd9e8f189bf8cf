//! CLI command definitions and dispatch.

mod image_tag;
mod manifest_create;
mod manifest_inspect;
mod manifest_ls;
mod manifest_rm;

use std::fmt;
use std::path::PathBuf;

use a3s_store_core::StoreConfig;
use a3s_store_runtime::ManifestStore;
use clap::{Parser, Subcommand};

/// A3S Store: local manifest list store.
#[derive(Parser)]
#[command(name = "a3s-store", version, about)]
pub struct Cli {
    /// Manifest store directory (default: $A3S_STORE_DIR or ~/.a3s/manifests)
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Manipulate manifest lists and image indexes
    #[command(subcommand)]
    Manifest(ManifestCommand),
    /// Create a tag that refers to an existing manifest list
    Tag(image_tag::ImageTagArgs),
}

/// `manifest` subcommands.
#[derive(Subcommand)]
pub enum ManifestCommand {
    /// Create a manifest list from stored manifests
    Create(manifest_create::ManifestCreateArgs),
    /// Display the contents of a manifest list or image index
    Inspect(manifest_inspect::ManifestInspectArgs),
    /// List tagged manifest lists
    Ls(manifest_ls::ManifestLsArgs),
    /// Remove manifest list or image index from local storage
    Rm(manifest_rm::ManifestRmArgs),
}

/// Command failure that asks for a specific process exit code.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExitError {}

/// Store configuration from the `--store-dir` flag, falling back to the
/// environment and then the default location.
pub(crate) fn store_config(store_dir: Option<PathBuf>) -> StoreConfig {
    store_dir
        .map(StoreConfig::new)
        .unwrap_or_else(StoreConfig::from_env)
}

/// Open the manifest store.
pub(crate) fn open_store(config: &StoreConfig) -> Result<ManifestStore, Box<dyn std::error::Error>> {
    let store = ManifestStore::from_config(config)?;
    Ok(store)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = store_config(cli.store_dir);
    match cli.command {
        Command::Manifest(command) => match command {
            ManifestCommand::Create(args) => manifest_create::execute(args, &config).await,
            ManifestCommand::Inspect(args) => manifest_inspect::execute(args, &config).await,
            ManifestCommand::Ls(args) => manifest_ls::execute(args, &config).await,
            ManifestCommand::Rm(args) => manifest_rm::execute(args, &config).await,
        },
        Command::Tag(args) => image_tag::execute(args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_manifest_rm() {
        let cli = Cli::try_parse_from([
            "a3s-store",
            "--store-dir",
            "/tmp/store",
            "manifest",
            "rm",
            "-i",
            "a",
            "b",
        ])
        .unwrap();

        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/store")));
        match cli.command {
            Command::Manifest(ManifestCommand::Rm(args)) => {
                assert!(args.ignore);
                assert_eq!(args.lists, vec!["a".to_string(), "b".to_string()]);
            }
            _ => panic!("expected manifest rm"),
        }
    }

    #[test]
    fn test_manifest_rm_requires_a_list() {
        assert!(Cli::try_parse_from(["a3s-store", "manifest", "rm"]).is_err());
    }

    #[test]
    fn test_store_dir_flag_wins() {
        let config = store_config(Some(PathBuf::from("/srv/manifests")));
        assert_eq!(config.store_dir, PathBuf::from("/srv/manifests"));
    }

    #[test]
    fn test_exit_error_display() {
        let err = ExitError {
            code: 125,
            message: "a: image not known".to_string(),
        };
        assert_eq!(err.to_string(), "a: image not known");
    }
}
