//! A3S Store Runtime - local manifest store and reference removal.
//!
//! This crate provides the on-disk content-addressable manifest store and
//! the engine that removes manifest list / image index references from it.

#![allow(clippy::result_large_err)]

pub mod oci;
pub mod removal;

// Re-export common types
pub use oci::{BlobRecord, ImageReference, ManifestStore, StoreGuard};
pub use removal::{
    finalize, join_errors, manifest_rm, remove_all, BatchError, ExitStatus, PerTargetError,
    RemovalKind, RemovalPlan, RemovalReport, RemovalRequest, StoreAccessor, Target,
};

/// A3S Store Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
