//! A3S Store Core - Foundational Types
//!
//! Digests, the shared error type and store configuration used by the
//! manifest store runtime and the CLI.

pub mod config;
pub mod digest;
pub mod error;

// Re-export commonly used types
pub use config::StoreConfig;
pub use digest::Digest;
pub use error::{ErrorKind, Result, StoreError};

/// A3S Store version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
