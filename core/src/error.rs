use thiserror::Error;

/// A3S Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// No tag or blob matches the given name
    #[error("{0}: image not known")]
    ImageNotFound(String),

    /// Digest is not present in the store
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Malformed image reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Malformed digest literal
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Content is still referenced and cannot be freed
    #[error("Blob {digest} is in use by {refs} reference(s)")]
    BlobInUse { digest: String, refs: usize },

    /// Several tags share the content, so removing it by digest is ambiguous
    #[error("Unable to delete {digest} by digest: it has {tags} tags, remove them by name")]
    MultipleTags { digest: String, tags: usize },

    /// Target exists but is not a manifest list or image index
    #[error("{0} is not a manifest list")]
    NotManifestList(String),

    /// Store metadata is inconsistent with itself or with disk
    #[error("Store corrupted: {0}")]
    Corrupted(String),

    /// Store lock could not be acquired
    #[error("Lock error: {0}")]
    LockError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse failure classes reported per removal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Name resolves to neither a tag nor a stored digest.
    NotFound,
    /// Mutating the store failed (I/O, corruption, permission, content in use).
    StoreFailure,
    /// Name is syntactically malformed.
    InvalidReference,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::StoreFailure => write!(f, "store failure"),
            Self::InvalidReference => write!(f, "invalid reference"),
        }
    }
}

impl StoreError {
    /// Classify this error for batch reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageNotFound(_) => ErrorKind::NotFound,
            Self::InvalidReference(_) | Self::InvalidDigest(_) => ErrorKind::InvalidReference,
            _ => ErrorKind::StoreFailure,
        }
    }

    /// Whether this error means "nothing by that name".
    ///
    /// Malformed names can never resolve, so they count as missing too.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::InvalidReference)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

/// Result type alias for A3S Store operations
pub type Result<T> = std::result::Result<T, StoreError>;
