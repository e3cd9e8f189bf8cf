//! OCI image reference parsing.
//!
//! Parses names like `ghcr.io/a3s-box/list:v1` into structured components so
//! that `mylist`, `mylist:latest` and `docker.io/library/mylist:latest` all
//! name the same tag in the store.

use a3s_store_core::digest::Digest;
use a3s_store_core::error::{Result, StoreError};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "a3s-box/list")
    pub repository: String,
    /// Tag (e.g., "latest", "v0.1.0")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<Digest>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `mylist` → docker.io/library/mylist:latest
    /// - `mylist:v1` → docker.io/library/mylist:v1
    /// - `localhost/mylist` → localhost/mylist:latest
    /// - `ghcr.io/org/list@sha256:abc...` → ghcr.io/org/list@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StoreError::InvalidReference(
                "empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name_tag, digest)) => {
                let digest = Digest::parse(digest).map_err(|_| {
                    StoreError::InvalidReference(format!(
                        "{reference}: expected sha256:<hex> after '@'"
                    ))
                })?;
                (name_tag, Some(digest))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(StoreError::InvalidReference(format!(
                    "{reference}: invalid tag '{tag}'"
                )));
            }
        }

        let (registry, repository) = Self::split_registry_repository(name)?;
        if !is_valid_repository(&repository) {
            return Err(StoreError::InvalidReference(format!(
                "{reference}: repository name must be lowercase"
            )));
        }

        // Apply default tag if no tag and no digest
        let tag = match (tag, &digest) {
            (Some(tag), _) => Some(tag.to_string()),
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (None, Some(_)) => None,
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str) -> Result<(String, String)> {
        // The first component is a registry if it looks like a hostname
        if let Some((first, rest)) = name.split_once('/') {
            if first.contains('.') || first.contains(':') || first == "localhost" {
                if rest.is_empty() {
                    return Err(StoreError::InvalidReference(format!(
                        "empty repository in reference '{}'",
                        name
                    )));
                }
                return Ok((first.to_string(), rest.to_string()));
            }
        }

        let repository = if name.contains('/') {
            name.to_string()
        } else {
            format!("library/{}", name)
        };

        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest.as_str());
        }
        s
    }

    /// Canonical tag name for store lookups, or `None` for digest references.
    pub fn tag_name(&self) -> Option<String> {
        self.tag
            .as_ref()
            .map(|tag| format!("{}/{}:{}", self.registry, self.repository, tag))
    }
}

/// Split `name[:tag]`, where the tag colon must come after the last slash
/// and a purely numeric suffix on a slash-less name is a registry port.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    let Some(colon) = name_tag[last_segment_start..].rfind(':') else {
        return (name_tag, None);
    };
    let colon = last_segment_start + colon;
    let after = &name_tag[colon + 1..];
    if last_segment_start == 0 && !after.is_empty() && after.bytes().all(|b| b.is_ascii_digit()) {
        return (name_tag, None);
    }
    (&name_tag[..colon], Some(after))
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 128
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

fn is_valid_repository(repository: &str) -> bool {
    !repository.is_empty()
        && repository.bytes().all(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'/' | b'_' | b'.' | b'-')
        })
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}
