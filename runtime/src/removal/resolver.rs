//! Target resolution: tag, digest, or nothing.

use a3s_store_core::digest::{is_lower_hex, is_sha256_hex, Digest, SHA256_PREFIX};

use super::StoreAccessor;
use crate::oci::ImageReference;

/// Shortest hex prefix accepted as a digest reference.
pub const MIN_DIGEST_PREFIX_LEN: usize = 12;

/// What a removal target name denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A tag binding, by its stored name.
    Tag { name: String, digest: Digest },
    /// Content named directly by digest.
    Digest(Digest),
}

impl Target {
    pub fn digest(&self) -> &Digest {
        match self {
            Target::Tag { digest, .. } => digest,
            Target::Digest(digest) => digest,
        }
    }
}

/// Resolve a user-supplied name.
///
/// Tags win over digests: the exact name is tried first, then its
/// normalized reference form, then digest forms (`sha256:<hex>`, bare hex,
/// or an unambiguous hex prefix of at least [`MIN_DIGEST_PREFIX_LEN`]).
/// Malformed names simply do not resolve.
pub fn resolve<S: StoreAccessor + ?Sized>(store: &S, name: &str) -> Option<Target> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(digest) = store.resolve_name(name) {
        return Some(Target::Tag {
            name: name.to_string(),
            digest,
        });
    }

    match ImageReference::parse(name) {
        Ok(reference) => {
            if let Some(tag) = reference.tag_name() {
                if let Some(digest) = store.resolve_name(&tag) {
                    return Some(Target::Tag { name: tag, digest });
                }
            }
            if let Some(digest) = reference.digest {
                if store.contains_blob(&digest) {
                    return Some(Target::Digest(digest));
                }
            }
        }
        Err(e) => {
            tracing::debug!(reference = %name, error = %e, "Name is not an image reference");
        }
    }

    resolve_digest(store, name)
}

fn resolve_digest<S: StoreAccessor + ?Sized>(store: &S, name: &str) -> Option<Target> {
    let hex_part = name.strip_prefix(SHA256_PREFIX).unwrap_or(name);
    if !is_lower_hex(hex_part) {
        return None;
    }

    if is_sha256_hex(hex_part) {
        let digest = Digest::from_hex(hex_part).ok()?;
        return store
            .contains_blob(&digest)
            .then_some(Target::Digest(digest));
    }

    if hex_part.len() < MIN_DIGEST_PREFIX_LEN {
        return None;
    }

    let mut matches = store.digests_with_prefix(hex_part);
    if matches.len() > 1 {
        tracing::debug!(
            prefix = %hex_part,
            candidates = matches.len(),
            "Ambiguous digest prefix"
        );
        return None;
    }
    matches.pop().map(Target::Digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::removal::testing::MemoryStore;

    #[test]
    fn test_resolve_exact_tag() {
        let mut store = MemoryStore::default();
        let digest = store.blob("list", &[]);
        store.tag("localhost/list:v1", &digest);

        let target = resolve(&store, "localhost/list:v1").unwrap();
        assert_eq!(
            target,
            Target::Tag {
                name: "localhost/list:v1".to_string(),
                digest
            }
        );
    }

    #[test]
    fn test_resolve_normalized_tag() {
        let mut store = MemoryStore::default();
        let digest = store.blob("list", &[]);
        store.tag("docker.io/library/mylist:latest", &digest);

        for name in ["mylist", "mylist:latest", " mylist "] {
            let target = resolve(&store, name).unwrap();
            assert_eq!(target.digest(), &digest);
            assert!(
                matches!(target, Target::Tag { ref name, .. } if name == "docker.io/library/mylist:latest")
            );
        }
    }

    #[test]
    fn test_resolve_full_digest() {
        let mut store = MemoryStore::default();
        let digest = store.blob("list", &[]);

        assert_eq!(
            resolve(&store, digest.as_str()),
            Some(Target::Digest(digest.clone()))
        );
        assert_eq!(
            resolve(&store, digest.hex()),
            Some(Target::Digest(digest.clone()))
        );
        assert_eq!(
            resolve(&store, &format!("localhost/list@{digest}")),
            Some(Target::Digest(digest))
        );
    }

    #[test]
    fn test_resolve_digest_prefix() {
        let mut store = MemoryStore::default();
        let digest = store.blob("list", &[]);

        let prefix = &digest.hex()[..MIN_DIGEST_PREFIX_LEN];
        assert_eq!(
            resolve(&store, prefix),
            Some(Target::Digest(digest.clone()))
        );

        let too_short = &digest.hex()[..MIN_DIGEST_PREFIX_LEN - 1];
        assert_eq!(resolve(&store, too_short), None);
    }

    #[test]
    fn test_tag_wins_over_digest_prefix() {
        let mut store = MemoryStore::default();
        let content = store.blob("content", &[]);
        let other = store.blob("other", &[]);
        let prefix = content.hex()[..MIN_DIGEST_PREFIX_LEN].to_string();
        store.tag(&prefix, &other);

        assert_eq!(resolve(&store, &prefix).unwrap().digest(), &other);
    }

    #[test]
    fn test_resolve_unknown_digest() {
        let store = MemoryStore::default();
        let digest = Digest::compute(b"absent");
        assert_eq!(resolve(&store, digest.as_str()), None);
    }

    #[test]
    fn test_resolve_missing_and_malformed() {
        let store = MemoryStore::default();
        assert_eq!(resolve(&store, ""), None);
        assert_eq!(resolve(&store, "missing"), None);
        assert_eq!(resolve(&store, "Not A Reference!"), None);
        assert_eq!(resolve(&store, "sha256:xyz"), None);
    }
}
