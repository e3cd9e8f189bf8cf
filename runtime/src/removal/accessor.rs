use a3s_store_core::digest::Digest;
use a3s_store_core::error::Result;

/// Primitive operations the removal engine needs from a store.
///
/// Implementors must only be reachable while the store is exclusively
/// locked; [`StoreGuard`](crate::oci::StoreGuard) is the production one.
pub trait StoreAccessor {
    /// Digest bound to an exact tag name.
    fn resolve_name(&self, name: &str) -> Option<Digest>;

    /// Whether a blob record exists for `digest`.
    fn contains_blob(&self, digest: &Digest) -> bool;

    /// Stored digests whose hex part starts with `hex_prefix`.
    fn digests_with_prefix(&self, hex_prefix: &str) -> Vec<Digest>;

    /// Tag names bound to `digest`, sorted.
    fn tags_of(&self, digest: &Digest) -> Vec<String>;

    /// Unbind a tag, returning the digest it pointed at.
    fn remove_tag(&mut self, name: &str) -> Result<Digest>;

    /// Tags bound to `digest` plus indices listing it as a child.
    ///
    /// Fails for digests that are not stored.
    fn refcount(&self, digest: &Digest) -> Result<usize>;

    /// Indices listing `digest` as a child.
    fn parents_of(&self, digest: &Digest) -> Vec<Digest>;

    /// Child manifests of an index; empty for anything else.
    fn child_digests(&self, digest: &Digest) -> Result<Vec<Digest>>;

    /// Drop a blob record and free its content.
    ///
    /// Fails while any tag is still bound to the digest.
    fn delete_blob(&mut self, digest: &Digest) -> Result<()>;
}
