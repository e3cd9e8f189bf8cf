//! Disk-based content-addressable manifest store.
//!
//! Blobs live under `blobs/sha256/<hex>`. Tag bindings and per-blob records
//! (media type, size, child manifests) live in a persistent `index.json`.
//! Reference counts are derived from the index, never stored: a blob's
//! refcount is the number of tags bound to it plus the number of image
//! indices listing it as a child.
//!
//! Every read or mutation goes through a [`StoreGuard`], which holds both an
//! in-process mutex and an exclusive OS lock on `store.lock`, so other
//! processes sharing the directory are serialized as well. Mutations are made
//! on the guard's private copy of the index and only become visible when
//! [`StoreGuard::commit`] atomically replaces `index.json`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use a3s_store_core::config::StoreConfig;
use a3s_store_core::digest::{is_sha256_hex, Digest};
use a3s_store_core::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::reference::ImageReference;
use crate::removal::{resolve, StoreAccessor};

/// OCI image index media type.
pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// OCI image manifest media type.
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Docker manifest list media type (treated like an OCI index).
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

const INDEX_FILE: &str = "index.json";
const LOCK_FILE: &str = "store.lock";
const BLOBS_DIR: &str = "blobs";
const ALGORITHM_DIR: &str = "sha256";

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Content digest
    pub digest: Digest,
    /// Media type of the content
    pub media_type: String,
    /// Content size in bytes
    pub size_bytes: u64,
    /// Child manifests, for image indices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Digest>,
    /// When the blob was added
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    /// Whether this blob is an image index / manifest list.
    pub fn is_index(&self) -> bool {
        is_index_media_type(&self.media_type)
    }
}

fn is_index_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_IMAGE_INDEX || media_type == MEDIA_TYPE_DOCKER_MANIFEST_LIST
}

/// Persistent index stored as JSON on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreIndex {
    /// Tag name → digest
    #[serde(default)]
    tags: BTreeMap<String, Digest>,
    /// Digest → blob record
    #[serde(default)]
    blobs: BTreeMap<Digest, BlobRecord>,
}

impl StoreIndex {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            StoreError::Corrupted(format!(
                "failed to parse store index {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write to a temp file, then rename over the old index.
    fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Minimal OCI image index document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageIndexDocument {
    schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    media_type: String,
    digest: Digest,
    size: u64,
}

/// Content-addressable manifest store rooted at a directory.
pub struct ManifestStore {
    /// Root directory for the store
    store_dir: PathBuf,
    /// Serializes guards within this process before taking the file lock
    mutex: Mutex<()>,
}

impl ManifestStore {
    /// Open (or create) a store.
    pub fn open(store_dir: &Path) -> Result<Self> {
        let blobs_dir = store_dir.join(BLOBS_DIR).join(ALGORITHM_DIR);
        std::fs::create_dir_all(&blobs_dir).map_err(|e| {
            StoreError::ConfigError(format!(
                "Failed to create manifest store directory {}: {}",
                blobs_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            store_dir: store_dir.to_path_buf(),
            mutex: Mutex::new(()),
        })
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.store_dir)
    }

    /// Get the store directory path.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Acquire exclusive access to the store.
    ///
    /// Waits for other holders in this process, then for other processes.
    /// The lock is released when the guard is dropped.
    pub async fn lock(&self) -> Result<StoreGuard<'_>> {
        let guard = self.mutex.lock().await;

        let lock_path = self.store_dir.join(LOCK_FILE);
        let lock_file = tokio::task::spawn_blocking(move || acquire_file_lock(&lock_path))
            .await
            .map_err(|e| StoreError::LockError(format!("lock task failed: {e}")))??;

        let index = StoreIndex::load(&self.index_path())?;

        Ok(StoreGuard {
            store: self,
            index,
            freed: Vec::new(),
            dirty: false,
            _lock: lock_file,
            _guard: guard,
        })
    }

    /// Store raw content and return its digest.
    ///
    /// Index media types are parsed so their child manifests are recorded;
    /// every child must already be stored.
    pub async fn put_blob(&self, data: &[u8], media_type: &str) -> Result<Digest> {
        let mut guard = self.lock().await?;
        let children = if is_index_media_type(media_type) {
            index_children(data)?
        } else {
            Vec::new()
        };
        let digest = guard.insert_blob(data, media_type, children)?;
        guard.commit()?;
        Ok(digest)
    }

    /// Create an OCI image index over existing blobs.
    pub async fn put_index(&self, children: &[Digest]) -> Result<Digest> {
        let mut guard = self.lock().await?;

        let mut manifests = Vec::with_capacity(children.len());
        for child in children {
            let record = guard
                .record(child)
                .ok_or_else(|| StoreError::BlobNotFound(child.to_string()))?;
            manifests.push(Descriptor {
                media_type: record.media_type.clone(),
                digest: child.clone(),
                size: record.size_bytes,
            });
        }

        let document = ImageIndexDocument {
            schema_version: 2,
            media_type: Some(MEDIA_TYPE_IMAGE_INDEX.to_string()),
            manifests,
        };
        let data = serde_json::to_vec(&document)?;

        let digest = guard.insert_blob(&data, MEDIA_TYPE_IMAGE_INDEX, children.to_vec())?;
        guard.commit()?;
        Ok(digest)
    }

    /// Bind `name` to `digest`, moving the tag if it already exists.
    ///
    /// Returns the normalized tag name that was stored.
    pub async fn tag(&self, name: &str, digest: &Digest) -> Result<String> {
        let tag = normalize_tag(name)?;
        let mut guard = self.lock().await?;
        guard.tag(&tag, digest)?;
        guard.commit()?;
        Ok(tag)
    }

    /// List all tags with the record they point at.
    pub async fn list_tags(&self) -> Result<Vec<(String, BlobRecord)>> {
        let guard = self.lock().await?;
        guard
            .tags()
            .iter()
            .map(|(name, digest)| {
                guard
                    .record(digest)
                    .cloned()
                    .map(|record| (name.clone(), record))
                    .ok_or_else(|| {
                        StoreError::Corrupted(format!("tag {name} points at missing blob {digest}"))
                    })
            })
            .collect()
    }

    /// Look up the record a tag or digest reference points at.
    pub async fn inspect(&self, name: &str) -> Result<BlobRecord> {
        let guard = self.lock().await?;
        let target =
            resolve(&guard, name).ok_or_else(|| StoreError::ImageNotFound(name.to_string()))?;
        guard
            .record(target.digest())
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(target.digest().to_string()))
    }

    /// Read blob content.
    pub async fn read_blob(&self, digest: &Digest) -> Result<Vec<u8>> {
        match tokio::fs::read(self.blob_path(digest)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(digest.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove blob files that no index record refers to.
    ///
    /// These are left behind when a process dies between writing a blob and
    /// committing the index, or when unlinking a freed blob failed.
    pub async fn sweep_orphans(&self) -> Result<Vec<PathBuf>> {
        let guard = self.lock().await?;
        let blobs_dir = self.store_dir.join(BLOBS_DIR).join(ALGORITHM_DIR);

        let mut removed = Vec::new();
        for entry in std::fs::read_dir(&blobs_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            let referenced = is_sha256_hex(&name)
                && Digest::from_hex(&name)
                    .map(|d| guard.contains_blob(&d))
                    .unwrap_or(false);
            if referenced {
                continue;
            }

            let path = entry.path();
            std::fs::remove_file(&path)?;
            tracing::debug!(path = %path.display(), "Removed orphaned blob file");
            removed.push(path);
        }

        Ok(removed)
    }

    fn index_path(&self) -> PathBuf {
        self.store_dir.join(INDEX_FILE)
    }

    fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.store_dir
            .join(BLOBS_DIR)
            .join(ALGORITHM_DIR)
            .join(digest.hex())
    }
}

impl std::fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestStore")
            .field("store_dir", &self.store_dir)
            .finish()
    }
}

/// Exclusive, transactional view of the store.
///
/// Dropping a guard without calling [`commit`](Self::commit) discards every
/// change made through it.
pub struct StoreGuard<'a> {
    store: &'a ManifestStore,
    index: StoreIndex,
    /// Blobs whose records were deleted; files are unlinked after commit
    freed: Vec<Digest>,
    dirty: bool,
    // Field order matters: the file lock is released before the mutex.
    _lock: File,
    _guard: MutexGuard<'a, ()>,
}

impl StoreGuard<'_> {
    /// Record for a stored blob.
    pub fn record(&self, digest: &Digest) -> Option<&BlobRecord> {
        self.index.blobs.get(digest)
    }

    /// All tag bindings.
    pub fn tags(&self) -> &BTreeMap<String, Digest> {
        &self.index.tags
    }

    /// Bind an already-normalized tag name to a stored blob.
    ///
    /// Returns the digest the tag pointed at before, if any.
    pub fn tag(&mut self, name: &str, digest: &Digest) -> Result<Option<Digest>> {
        if !self.contains_blob(digest) {
            return Err(StoreError::BlobNotFound(digest.to_string()));
        }
        self.dirty = true;
        Ok(self.index.tags.insert(name.to_string(), digest.clone()))
    }

    /// Write content to disk and record it.
    fn insert_blob(
        &mut self,
        data: &[u8],
        media_type: &str,
        children: Vec<Digest>,
    ) -> Result<Digest> {
        for child in &children {
            if !self.contains_blob(child) {
                return Err(StoreError::BlobNotFound(child.to_string()));
            }
        }

        let digest = Digest::compute(data);
        write_blob_file(&self.store.blob_path(&digest), data)?;

        if !self.index.blobs.contains_key(&digest) {
            self.index.blobs.insert(
                digest.clone(),
                BlobRecord {
                    digest: digest.clone(),
                    media_type: media_type.to_string(),
                    size_bytes: data.len() as u64,
                    children,
                    created_at: Utc::now(),
                },
            );
            self.dirty = true;
        }

        // Re-adding freed content in the same transaction keeps the file.
        self.freed.retain(|d| d != &digest);
        Ok(digest)
    }

    /// Persist changes and unlink freed blob files.
    ///
    /// Returns the digests whose content was freed.
    pub fn commit(mut self) -> Result<Vec<Digest>> {
        if self.dirty {
            self.index.save(&self.store.index_path())?;
        }

        let freed = std::mem::take(&mut self.freed);
        for digest in &freed {
            let path = self.store.blob_path(digest);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        digest = %digest,
                        error = %e,
                        "Failed to remove freed blob file, leaving it for sweep"
                    );
                }
            }
        }

        Ok(freed)
    }
}

impl StoreAccessor for StoreGuard<'_> {
    fn resolve_name(&self, name: &str) -> Option<Digest> {
        self.index.tags.get(name).cloned()
    }

    fn contains_blob(&self, digest: &Digest) -> bool {
        self.index.blobs.contains_key(digest)
    }

    fn digests_with_prefix(&self, hex_prefix: &str) -> Vec<Digest> {
        self.index
            .blobs
            .keys()
            .filter(|d| d.hex().starts_with(hex_prefix))
            .cloned()
            .collect()
    }

    fn tags_of(&self, digest: &Digest) -> Vec<String> {
        self.index
            .tags
            .iter()
            .filter(|(_, d)| *d == digest)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn remove_tag(&mut self, name: &str) -> Result<Digest> {
        let digest = self
            .index
            .tags
            .remove(name)
            .ok_or_else(|| StoreError::ImageNotFound(name.to_string()))?;
        self.dirty = true;
        Ok(digest)
    }

    fn refcount(&self, digest: &Digest) -> Result<usize> {
        if !self.contains_blob(digest) {
            return Err(StoreError::BlobNotFound(digest.to_string()));
        }
        Ok(self.tags_of(digest).len() + self.parents_of(digest).len())
    }

    fn parents_of(&self, digest: &Digest) -> Vec<Digest> {
        self.index
            .blobs
            .values()
            .filter(|record| record.children.contains(digest))
            .map(|record| record.digest.clone())
            .collect()
    }

    fn child_digests(&self, digest: &Digest) -> Result<Vec<Digest>> {
        self.record(digest)
            .map(|record| record.children.clone())
            .ok_or_else(|| StoreError::BlobNotFound(digest.to_string()))
    }

    fn delete_blob(&mut self, digest: &Digest) -> Result<()> {
        if !self.contains_blob(digest) {
            return Err(StoreError::BlobNotFound(digest.to_string()));
        }
        let tags = self.tags_of(digest);
        if !tags.is_empty() {
            return Err(StoreError::BlobInUse {
                digest: digest.to_string(),
                refs: tags.len(),
            });
        }

        self.index.blobs.remove(digest);
        self.freed.push(digest.clone());
        self.dirty = true;
        Ok(())
    }
}

/// Normalize a user-supplied name into the form tags are stored under.
pub fn normalize_tag(name: &str) -> Result<String> {
    ImageReference::parse(name)?.tag_name().ok_or_else(|| {
        StoreError::InvalidReference(format!("{name}: cannot use a digest reference as a tag"))
    })
}

fn acquire_file_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            StoreError::LockError(format!("failed to open {}: {}", path.display(), e))
        })?;
    file.lock_exclusive()
        .map_err(|e| StoreError::LockError(format!("failed to lock {}: {}", path.display(), e)))?;
    Ok(file)
}

fn write_blob_file(path: &Path, data: &[u8]) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn index_children(data: &[u8]) -> Result<Vec<Digest>> {
    let document: ImageIndexDocument = serde_json::from_slice(data)?;
    Ok(document.manifests.into_iter().map(|m| m.digest).collect())
}
