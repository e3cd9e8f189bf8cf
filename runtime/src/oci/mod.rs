//! OCI manifest storage for A3S Store.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Manifest Store                  │
//! │                                              │
//! │  store_dir/                                  │
//! │  ├── index.json   (tags + blob records)      │
//! │  ├── store.lock   (cross-process lock)       │
//! │  └── blobs/                                  │
//! │      └── sha256/                             │
//! │          ├── <index>     (image index)       │
//! │          └── <manifest>  (image manifests)   │
//! └──────────────────────────────────────────────┘
//! ```

pub mod reference;
pub mod store;

pub use reference::ImageReference;
pub use store::{
    normalize_tag, BlobRecord, ManifestStore, StoreGuard, MEDIA_TYPE_DOCKER_MANIFEST_LIST,
    MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};
