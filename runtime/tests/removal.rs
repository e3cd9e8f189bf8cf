//! Integration tests: manifest list removal against an on-disk store.
//!
//! Every test builds its own store in a temporary directory, populates it
//! with manifest lists through the public API, and then drives
//! `remove_all` / `manifest_rm` the way the CLI does.

use std::sync::Arc;

use a3s_store_core::digest::Digest;
use a3s_store_core::error::{ErrorKind, StoreError};
use a3s_store_runtime::oci::MEDIA_TYPE_IMAGE_MANIFEST;
use a3s_store_runtime::removal::{EXIT_FAILURE, EXIT_NOT_FOUND, EXIT_SUCCESS};
use a3s_store_runtime::{
    finalize, manifest_rm, remove_all, ExitStatus, ManifestStore, RemovalRequest, StoreAccessor,
};
use tempfile::TempDir;

/// Store two platform manifests and an index over them.
async fn put_list(store: &ManifestStore, name: &str) -> (Digest, Vec<Digest>) {
    let mut children = Vec::new();
    for platform in ["linux/amd64", "linux/arm64"] {
        let body = format!(r#"{{"schemaVersion":2,"list":"{name}","platform":"{platform}"}}"#);
        children.push(
            store
                .put_blob(body.as_bytes(), MEDIA_TYPE_IMAGE_MANIFEST)
                .await
                .unwrap(),
        );
    }
    let list = store.put_index(&children).await.unwrap();
    (list, children)
}

async fn refcount(store: &ManifestStore, digest: &Digest) -> Result<usize, StoreError> {
    let guard = store.lock().await?;
    guard.refcount(digest)
}

#[tokio::test]
async fn test_removing_only_tag_deletes_list_and_children() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "mylist").await;
    let tag = store.tag("localhost/mylist:v1", &list).await.unwrap();

    let (report, error) = manifest_rm(&store, &RemovalRequest::new(["localhost/mylist:v1"])).await;

    assert!(error.is_none());
    assert_eq!(report.untagged, vec![tag]);
    assert_eq!(
        report.deleted,
        vec![
            list.to_string(),
            children[0].to_string(),
            children[1].to_string()
        ]
    );
    assert_eq!(report.exit_code, EXIT_SUCCESS);

    assert!(store.list_tags().await.unwrap().is_empty());
    for digest in std::iter::once(&list).chain(&children) {
        assert!(matches!(
            refcount(&store, digest).await,
            Err(StoreError::BlobNotFound(_))
        ));
        assert!(matches!(
            store.read_blob(digest).await,
            Err(StoreError::BlobNotFound(_))
        ));
    }
    assert!(store.sweep_orphans().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removing_one_of_two_tags_untags_only() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "mylist").await;
    store.tag("mylist:v1", &list).await.unwrap();
    store.tag("mylist:v2", &list).await.unwrap();
    assert_eq!(refcount(&store, &list).await.unwrap(), 2);

    let (report, error) = manifest_rm(&store, &RemovalRequest::new(["mylist:v1"])).await;

    assert!(error.is_none());
    assert_eq!(report.untagged, vec!["docker.io/library/mylist:v1".to_string()]);
    assert!(report.deleted.is_empty());
    assert_eq!(refcount(&store, &list).await.unwrap(), 1);
    assert_eq!(store.inspect("mylist:v2").await.unwrap().digest, list);
    for child in &children {
        assert!(store.read_blob(child).await.is_ok());
    }
}

#[tokio::test]
async fn test_missing_target_ignored() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (a, _) = put_list(&store, "a").await;
    let (b, _) = put_list(&store, "b").await;
    store.tag("a", &a).await.unwrap();
    store.tag("b", &b).await.unwrap();

    let request = RemovalRequest::new(["a", "missing", "b"]).ignore_missing(true);
    let (mut report, errors) = remove_all(&store, &request).await;

    assert!(errors.is_empty());
    assert_eq!(
        report.untagged,
        vec![
            "docker.io/library/a:latest".to_string(),
            "docker.io/library/b:latest".to_string()
        ]
    );
    assert_eq!(report.deleted.len(), 6);
    assert_eq!(finalize(&mut report, &errors), ExitStatus::Success);
    assert_eq!(report.exit_code, EXIT_SUCCESS);
}

#[tokio::test]
async fn test_missing_target_reported_and_batch_continues() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (a, _) = put_list(&store, "a").await;
    let (b, _) = put_list(&store, "b").await;
    store.tag("a", &a).await.unwrap();
    store.tag("b", &b).await.unwrap();

    let request = RemovalRequest::new(["a", "missing", "b"]);
    let (report, error) = manifest_rm(&store, &request).await;

    assert_eq!(report.untagged.len(), 2);
    assert!(report.deleted.contains(&a.to_string()));
    assert!(report.deleted.contains(&b.to_string()));
    assert_eq!(report.exit_code, EXIT_NOT_FOUND);

    let error = error.expect("missing target should be reported");
    assert_eq!(error.errors().len(), 1);
    assert_eq!(error.errors()[0].name, "missing");
    assert_eq!(error.errors()[0].kind, ErrorKind::NotFound);
    assert_eq!(error.to_string(), "missing: image not known");
}

#[tokio::test]
async fn test_second_removal_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, _) = put_list(&store, "a").await;
    store.tag("a", &list).await.unwrap();

    let request = RemovalRequest::new(["a"]);
    let (first, error) = manifest_rm(&store, &request).await;
    assert!(error.is_none());
    assert_eq!(first.deleted.len(), 3);

    let (second, error) = manifest_rm(&store, &request).await;
    assert!(second.untagged.is_empty());
    assert!(second.deleted.is_empty());
    let error = error.unwrap();
    assert_eq!(error.errors()[0].kind, ErrorKind::NotFound);
    assert_eq!(second.exit_code, EXIT_NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_targets_processed_in_order() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, _) = put_list(&store, "a").await;
    store.tag("a:v1", &list).await.unwrap();
    store.tag("a:v2", &list).await.unwrap();

    let request = RemovalRequest::new(["a:v1", "a:v1", "a:v2"]);
    let (report, errors) = remove_all(&store, &request).await;

    assert_eq!(
        report.untagged,
        vec![
            "docker.io/library/a:v1".to_string(),
            "docker.io/library/a:v2".to_string()
        ]
    );
    assert_eq!(report.deleted[0], list.to_string());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name, "a:v1");
}

#[tokio::test]
async fn test_remove_by_digest_with_one_tag() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "a").await;
    store.tag("a:v1", &list).await.unwrap();

    let (report, error) = manifest_rm(&store, &RemovalRequest::new([list.as_str()])).await;

    assert!(error.is_none());
    assert_eq!(report.untagged, vec!["docker.io/library/a:v1".to_string()]);
    assert_eq!(report.deleted.len(), 1 + children.len());
    assert!(store.list_tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_by_digest_with_several_tags_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "a").await;
    store.tag("a:v1", &list).await.unwrap();
    store.tag("b:v1", &list).await.unwrap();

    let (report, error) = manifest_rm(&store, &RemovalRequest::new([list.as_str()])).await;

    assert!(report.is_empty());
    assert_eq!(report.exit_code, EXIT_FAILURE);
    let error = error.unwrap();
    assert_eq!(error.errors()[0].kind, ErrorKind::StoreFailure);
    assert!(matches!(
        error.errors()[0].source,
        StoreError::MultipleTags { tags: 2, .. }
    ));

    assert_eq!(store.list_tags().await.unwrap().len(), 2);
    assert_eq!(refcount(&store, &list).await.unwrap(), 2);
    for child in &children {
        assert!(store.read_blob(child).await.is_ok());
    }
}

#[tokio::test]
async fn test_plain_manifest_is_not_removed() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "a").await;
    store.tag("a", &list).await.unwrap();
    store.tag("app", &children[0]).await.unwrap();

    let request = RemovalRequest::new(["app", "a"]);
    let (report, error) = manifest_rm(&store, &request).await;

    let error = error.unwrap();
    assert_eq!(error.errors().len(), 1);
    assert_eq!(error.errors()[0].name, "app");
    assert_eq!(error.errors()[0].kind, ErrorKind::StoreFailure);
    assert_eq!(error.to_string(), "app is not a manifest list");
    assert_eq!(report.exit_code, EXIT_FAILURE);

    // The list goes; the tagged manifest keeps its tag and content.
    assert_eq!(report.untagged, vec!["docker.io/library/a:latest".to_string()]);
    assert_eq!(report.deleted, vec![list.to_string(), children[1].to_string()]);
    assert_eq!(store.inspect("app").await.unwrap().digest, children[0]);
    assert!(store.read_blob(&children[0]).await.is_ok());
}

#[tokio::test]
async fn test_store_failure_is_isolated_and_atomic() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (inner, _) = put_list(&store, "inner").await;
    let outer = store.put_index(std::slice::from_ref(&inner)).await.unwrap();
    let (other, _) = put_list(&store, "b").await;
    store.tag("outer", &outer).await.unwrap();
    store.tag("inner", &inner).await.unwrap();
    store.tag("b", &other).await.unwrap();

    // The inner list is still listed by "outer", so freeing it by digest must
    // fail without dropping its tag.
    let request = RemovalRequest::new([inner.to_string(), "b".to_string()]);
    let (report, error) = manifest_rm(&store, &request).await;

    let error = error.unwrap();
    assert_eq!(error.errors().len(), 1);
    assert_eq!(error.errors()[0].kind, ErrorKind::StoreFailure);
    assert!(matches!(
        error.errors()[0].source,
        StoreError::BlobInUse { .. }
    ));
    assert_eq!(report.exit_code, EXIT_FAILURE);

    assert_eq!(report.untagged, vec!["docker.io/library/b:latest".to_string()]);
    assert_eq!(report.deleted[0], other.to_string());
    assert_eq!(store.inspect("inner").await.unwrap().digest, inner);
    assert_eq!(refcount(&store, &inner).await.unwrap(), 2);
}

#[tokio::test]
async fn test_commit_failure_leaves_store_unchanged() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "a").await;
    store.tag("a", &list).await.unwrap();

    // A directory where the index temp file goes makes every commit fail.
    let blocker = tmp.path().join("index.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let (report, errors) = remove_all(&store, &RemovalRequest::new(["a", "a"])).await;

    assert!(report.is_empty());
    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert_eq!(error.name, "a");
        assert_eq!(error.kind, ErrorKind::StoreFailure);
        assert!(matches!(error.source, StoreError::IoError(_)));
    }

    assert_eq!(store.list_tags().await.unwrap().len(), 1);
    assert_eq!(refcount(&store, &list).await.unwrap(), 1);
    for digest in std::iter::once(&list).chain(&children) {
        assert!(store.read_blob(digest).await.is_ok());
    }

    std::fs::remove_dir(&blocker).unwrap();
    let (report, error) = manifest_rm(&store, &RemovalRequest::new(["a"])).await;
    assert!(error.is_none());
    assert_eq!(report.deleted.len(), 1 + children.len());
}

#[tokio::test]
async fn test_shared_child_survives_list_removal() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::open(tmp.path()).unwrap();
    let (list, children) = put_list(&store, "a").await;
    let sibling = store.put_index(&children[..1]).await.unwrap();
    store.tag("a", &list).await.unwrap();
    store.tag("sibling", &sibling).await.unwrap();

    let (report, error) = manifest_rm(&store, &RemovalRequest::new(["a"])).await;

    assert!(error.is_none());
    assert_eq!(
        report.deleted,
        vec![list.to_string(), children[1].to_string()]
    );
    assert_eq!(refcount(&store, &children[0]).await.unwrap(), 1);
    assert!(store.read_blob(&children[0]).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_removals_delete_once() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ManifestStore::open(tmp.path()).unwrap());
    let (list, children) = put_list(&store, "a").await;
    store.tag("a:one", &list).await.unwrap();
    store.tag("a:two", &list).await.unwrap();

    let handles: Vec<_> = ["a:one", "a:two"]
        .into_iter()
        .map(|name| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { remove_all(&store, &RemovalRequest::new([name])).await })
        })
        .collect();

    let mut untagged = Vec::new();
    let mut deleted = Vec::new();
    for handle in handles {
        let (report, errors) = handle.await.unwrap();
        assert!(errors.is_empty());
        untagged.extend(report.untagged);
        deleted.extend(report.deleted);
    }

    assert_eq!(untagged.len(), 2);
    assert_eq!(deleted.iter().filter(|d| **d == list.to_string()).count(), 1);
    assert_eq!(deleted.len(), 1 + children.len());
    assert!(store.list_tags().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_store_handles_serialize_on_file_lock() {
    let tmp = TempDir::new().unwrap();
    let first = Arc::new(ManifestStore::open(tmp.path()).unwrap());
    let second = Arc::new(ManifestStore::open(tmp.path()).unwrap());
    let (list, children) = put_list(&first, "a").await;
    first.tag("a:one", &list).await.unwrap();
    first.tag("a:two", &list).await.unwrap();

    let one = {
        let store = Arc::clone(&first);
        tokio::spawn(async move { remove_all(&store, &RemovalRequest::new(["a:one"])).await })
    };
    let two = {
        let store = Arc::clone(&second);
        tokio::spawn(async move { remove_all(&store, &RemovalRequest::new(["a:two"])).await })
    };

    let (report_one, errors_one) = one.await.unwrap();
    let (report_two, errors_two) = two.await.unwrap();
    assert!(errors_one.is_empty());
    assert!(errors_two.is_empty());

    let total_deleted = report_one.deleted.len() + report_two.deleted.len();
    assert_eq!(total_deleted, 1 + children.len());
    assert!(report_one.deleted.is_empty() || report_two.deleted.is_empty());
    assert!(second.list_tags().await.unwrap().is_empty());
}
