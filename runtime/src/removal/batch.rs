//! Batch removal with per-target error isolation.

use std::fmt;

use a3s_store_core::error::{ErrorKind, Result, StoreError};
use serde::{Deserialize, Serialize};

use super::report::{finalize, join_errors, BatchError};
use super::{apply, plan, resolve, RemovalKind, RemovalPlan};
use crate::oci::ManifestStore;

/// Names to remove, in order, plus how to treat missing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalRequest {
    /// Target names; duplicates are processed again
    pub targets: Vec<String>,
    /// Skip names that do not resolve instead of reporting them
    pub ignore_missing: bool,
}

impl RemovalRequest {
    pub fn new<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ignore_missing: false,
        }
    }

    pub fn ignore_missing(mut self, ignore: bool) -> Self {
        self.ignore_missing = ignore;
        self
    }
}

/// What a batch actually removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    /// Tag names whose binding was removed
    pub untagged: Vec<String>,
    /// Digests whose content was freed
    pub deleted: Vec<String>,
    /// Process exit code suggested for this batch
    pub exit_code: i32,
}

impl RemovalReport {
    pub fn is_empty(&self) -> bool {
        self.untagged.is_empty() && self.deleted.is_empty()
    }

    fn record(&mut self, plan: &RemovalPlan) {
        self.untagged.extend(plan.untag.iter().cloned());
        if plan.kind == RemovalKind::Delete {
            self.deleted.push(plan.affected.to_string());
            self.deleted
                .extend(plan.cascaded.iter().map(|digest| digest.to_string()));
        }
    }
}

/// A target that failed, and why.
#[derive(Debug)]
pub struct PerTargetError {
    /// Name as given in the request
    pub name: String,
    pub kind: ErrorKind,
    pub source: StoreError,
}

impl PerTargetError {
    pub fn new(name: impl Into<String>, source: StoreError) -> Self {
        let kind = match source.kind() {
            ErrorKind::InvalidReference => ErrorKind::NotFound,
            kind => kind,
        };
        Self {
            name: name.into(),
            kind,
            source,
        }
    }
}

impl fmt::Display for PerTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            // Already carries the name
            StoreError::ImageNotFound(_) | StoreError::NotManifestList(_) => {
                write!(f, "{}", self.source)
            }
            source => write!(f, "{}: {}", self.name, source),
        }
    }
}

impl std::error::Error for PerTargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Remove every target in order, continuing past failures.
///
/// Each target runs under its own store lock and commits on its own: it
/// either contributes report entries or exactly one error, never both.
pub async fn remove_all(
    store: &ManifestStore,
    request: &RemovalRequest,
) -> (RemovalReport, Vec<PerTargetError>) {
    let mut report = RemovalReport::default();
    let mut errors = Vec::new();

    for name in &request.targets {
        match remove_one(store, name).await {
            Ok(plan) => report.record(&plan),
            Err(e) if e.is_not_found() && request.ignore_missing => {
                tracing::debug!(reference = %name, "Ignoring missing manifest list");
            }
            Err(e) => {
                tracing::debug!(reference = %name, error = %e, "Failed to remove manifest list");
                errors.push(PerTargetError::new(name.as_str(), e));
            }
        }
    }

    (report, errors)
}

/// Remove manifest lists and fold the outcome into a report plus one
/// merged error.
pub async fn manifest_rm(
    store: &ManifestStore,
    request: &RemovalRequest,
) -> (RemovalReport, Option<BatchError>) {
    let (mut report, errors) = remove_all(store, request).await;
    let status = finalize(&mut report, &errors);
    tracing::debug!(
        ?status,
        untagged = report.untagged.len(),
        deleted = report.deleted.len(),
        errors = errors.len(),
        "Manifest removal finished"
    );
    (report, join_errors(errors))
}

async fn remove_one(store: &ManifestStore, name: &str) -> Result<RemovalPlan> {
    let mut guard = store.lock().await?;

    let target =
        resolve(&guard, name).ok_or_else(|| StoreError::ImageNotFound(name.to_string()))?;
    let record = guard
        .record(target.digest())
        .ok_or_else(|| StoreError::BlobNotFound(target.digest().to_string()))?;
    if !record.is_index() {
        return Err(StoreError::NotManifestList(name.to_string()));
    }

    let plan = plan(&guard, &target)?;
    apply(&mut guard, &plan)?;
    guard.commit()?;

    match plan.kind {
        RemovalKind::Untag => {
            tracing::info!(
                reference = %name,
                digest = %plan.affected,
                "Untagged manifest list"
            );
        }
        RemovalKind::Delete => {
            tracing::info!(
                reference = %name,
                digest = %plan.affected,
                cascaded = plan.cascaded.len(),
                "Deleted manifest list"
            );
        }
    }

    Ok(plan)
}
