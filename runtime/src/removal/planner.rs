//! Removal planning: untag versus delete, and cascading child deletion.

use std::collections::{HashSet, VecDeque};

use a3s_store_core::digest::Digest;
use a3s_store_core::error::{Result, StoreError};

use super::{StoreAccessor, Target};

/// Outcome class of removing one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    /// Only the binding goes; the content is still referenced.
    Untag,
    /// The content becomes unreferenced and is freed.
    Delete,
}

/// Everything one target's removal will change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    pub kind: RemovalKind,
    /// Digest the target resolved to
    pub affected: Digest,
    /// Tag bindings to remove, in name order
    pub untag: Vec<String>,
    /// Children freed along with `affected`, parents before children
    pub cascaded: Vec<Digest>,
}

/// Decide what removing `target` does to the store. Read-only.
///
/// A tag target whose content keeps another tag or a parent index is an
/// untag. A digest target removes the content's single tag, if any; it fails
/// with [`StoreError::MultipleTags`] when several tags share the content and
/// with [`StoreError::BlobInUse`] while an index still lists it.
pub fn plan<S: StoreAccessor + ?Sized>(store: &S, target: &Target) -> Result<RemovalPlan> {
    let digest = target.digest().clone();
    if !store.contains_blob(&digest) {
        return Err(StoreError::BlobNotFound(digest.to_string()));
    }

    let untag = match target {
        Target::Tag { name, .. } => vec![name.clone()],
        Target::Digest(digest) => {
            let tags = store.tags_of(digest);
            if tags.len() > 1 {
                return Err(StoreError::MultipleTags {
                    digest: digest.to_string(),
                    tags: tags.len(),
                });
            }
            tags
        }
    };

    let remaining_tags = store
        .tags_of(&digest)
        .iter()
        .filter(|tag| !untag.contains(tag))
        .count();
    let parents: Vec<Digest> = store
        .parents_of(&digest)
        .into_iter()
        .filter(|parent| parent != &digest)
        .collect();

    if remaining_tags > 0 || !parents.is_empty() {
        if let Target::Digest(_) = target {
            return Err(StoreError::BlobInUse {
                digest: digest.to_string(),
                refs: remaining_tags + parents.len(),
            });
        }

        tracing::debug!(
            digest = %digest,
            remaining_tags,
            parents = parents.len(),
            "Content stays referenced, untag only"
        );
        return Ok(RemovalPlan {
            kind: RemovalKind::Untag,
            affected: digest,
            untag,
            cascaded: Vec::new(),
        });
    }

    let cascaded = cascade(store, &digest)?;
    tracing::debug!(
        digest = %digest,
        cascaded = cascaded.len(),
        "Content becomes unreferenced, delete"
    );

    Ok(RemovalPlan {
        kind: RemovalKind::Delete,
        affected: digest,
        untag,
        cascaded,
    })
}

/// Children of `root` that lose their last reference once `root` is gone.
///
/// A child is freed only when it has no tags and every parent index is
/// itself being freed. A child is re-examined each time another of its
/// parents is freed, and the `doomed` set bounds the walk on cyclic data.
fn cascade<S: StoreAccessor + ?Sized>(store: &S, root: &Digest) -> Result<Vec<Digest>> {
    let mut doomed: HashSet<Digest> = HashSet::from([root.clone()]);
    let mut cascaded = Vec::new();
    let mut queue: VecDeque<Digest> = store.child_digests(root)?.into();

    while let Some(child) = queue.pop_front() {
        if doomed.contains(&child) || !store.contains_blob(&child) {
            continue;
        }
        if !store.tags_of(&child).is_empty() {
            continue;
        }
        let has_live_parent = store
            .parents_of(&child)
            .iter()
            .any(|parent| parent != &child && !doomed.contains(parent));
        if has_live_parent {
            continue;
        }

        doomed.insert(child.clone());
        queue.extend(store.child_digests(&child)?);
        cascaded.push(child);
    }

    Ok(cascaded)
}

/// Carry out a plan against a locked store.
///
/// Changes only become durable when the caller commits the guard, so an
/// error here leaves nothing behind.
pub fn apply<S: StoreAccessor + ?Sized>(store: &mut S, plan: &RemovalPlan) -> Result<()> {
    for name in &plan.untag {
        store.remove_tag(name)?;
    }

    if plan.kind == RemovalKind::Untag {
        return Ok(());
    }

    store.delete_blob(&plan.affected)?;
    for digest in &plan.cascaded {
        store.delete_blob(digest)?;
    }

    // A surviving index must not point at freed content.
    for digest in std::iter::once(&plan.affected).chain(&plan.cascaded) {
        let parents = store.parents_of(digest);
        if !parents.is_empty() {
            return Err(StoreError::BlobInUse {
                digest: digest.to_string(),
                refs: parents.len(),
            });
        }
    }

    Ok(())
}
