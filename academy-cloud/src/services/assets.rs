//! Asset Lifecycle Manager
//!
//! Deletes object-storage keys that a committed edit or delete left without
//! an owner. Deletion is best effort: failures are logged, never surfaced.

use std::collections::HashSet;
use std::sync::Arc;

use crate::storage::ObjectStore;

/// Keys present in `old` but not in `new`, first occurrence order, blanks dropped.
///
/// Both sides are compared trimmed.
pub fn superseded_keys(old: &[String], new: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = new.iter().map(|k| k.trim()).collect();
    let mut seen = HashSet::new();
    old.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && !keep.contains(k) && seen.insert(*k))
        .map(str::to_owned)
        .collect()
}

#[derive(Clone)]
pub struct AssetJanitor {
    objects: Arc<dyn ObjectStore>,
    /// Run deletions on a spawned task instead of awaiting them
    detached: bool,
}

impl AssetJanitor {
    /// Deletions run in the background, the caller never waits on storage
    pub fn detached(objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            objects,
            detached: true,
        }
    }

    /// Deletions complete before `reconcile` returns
    #[cfg(test)]
    pub fn inline(objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            objects,
            detached: false,
        }
    }

    /// Schedule deletion of `old - new`. Call only after the owning mutation committed.
    ///
    /// Returns the keys scheduled.
    pub async fn reconcile(&self, old: &[String], new: &[String]) -> Vec<String> {
        let keys = superseded_keys(old, new);
        if keys.is_empty() {
            return keys;
        }

        if self.detached {
            let objects = self.objects.clone();
            let scheduled = keys.clone();
            tokio::spawn(async move {
                delete_all(objects.as_ref(), &scheduled).await;
            });
        } else {
            delete_all(self.objects.as_ref(), &keys).await;
        }
        keys
    }
}

async fn delete_all(objects: &dyn ObjectStore, keys: &[String]) {
    for key in keys {
        match objects.delete_object(key).await {
            Ok(()) => tracing::info!(key = %key, "Released orphaned object"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to delete orphaned object"),
        }
    }
}
