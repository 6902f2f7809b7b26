//! Three-way reconciliation of local and remote bookmark state.
//!
//! [`reconcile`] is a pure function: given the local bookmark set, the local
//! tombstone set, and one remote inventory snapshot, it partitions every uid
//! into at most one of six action lists plus the tombstone purge set. The
//! same inputs always produce the same plan, and a plan applied to fresh
//! state reconciles to an empty plan on the next pass.

use std::collections::HashSet;
use std::mem;

use tracing::{debug, warn};

use crate::error::Result;
use crate::inventory::RemoteInventory;
use crate::models::{BookmarkRecord, Uid};
use crate::resolver::BookResolver;
use crate::store::BookmarkStore;

/// Actions required to bring local and remote state into agreement.
///
/// The lists are disjoint by uid. Bookmark lists keep the enumeration order
/// of the local input; uid lists are sorted.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationPlan {
    /// Local bookmarks the server has never seen
    pub to_send_to_server: Vec<BookmarkRecord>,
    /// Local bookmarks whose content must overwrite the server's
    pub to_update_on_server: Vec<BookmarkRecord>,
    /// Local bookmarks to rebuild from the server's newer content
    pub to_update_on_client: Vec<BookmarkRecord>,
    /// Local bookmarks the server reports as deleted
    pub to_delete_on_client: Vec<BookmarkRecord>,
    /// Remote-only uids to materialize locally
    pub to_get_from_server: Vec<Uid>,
    /// Remote-only uids deleted locally before ever materializing
    pub to_delete_on_server: Vec<Uid>,
    /// Client tombstones the server no longer knows as active
    pub to_purge_local_tombstones: Vec<Uid>,
}

impl ReconciliationPlan {
    /// True when the pass has nothing left to do
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_send_to_server.is_empty()
            && self.to_update_on_server.is_empty()
            && self.to_update_on_client.is_empty()
            && self.to_delete_on_client.is_empty()
            && self.to_get_from_server.is_empty()
            && self.to_delete_on_server.is_empty()
            && self.to_purge_local_tombstones.is_empty()
    }
}

/// Classify every bookmark into the action lists of one pass.
#[must_use]
pub fn reconcile(
    local: &[BookmarkRecord],
    local_tombstones: &HashSet<Uid>,
    remote: &RemoteInventory,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    // Step A: a tombstone the server no longer lists as active carries no
    // further sync obligation.
    plan.to_purge_local_tombstones = local_tombstones
        .iter()
        .filter(|uid| !remote.active.contains_key(*uid))
        .cloned()
        .collect();
    plan.to_purge_local_tombstones.sort();

    // Step B: classify each local bookmark against its remote entry.
    let mut matched: HashSet<&Uid> = HashSet::new();
    for bookmark in local {
        let Some(entry) = remote.active.get(&bookmark.uid) else {
            if remote.deleted.contains(&bookmark.uid) {
                plan.to_delete_on_client.push(bookmark.clone());
            } else {
                plan.to_send_to_server.push(bookmark.clone());
            }
            continue;
        };
        matched.insert(&bookmark.uid);

        match (&entry.version_uid, &bookmark.version_uid) {
            // Placeholder entry: the server knows the uid but holds no
            // content. Resend only if we ever synced content before.
            (None, Some(_)) => plan.to_update_on_server.push(bookmark.clone()),
            (None, None) => {}
            (Some(_), None) => plan.to_update_on_client.push(bookmark.clone()),
            (Some(remote_version), Some(local_version)) => {
                if remote_version != local_version {
                    // Timestamp arbitration; local wins ties.
                    if entry.modification_timestamp <= bookmark.modified_or_created_at() {
                        plan.to_update_on_server.push(bookmark.clone());
                    } else {
                        plan.to_update_on_client.push(bookmark.clone());
                    }
                }
            }
        }
    }

    // Step C: remote-only uids, partitioned by the local tombstone set.
    let mut leftover: Vec<&Uid> = remote
        .active
        .keys()
        .filter(|uid| !matched.contains(uid))
        .collect();
    leftover.sort();
    for uid in leftover {
        if local_tombstones.contains(uid) {
            plan.to_delete_on_server.push(uid.clone());
        } else {
            plan.to_get_from_server.push(uid.clone());
        }
    }

    debug!(
        send = plan.to_send_to_server.len(),
        update_server = plan.to_update_on_server.len(),
        update_client = plan.to_update_on_client.len(),
        delete_client = plan.to_delete_on_client.len(),
        get = plan.to_get_from_server.len(),
        delete_server = plan.to_delete_on_server.len(),
        purge = plan.to_purge_local_tombstones.len(),
        "classified bookmarks"
    );
    plan
}

/// Step D: drop get-from-server uids whose book hashes resolve to no local
/// book. A bookmark cannot be materialized without a host book.
///
/// Returns the number of dropped uids.
pub fn retain_materializable<S: BookmarkStore>(
    plan: &mut ReconciliationPlan,
    remote: &RemoteInventory,
    resolver: &mut BookResolver<'_, S>,
) -> Result<usize> {
    let candidates = mem::take(&mut plan.to_get_from_server);
    let mut dropped = 0;
    for uid in candidates {
        let resolved = match remote.active.get(&uid) {
            Some(entry) => resolver.resolve(&entry.book_hashes)?.is_some(),
            None => false,
        };
        if resolved {
            plan.to_get_from_server.push(uid);
        } else {
            dropped += 1;
            warn!(%uid, "skipping remote bookmark for unknown book");
        }
    }
    Ok(dropped)
}
