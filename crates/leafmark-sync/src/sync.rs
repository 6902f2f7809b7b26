//! The reconciliation pass driver.
//!
//! One pass is a sequential pipeline: fetch the full remote inventory,
//! classify, apply local-side actions, submit the outgoing batch. The pass
//! assumes exclusive access to the local store for its duration; callers
//! serialize passes. There is no mid-stage cancellation: a cancellation
//! request is honored between stages only, and classification itself is
//! pure and fast.
//!
//! Any fatal error aborts the pass where it happened. Local mutations
//! already committed by earlier sub-steps are not rolled back; the
//! classification is idempotent, so retrying a whole pass converges.

use tracing::debug;

use crate::apply::apply_local_changes;
use crate::error::Result;
use crate::inventory::fetch_remote_inventory;
use crate::models::BookmarkRecord;
use crate::reconcile::{reconcile, retain_materializable};
use crate::resolver::BookResolver;
use crate::store::{BookmarkQuery, BookmarkStore};
use crate::submit::submit_remote_changes;
use crate::transport::SyncTransport;

/// Local enumeration page size
const LOCAL_PAGE_SIZE: usize = 20;

/// Pass-scoped timestamp, captured once and threaded through every request
/// the pass issues, so a whole pass is reproducible in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncClock {
    timestamp_ms: i64,
}

impl SyncClock {
    /// Capture the current wall-clock time
    #[must_use]
    pub fn now() -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Fixed timestamp (Unix ms)
    #[must_use]
    pub const fn at(timestamp_ms: i64) -> Self {
        Self { timestamp_ms }
    }

    #[must_use]
    pub const fn timestamp_ms(self) -> i64 {
        self.timestamp_ms
    }
}

/// What one successful pass did.
///
/// `skipped` counts items left unsynced by design (unknown book, malformed
/// payload, unhashable book); a non-zero value is not a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub purged_tombstones: usize,
    pub deleted_on_client: usize,
    pub created_on_client: usize,
    pub updated_on_client: usize,
    pub submitted_directives: usize,
    pub skipped: usize,
}

/// Run one full reconciliation pass against the current wall clock.
pub async fn sync_bookmarks<S, T>(transport: &T, store: &S) -> Result<SyncReport>
where
    S: BookmarkStore,
    T: SyncTransport,
{
    sync_bookmarks_at(transport, store, SyncClock::now()).await
}

/// Run one full reconciliation pass with an explicit pass clock.
pub async fn sync_bookmarks_at<S, T>(
    transport: &T,
    store: &S,
    clock: SyncClock,
) -> Result<SyncReport>
where
    S: BookmarkStore,
    T: SyncTransport,
{
    let inventory = fetch_remote_inventory(transport, clock).await?;
    let local = load_local_bookmarks(store)?;
    let tombstones = store.deleted_bookmark_uids()?;

    let mut plan = reconcile(&local, &tombstones, &inventory);
    let mut resolver = BookResolver::new(store);
    let unresolvable = retain_materializable(&mut plan, &inventory, &mut resolver)?;

    let applied = apply_local_changes(store, transport, &plan, &mut resolver).await?;
    let submitted = submit_remote_changes(store, transport, &plan, clock).await?;

    let report = SyncReport {
        purged_tombstones: applied.purged_tombstones,
        deleted_on_client: applied.deleted,
        created_on_client: applied.created,
        updated_on_client: applied.updated,
        submitted_directives: submitted.directives(),
        skipped: unresolvable + applied.skipped + submitted.skipped,
    };
    debug!(?report, "reconciliation pass complete");
    Ok(report)
}

fn load_local_bookmarks<S: BookmarkStore>(store: &S) -> Result<Vec<BookmarkRecord>> {
    let mut all = Vec::new();
    let mut query = BookmarkQuery::new(LOCAL_PAGE_SIZE);
    loop {
        let page = store.bookmarks(&query)?;
        if page.is_empty() {
            break;
        }
        all.extend(page);
        query = query.next();
    }
    Ok(all)
}
