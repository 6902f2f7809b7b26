//! Batched upload of outstanding local changes.
//!
//! Serializes every send/update bookmark and every server-side delete into
//! one mutation request carrying the pass timestamp. A bookmark whose book
//! has no canonical hash is dropped from the batch: without a stable book
//! identity the server cannot file it. Hash lookups are memoized per book,
//! misses included, so an unhashable book is probed once per pass.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{BookId, BookmarkRecord};
use crate::reconcile::ReconciliationPlan;
use crate::store::BookmarkStore;
use crate::sync::SyncClock;
use crate::transport::SyncTransport;
use crate::wire::{BookmarkBody, ChangeBatch, ChangeDirective};

/// Counters for the upload stage of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Bookmarks dropped because their book has no canonical hash
    pub skipped: usize,
}

impl SubmitStats {
    /// Directives actually placed in the batch
    #[must_use]
    pub const fn directives(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

/// Build and submit the outgoing change batch. Submission is skipped
/// entirely when no directive survives; fire-and-forget otherwise.
pub async fn submit_remote_changes<S, T>(
    store: &S,
    transport: &T,
    plan: &ReconciliationPlan,
    clock: SyncClock,
) -> Result<SubmitStats>
where
    S: BookmarkStore,
    T: SyncTransport,
{
    let mut cache = BookHashCache::new(store);
    let mut requests = Vec::new();
    let mut stats = SubmitStats::default();

    for bookmark in &plan.to_send_to_server {
        if let Some(hash) = cache.hash_for(bookmark)? {
            requests.push(ChangeDirective::Add {
                bookmark: BookmarkBody::from_record(bookmark, hash),
            });
            stats.added += 1;
        } else {
            warn!(uid = %bookmark.uid, "book has no canonical hash; bookmark not uploaded");
            stats.skipped += 1;
        }
    }
    for bookmark in &plan.to_update_on_server {
        if let Some(hash) = cache.hash_for(bookmark)? {
            requests.push(ChangeDirective::Update {
                bookmark: BookmarkBody::from_record(bookmark, hash),
            });
            stats.updated += 1;
        } else {
            warn!(uid = %bookmark.uid, "book has no canonical hash; update not uploaded");
            stats.skipped += 1;
        }
    }
    for uid in &plan.to_delete_on_server {
        requests.push(ChangeDirective::Delete { uid: uid.clone() });
        stats.deleted += 1;
    }

    if requests.is_empty() {
        debug!("no outgoing changes to submit");
        return Ok(stats);
    }

    let batch = ChangeBatch {
        requests,
        timestamp: clock.timestamp_ms(),
    };
    transport.submit_changes(&batch).await?;
    debug!(?stats, "submitted change batch");
    Ok(stats)
}

/// Per-pass canonical-hash memo keyed by local book id
struct BookHashCache<'a, S> {
    store: &'a S,
    by_book: HashMap<BookId, Option<String>>,
}

impl<'a, S: BookmarkStore> BookHashCache<'a, S> {
    fn new(store: &'a S) -> Self {
        Self {
            store,
            by_book: HashMap::new(),
        }
    }

    fn hash_for(&mut self, bookmark: &BookmarkRecord) -> Result<Option<String>> {
        if let Some(hash) = self.by_book.get(&bookmark.book_id) {
            return Ok(hash.clone());
        }
        let hash = match self.store.book_by_id(bookmark.book_id)? {
            Some(book) => self.store.book_hash(&book)?,
            None => None,
        };
        self.by_book.insert(bookmark.book_id, hash.clone());
        Ok(hash)
    }
}
