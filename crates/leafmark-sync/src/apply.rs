//! Local-side application of a reconciliation plan.
//!
//! Purges confirmed tombstones, deletes bookmarks the server tombstoned,
//! and materializes or rebuilds bookmarks from freshly fetched payload
//! bodies. A failed remote fetch aborts the pass; a payload that cannot be
//! matched to a book or is missing required fields is dropped with no local
//! mutation and counted as skipped.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::models::{BookId, BookmarkRecord, TextPosition, Uid};
use crate::reconcile::ReconciliationPlan;
use crate::resolver::BookResolver;
use crate::store::BookmarkStore;
use crate::transport::SyncTransport;
use crate::wire::{BookmarkPayload, decode_end};

/// Counters for the local-side stage of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub purged_tombstones: usize,
    pub deleted: usize,
    pub created: usize,
    pub updated: usize,
    /// Payloads dropped by design (unknown book, unknown uid, missing field)
    pub skipped: usize,
}

/// Execute every local-side action of the plan.
pub async fn apply_local_changes<S, T>(
    store: &S,
    transport: &T,
    plan: &ReconciliationPlan,
    resolver: &mut BookResolver<'_, S>,
) -> Result<ApplyStats>
where
    S: BookmarkStore,
    T: SyncTransport,
{
    let mut stats = ApplyStats::default();

    if !plan.to_purge_local_tombstones.is_empty() {
        store.purge_bookmarks(&plan.to_purge_local_tombstones)?;
        stats.purged_tombstones = plan.to_purge_local_tombstones.len();
    }

    for bookmark in &plan.to_delete_on_client {
        store.delete_bookmark(bookmark)?;
        stats.deleted += 1;
    }

    if !plan.to_get_from_server.is_empty() {
        let payloads = transport.fetch_bookmarks(&plan.to_get_from_server).await?;
        for payload in payloads {
            if materialize(store, resolver, &payload)? {
                stats.created += 1;
            } else {
                stats.skipped += 1;
            }
        }
    }

    if !plan.to_update_on_client.is_empty() {
        let by_uid: HashMap<&Uid, &BookmarkRecord> = plan
            .to_update_on_client
            .iter()
            .map(|bookmark| (&bookmark.uid, bookmark))
            .collect();
        let uids: Vec<Uid> = plan
            .to_update_on_client
            .iter()
            .map(|bookmark| bookmark.uid.clone())
            .collect();

        let payloads = transport.fetch_bookmarks(&uids).await?;
        for payload in payloads {
            let Some(old) = by_uid.get(&payload.uid) else {
                warn!(uid = %payload.uid, "payload for a uid we did not request");
                stats.skipped += 1;
                continue;
            };
            // book identity never changes on update
            match record_from_payload(&payload, old.book_id, &old.book_title, old.id) {
                Ok(mut record) => {
                    store.save_bookmark(&mut record)?;
                    stats.updated += 1;
                }
                Err(SyncError::MalformedRecord(reason)) => {
                    warn!(%reason, "dropping malformed update payload");
                    stats.skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    debug!(?stats, "applied local changes");
    Ok(stats)
}

/// Create a local bookmark from a remote payload. Returns `false` when the
/// payload is dropped by design.
fn materialize<S: BookmarkStore>(
    store: &S,
    resolver: &mut BookResolver<'_, S>,
    payload: &BookmarkPayload,
) -> Result<bool> {
    let Some(hash) = payload.book_hash.as_deref() else {
        warn!(uid = %payload.uid, "payload carries no book hash");
        return Ok(false);
    };
    let Some(book) = resolver.resolve_one(hash)? else {
        warn!(uid = %payload.uid, "no local book for payload hash");
        return Ok(false);
    };

    match record_from_payload(payload, book.id, &book.title, None) {
        Ok(mut record) => {
            store.save_bookmark(&mut record)?;
            Ok(true)
        }
        Err(SyncError::MalformedRecord(reason)) => {
            warn!(%reason, "dropping malformed bookmark payload");
            Ok(false)
        }
        Err(other) => Err(other),
    }
}

/// Build a full bookmark record from a payload body, validating required
/// fields.
fn record_from_payload(
    payload: &BookmarkPayload,
    book_id: BookId,
    book_title: &str,
    id: Option<i64>,
) -> Result<BookmarkRecord> {
    let uid = &payload.uid;
    let start = TextPosition::new(
        required(payload.para_start, "para_start", uid)?,
        required(payload.elmt_start, "elmt_start", uid)?,
        required(payload.char_start, "char_start", uid)?,
    );
    let end = decode_end(
        required(payload.para_end, "para_end", uid)?,
        required(payload.elmt_end, "elmt_end", uid)?,
        required(payload.char_end, "char_end", uid)?,
    );

    Ok(BookmarkRecord {
        id,
        uid: uid.clone(),
        version_uid: payload.version_uid.clone(),
        book_id,
        book_title: book_title.to_string(),
        text: required(payload.text.clone(), "text", uid)?,
        style_id: required(payload.style_id, "style_id", uid)?,
        model_id: payload.model_id.clone(),
        start,
        end,
        created_at: required(payload.creation_timestamp, "creation_timestamp", uid)?,
        modified_at: payload.modification_timestamp,
        accessed_at: payload.access_timestamp,
    })
}

fn required<T>(value: Option<T>, field: &str, uid: &Uid) -> Result<T> {
    value.ok_or_else(|| SyncError::MalformedRecord(format!("{uid}: missing {field}")))
}
