//! Typed wire records for the sync protocol.
//!
//! Field names follow the server's JSON schema (`page_no`, `version_uid`,
//! `para_start`, ...). Every record is an explicit serde type; required-field
//! checks happen at the boundary and raise `SyncError::MalformedRecord`
//! instead of failing on a loose cast deep in the pipeline.

use serde::{Deserialize, Serialize};

use crate::models::{BookmarkEnd, BookmarkRecord, TextPosition, Uid};

/// Request body for one page of the inventory listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryPageRequest {
    pub page_no: u32,
    pub page_size: u32,
    /// Pass timestamp (Unix ms), identical for every request of one pass
    pub timestamp: i64,
}

/// One page of the remote bookmark inventory
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryPage {
    /// Active entries on this page
    #[serde(default)]
    pub actual: Vec<RemoteInventoryEntry>,
    /// Uids the server reports as deleted
    #[serde(default)]
    pub deleted: Vec<Uid>,
    /// Total number of active entries across all pages
    pub count: i64,
}

/// Lightweight listing entry for one remote bookmark.
///
/// A missing `version_uid` means the server holds an identity placeholder
/// with no content, which reconciliation treats distinctly from "has
/// content".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteInventoryEntry {
    pub uid: Uid,
    #[serde(default)]
    pub version_uid: Option<Uid>,
    /// Candidate content hashes of the host book, in resolution order
    #[serde(default)]
    pub book_hashes: Vec<String>,
    #[serde(default)]
    pub modification_timestamp: i64,
}

/// Full bookmark body returned by the payload endpoint.
///
/// Everything except `uid` is optional at the parse level; materialization
/// validates the fields it needs and drops the item when one is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkPayload {
    pub uid: Uid,
    #[serde(default)]
    pub version_uid: Option<Uid>,
    #[serde(default)]
    pub book_hash: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub style_id: Option<i32>,
    #[serde(default)]
    pub para_start: Option<i32>,
    #[serde(default)]
    pub elmt_start: Option<i32>,
    #[serde(default)]
    pub char_start: Option<i32>,
    #[serde(default)]
    pub para_end: Option<i32>,
    #[serde(default)]
    pub elmt_end: Option<i32>,
    #[serde(default)]
    pub char_end: Option<i32>,
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
    #[serde(default)]
    pub modification_timestamp: Option<i64>,
    #[serde(default)]
    pub access_timestamp: Option<i64>,
}

/// One outgoing directive of the batched mutation request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ChangeDirective {
    Add { bookmark: BookmarkBody },
    Update { bookmark: BookmarkBody },
    Delete { uid: Uid },
}

/// The batched mutation request
#[derive(Debug, Clone, Serialize)]
pub struct ChangeBatch {
    pub requests: Vec<ChangeDirective>,
    /// Pass timestamp (Unix ms)
    pub timestamp: i64,
}

/// Serialized bookmark carried by an add/update directive
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkBody {
    pub book_hash: String,
    pub uid: Uid,
    /// `null` for a bookmark that has never been synced
    pub version_uid: Option<Uid>,
    pub style_id: i32,
    pub text: String,
    pub model_id: Option<String>,
    pub para_start: i32,
    pub elmt_start: i32,
    pub char_start: i32,
    pub para_end: i32,
    pub elmt_end: i32,
    pub char_end: i32,
    pub creation_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_timestamp: Option<i64>,
}

impl BookmarkBody {
    #[must_use]
    pub fn from_record(bookmark: &BookmarkRecord, book_hash: String) -> Self {
        let (para_end, elmt_end, char_end) = encode_end(bookmark.end);
        Self {
            book_hash,
            uid: bookmark.uid.clone(),
            version_uid: bookmark.version_uid.clone(),
            style_id: bookmark.style_id,
            text: bookmark.text.clone(),
            model_id: bookmark.model_id.clone(),
            para_start: bookmark.start.paragraph,
            elmt_start: bookmark.start.element,
            char_start: bookmark.start.char_index,
            para_end,
            elmt_end,
            char_end,
            creation_timestamp: bookmark.created_at,
            modification_timestamp: bookmark.modified_at,
            access_timestamp: bookmark.accessed_at,
        }
    }
}

/// Encode an end boundary into `(para_end, elmt_end, char_end)`.
///
/// An unresolved length is carried in `para_end` with `char_end = -1`.
#[must_use]
pub fn encode_end(end: BookmarkEnd) -> (i32, i32, i32) {
    match end {
        BookmarkEnd::Position(pos) => (pos.paragraph, pos.element, pos.char_index),
        BookmarkEnd::Length(length) => (length, 0, -1),
    }
}

/// Inverse of [`encode_end`]: `char_end >= 0` means a resolved position
#[must_use]
pub fn decode_end(para_end: i32, elmt_end: i32, char_end: i32) -> BookmarkEnd {
    if char_end >= 0 {
        BookmarkEnd::Position(TextPosition::new(para_end, elmt_end, char_end))
    } else {
        BookmarkEnd::Length(para_end)
    }
}
