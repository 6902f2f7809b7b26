//! Bookmark model

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;
use crate::models::BookId;

/// A stable 36-character bookmark identifier (hyphenated UUID format).
///
/// Also used for version uids, which are regenerated on every content
/// mutation. Any other non-empty length signals corrupted local data and is
/// rejected at construction and at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Required length of the canonical string form
    pub const LEN: usize = 36;

    /// Generate a fresh random uid
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a raw uid string
    pub fn parse(raw: impl Into<String>) -> Result<Self, SyncError> {
        let raw = raw.into();
        if raw.len() == Self::LEN {
            Ok(Self(raw))
        } else {
            Err(SyncError::InvalidUid(raw))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Uid {
    type Error = SyncError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// A resolved position in the document text model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub paragraph: i32,
    pub element: i32,
    pub char_index: i32,
}

impl TextPosition {
    #[must_use]
    pub const fn new(paragraph: i32, element: i32, char_index: i32) -> Self {
        Self {
            paragraph,
            element,
            char_index,
        }
    }
}

/// End boundary of a bookmark.
///
/// `Length` means the end position has not been resolved against the document
/// model yet; only the raw character length is known. Resolving it is
/// presentation logic and happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkEnd {
    Position(TextPosition),
    Length(i32),
}

/// A bookmark in the local store.
///
/// `uid` is assigned once and never changes. `version_uid` and `modified_at`
/// move together: both are bumped by the content setters and by nothing else.
/// A `version_uid` of `None` means the bookmark has never been synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    /// Local row id, `None` until first persisted
    pub id: Option<i64>,
    pub uid: Uid,
    pub version_uid: Option<Uid>,
    pub book_id: BookId,
    pub book_title: String,
    pub text: String,
    pub style_id: i32,
    pub model_id: Option<String>,
    pub start: TextPosition,
    pub end: BookmarkEnd,
    /// Creation timestamp (Unix ms), immutable
    pub created_at: i64,
    /// Last content-change timestamp (Unix ms)
    pub modified_at: Option<i64>,
    /// Last view timestamp (Unix ms)
    pub accessed_at: Option<i64>,
}

impl BookmarkRecord {
    /// Create a brand-new local bookmark, not yet known to the server
    #[must_use]
    pub fn new(
        book_id: BookId,
        book_title: impl Into<String>,
        model_id: Option<String>,
        text: impl Into<String>,
        start: TextPosition,
        end: BookmarkEnd,
    ) -> Self {
        Self {
            id: None,
            uid: Uid::random(),
            version_uid: None,
            book_id,
            book_title: book_title.into(),
            text: text.into(),
            style_id: 1,
            model_id,
            start,
            end,
            created_at: now_ms(),
            modified_at: None,
            accessed_at: None,
        }
    }

    /// Replace the bookmark text, bumping the version uid
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text = text;
            self.on_modification();
        }
    }

    /// Change the highlight style, bumping the version uid
    pub fn set_style_id(&mut self, style_id: i32) {
        if style_id != self.style_id {
            self.style_id = style_id;
            self.on_modification();
        }
    }

    /// Record that the bookmark was viewed
    pub fn mark_accessed(&mut self) {
        self.accessed_at = Some(now_ms());
    }

    /// Modification time used for sync arbitration, falling back to creation
    #[must_use]
    pub fn modified_or_created_at(&self) -> i64 {
        self.modified_at.unwrap_or(self.created_at)
    }

    /// Most recent of modification (or creation) and access timestamps
    #[must_use]
    pub fn latest_at(&self) -> i64 {
        let latest = self.modified_or_created_at();
        match self.accessed_at {
            Some(accessed) if accessed > latest => accessed,
            _ => latest,
        }
    }

    fn on_modification(&mut self) {
        self.version_uid = Some(Uid::random());
        self.modified_at = Some(now_ms());
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
