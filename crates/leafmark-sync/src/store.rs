//! Local store collaborator interface

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{BookId, BookRef, BookmarkRecord, Uid};

/// Page cursor for enumerating the local bookmark table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmarkQuery {
    pub page_size: usize,
    pub page: usize,
}

impl BookmarkQuery {
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        Self { page_size, page: 0 }
    }

    /// Cursor for the following page
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page_size: self.page_size,
            page: self.page + 1,
        }
    }
}

/// The local bookmark store and book catalog consumed by the sync engine.
///
/// Each call is individually transactional; the engine never spans a
/// transaction across calls. The engine assumes exclusive access to the
/// store for the duration of one pass — callers serialize passes.
pub trait BookmarkStore {
    /// One page of bookmarks; an empty page terminates enumeration
    fn bookmarks(&self, query: &BookmarkQuery) -> Result<Vec<BookmarkRecord>>;

    /// Uids deleted locally and not yet confirmed-purged (client tombstones)
    fn deleted_bookmark_uids(&self) -> Result<HashSet<Uid>>;

    /// Delete a bookmark, recording a tombstone for its uid
    fn delete_bookmark(&self, bookmark: &BookmarkRecord) -> Result<()>;

    /// Drop tombstones the server no longer needs to hear about
    fn purge_bookmarks(&self, uids: &[Uid]) -> Result<()>;

    /// Insert or update a bookmark, assigning `id` on first insert
    fn save_bookmark(&self, bookmark: &mut BookmarkRecord) -> Result<()>;

    /// Look up a book by one of its content hashes
    fn book_by_hash(&self, hash: &str) -> Result<Option<BookRef>>;

    /// Look up a book by its local row id
    fn book_by_id(&self, id: BookId) -> Result<Option<BookRef>>;

    /// Canonical content hash of a book, if one can be computed
    fn book_hash(&self, book: &BookRef) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn query_next_advances_page_only() {
        let q = BookmarkQuery::new(20);
        assert_eq!(q.page, 0);
        let q = q.next();
        assert_eq!(q, BookmarkQuery { page_size: 20, page: 1 });
    }
}
