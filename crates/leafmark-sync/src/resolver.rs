//! Content-hash book resolution with per-pass memoization.
//!
//! A client book may be known to the server under any of several content
//! hashes. Once any candidate hash matches, the memo is back-filled for all
//! candidates of that call, so every known alias resolves without another
//! catalog query. Misses are not memoized.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::BookRef;
use crate::store::BookmarkStore;

/// Memoized hash-to-book lookups, scoped to one reconciliation pass
pub struct BookResolver<'a, S: BookmarkStore> {
    store: &'a S,
    by_hash: HashMap<String, BookRef>,
}

impl<'a, S: BookmarkStore> BookResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            by_hash: HashMap::new(),
        }
    }

    /// Resolve an ordered candidate hash list to a locally known book
    pub fn resolve(&mut self, hashes: &[String]) -> Result<Option<BookRef>> {
        for hash in hashes {
            if let Some(book) = self.by_hash.get(hash) {
                return Ok(Some(book.clone()));
            }
        }

        let mut found = None;
        for hash in hashes {
            if let Some(book) = self.store.book_by_hash(hash)? {
                found = Some(book);
                break;
            }
        }

        if let Some(book) = found {
            for hash in hashes {
                self.by_hash.insert(hash.clone(), book.clone());
            }
            return Ok(Some(book));
        }
        Ok(None)
    }

    /// Resolve a single content hash
    pub fn resolve_one(&mut self, hash: &str) -> Result<Option<BookRef>> {
        if let Some(book) = self.by_hash.get(hash) {
            return Ok(Some(book.clone()));
        }
        match self.store.book_by_hash(hash)? {
            Some(book) => {
                self.by_hash.insert(hash.to_string(), book.clone());
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }
}
