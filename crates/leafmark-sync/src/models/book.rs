//! Book catalog references

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local-only row identifier of a book in the catalog.
///
/// Never transmitted; the wire identifies books by content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookId(pub i64);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locally known book, as much of it as the sync engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRef {
    pub id: BookId,
    pub title: String,
}

impl BookRef {
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: BookId(id),
            title: title.into(),
        }
    }
}
