//! Domain models shared across the sync pipeline

mod book;
mod bookmark;

pub use book::{BookId, BookRef};
pub use bookmark::{BookmarkEnd, BookmarkRecord, TextPosition, Uid};
