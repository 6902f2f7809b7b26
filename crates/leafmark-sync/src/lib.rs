//! leafmark-sync - bookmark synchronization engine
//!
//! Merges a client's local bookmark set with a remote server's, classifying
//! every bookmark into one of six actions (create/update/delete on either
//! side, plus local tombstone purges) and executing them against two
//! collaborating stores: a [`store::BookmarkStore`] owned by the embedding
//! application and a [`transport::SyncTransport`] over the sync protocol.
//!
//! The entry point is [`sync::sync_bookmarks`], one sequential
//! fetch -> classify -> apply-local -> submit-remote pass.

pub mod apply;
pub mod error;
pub mod inventory;
pub mod models;
pub mod reconcile;
pub mod resolver;
pub mod store;
pub mod submit;
pub mod sync;
pub mod transport;
pub mod wire;

pub use error::{Result, SyncError};
pub use models::{BookId, BookRef, BookmarkEnd, BookmarkRecord, TextPosition, Uid};
pub use store::{BookmarkQuery, BookmarkStore};
pub use sync::{sync_bookmarks, sync_bookmarks_at, SyncClock, SyncReport};
pub use transport::{HttpSyncTransport, SyncTransport};
