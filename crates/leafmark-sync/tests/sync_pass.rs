//! Full reconciliation passes over an in-memory store and a scripted
//! transport.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use pretty_assertions::assert_eq;
use serde_json::json;

use leafmark_sync::wire::{
    BookmarkPayload, ChangeBatch, ChangeDirective, InventoryPage, InventoryPageRequest,
    RemoteInventoryEntry,
};
use leafmark_sync::{
    sync_bookmarks_at, BookId, BookRef, BookmarkEnd, BookmarkQuery, BookmarkRecord, BookmarkStore,
    Result, SyncClock, SyncError, SyncReport, SyncTransport, TextPosition, Uid,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct MemoryStore {
    bookmarks: RefCell<Vec<BookmarkRecord>>,
    tombstones: RefCell<HashSet<Uid>>,
    books_by_hash: HashMap<String, BookRef>,
    books_by_id: HashMap<BookId, BookRef>,
    canonical: HashMap<BookId, String>,
    next_id: Cell<i64>,
}

impl MemoryStore {
    /// `books`: (id, title, hashes, canonical hash present)
    fn new(books: &[(i64, &str, &[&str], bool)]) -> Self {
        let mut books_by_hash = HashMap::new();
        let mut books_by_id = HashMap::new();
        let mut canonical = HashMap::new();
        for (id, title, hashes, hashable) in books {
            let book = BookRef::new(*id, *title);
            for hash in *hashes {
                books_by_hash.insert((*hash).to_string(), book.clone());
            }
            if *hashable {
                if let Some(hash) = hashes.first() {
                    canonical.insert(book.id, (*hash).to_string());
                }
            }
            books_by_id.insert(book.id, book);
        }
        Self {
            bookmarks: RefCell::new(Vec::new()),
            tombstones: RefCell::new(HashSet::new()),
            books_by_hash,
            books_by_id,
            canonical,
            next_id: Cell::new(1),
        }
    }

    fn insert(&self, mut bookmark: BookmarkRecord) {
        bookmark.id = Some(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.bookmarks.borrow_mut().push(bookmark);
    }

    fn add_tombstone(&self, uid: Uid) {
        self.tombstones.borrow_mut().insert(uid);
    }

    fn get(&self, uid: &Uid) -> Option<BookmarkRecord> {
        self.bookmarks
            .borrow()
            .iter()
            .find(|b| &b.uid == uid)
            .cloned()
    }
}

impl BookmarkStore for MemoryStore {
    fn bookmarks(&self, query: &BookmarkQuery) -> Result<Vec<BookmarkRecord>> {
        let all = self.bookmarks.borrow();
        Ok(all
            .iter()
            .skip(query.page * query.page_size)
            .take(query.page_size)
            .cloned()
            .collect())
    }

    fn deleted_bookmark_uids(&self) -> Result<HashSet<Uid>> {
        Ok(self.tombstones.borrow().clone())
    }

    fn delete_bookmark(&self, bookmark: &BookmarkRecord) -> Result<()> {
        self.bookmarks.borrow_mut().retain(|b| b.uid != bookmark.uid);
        self.tombstones.borrow_mut().insert(bookmark.uid.clone());
        Ok(())
    }

    fn purge_bookmarks(&self, uids: &[Uid]) -> Result<()> {
        let mut tombstones = self.tombstones.borrow_mut();
        for uid in uids {
            tombstones.remove(uid);
        }
        Ok(())
    }

    fn save_bookmark(&self, bookmark: &mut BookmarkRecord) -> Result<()> {
        let mut all = self.bookmarks.borrow_mut();
        if let Some(existing) = all.iter_mut().find(|b| b.uid == bookmark.uid) {
            bookmark.id = existing.id;
            *existing = bookmark.clone();
        } else {
            bookmark.id = Some(self.next_id.get());
            self.next_id.set(self.next_id.get() + 1);
            all.push(bookmark.clone());
        }
        Ok(())
    }

    fn book_by_hash(&self, hash: &str) -> Result<Option<BookRef>> {
        Ok(self.books_by_hash.get(hash).cloned())
    }

    fn book_by_id(&self, id: BookId) -> Result<Option<BookRef>> {
        Ok(self.books_by_id.get(&id).cloned())
    }

    fn book_hash(&self, book: &BookRef) -> Result<Option<String>> {
        Ok(self.canonical.get(&book.id).cloned())
    }
}

#[derive(Default)]
struct ScriptedTransport {
    pages: Vec<InventoryPage>,
    payloads: HashMap<Uid, BookmarkPayload>,
    fail_payload_fetch: bool,
    payload_requests: RefCell<Vec<Vec<Uid>>>,
    batches: RefCell<Vec<ChangeBatch>>,
}

impl SyncTransport for ScriptedTransport {
    async fn fetch_inventory_page(&self, request: &InventoryPageRequest) -> Result<InventoryPage> {
        Ok(self.pages[request.page_no as usize].clone())
    }

    async fn fetch_bookmarks(&self, uids: &[Uid]) -> Result<Vec<BookmarkPayload>> {
        if self.fail_payload_fetch {
            return Err(SyncError::Api("connection reset (502)".to_string()));
        }
        self.payload_requests.borrow_mut().push(uids.to_vec());
        Ok(uids
            .iter()
            .filter_map(|uid| self.payloads.get(uid).cloned())
            .collect())
    }

    async fn submit_changes(&self, batch: &ChangeBatch) -> Result<()> {
        self.batches.borrow_mut().push(batch.clone());
        Ok(())
    }
}

fn uid(n: u8) -> Uid {
    Uid::parse(format!("{n:08}-0000-4000-8000-000000000000")).unwrap()
}

fn version(n: u8) -> Uid {
    Uid::parse(format!("{n:08}-1111-4111-8111-111111111111")).unwrap()
}

fn local_bookmark(n: u8, book_id: i64, version_uid: Option<Uid>, modified_at: Option<i64>) -> BookmarkRecord {
    let mut bmk = BookmarkRecord::new(
        BookId(book_id),
        format!("book-{book_id}"),
        Some("main".to_string()),
        format!("local text {n}"),
        TextPosition::new(i32::from(n), 0, 0),
        BookmarkEnd::Position(TextPosition::new(i32::from(n), 4, 2)),
    );
    bmk.uid = uid(n);
    bmk.version_uid = version_uid;
    bmk.created_at = 100;
    bmk.modified_at = modified_at;
    bmk
}

fn entry(n: u8, version_uid: Option<Uid>, ts: i64, hashes: &[&str]) -> RemoteInventoryEntry {
    RemoteInventoryEntry {
        uid: uid(n),
        version_uid,
        book_hashes: hashes.iter().map(|h| (*h).to_string()).collect(),
        modification_timestamp: ts,
    }
}

fn payload(n: u8, version_n: u8, book_hash: Option<&str>, text: &str) -> BookmarkPayload {
    serde_json::from_value(json!({
        "uid": uid(n).as_str(),
        "version_uid": version(version_n).as_str(),
        "book_hash": book_hash,
        "text": text,
        "style_id": 1,
        "para_start": 1, "elmt_start": 0, "char_start": 0,
        "para_end": 1, "elmt_end": 8, "char_end": 3,
        "creation_timestamp": 50,
        "modification_timestamp": 60
    }))
    .unwrap()
}

fn action_uids(batch: &ChangeBatch) -> Vec<(&'static str, Uid)> {
    batch
        .requests
        .iter()
        .map(|directive| match directive {
            ChangeDirective::Add { bookmark } => ("add", bookmark.uid.clone()),
            ChangeDirective::Update { bookmark } => ("update", bookmark.uid.clone()),
            ChangeDirective::Delete { uid } => ("delete", uid.clone()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// One pass over a mixed fixture exercising all seven action lists:
/// 1 new local, 2 locally newer, 3 remotely newer, 4 deleted on server,
/// 5 new remote (known book), 6 new remote (unknown book), 7 tombstoned
/// locally but active remotely, 8 stale local tombstone.
#[tokio::test]
async fn mixed_pass_applies_every_action_kind() {
    let store = MemoryStore::new(&[(1, "Emma", &["h-emma"], true)]);
    store.insert(local_bookmark(1, 1, None, None));
    store.insert(local_bookmark(2, 1, Some(version(2)), Some(2_000)));
    store.insert(local_bookmark(3, 1, Some(version(3)), Some(1_000)));
    store.insert(local_bookmark(4, 1, Some(version(4)), Some(1_000)));
    store.add_tombstone(uid(7));
    store.add_tombstone(uid(8));

    let transport = ScriptedTransport {
        pages: vec![InventoryPage {
            actual: vec![
                entry(2, Some(version(20)), 1_000, &["h-emma"]),
                entry(3, Some(version(30)), 5_000, &["h-emma"]),
                entry(5, Some(version(50)), 0, &["h-emma"]),
                entry(6, Some(version(60)), 0, &["h-lost"]),
                entry(7, Some(version(70)), 0, &["h-emma"]),
            ],
            deleted: vec![uid(4)],
            count: 5,
        }],
        payloads: [
            (uid(5), payload(5, 50, Some("h-emma"), "remote quote 5")),
            (uid(3), payload(3, 30, None, "server wins for 3")),
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    };

    let report = sync_bookmarks_at(&transport, &store, SyncClock::at(9_000))
        .await
        .unwrap();

    assert_eq!(
        report,
        SyncReport {
            purged_tombstones: 1,     // 8
            deleted_on_client: 1,     // 4
            created_on_client: 1,     // 5
            updated_on_client: 1,     // 3
            submitted_directives: 3,  // add 1, update 2, delete 7
            skipped: 1,               // 6: unknown book
        }
    );

    // local store end state
    assert!(store.get(&uid(4)).is_none());
    let created = store.get(&uid(5)).expect("bookmark 5 materialized");
    assert_eq!(created.book_id, BookId(1));
    assert_eq!(created.book_title, "Emma");
    assert_eq!(created.version_uid, Some(version(50)));
    assert_eq!(created.text, "remote quote 5");
    let updated = store.get(&uid(3)).expect("bookmark 3 still present");
    assert_eq!(updated.text, "server wins for 3");
    assert_eq!(updated.version_uid, Some(version(30)));
    assert_eq!(updated.book_id, BookId(1), "update never rebinds the book");
    assert_eq!(updated.id, Some(3), "update keeps the local row");
    assert!(store.get(&uid(6)).is_none(), "unknown-book payload dropped");

    // tombstones: 8 purged, 7 pending server confirmation, 4 newly recorded
    let tombstones = store.tombstones.borrow().clone();
    let expected: HashSet<Uid> = [uid(7), uid(4)].into_iter().collect();
    assert_eq!(tombstones, expected);

    // payload fetches: one batched get, one batched update fetch
    assert_eq!(
        *transport.payload_requests.borrow(),
        vec![vec![uid(5)], vec![uid(3)]]
    );

    // outgoing batch
    let batches = transport.batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].timestamp, 9_000);
    let mut actions = action_uids(&batches[0]);
    actions.sort();
    assert_eq!(
        actions,
        vec![
            ("add", uid(1)),
            ("delete", uid(7)),
            ("update", uid(2)),
        ]
    );
}

#[tokio::test]
async fn in_sync_state_is_a_no_op_pass() {
    let store = MemoryStore::new(&[(1, "Emma", &["h-emma"], true)]);
    store.insert(local_bookmark(2, 1, Some(version(2)), Some(2_000)));

    let transport = ScriptedTransport {
        pages: vec![InventoryPage {
            actual: vec![entry(2, Some(version(2)), 9_999, &["h-emma"])],
            deleted: vec![],
            count: 1,
        }],
        ..Default::default()
    };

    let report = sync_bookmarks_at(&transport, &store, SyncClock::at(1))
        .await
        .unwrap();
    assert_eq!(report, SyncReport::default());
    assert!(transport.batches.borrow().is_empty());
    assert!(transport.payload_requests.borrow().is_empty());
}

/// Applying a mixed pass and rerunning against the post-pass state yields an
/// empty second pass (idempotence).
#[tokio::test]
async fn second_pass_over_settled_state_is_empty() {
    let store = MemoryStore::new(&[(1, "Emma", &["h-emma"], true)]);
    store.insert(local_bookmark(3, 1, Some(version(3)), Some(1_000)));

    // pass one: server has newer content for 3 and a new bookmark 5
    let transport = ScriptedTransport {
        pages: vec![InventoryPage {
            actual: vec![
                entry(3, Some(version(30)), 5_000, &["h-emma"]),
                entry(5, Some(version(50)), 0, &["h-emma"]),
            ],
            deleted: vec![],
            count: 2,
        }],
        payloads: [
            (uid(3), payload(3, 30, None, "new text 3")),
            (uid(5), payload(5, 50, Some("h-emma"), "new text 5")),
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    };
    sync_bookmarks_at(&transport, &store, SyncClock::at(1))
        .await
        .unwrap();

    // pass two: remote unchanged, local now settled
    let transport = ScriptedTransport {
        pages: transport.pages.clone(),
        ..Default::default()
    };
    let report = sync_bookmarks_at(&transport, &store, SyncClock::at(2))
        .await
        .unwrap();
    assert_eq!(report, SyncReport::default());
    assert!(transport.batches.borrow().is_empty());
}

/// A transport failure aborts the pass. Mutations from earlier sub-steps
/// stay applied; nothing is submitted.
#[tokio::test]
async fn payload_fetch_failure_aborts_before_submission() {
    let store = MemoryStore::new(&[(1, "Emma", &["h-emma"], true)]);
    store.insert(local_bookmark(1, 1, None, None));
    store.insert(local_bookmark(4, 1, Some(version(4)), Some(1_000)));

    let transport = ScriptedTransport {
        pages: vec![InventoryPage {
            actual: vec![entry(5, Some(version(50)), 0, &["h-emma"])],
            deleted: vec![uid(4)],
            count: 1,
        }],
        fail_payload_fetch: true,
        ..Default::default()
    };

    let result = sync_bookmarks_at(&transport, &store, SyncClock::at(1)).await;
    assert!(matches!(result, Err(SyncError::Api(_))));

    // the delete ran before the failing fetch and is durable
    assert!(store.get(&uid(4)).is_none());
    // bookmark 1 was never sent
    assert!(transport.batches.borrow().is_empty());
}
