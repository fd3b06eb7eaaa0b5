/// SQLite-backed record store
///
/// Local implementation of the realtime document database. Every
/// mutation re-queries the full `card_templates` set ordered by `ord`
/// ascending and pushes it to all registered listeners, which gives the
/// controllers the same full-snapshot-replace semantics a hosted
/// realtime store would.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};

use super::records::{
    ListenerSet, NewRecord, RecordPatch, RecordStore, SnapshotListener, StoreError, Subscription,
};
use crate::state::data::{CardRecord, Side};

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub struct SqliteRecordStore {
    // rusqlite::Connection is Send but not Sync, so all access goes
    // through this lock. No statement is held across an await point.
    conn: Mutex<Connection>,
    listeners: Arc<ListenerSet>,
    seq: AtomicU64,
}

impl SqliteRecordStore {
    /// Open (or create) the store at the default location:
    /// - Linux: ~/.local/share/card-gallery/card_gallery.db
    /// - macOS: ~/Library/Application Support/card-gallery/card_gallery.db
    /// - Windows: %APPDATA%\card-gallery\card_gallery.db
    pub fn open() -> Result<Self, StoreError> {
        let db_path = Self::default_db_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create data directory: {}", e)))?;
        }

        let store = Self::open_at(&db_path)?;
        println!("📁 Record store initialized at: {}", db_path.display());
        Ok(store)
    }

    /// Open (or create) the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, used by the test suite.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine user data directory");
        path.push("card-gallery");
        path.push("card_gallery.db");
        path
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = SqliteRecordStore {
            conn: Mutex::new(conn),
            listeners: ListenerSet::new(),
            seq: AtomicU64::new(0),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS card_templates (
                id              TEXT PRIMARY KEY,
                category        TEXT NOT NULL,
                side            TEXT NOT NULL,
                ord             REAL NOT NULL,
                storage_path    TEXT NOT NULL DEFAULT '',
                deleted         INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        // The subscription query orders by position on every snapshot
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_card_templates_ord
             ON card_templates(ord ASC)",
            [],
        )?;

        Ok(())
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("record store connection poisoned")
    }

    /// Current full set, ordered by `ord` ascending. Soft-deleted rows
    /// are included; excluding them is view policy, not store policy.
    pub fn snapshot(&self) -> Result<Vec<CardRecord>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, side, ord, storage_path, deleted, created_at, updated_at
             FROM card_templates ORDER BY ord ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let side_raw: String = row.get(2)?;
            let side = Side::parse(&side_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("invalid side: {}", side_raw).into(),
                )
            })?;
            Ok(CardRecord {
                id: row.get(0)?,
                category: row.get(1)?,
                side,
                order: row.get(3)?,
                storage_path: row.get(4)?,
                deleted: row.get::<_, i64>(5)? != 0,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// Number of documents, soft-deleted included.
    pub fn record_count(&self) -> Result<i64, StoreError> {
        let count =
            self.lock_conn()
                .query_row("SELECT COUNT(*) FROM card_templates", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Opaque id: base-36 nanosecond clock plus a process-local counter
    /// so two documents created in the same tick still differ.
    fn assign_id(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u128;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) as u128;
        format!("{}{}", to_base36(nanos), to_base36(0x1000 + seq))
    }

    fn push_snapshot(&self) {
        match self.snapshot() {
            Ok(snapshot) => self.listeners.notify(&snapshot),
            Err(e) => eprintln!("⚠️  Snapshot after write failed: {}", e),
        }
    }
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    buf.iter().map(|&b| b as char).collect()
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn add(&self, new: NewRecord) -> Result<String, StoreError> {
        let id = self.assign_id();
        let now = Utc::now().timestamp_millis();
        {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO card_templates
                 (id, category, side, ord, storage_path, deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                params![id, new.category, new.side.as_str(), new.order, new.storage_path, now],
            )?;
        }
        self.push_snapshot();
        Ok(id)
    }

    async fn update(&self, id: &str, patch: RecordPatch) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        {
            let conn = self.lock_conn();
            let changed = conn.execute(
                "UPDATE card_templates SET
                     category     = COALESCE(?2, category),
                     side         = COALESCE(?3, side),
                     ord          = COALESCE(?4, ord),
                     storage_path = COALESCE(?5, storage_path),
                     deleted      = COALESCE(?6, deleted),
                     updated_at   = ?7
                 WHERE id = ?1",
                params![
                    id,
                    patch.category,
                    patch.side.map(|s| s.as_str()),
                    patch.order,
                    patch.storage_path,
                    patch.deleted.map(i64::from),
                    now
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }
        self.push_snapshot();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let changed = {
            let conn = self.lock_conn();
            conn.execute("DELETE FROM card_templates WHERE id = ?1", params![id])?
        };
        // Removing an id that is already gone leaves the same end state
        if changed > 0 {
            self.push_snapshot();
        }
        Ok(())
    }

    fn subscribe(&self, listener: SnapshotListener) -> Subscription {
        // Deliver the current set before any mutation arrives
        match self.snapshot() {
            Ok(snapshot) => listener(&snapshot),
            Err(e) => eprintln!("⚠️  Initial snapshot failed: {}", e),
        }
        self.listeners.register(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::open_in_memory().unwrap()
    }

    fn new_record(category: &str, side: Side, order: f64) -> NewRecord {
        NewRecord {
            category: category.to_string(),
            side,
            order,
            storage_path: String::new(),
        }
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_timestamps() {
        let store = store();
        let id = store.add(new_record("A", Side::Front, 1.0)).await.unwrap();
        assert!(!id.is_empty());

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id, id);
        assert_eq!(snap[0].category, "A");
        assert_eq!(snap[0].storage_path, "");
        assert!(!snap[0].deleted);
        assert!(snap[0].created_at > 0);
        assert_eq!(snap[0].created_at, snap[0].updated_at);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = store();
        let a = store.add(new_record("A", Side::Front, 1.0)).await.unwrap();
        let b = store.add(new_record("A", Side::Back, 1.0)).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_snapshot_ordered_by_order_ascending() {
        let store = store();
        store.add(new_record("B", Side::Front, 3.0)).await.unwrap();
        store.add(new_record("A", Side::Front, 1.0)).await.unwrap();
        store.add(new_record("C", Side::Front, 2.0)).await.unwrap();

        let orders: Vec<f64> = store.snapshot().unwrap().iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_update_patches_fields_and_refreshes_updated_at() {
        let store = store();
        let id = store.add(new_record("A", Side::Front, 1.0)).await.unwrap();

        store
            .update(
                &id,
                RecordPatch {
                    storage_path: Some(format!("templates/{}.png", id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let snap = store.snapshot().unwrap();
        assert_eq!(snap[0].storage_path, format!("templates/{}.png", id));
        // Untouched fields survive the patch
        assert_eq!(snap[0].category, "A");
        assert_eq!(snap[0].side, Side::Front);
        assert!(snap[0].updated_at >= snap[0].created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = store();
        let err = store
            .update("missing", RecordPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = store();
        let id = store.add(new_record("A", Side::Front, 1.0)).await.unwrap();
        store.remove(&id).await.unwrap();
        store.remove(&id).await.unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_mutation_snapshots() {
        let store = store();
        store.add(new_record("A", Side::Front, 1.0)).await.unwrap();

        let pushes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let pushes_cb = Arc::clone(&pushes);
        let seen_cb = Arc::clone(&seen);
        let sub = store.subscribe(Arc::new(move |snap: &[CardRecord]| {
            pushes_cb.fetch_add(1, Ordering::SeqCst);
            *seen_cb.lock().unwrap() = snap.to_vec();
        }));

        // Initial snapshot arrives during subscribe
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);

        store.add(new_record("A", Side::Back, 1.0)).await.unwrap();
        assert_eq!(pushes.load(Ordering::SeqCst), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);

        drop(sub);
        store.add(new_record("B", Side::Front, 1.0)).await.unwrap();
        assert_eq!(pushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
