/// Record store interface
///
/// The realtime document database holding one document per card face.
/// Mutations go through the async trait methods; reads happen through a
/// standing subscription that pushes a full ordered snapshot after every
/// change. Listeners receive the complete set, soft-deleted rows
/// included — excluding those is the mirror's job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use thiserror::Error;

use crate::state::data::{CardRecord, Side};

/// Errors from the document database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document with id {0}")]
    NotFound(String),
    #[error("record store error: {0}")]
    Backend(String),
}

/// Fields for a new document. The store assigns the id and both
/// timestamps; `storage_path` starts empty during the create flow.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub category: String,
    pub side: Side,
    pub order: f64,
    pub storage_path: String,
}

/// Partial update for an existing document. `None` fields are left
/// untouched; `updated_at` is always refreshed by the store.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub category: Option<String>,
    pub side: Option<Side>,
    pub order: Option<f64>,
    pub storage_path: Option<String>,
    pub deleted: Option<bool>,
}

/// Callback invoked with the full snapshot, ordered by `order` ascending.
pub type SnapshotListener = Arc<dyn Fn(&[CardRecord]) + Send + Sync>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a document and return its store-assigned id.
    async fn add(&self, new: NewRecord) -> Result<String, StoreError>;

    /// Patch a document. Unknown ids fail with `StoreError::NotFound`.
    async fn update(&self, id: &str, patch: RecordPatch) -> Result<(), StoreError>;

    /// Delete a document. Deleting an id that is already gone is not an
    /// error; the end state is the same.
    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    /// Register a snapshot listener. The current snapshot is delivered
    /// synchronously before this returns, then again after every
    /// mutation. Dropping the returned guard unregisters the listener.
    fn subscribe(&self, listener: SnapshotListener) -> Subscription;
}

/// Registered listeners for one store instance.
///
/// Kept behind an `Arc` so subscription guards can unregister themselves
/// without holding the store alive.
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, SnapshotListener)>>,
}

impl ListenerSet {
    pub fn new() -> Arc<Self> {
        Arc::new(ListenerSet {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn register(self: &Arc<Self>, listener: SnapshotListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listener set poisoned")
            .push((id, listener));
        Subscription {
            set: Arc::downgrade(self),
            id,
        }
    }

    fn unregister(&self, id: u64) {
        self.listeners
            .lock()
            .expect("listener set poisoned")
            .retain(|(lid, _)| *lid != id);
    }

    /// Fan a snapshot out to every registered listener.
    pub fn notify(&self, snapshot: &[CardRecord]) {
        // Clone the callbacks out so a listener can drop its own
        // subscription without deadlocking on the registry lock.
        let callbacks: Vec<SnapshotListener> = self
            .listeners
            .lock()
            .expect("listener set poisoned")
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for cb in callbacks {
            cb(snapshot);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.lock().expect("listener set poisoned").len()
    }
}

/// Guard for one live subscription. Unregisters on drop.
pub struct Subscription {
    set: Weak<ListenerSet>,
    id: u64,
}

impl Subscription {
    /// Explicitly stop receiving snapshots. Equivalent to dropping.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            set.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscription_drop_unregisters() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_cb = Arc::clone(&hits);
        let sub = set.register(Arc::new(move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(set.len(), 1);

        set.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(sub);
        assert_eq!(set.len(), 0);
        set.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_is_drop() {
        let set = ListenerSet::new();
        let sub = set.register(Arc::new(|_| {}));
        assert_eq!(set.len(), 1);
        sub.cancel();
        assert_eq!(set.len(), 0);
    }
}
