use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::item::Item;
use crate::store::{seed, RecordStore, StoreError};

/// In-process record store holding the catalog and every uploaded record in memory.
///
/// Cloning is cheap: clones share the same state through reference counting, so a test can
/// keep one handle for inspection while the server owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

/// An uploaded payload and the identity of the connection that sent it.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub client_id: String,
    pub payload: Bytes,
}

#[derive(Default)]
struct State {
    items: Vec<Item>,
    records: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_items(items: Vec<Item>) -> MemoryStore {
        let state = State {
            items,
            records: Vec::new(),
        };

        MemoryStore {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// A store whose catalog holds `count` generated items.
    pub fn seeded(count: usize) -> MemoryStore {
        MemoryStore::with_items(seed::catalog(count).collect())
    }

    /// Snapshot of the uploaded records, in the order they were appended.
    pub fn records(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.lock()?.records.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.lock()?.items.clone())
    }

    async fn append_record(&self, client_id: &str, payload: Bytes) -> Result<(), StoreError> {
        let record = Record {
            client_id: client_id.to_string(),
            payload,
        };
        self.lock()?.records.push(record);

        Ok(())
    }
}
