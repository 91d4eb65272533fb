pub mod memory;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error as ThisError;

use crate::item::Item;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid item row: {0}")]
    InvalidRow(String),
    #[error("store state is poisoned")]
    Poisoned,
}

/// Persistence used by client sessions: the item catalog served on dumps and the sink for
/// uploaded records.
///
/// A single handle is shared by every connection, so implementations must be safe for
/// concurrent calls and keep each append atomic with respect to its payload.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the whole catalog in the order it should be sent to clients.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Persists a raw payload uploaded by the client identified by `client_id`.
    async fn append_record(&self, client_id: &str, payload: Bytes) -> Result<(), StoreError>;
}
