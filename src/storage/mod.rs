use crate::{
    domain::{Card, EntityId, List, PendingAction, PendingOp, QueueId},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Durable keyed storage for lists, cards and the pending-action queue.
///
/// Collections are returned sorted by key. Callers treat failures as
/// best-effort: the in-memory board stays authoritative.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Prepares the backend (directories, schema)
    async fn initialize(&self) -> Result<()>;

    /// Inserts or replaces a list by id
    async fn save_list(&self, list: &List) -> Result<()>;

    /// Inserts or replaces a card by id
    async fn save_card(&self, card: &Card) -> Result<()>;

    async fn get_all_lists(&self) -> Result<Vec<List>>;

    async fn get_all_cards(&self) -> Result<Vec<Card>>;

    /// Deletes a list; deleting a missing id is not an error
    async fn delete_list(&self, id: &EntityId) -> Result<()>;

    /// Deletes a card; deleting a missing id is not an error
    async fn delete_card(&self, id: &EntityId) -> Result<()>;

    /// Clears both entity collections and writes the given ones in a single
    /// atomic step, so no reader observes a half-written board
    async fn save_all_data(&self, lists: &[List], cards: &[Card]) -> Result<()>;

    /// Removes all lists, cards and queued operations
    async fn clear_all_data(&self) -> Result<()>;

    /// Appends an operation to the pending queue, stamping it with the
    /// current time. Returns its auto-incremented key.
    async fn add_to_sync_queue(&self, op: PendingOp) -> Result<QueueId>;

    /// Pending operations in enqueue order
    async fn get_sync_queue(&self) -> Result<Vec<PendingAction>>;

    async fn remove_from_sync_queue(&self, id: QueueId) -> Result<()>;

    async fn clear_sync_queue(&self) -> Result<()>;

    /// Checks if the backend has been initialized
    async fn is_initialized(&self) -> bool;
}
