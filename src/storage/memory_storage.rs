use crate::{
    domain::{Card, EntityId, List, PendingAction, PendingOp, QueueId},
    error::{KanbanError, Result},
    storage::VersionStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Collections {
    lists: BTreeMap<EntityId, List>,
    cards: BTreeMap<EntityId, Card>,
    queue: BTreeMap<QueueId, PendingAction>,
    next_queue_id: u64,
}

/// Volatile storage backend, for tests and sessions that opt out of disk
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Collections>,
    initialized: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every mutating call fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KanbanError::StorageError(
                "memory storage is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VersionStore for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn save_list(&self, list: &List) -> Result<()> {
        self.check_writable()?;
        self.inner
            .lock()
            .await
            .lists
            .insert(list.id.clone(), list.clone());
        Ok(())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        self.check_writable()?;
        self.inner
            .lock()
            .await
            .cards
            .insert(card.id.clone(), card.clone());
        Ok(())
    }

    async fn get_all_lists(&self) -> Result<Vec<List>> {
        Ok(self.inner.lock().await.lists.values().cloned().collect())
    }

    async fn get_all_cards(&self) -> Result<Vec<Card>> {
        Ok(self.inner.lock().await.cards.values().cloned().collect())
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().await.lists.remove(id);
        Ok(())
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().await.cards.remove(id);
        Ok(())
    }

    async fn save_all_data(&self, lists: &[List], cards: &[Card]) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.lock().await;
        inner.lists = lists.iter().map(|l| (l.id.clone(), l.clone())).collect();
        inner.cards = cards.iter().map(|c| (c.id.clone(), c.clone())).collect();
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.lock().await;
        inner.lists.clear();
        inner.cards.clear();
        inner.queue.clear();
        Ok(())
    }

    async fn add_to_sync_queue(&self, op: PendingOp) -> Result<QueueId> {
        self.check_writable()?;
        let mut inner = self.inner.lock().await;
        inner.next_queue_id += 1;
        let id = QueueId(inner.next_queue_id);
        inner.queue.insert(
            id,
            PendingAction {
                id,
                op,
                timestamp: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_sync_queue(&self) -> Result<Vec<PendingAction>> {
        Ok(self.inner.lock().await.queue.values().cloned().collect())
    }

    async fn remove_from_sync_queue(&self, id: QueueId) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().await.queue.remove(&id);
        Ok(())
    }

    async fn clear_sync_queue(&self) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().await.queue.clear();
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_list_sorted_by_id() {
        let storage = MemoryStorage::new();
        let mut b = List::new("B", 1);
        b.id = EntityId::from("b");
        let mut a = List::new("A", 0);
        a.id = EntityId::from("a");

        storage.save_list(&b).await.unwrap();
        storage.save_list(&a).await.unwrap();

        let ids: Vec<_> = storage
            .get_all_lists()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
    }

    #[tokio::test]
    async fn test_queue_ids_auto_increment() {
        let storage = MemoryStorage::new();
        let first = storage
            .add_to_sync_queue(PendingOp::DeleteList { id: "l1".into() })
            .await
            .unwrap();
        let second = storage
            .add_to_sync_queue(PendingOp::DeleteCard { id: "c1".into() })
            .await
            .unwrap();
        assert!(second > first);

        storage.remove_from_sync_queue(first).await.unwrap();
        let queue = storage.get_sync_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, second);

        // keys are never reused
        let third = storage
            .add_to_sync_queue(PendingOp::DeleteList { id: "l2".into() })
            .await
            .unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        assert!(storage.save_all_data(&[], &[]).await.is_err());
        storage.set_fail_writes(false);
        assert!(storage.save_all_data(&[], &[]).await.is_ok());
    }
}
