use crate::domain::{ordering, Card, CardUpdate, EntityId, List, ListUpdate};
use crate::sync::gateway::{GatewayError, GatewayResult, RemoteGateway};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    lists: Vec<List>,
    cards: Vec<Card>,
    latency: Duration,
    fail_all: bool,
    failing_ids: HashSet<EntityId>,
    calls: Vec<&'static str>,
}

/// Remote authority kept in process memory.
///
/// Behaves like a simple REST backend: creates stamp version 1, updates bump
/// the server-side version, deletes of unknown ids reject. Latency and
/// failures can be injected per instance.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    inner: Mutex<Inner>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                latency,
                ..Inner::default()
            }),
        }
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.inner.lock().await.latency = latency;
    }

    /// Rejects every call while set
    pub async fn set_offline(&self, fail: bool) {
        self.inner.lock().await.fail_all = fail;
    }

    /// Rejects calls that target `id` until [`Self::clear_failures`]
    pub async fn fail_for(&self, id: impl Into<EntityId>) {
        self.inner.lock().await.failing_ids.insert(id.into());
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.fail_all = false;
        inner.failing_ids.clear();
    }

    /// Replaces the remote data verbatim
    pub async fn seed(&self, lists: Vec<List>, cards: Vec<Card>) {
        let mut inner = self.inner.lock().await;
        inner.lists = lists;
        inner.cards = cards;
    }

    /// Current remote lists and cards
    pub async fn snapshot(&self) -> (Vec<List>, Vec<Card>) {
        let inner = self.inner.lock().await;
        (inner.lists.clone(), inner.cards.clone())
    }

    /// Names of the gateway calls received so far, including rejected ones
    pub async fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().await.calls.clone()
    }

    /// Overwrites the remote with the given records, bumping every version
    pub async fn sync_all(
        &self,
        lists: &[List],
        cards: &[Card],
    ) -> GatewayResult<(Vec<List>, Vec<Card>)> {
        let mut inner = self.begin("sync_all", None).await?;
        let now = Utc::now();
        inner.lists = lists
            .iter()
            .cloned()
            .map(|mut l| {
                l.version += 1;
                l.last_modified_at = now;
                l
            })
            .collect();
        inner.cards = cards
            .iter()
            .cloned()
            .map(|mut c| {
                c.version += 1;
                c.last_modified_at = now;
                c
            })
            .collect();
        Ok((inner.lists.clone(), inner.cards.clone()))
    }

    /// Records the call, waits out the latency and applies failure injection.
    /// Returns the lock so the caller's mutation is atomic.
    async fn begin(
        &self,
        call: &'static str,
        target: Option<&EntityId>,
    ) -> GatewayResult<tokio::sync::MutexGuard<'_, Inner>> {
        let latency = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(call);
            inner.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let inner = self.inner.lock().await;
        if inner.fail_all {
            debug!(call, "simulated outage");
            return Err(GatewayError::Unavailable("simulated server error".to_string()));
        }
        if let Some(id) = target {
            if inner.failing_ids.contains(id) {
                debug!(call, %id, "simulated failure");
                return Err(GatewayError::Unavailable(format!("simulated failure for {id}")));
            }
        }
        Ok(inner)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn fetch_lists(&self) -> GatewayResult<Vec<List>> {
        let inner = self.begin("fetch_lists", None).await?;
        Ok(inner.lists.clone())
    }

    async fn fetch_cards(&self) -> GatewayResult<Vec<Card>> {
        let inner = self.begin("fetch_cards", None).await?;
        Ok(inner.cards.clone())
    }

    async fn create_list(&self, list: &List) -> GatewayResult<List> {
        let mut inner = self.begin("create_list", Some(&list.id)).await?;
        let mut created = list.clone();
        created.version = 1;
        created.last_modified_at = Utc::now();

        // a replayed create overwrites instead of duplicating
        match inner.lists.iter_mut().find(|l| l.id == created.id) {
            Some(slot) => *slot = created.clone(),
            None => inner.lists.push(created.clone()),
        }
        Ok(created)
    }

    async fn update_list(&self, id: &EntityId, updates: &ListUpdate) -> GatewayResult<List> {
        let mut inner = self.begin("update_list", Some(id)).await?;
        let list = inner
            .lists
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| GatewayError::list_not_found(id))?;
        list.apply_update(updates, Utc::now());
        Ok(list.clone())
    }

    async fn delete_list(&self, id: &EntityId) -> GatewayResult<()> {
        let mut inner = self.begin("delete_list", Some(id)).await?;
        let before = inner.lists.len();
        inner.lists.retain(|l| &l.id != id);
        if inner.lists.len() == before {
            return Err(GatewayError::list_not_found(id));
        }
        inner.cards.retain(|c| &c.list_id != id);
        Ok(())
    }

    async fn create_card(&self, card: &Card) -> GatewayResult<Card> {
        let mut inner = self.begin("create_card", Some(&card.id)).await?;
        let mut created = card.clone();
        created.version = 1;
        created.last_modified_at = Utc::now();

        match inner.cards.iter_mut().find(|c| c.id == created.id) {
            Some(slot) => *slot = created.clone(),
            None => inner.cards.push(created.clone()),
        }
        Ok(created)
    }

    async fn update_card(&self, id: &EntityId, updates: &CardUpdate) -> GatewayResult<Card> {
        let mut inner = self.begin("update_card", Some(id)).await?;
        let card = inner
            .cards
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| GatewayError::card_not_found(id))?;
        card.apply_update(updates, Utc::now());
        Ok(card.clone())
    }

    async fn delete_card(&self, id: &EntityId) -> GatewayResult<()> {
        let mut inner = self.begin("delete_card", Some(id)).await?;
        let before = inner.cards.len();
        inner.cards.retain(|c| &c.id != id);
        if inner.cards.len() == before {
            return Err(GatewayError::card_not_found(id));
        }
        Ok(())
    }

    async fn move_card(
        &self,
        card_id: &EntityId,
        new_list_id: &EntityId,
        new_index: usize,
    ) -> GatewayResult<()> {
        let mut inner = self.begin("move_card", Some(card_id)).await?;
        let source_list = inner
            .cards
            .iter()
            .find(|c| &c.id == card_id)
            .map(|c| c.list_id.clone())
            .ok_or_else(|| GatewayError::card_not_found(card_id))?;
        if !inner.lists.iter().any(|l| &l.id == new_list_id) {
            return Err(GatewayError::list_not_found(new_list_id));
        }

        let mut source = ordering::card_ids_in_list(&inner.cards, &source_list);
        source.retain(|id| id != card_id);
        let mut target = ordering::card_ids_in_list(&inner.cards, new_list_id);
        target.retain(|id| id != card_id);
        target.insert(new_index.min(target.len()), card_id.clone());

        if let Some(card) = inner.cards.iter_mut().find(|c| &c.id == card_id) {
            card.list_id = new_list_id.clone();
        }
        let now = Utc::now();
        if &source_list != new_list_id {
            ordering::renumber(&mut inner.cards, &source, now);
        }
        ordering::renumber(&mut inner.cards, &target, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(id: &str, order: u32) -> List {
        List::with_id(EntityId::from(id), id.to_uppercase(), order, Utc::now())
    }

    fn card(id: &str, list_id: &str, order: u32) -> Card {
        let mut card = Card::new(EntityId::from(list_id), id, order);
        card.id = EntityId::from(id);
        card
    }

    fn order_of(cards: &[Card], id: &str) -> (String, u32) {
        let card = cards.iter().find(|c| c.id.as_str() == id).unwrap();
        (card.list_id.to_string(), card.order)
    }

    #[tokio::test]
    async fn test_create_stamps_version_one() {
        let gateway = InMemoryGateway::new();
        let mut local = list("l1", 0);
        local.version = 5;

        let created = gateway.create_list(&local).await.unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.id.as_str(), "l1");

        // replay does not duplicate
        gateway.create_list(&local).await.unwrap();
        assert_eq!(gateway.fetch_lists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_bumps_server_version() {
        let gateway = InMemoryGateway::new();
        gateway.seed(vec![list("l1", 0)], vec![card("c1", "l1", 0)]).await;

        let updated = gateway
            .update_card(&EntityId::from("c1"), &CardUpdate::title("Renamed"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_missing_ids_reject_with_not_found() {
        let gateway = InMemoryGateway::new();
        let missing = EntityId::from("ghost");

        assert_eq!(
            gateway.delete_card(&missing).await,
            Err(GatewayError::card_not_found(&missing))
        );
        assert_eq!(
            gateway.update_list(&missing, &ListUpdate::title("x")).await,
            Err(GatewayError::list_not_found(&missing))
        );
    }

    #[tokio::test]
    async fn test_delete_list_cascades() {
        let gateway = InMemoryGateway::new();
        gateway
            .seed(
                vec![list("l1", 0), list("l2", 1)],
                vec![card("c1", "l1", 0), card("c2", "l2", 0)],
            )
            .await;

        gateway.delete_list(&EntityId::from("l1")).await.unwrap();

        let (lists, cards) = gateway.snapshot().await;
        assert_eq!(lists.len(), 1);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id.as_str(), "c2");
    }

    #[tokio::test]
    async fn test_move_renumbers_both_lists() {
        let gateway = InMemoryGateway::new();
        gateway
            .seed(
                vec![list("l1", 0), list("l2", 1)],
                vec![
                    card("a", "l1", 0),
                    card("b", "l1", 1),
                    card("c", "l1", 2),
                    card("x", "l2", 0),
                ],
            )
            .await;

        gateway
            .move_card(&EntityId::from("a"), &EntityId::from("l2"), 1)
            .await
            .unwrap();

        let (_, cards) = gateway.snapshot().await;
        assert_eq!(order_of(&cards, "b"), ("l1".to_string(), 0));
        assert_eq!(order_of(&cards, "c"), ("l1".to_string(), 1));
        assert_eq!(order_of(&cards, "x"), ("l2".to_string(), 0));
        assert_eq!(order_of(&cards, "a"), ("l2".to_string(), 1));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let gateway = InMemoryGateway::new();
        gateway.seed(vec![list("l1", 0)], vec![]).await;

        gateway.fail_for("l1").await;
        assert!(matches!(
            gateway.update_list(&EntityId::from("l1"), &ListUpdate::title("x")).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(gateway.fetch_lists().await.is_ok());

        gateway.set_offline(true).await;
        assert!(gateway.fetch_lists().await.is_err());

        gateway.clear_failures().await;
        assert!(gateway
            .update_list(&EntityId::from("l1"), &ListUpdate::title("x"))
            .await
            .is_ok());
        assert_eq!(
            gateway.calls().await,
            vec!["update_list", "fetch_lists", "fetch_lists", "update_list"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let gateway = InMemoryGateway::with_latency(Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        gateway.fetch_cards().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_sync_all_bumps_versions() {
        let gateway = InMemoryGateway::new();
        let (lists, cards) = gateway
            .sync_all(&[list("l1", 0)], &[card("c1", "l1", 0)])
            .await
            .unwrap();
        assert_eq!(lists[0].version, 2);
        assert_eq!(cards[0].version, 2);
    }
}
