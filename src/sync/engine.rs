use crate::board_store::BoardStore;
use crate::config::KanbanConfig;
use crate::domain::{
    Action, BoardState, Card, CardUpdate, Conflict, ConflictChoice, Entity, EntityId, List,
    ListUpdate, PendingAction, PendingOp, QueueId,
};
use crate::error::{KanbanError, Result};
use crate::storage::VersionStore;
use crate::sync::gateway::{GatewayError, GatewayResult, RemoteGateway};
use crate::sync::merge::{approximate_base, merge_json};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Why a sync cycle did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    InFlight,
}

/// Counters for one completed sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Pending actions the remote accepted
    pub replayed: usize,
    /// Pending actions left queued for the next cycle
    pub failed: usize,
    /// Local records replaced by a merge with a newer remote record
    pub merged: usize,
    /// Remote records added because they had no local counterpart
    pub appended: usize,
    pub conflicts: usize,
    /// Whether the merged board reached the version store
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
    Failed(String),
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// What happened to a mutation handed to [`SyncEngine::queue_action`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The remote accepted it right away
    Sent,
    /// Persisted to the pending queue under this key
    Queued(QueueId),
    /// Neither delivered nor persisted
    Dropped(String),
}

/// Reconciles the local board with the remote authority.
///
/// The engine owns no board state of its own: it reads and writes through
/// the [`BoardStore`], persists through the [`VersionStore`] and talks to the
/// remote through the [`RemoteGateway`]. Sync failures never escape; they
/// are logged and reported through [`SyncOutcome`].
pub struct SyncEngine {
    board: BoardStore,
    gateway: Arc<dyn RemoteGateway>,
    storage: Arc<dyn VersionStore>,
    online: AtomicBool,
    in_flight: AtomicBool,
    /// Remote records as fetched by the previous cycle, keyed by id
    baselines: Mutex<HashMap<EntityId, Value>>,
}

/// Clears the in-flight flag when a cycle ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ids deleted locally whose remote copies must not come back through a merge
#[derive(Debug, Default)]
struct Tombstones {
    lists: HashSet<EntityId>,
    cards: HashSet<EntityId>,
}

impl Tombstones {
    /// Deletes still waiting in the queue
    fn record_queued(&mut self, queue: &[PendingAction]) {
        for pending in queue {
            match &pending.op {
                PendingOp::DeleteList { id } => {
                    self.lists.insert(id.clone());
                }
                PendingOp::DeleteCard { id } => {
                    self.cards.insert(id.clone());
                }
                _ => {}
            }
        }
    }

    /// Entities the board held when the cycle started but no longer holds
    fn record_vanished(&mut self, known: &BoardState, current: &BoardState) {
        let lists = known.lists.iter().filter(|l| current.list(&l.id).is_none());
        self.lists.extend(lists.map(|l| l.id.clone()));
        let cards = known.cards.iter().filter(|c| current.card(&c.id).is_none());
        self.cards.extend(cards.map(|c| c.id.clone()));
    }

    fn admits_list(&self, list: &List) -> bool {
        !self.lists.contains(&list.id)
    }

    fn admits_card(&self, card: &Card) -> bool {
        !self.cards.contains(&card.id) && !self.lists.contains(&card.list_id)
    }
}

impl SyncEngine {
    pub fn new(
        board: BoardStore,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn VersionStore>,
    ) -> Self {
        Self {
            board,
            gateway,
            storage,
            online: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            baselines: Mutex::new(HashMap::new()),
        }
    }

    /// Builds an engine that starts with the configured connectivity
    pub fn from_config(
        board: BoardStore,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn VersionStore>,
        config: &KanbanConfig,
    ) -> Self {
        Self::new(board, gateway, storage).with_online(config.start_online)
    }

    /// Sets the initial connectivity without triggering a sync
    pub fn with_online(self, online: bool) -> Self {
        self.online.store(online, Ordering::SeqCst);
        self
    }

    pub fn board(&self) -> &BoardStore {
        &self.board
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Records a connectivity transition. Coming back online starts a sync
    /// immediately and returns its outcome.
    pub async fn on_connectivity_change(&self, online: bool) -> Option<SyncOutcome> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return None;
        }
        info!(online, "connectivity changed");
        if online {
            Some(self.sync_with_server().await)
        } else {
            None
        }
    }

    /// Periodic timer entry point
    pub async fn on_tick(&self) -> SyncOutcome {
        self.sync_with_server().await
    }

    /// Runs one sync cycle: fetch the remote, replay pending actions in
    /// order, merge, then replace and persist the local board.
    ///
    /// Re-entrant calls while a cycle is running are skipped, not queued.
    pub async fn sync_with_server(&self) -> SyncOutcome {
        if !self.is_online() {
            debug!("offline, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync already in flight, skipping");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.run_cycle().await {
            Ok(report) => {
                info!(
                    replayed = report.replayed,
                    failed = report.failed,
                    merged = report.merged,
                    appended = report.appended,
                    conflicts = report.conflicts,
                    "sync completed"
                );
                SyncOutcome::Completed(report)
            }
            Err(err) => {
                warn!(error = %err, "sync failed");
                self.board.dispatch(Action::SyncFailure { queue: None });
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    /// Sends a local mutation to the remote.
    ///
    /// Offline, the mutation goes straight to the pending queue. Online, it
    /// is sent directly when nothing older is waiting, otherwise queued
    /// behind the backlog so replay order is kept; either way a sync follows.
    pub async fn queue_action(&self, op: PendingOp) -> Delivery {
        if !self.is_online() {
            return self.enqueue(op).await;
        }

        let backlog_empty = match self.storage.get_sync_queue().await {
            Ok(queue) => queue.is_empty(),
            Err(err) => {
                warn!(error = %err, "failed to read pending queue");
                false
            }
        };

        let delivery = if backlog_empty {
            match self.replay(&op).await {
                Ok(()) => {
                    debug!(action = op.kind(), target = %op.target(), "sent");
                    Delivery::Sent
                }
                Err(err) => {
                    debug!(action = op.kind(), error = %err, "direct send failed, queueing");
                    self.enqueue(op).await
                }
            }
        } else {
            self.enqueue(op).await
        };

        self.sync_with_server().await;
        delivery
    }

    /// Keeps one side of a recorded conflict and sends the result to the
    /// remote. Returns `None` when the kept record no longer has a home on
    /// the board (its list is gone).
    pub async fn resolve_conflict(
        &self,
        entity_id: &EntityId,
        choice: ConflictChoice,
    ) -> Result<Option<Delivery>> {
        let resolved = self.board.dispatch(Action::ResolveConflict {
            entity_id: entity_id.clone(),
            choice,
        });
        if !resolved {
            return Err(KanbanError::ConflictNotFound(entity_id.to_string()));
        }
        info!(%entity_id, ?choice, "conflict resolved");

        let state = self.board.state();
        let op = if let Some(list) = state.list(entity_id) {
            PendingOp::UpdateList {
                id: list.id.clone(),
                updates: ListUpdate {
                    title: Some(list.title.clone()),
                    order: Some(list.order),
                    archived: Some(list.archived),
                },
            }
        } else if let Some(card) = state.card(entity_id) {
            PendingOp::UpdateCard {
                id: card.id.clone(),
                updates: CardUpdate {
                    title: Some(card.title.clone()),
                    description: Some(card.description.clone()),
                    tags: Some(card.tags.clone()),
                    order: Some(card.order),
                },
            }
        } else {
            return Ok(None);
        };

        Ok(Some(self.queue_action(op).await))
    }

    /// Empties the board, the version store and the pending queue. Nothing
    /// is sent to the remote, so the next sync downloads its records again.
    pub async fn clear_all(&self) -> Result<()> {
        self.board.dispatch(Action::ClearAll);
        self.baselines.lock().await.clear();
        self.storage.clear_all_data().await?;
        self.mirror_queue().await;
        info!("board cleared");
        Ok(())
    }

    async fn run_cycle(&self) -> Result<SyncReport> {
        let known = self.board.state();
        let remote_lists = self.gateway.fetch_lists().await?;
        let remote_cards = self.gateway.fetch_cards().await?;
        let mut report = SyncReport::default();

        let queue = self.storage.get_sync_queue().await?;
        let mut tombstones = Tombstones::default();
        tombstones.record_queued(&queue);

        for pending in queue {
            match self.replay(&pending.op).await {
                Ok(()) => {
                    report.replayed += 1;
                    debug!(queue_id = %pending.id, action = pending.op.kind(), "replayed");
                    if let Err(err) = self.storage.remove_from_sync_queue(pending.id).await {
                        warn!(
                            queue_id = %pending.id,
                            error = %err,
                            "failed to dequeue replayed action"
                        );
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        queue_id = %pending.id,
                        action = pending.op.kind(),
                        error = %err,
                        "pending action failed, keeping it queued"
                    );
                }
            }
        }

        // deletes queued while the drain ran
        match self.storage.get_sync_queue().await {
            Ok(queue) => tombstones.record_queued(&queue),
            Err(err) => warn!(error = %err, "failed to re-read pending queue"),
        }

        let mut baselines = self.baselines.lock().await;
        let mut conflicts = Vec::new();
        self.board.dispatch_with(|state| {
            tombstones.record_vanished(&known, state);
            let lists = merge_records(
                &state.lists,
                &remote_lists,
                &baselines,
                |list| tombstones.admits_list(list),
                &mut report,
                &mut conflicts,
            );
            let cards = merge_records(
                &state.cards,
                &remote_cards,
                &baselines,
                |card| tombstones.admits_card(card),
                &mut report,
                &mut conflicts,
            );
            Action::SetInitialState { lists, cards }
        });

        *baselines = remote_lists
            .iter()
            .map(|l| (l.id.clone(), serde_json::to_value(l)))
            .chain(remote_cards.iter().map(|c| (c.id.clone(), serde_json::to_value(c))))
            .filter_map(|(id, value)| value.ok().map(|v| (id, v)))
            .collect();
        drop(baselines);

        match self.board.persist(self.storage.as_ref()).await {
            Ok(_) => report.persisted = true,
            Err(err) => warn!(error = %err, "failed to persist merged board"),
        }

        self.board.dispatch(Action::SyncSuccess);
        self.mirror_queue().await;

        report.conflicts = conflicts.len();
        if !conflicts.is_empty() {
            self.board.dispatch(Action::RecordConflicts { conflicts });
        }
        Ok(report)
    }

    async fn replay(&self, op: &PendingOp) -> GatewayResult<()> {
        match op {
            PendingOp::CreateList(list) => self.gateway.create_list(list).await.map(drop),
            PendingOp::UpdateList { id, updates } => {
                self.gateway.update_list(id, updates).await.map(drop)
            }
            PendingOp::DeleteList { id } => already_gone_is_ok(self.gateway.delete_list(id).await),
            PendingOp::CreateCard(card) => self.gateway.create_card(card).await.map(drop),
            PendingOp::UpdateCard { id, updates } => {
                self.gateway.update_card(id, updates).await.map(drop)
            }
            PendingOp::DeleteCard { id } => already_gone_is_ok(self.gateway.delete_card(id).await),
            PendingOp::MoveCard {
                card_id,
                new_list_id,
                new_index,
            } => {
                self.gateway
                    .move_card(card_id, new_list_id, *new_index)
                    .await
            }
        }
    }

    async fn enqueue(&self, op: PendingOp) -> Delivery {
        let kind = op.kind();
        let target = op.target().clone();
        match self.storage.add_to_sync_queue(op).await {
            Ok(id) => {
                debug!(queue_id = %id, action = kind, %target, "queued");
                self.mirror_queue().await;
                Delivery::Queued(id)
            }
            Err(err) => {
                error!(action = kind, %target, error = %err, "failed to queue action");
                Delivery::Dropped(err.to_string())
            }
        }
    }

    /// Copies the persisted pending queue into the board state
    async fn mirror_queue(&self) {
        match self.storage.get_sync_queue().await {
            Ok(queue) => {
                self.board.dispatch(Action::SyncFailure { queue: Some(queue) });
            }
            Err(err) => warn!(error = %err, "failed to read pending queue"),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.is_online())
            .field("in_flight", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

/// A delete the remote no longer has anything to apply to has succeeded
fn already_gone_is_ok(result: GatewayResult<()>) -> GatewayResult<()> {
    match result {
        Err(GatewayError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

/// Entity behaviour the merge needs, shared by lists and cards
trait SyncRecord: Clone + Serialize + DeserializeOwned {
    fn id(&self) -> &EntityId;
    fn last_modified_at(&self) -> DateTime<Utc>;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn into_entity(self) -> Entity;
}

impl SyncRecord for List {
    fn id(&self) -> &EntityId {
        &self.id
    }
    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn into_entity(self) -> Entity {
        Entity::List(self)
    }
}

impl SyncRecord for Card {
    fn id(&self) -> &EntityId {
        &self.id
    }
    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn into_entity(self) -> Entity {
        Entity::Card(self)
    }
}

/// Merges one collection. Local records are kept unless the remote copy is
/// strictly newer; remote-only records that pass `admit` are appended.
fn merge_records<T, F>(
    local: &[T],
    remote: &[T],
    baselines: &HashMap<EntityId, Value>,
    admit: F,
    report: &mut SyncReport,
    conflicts: &mut Vec<Conflict>,
) -> Vec<T>
where
    T: SyncRecord,
    F: Fn(&T) -> bool,
{
    let remote_by_id: HashMap<&EntityId, &T> = remote.iter().map(|r| (r.id(), r)).collect();
    let local_ids: HashSet<&EntityId> = local.iter().map(|l| l.id()).collect();

    let mut merged: Vec<T> = local
        .iter()
        .map(|record| match remote_by_id.get(record.id()) {
            Some(server) if server.last_modified_at() > record.last_modified_at() => {
                report.merged += 1;
                merge_record(record, server, baselines, conflicts)
            }
            _ => record.clone(),
        })
        .collect();

    for server in remote {
        if !local_ids.contains(server.id()) && admit(server) {
            report.appended += 1;
            merged.push(server.clone());
        }
    }
    merged
}

fn merge_record<T: SyncRecord>(
    local: &T,
    server: &T,
    baselines: &HashMap<EntityId, Value>,
    conflicts: &mut Vec<Conflict>,
) -> T {
    let pair = (serde_json::to_value(local), serde_json::to_value(server));
    let (local_json, server_json) = match pair {
        (Ok(local_json), Ok(server_json)) => (local_json, server_json),
        _ => return server.clone(),
    };
    let base = baselines
        .get(local.id())
        .cloned()
        .unwrap_or_else(|| approximate_base(&local_json));

    let outcome = merge_json(&base, &local_json, &server_json);
    let mut record: T = match serde_json::from_value(outcome.value) {
        Ok(record) => record,
        Err(err) => {
            warn!(id = %local.id(), error = %err, "merged record is malformed, taking remote copy");
            return server.clone();
        }
    };
    record.set_version(record.version().max(local.version()).max(server.version()));

    if !outcome.conflicting_fields.is_empty() {
        let local_entity = local.clone().into_entity();
        conflicts.push(Conflict {
            kind: local_entity.kind(),
            name: local_entity.title().to_string(),
            local: local_entity,
            server: server.clone().into_entity(),
            fields: outcome.conflicting_fields,
        });
    }
    record
}
