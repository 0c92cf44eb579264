//! Single-writer owner of the board state.
//!
//! Every mutation goes through [`BoardStore::dispatch`], which runs the
//! reducer against the current snapshot and publishes the result on a watch
//! channel. Readers either take the latest snapshot with
//! [`BoardStore::state`] or [`BoardStore::subscribe`] to changes.

use crate::config::KanbanConfig;
use crate::domain::reducer::apply;
use crate::domain::validation::{validate_card, validate_list, validate_tag};
use crate::domain::{
    Action, BoardState, CardDraft, CardUpdate, EntityId, ListUpdate, PendingOp, TagSet,
};
use crate::error::{KanbanError, Result};
use crate::storage::VersionStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cloneable handle to the shared board
#[derive(Debug, Clone)]
pub struct BoardStore {
    sender: Arc<watch::Sender<Arc<BoardState>>>,
    /// Last state written to storage; holding the lock is a turn to write
    last_written: Arc<Mutex<Option<Arc<BoardState>>>>,
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore {
    pub fn new() -> Self {
        Self::with_state(BoardState::new())
    }

    pub fn with_state(state: BoardState) -> Self {
        let (sender, _) = watch::channel(Arc::new(state));
        Self {
            sender: Arc::new(sender),
            last_written: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &KanbanConfig) -> Self {
        let state = match config.history_limit {
            Some(limit) => BoardState::new().with_history_limit(limit),
            None => BoardState::new(),
        };
        Self::with_state(state)
    }

    /// Latest published snapshot
    pub fn state(&self) -> Arc<BoardState> {
        Arc::clone(&self.sender.borrow())
    }

    /// Receiver that wakes on every effective state change
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.sender.subscribe()
    }

    /// Applies an action. Subscribers are only notified when it changed
    /// something; the return value says whether it did.
    pub fn dispatch(&self, action: Action) -> bool {
        let name = action.name();
        let changed = self
            .sender
            .send_if_modified(|state| apply(Arc::make_mut(state), action, Utc::now()));
        debug!(action = name, changed, "dispatched");
        changed
    }

    /// Builds an action from the current state and applies it in one step,
    /// so no other dispatch can interleave between the read and the write
    pub(crate) fn dispatch_with<F>(&self, build: F) -> bool
    where
        F: FnOnce(&BoardState) -> Action,
    {
        self.sender.send_if_modified(|state| {
            let action = build(state);
            apply(Arc::make_mut(state), action, Utc::now())
        })
    }

    /// Replaces the board with what the version store holds, and mirrors
    /// its pending queue. A storage failure leaves an empty board.
    pub async fn load_from(&self, storage: &dyn VersionStore) {
        let (lists, cards) = match read_board(storage).await {
            Ok(board) => board,
            Err(err) => {
                warn!(error = %err, "failed to load board from storage, starting empty");
                (Vec::new(), Vec::new())
            }
        };
        info!(lists = lists.len(), cards = cards.len(), "board loaded");
        self.dispatch(Action::SetInitialState { lists, cards });

        match storage.get_sync_queue().await {
            Ok(queue) => {
                self.dispatch(Action::SyncFailure { queue: Some(queue) });
            }
            Err(err) => warn!(error = %err, "failed to load pending queue"),
        }
    }

    /// Writes the latest lists and cards through `storage` and returns the
    /// state that was written.
    ///
    /// Writes from here and from [`Self::spawn_persistence`] take turns, and
    /// each one reads the board only once it holds its turn.
    pub async fn persist(&self, storage: &dyn VersionStore) -> Result<Arc<BoardState>> {
        let mut written = self.last_written.lock().await;
        let state = self.state();
        storage.save_all_data(&state.lists, &state.cards).await?;
        *written = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Writes lists and cards through `storage` whenever they change.
    ///
    /// Changes dispatched after this call are saved even if the task has not
    /// started yet. The task ends once every handle to this store is dropped.
    /// Write failures are logged and retried on the next change.
    pub fn spawn_persistence(&self, storage: Arc<dyn VersionStore>) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        // the board as it stands now counts as stored until something else
        // gets written
        let baseline = Arc::clone(&receiver.borrow_and_update());
        let last_written = Arc::clone(&self.last_written);
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let mut written = last_written.lock().await;
                let state = Arc::clone(&receiver.borrow_and_update());
                if same_records(written.as_ref().unwrap_or(&baseline), &state) {
                    continue;
                }
                match storage.save_all_data(&state.lists, &state.cards).await {
                    Ok(()) => {
                        debug!(
                            lists = state.lists.len(),
                            cards = state.cards.len(),
                            "board persisted"
                        );
                        *written = Some(state);
                    }
                    Err(err) => warn!(error = %err, "failed to persist board"),
                }
            }
        })
    }

    // Intents. Each validates its input, applies the edit locally and returns
    // the remote mutation that mirrors it, ready for the sync engine's queue.

    pub fn add_list(&self, title: &str) -> Result<PendingOp> {
        validate_list(title)?;
        let id = EntityId::generate();
        self.dispatch(Action::AddList {
            title: title.trim().to_string(),
            id: Some(id.clone()),
        });
        let list = self
            .state()
            .list(&id)
            .cloned()
            .ok_or_else(|| KanbanError::ListNotFound(id.to_string()))?;
        Ok(PendingOp::CreateList(list))
    }

    pub fn rename_list(&self, id: &EntityId, title: &str) -> Result<PendingOp> {
        validate_list(title)?;
        self.require_list(id)?;
        let updates = ListUpdate::title(title.trim());
        self.dispatch(Action::UpdateList {
            list_id: id.clone(),
            updates: updates.clone(),
        });
        Ok(PendingOp::UpdateList {
            id: id.clone(),
            updates,
        })
    }

    /// Hides a list from the board. Locally this does not bump its version.
    pub fn archive_list(&self, id: &EntityId) -> Result<PendingOp> {
        self.require_list(id)?;
        self.dispatch(Action::ArchiveList { list_id: id.clone() });
        Ok(PendingOp::UpdateList {
            id: id.clone(),
            updates: ListUpdate::archived(true),
        })
    }

    pub fn unarchive_list(&self, id: &EntityId) -> Result<PendingOp> {
        self.require_list(id)?;
        self.dispatch(Action::UnarchiveList { list_id: id.clone() });
        Ok(PendingOp::UpdateList {
            id: id.clone(),
            updates: ListUpdate::archived(false),
        })
    }

    /// Deletes a list and its cards
    pub fn delete_list(&self, id: &EntityId) -> Result<PendingOp> {
        self.require_list(id)?;
        self.dispatch(Action::DeleteList { list_id: id.clone() });
        Ok(PendingOp::DeleteList { id: id.clone() })
    }

    pub fn add_card(&self, list_id: &EntityId, mut draft: CardDraft) -> Result<PendingOp> {
        validate_card(draft.title.as_deref(), draft.description.as_deref())?;
        if let Some(tags) = &draft.tags {
            tags.iter().try_for_each(validate_tag)?;
        }
        self.require_list(list_id)?;

        let id = draft.id.take().unwrap_or_else(EntityId::generate);
        if self.state().card(&id).is_some() {
            return Err(KanbanError::validation("card.id", format!("card {id} already exists")));
        }
        draft.id = Some(id.clone());
        draft.title = draft.title.map(|t| t.trim().to_string());
        self.dispatch(Action::AddCard {
            list_id: list_id.clone(),
            draft,
        });

        let card = self
            .state()
            .card(&id)
            .cloned()
            .ok_or_else(|| KanbanError::CardNotFound(id.to_string()))?;
        Ok(PendingOp::CreateCard(card))
    }

    /// Edits a card's content. Positions change through [`Self::move_card`]
    /// and [`Self::reorder_cards`] instead.
    pub fn update_card(&self, id: &EntityId, updates: CardUpdate) -> Result<PendingOp> {
        if updates.order.is_some() {
            return Err(KanbanError::validation(
                "order",
                "use move_card or reorder_cards to reposition a card",
            ));
        }
        validate_card(updates.title.as_deref(), updates.description.as_deref())?;
        if let Some(tags) = &updates.tags {
            tags.iter().try_for_each(validate_tag)?;
        }
        self.require_card(id)?;
        self.dispatch(Action::UpdateCard {
            card_id: id.clone(),
            updates: updates.clone(),
        });
        Ok(PendingOp::UpdateCard {
            id: id.clone(),
            updates,
        })
    }

    /// Adds a tag to a card. Returns `None` when the card already carries it.
    pub fn add_tag(&self, card_id: &EntityId, tag: &str) -> Result<Option<PendingOp>> {
        let tag = tag.trim();
        validate_tag(tag)?;
        let mut tags = self.require_card(card_id)?;
        if !tags.insert(tag) {
            return Ok(None);
        }
        self.update_card(card_id, CardUpdate::tags(tags)).map(Some)
    }

    /// Removes a tag from a card. Returns `None` when it was not there.
    pub fn remove_tag(&self, card_id: &EntityId, tag: &str) -> Result<Option<PendingOp>> {
        let mut tags = self.require_card(card_id)?;
        if !tags.remove(tag) {
            return Ok(None);
        }
        self.update_card(card_id, CardUpdate::tags(tags)).map(Some)
    }

    pub fn delete_card(&self, id: &EntityId) -> Result<PendingOp> {
        self.require_card(id)?;
        self.dispatch(Action::DeleteCard { card_id: id.clone() });
        Ok(PendingOp::DeleteCard { id: id.clone() })
    }

    /// Moves a card to `new_index` within `new_list_id`; the index is clamped
    pub fn move_card(
        &self,
        card_id: &EntityId,
        new_list_id: &EntityId,
        new_index: usize,
    ) -> Result<PendingOp> {
        self.require_card(card_id)?;
        self.require_list(new_list_id)?;
        self.dispatch(Action::MoveCard {
            card_id: card_id.clone(),
            new_list_id: new_list_id.clone(),
            new_index,
        });
        Ok(PendingOp::MoveCard {
            card_id: card_id.clone(),
            new_list_id: new_list_id.clone(),
            new_index,
        })
    }

    /// Applies an explicit ordering to the cards of one list. Returns one
    /// update per card whose position changed.
    pub fn reorder_cards(
        &self,
        list_id: &EntityId,
        card_ids: Vec<EntityId>,
    ) -> Result<Vec<PendingOp>> {
        self.require_list(list_id)?;
        let state = self.state();
        if let Some(stranger) = card_ids
            .iter()
            .find(|id| state.card(id).map(|c| &c.list_id) != Some(list_id))
        {
            return Err(KanbanError::validation(
                "cardIds",
                format!("card {stranger} is not in list {list_id}"),
            ));
        }

        let ops = card_ids
            .iter()
            .enumerate()
            .filter(|(position, id)| {
                state.card(id).map(|c| c.order) != Some(*position as u32)
            })
            .map(|(position, id)| PendingOp::UpdateCard {
                id: id.clone(),
                updates: CardUpdate::order(position as u32),
            })
            .collect();
        self.dispatch(Action::ReorderCards {
            list_id: list_id.clone(),
            card_ids,
        });
        Ok(ops)
    }

    pub fn undo(&self) -> bool {
        self.dispatch(Action::Undo)
    }

    pub fn redo(&self) -> bool {
        self.dispatch(Action::Redo)
    }

    /// Empties the in-memory board. Persisted data and the stored pending
    /// queue are untouched; [`crate::SyncEngine::clear_all`] clears those too.
    pub fn clear_all(&self) {
        self.dispatch(Action::ClearAll);
    }

    fn require_list(&self, id: &EntityId) -> Result<()> {
        match self.state().list(id) {
            Some(_) => Ok(()),
            None => Err(KanbanError::ListNotFound(id.to_string())),
        }
    }

    /// Returns the card's current tags
    fn require_card(&self, id: &EntityId) -> Result<TagSet> {
        self.state()
            .card(id)
            .map(|c| c.tags.clone())
            .ok_or_else(|| KanbanError::CardNotFound(id.to_string()))
    }
}

fn same_records(a: &BoardState, b: &BoardState) -> bool {
    a.lists == b.lists && a.cards == b.cards
}

async fn read_board(
    storage: &dyn VersionStore,
) -> Result<(Vec<crate::domain::List>, Vec<crate::domain::Card>)> {
    if !storage.is_initialized().await {
        storage.initialize().await?;
    }
    let lists = storage.get_all_lists().await?;
    let cards = storage.get_all_cards().await?;
    Ok((lists, cards))
}
