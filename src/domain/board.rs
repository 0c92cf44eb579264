use crate::domain::action::PendingAction;
use crate::domain::card::Card;
use crate::domain::entity::EntityId;
use crate::domain::list::List;
use crate::domain::ordering;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lists and cards as they stood at one point in the undo history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub lists: Vec<List>,
    pub cards: Vec<Card>,
}

/// Which kind of entity a record is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    List,
    Card,
}

/// A list or a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    List(List),
    Card(Card),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Self::List(list) => &list.id,
            Self::Card(card) => &card.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::List(_) => EntityKind::List,
            Self::Card(_) => EntityKind::Card,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::List(list) => &list.title,
            Self::Card(card) => &card.title,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::List(list) => list.version,
            Self::Card(card) => card.version,
        }
    }
}

/// Local and remote edits that the merge could not reconcile field by field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    pub local: Entity,
    pub server: Entity,
    /// Field names edited on both sides with different values
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Conflict {
    pub fn entity_id(&self) -> &EntityId {
        self.local.id()
    }
}

/// The whole in-memory board: entities, undo history and sync bookkeeping.
///
/// `history[history_index]` is always the snapshot currently applied, so
/// `UNDO` steps to `history_index - 1` and `REDO` to `history_index + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub lists: Vec<List>,
    pub cards: Vec<Card>,
    pub history: Vec<Arc<BoardSnapshot>>,
    pub history_index: Option<usize>,
    pub sync_queue: Vec<PendingAction>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub conflicts: Vec<Conflict>,
    pub(crate) history_limit: Option<usize>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of undo steps retained
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            lists: self.lists.clone(),
            cards: self.cards.clone(),
        }
    }

    pub fn list(&self, id: &EntityId) -> Option<&List> {
        self.lists.iter().find(|l| &l.id == id)
    }

    pub fn card(&self, id: &EntityId) -> Option<&Card> {
        self.cards.iter().find(|c| &c.id == id)
    }

    /// Non-archived lists in display order
    pub fn visible_lists(&self) -> Vec<&List> {
        ordering::sorted_lists(&self.lists, false)
    }

    pub fn archived_lists(&self) -> Vec<&List> {
        self.lists.iter().filter(|l| l.archived).collect()
    }

    /// Cards of a list in display order
    pub fn cards_in_list(&self, list_id: &EntityId) -> Vec<&Card> {
        ordering::cards_in_list(&self.cards, list_id)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.history_index, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.history_index {
            Some(i) => i + 1 < self.history.len(),
            None => false,
        }
    }

    pub fn conflict_for(&self, id: &EntityId) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.entity_id() == id)
    }
}
