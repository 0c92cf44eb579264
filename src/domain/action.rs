use crate::domain::board::Conflict;
use crate::domain::card::{Card, CardDraft, CardUpdate};
use crate::domain::entity::EntityId;
use crate::domain::list::{List, ListUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything the board reducer knows how to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    /// Replaces lists and cards wholesale (cold load, post-sync merge)
    SetInitialState { lists: Vec<List>, cards: Vec<Card> },
    AddList {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<EntityId>,
    },
    UpdateList { list_id: EntityId, updates: ListUpdate },
    DeleteList { list_id: EntityId },
    ArchiveList { list_id: EntityId },
    UnarchiveList { list_id: EntityId },
    AddCard {
        list_id: EntityId,
        #[serde(flatten)]
        draft: CardDraft,
    },
    UpdateCard { card_id: EntityId, updates: CardUpdate },
    DeleteCard { card_id: EntityId },
    MoveCard {
        card_id: EntityId,
        new_list_id: EntityId,
        new_index: usize,
    },
    ReorderCards {
        list_id: EntityId,
        card_ids: Vec<EntityId>,
    },
    Undo,
    Redo,
    ClearAll,
    SyncSuccess,
    SyncFailure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queue: Option<Vec<PendingAction>>,
    },
    RecordConflicts { conflicts: Vec<Conflict> },
    ResolveConflict {
        entity_id: EntityId,
        choice: ConflictChoice,
    },
}

impl Action {
    /// Whether applying this action records an undo step
    pub fn is_undoable(&self) -> bool {
        matches!(
            self,
            Self::AddList { .. }
                | Self::UpdateList { .. }
                | Self::DeleteList { .. }
                | Self::ArchiveList { .. }
                | Self::UnarchiveList { .. }
                | Self::AddCard { .. }
                | Self::UpdateCard { .. }
                | Self::DeleteCard { .. }
                | Self::MoveCard { .. }
                | Self::ReorderCards { .. }
                | Self::ClearAll
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetInitialState { .. } => "SET_INITIAL_STATE",
            Self::AddList { .. } => "ADD_LIST",
            Self::UpdateList { .. } => "UPDATE_LIST",
            Self::DeleteList { .. } => "DELETE_LIST",
            Self::ArchiveList { .. } => "ARCHIVE_LIST",
            Self::UnarchiveList { .. } => "UNARCHIVE_LIST",
            Self::AddCard { .. } => "ADD_CARD",
            Self::UpdateCard { .. } => "UPDATE_CARD",
            Self::DeleteCard { .. } => "DELETE_CARD",
            Self::MoveCard { .. } => "MOVE_CARD",
            Self::ReorderCards { .. } => "REORDER_CARDS",
            Self::Undo => "UNDO",
            Self::Redo => "REDO",
            Self::ClearAll => "CLEAR_ALL",
            Self::SyncSuccess => "SYNC_SUCCESS",
            Self::SyncFailure { .. } => "SYNC_FAILURE",
            Self::RecordConflicts { .. } => "RECORD_CONFLICTS",
            Self::ResolveConflict { .. } => "RESOLVE_CONFLICT",
        }
    }
}

/// Which side of a conflict to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictChoice {
    Local,
    Server,
}

/// A mutation the remote authority has not confirmed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PendingOp {
    CreateList(List),
    UpdateList { id: EntityId, updates: ListUpdate },
    DeleteList { id: EntityId },
    CreateCard(Card),
    UpdateCard { id: EntityId, updates: CardUpdate },
    DeleteCard { id: EntityId },
    MoveCard {
        card_id: EntityId,
        new_list_id: EntityId,
        new_index: usize,
    },
}

impl PendingOp {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateList(_) => "CREATE_LIST",
            Self::UpdateList { .. } => "UPDATE_LIST",
            Self::DeleteList { .. } => "DELETE_LIST",
            Self::CreateCard(_) => "CREATE_CARD",
            Self::UpdateCard { .. } => "UPDATE_CARD",
            Self::DeleteCard { .. } => "DELETE_CARD",
            Self::MoveCard { .. } => "MOVE_CARD",
        }
    }

    /// The entity this operation targets
    pub fn target(&self) -> &EntityId {
        match self {
            Self::CreateList(list) => &list.id,
            Self::CreateCard(card) => &card.id,
            Self::UpdateList { id, .. }
            | Self::DeleteList { id }
            | Self::UpdateCard { id, .. }
            | Self::DeleteCard { id } => id,
            Self::MoveCard { card_id, .. } => card_id,
        }
    }
}

/// Auto-incrementing key of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub u64);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued operation as persisted by the version store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: QueueId,
    #[serde(flatten)]
    pub op: PendingOp,
    pub timestamp: DateTime<Utc>,
}
