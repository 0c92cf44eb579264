//! # Kanban Sync
//!
//! Local-first state core for kanban boards.
//!
//! The board lives in memory and changes only through reducer actions,
//! with a bounded undo/redo history. Lists and cards are persisted through a
//! pluggable [`VersionStore`], and a [`SyncEngine`] reconciles them with a
//! remote authority using a pending-action queue and a field-level
//! three-way merge. Nothing here depends on a UI or on a particular
//! transport.

pub mod board_store;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use board_store::BoardStore;
pub use config::KanbanConfig;
pub use domain::{
    action::{Action, ConflictChoice, PendingAction, PendingOp, QueueId},
    board::{BoardSnapshot, BoardState, Conflict, Entity, EntityKind},
    card::{Card, CardDraft, CardUpdate},
    entity::{EntityId, TagSet},
    list::{List, ListUpdate},
};
pub use error::{KanbanError, Result};
pub use storage::VersionStore;
pub use sync::{
    Delivery, GatewayError, InMemoryGateway, RemoteGateway, SyncEngine, SyncOutcome, SyncReport,
    SyncScheduler,
};
