pub mod action;
pub mod board;
pub mod card;
pub mod entity;
pub mod list;
pub mod ordering;
pub mod reducer;
pub mod validation;

pub use action::{Action, ConflictChoice, PendingAction, PendingOp, QueueId};
pub use board::{BoardSnapshot, BoardState, Conflict, Entity, EntityKind};
pub use card::{Card, CardDraft, CardUpdate};
pub use entity::{EntityId, TagSet};
pub use list::{List, ListUpdate};
pub use reducer::{reduce, reduce_at};
