use crate::domain::{Card, CardUpdate, EntityId, EntityKind, List, ListUpdate};
use async_trait::async_trait;
use thiserror::Error;

/// Why the remote authority rejected a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{kind:?} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote rejected request: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn list_not_found(id: &EntityId) -> Self {
        Self::NotFound {
            kind: EntityKind::List,
            id: id.clone(),
        }
    }

    pub fn card_not_found(id: &EntityId) -> Self {
        Self::NotFound {
            kind: EntityKind::Card,
            id: id.clone(),
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// The remote authority lists and cards are reconciled against.
///
/// Any rejection is treated as retryable by the sync engine; implementations
/// are expected to fail fast or apply their own timeouts.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn fetch_lists(&self) -> GatewayResult<Vec<List>>;

    async fn fetch_cards(&self) -> GatewayResult<Vec<Card>>;

    async fn create_list(&self, list: &List) -> GatewayResult<List>;

    async fn update_list(&self, id: &EntityId, updates: &ListUpdate) -> GatewayResult<List>;

    /// Deletes a list together with its cards
    async fn delete_list(&self, id: &EntityId) -> GatewayResult<()>;

    async fn create_card(&self, card: &Card) -> GatewayResult<Card>;

    async fn update_card(&self, id: &EntityId, updates: &CardUpdate) -> GatewayResult<Card>;

    async fn delete_card(&self, id: &EntityId) -> GatewayResult<()>;

    async fn move_card(
        &self,
        card_id: &EntityId,
        new_list_id: &EntityId,
        new_index: usize,
    ) -> GatewayResult<()>;
}
