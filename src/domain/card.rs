use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, TagSet};
use super::list::initial_version;

pub const DEFAULT_CARD_TITLE: &str = "New Card";

/// A card, owned by the board and filed under one list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: EntityId,
    pub list_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub order: u32,
    #[serde(default = "initial_version")]
    pub version: u64,
    #[serde(default)]
    pub last_modified_at: DateTime<Utc>,
}

impl Card {
    pub fn new(list_id: EntityId, title: impl Into<String>, order: u32) -> Self {
        Self::from_draft(EntityId::generate(), list_id, CardDraft::titled(title), order, Utc::now())
    }

    /// Builds a version-1 card from a draft, filling in the defaults
    pub fn from_draft(
        id: EntityId,
        list_id: EntityId,
        draft: CardDraft,
        order: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            list_id,
            title: draft.title.unwrap_or_else(|| DEFAULT_CARD_TITLE.to_string()),
            description: draft.description.unwrap_or_default(),
            tags: draft.tags.unwrap_or_default(),
            order,
            version: initial_version(),
            last_modified_at: now,
        }
    }

    /// Shallow-merges the update and records a content edit
    pub fn apply_update(&mut self, update: &CardUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(order) = update.order {
            self.order = order;
        }
        self.version += 1;
        self.last_modified_at = now;
    }
}

/// Caller-supplied fields for a new card; anything missing gets a default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSet>,
}

impl CardDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Partial update of a card's content fields and position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSet>,
    /// Position within the card's current list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl CardUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn tags(tags: TagSet) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    pub fn order(order: u32) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}
