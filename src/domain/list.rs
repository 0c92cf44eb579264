use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityId;

pub(crate) fn initial_version() -> u64 {
    1
}

/// A column on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default = "initial_version")]
    pub version: u64,
    #[serde(default)]
    pub last_modified_at: DateTime<Utc>,
}

impl List {
    /// Creates a new unarchived list at version 1
    pub fn new(title: impl Into<String>, order: u32) -> Self {
        Self::with_id(EntityId::generate(), title, order, Utc::now())
    }

    pub fn with_id(id: EntityId, title: impl Into<String>, order: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            order,
            archived: false,
            version: initial_version(),
            last_modified_at: now,
        }
    }

    /// Shallow-merges the update and records a content edit
    pub fn apply_update(&mut self, update: &ListUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(order) = update.order {
            self.order = order;
        }
        if let Some(archived) = update.archived {
            self.archived = archived;
        }
        self.version += 1;
        self.last_modified_at = now;
    }

    /// Toggles the archived flag without counting it as a content edit
    pub fn set_archived(&mut self, archived: bool, now: DateTime<Utc>) {
        self.archived = archived;
        self.last_modified_at = now;
    }
}

/// Partial update of a list's editable fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl ListUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.order.is_none() && self.archived.is_none()
    }
}
