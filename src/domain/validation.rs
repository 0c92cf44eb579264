use crate::error::{KanbanError, Result};

pub const MAX_LIST_TITLE_LEN: usize = 100;
pub const MAX_CARD_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_TAG_LEN: usize = 30;

fn require_title(field: &'static str, title: &str, max: usize) -> Result<()> {
    if title.trim().is_empty() {
        return Err(KanbanError::validation(field, "title is required"));
    }
    if title.chars().count() > max {
        return Err(KanbanError::validation(
            field,
            format!("title must be {max} characters or less"),
        ));
    }
    Ok(())
}

/// Validates a list title
pub fn validate_list(title: &str) -> Result<()> {
    require_title("list.title", title, MAX_LIST_TITLE_LEN)
}

/// Validates card content; `None` skips fields the caller is not setting
pub fn validate_card(title: Option<&str>, description: Option<&str>) -> Result<()> {
    if let Some(title) = title {
        require_title("card.title", title, MAX_CARD_TITLE_LEN)?;
    }
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(KanbanError::validation(
                "card.description",
                format!("description must be {MAX_DESCRIPTION_LEN} characters or less"),
            ));
        }
    }
    Ok(())
}

pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        return Err(KanbanError::validation("tag", "tag must be a non-empty string"));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(KanbanError::validation(
            "tag",
            format!("tag must be {MAX_TAG_LEN} characters or less"),
        ));
    }
    Ok(())
}
