use crate::domain::card::Card;
use crate::domain::entity::EntityId;
use crate::domain::list::List;
use chrono::{DateTime, Utc};

/// Returns the cards filed under `list_id`, sorted by their `order` field.
///
/// Ties keep board insertion order, so a list with stale duplicate orders
/// still renumbers deterministically.
///
/// # Examples
/// ```
/// use kanban_sync::domain::{card::Card, entity::EntityId, ordering::cards_in_list};
///
/// let list = EntityId::from("l1");
/// let cards = vec![
///     Card::new(list.clone(), "second", 1),
///     Card::new(list.clone(), "first", 0),
///     Card::new(EntityId::from("l2"), "elsewhere", 0),
/// ];
///
/// let titles: Vec<_> = cards_in_list(&cards, &list).iter().map(|c| c.title.as_str()).collect();
/// assert_eq!(titles, ["first", "second"]);
/// ```
pub fn cards_in_list<'a>(cards: &'a [Card], list_id: &EntityId) -> Vec<&'a Card> {
    let mut in_list: Vec<&Card> = cards.iter().filter(|c| &c.list_id == list_id).collect();
    in_list.sort_by_key(|c| c.order);
    in_list
}

/// Ids of the cards in `list_id`, in display order
pub fn card_ids_in_list(cards: &[Card], list_id: &EntityId) -> Vec<EntityId> {
    cards_in_list(cards, list_id)
        .into_iter()
        .map(|c| c.id.clone())
        .collect()
}

/// Lists sorted by `order`, optionally including archived ones
pub fn sorted_lists(lists: &[List], include_archived: bool) -> Vec<&List> {
    let mut sorted: Vec<&List> = lists
        .iter()
        .filter(|l| include_archived || !l.archived)
        .collect();
    sorted.sort_by_key(|l| l.order);
    sorted
}

/// Rewrites `order` so the given sequence reads `0..n-1`.
///
/// Every card in the sequence gets its timestamp refreshed; versions are
/// untouched since position alone is not a content edit.
pub(crate) fn renumber(cards: &mut [Card], sequence: &[EntityId], now: DateTime<Utc>) {
    for (index, id) in sequence.iter().enumerate() {
        if let Some(card) = cards.iter_mut().find(|c| &c.id == id) {
            card.order = index as u32;
            card.last_modified_at = now;
        }
    }
}

/// Checks that the orders within `list_id` form a dense `0..n-1` permutation
pub fn is_dense(cards: &[Card], list_id: &EntityId) -> bool {
    cards_in_list(cards, list_id)
        .iter()
        .enumerate()
        .all(|(i, c)| c.order as usize == i)
}
