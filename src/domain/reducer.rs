//! Pure board state transitions.
//!
//! [`reduce`] never fails: actions naming an unknown list or card leave the
//! state untouched and record no undo step.

use crate::domain::action::{Action, ConflictChoice, PendingAction};
use crate::domain::board::{BoardSnapshot, BoardState, Conflict, Entity};
use crate::domain::card::{Card, CardDraft, CardUpdate};
use crate::domain::entity::EntityId;
use crate::domain::list::{List, ListUpdate};
use crate::domain::ordering::{self, renumber};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Applies `action` to a copy of `state`, stamping mutations with the current time
pub fn reduce(state: &BoardState, action: Action) -> BoardState {
    reduce_at(state, action, Utc::now())
}

/// Same as [`reduce`] with an explicit clock reading
pub fn reduce_at(state: &BoardState, action: Action, now: DateTime<Utc>) -> BoardState {
    let mut next = state.clone();
    apply(&mut next, action, now);
    next
}

/// Applies `action` in place. Returns false when the action was a no-op.
pub fn apply(state: &mut BoardState, action: Action, now: DateTime<Utc>) -> bool {
    let undoable = action.is_undoable();
    let before = undoable.then(|| state.snapshot());

    let changed = match action {
        Action::SetInitialState { lists, cards } => {
            state.lists = lists;
            state.cards = cards;
            refresh_current_snapshot(state);
            true
        }
        Action::AddList { title, id } => add_list(state, title, id, now),
        Action::UpdateList { list_id, updates } => update_list(state, &list_id, &updates, now),
        Action::DeleteList { list_id } => delete_list(state, &list_id),
        Action::ArchiveList { list_id } => set_archived(state, &list_id, true, now),
        Action::UnarchiveList { list_id } => set_archived(state, &list_id, false, now),
        Action::AddCard { list_id, draft } => add_card(state, list_id, draft, now),
        Action::UpdateCard { card_id, updates } => update_card(state, &card_id, &updates, now),
        Action::DeleteCard { card_id } => delete_card(state, &card_id),
        Action::MoveCard {
            card_id,
            new_list_id,
            new_index,
        } => move_card(state, &card_id, &new_list_id, new_index, now),
        Action::ReorderCards { list_id, card_ids } => {
            reorder_cards(state, &list_id, &card_ids, now)
        }
        Action::Undo => undo(state),
        Action::Redo => redo(state),
        Action::ClearAll => {
            state.lists.clear();
            state.cards.clear();
            state.sync_queue.clear();
            state.conflicts.clear();
            true
        }
        Action::SyncSuccess => {
            state.last_sync_time = Some(now);
            state.sync_queue.clear();
            true
        }
        Action::SyncFailure { queue } => set_queue(state, queue),
        Action::RecordConflicts { conflicts } => record_conflicts(state, conflicts),
        Action::ResolveConflict { entity_id, choice } => {
            resolve_conflict(state, &entity_id, choice, now)
        }
    };

    if changed {
        if let Some(before) = before {
            push_history(state, before);
        }
    }
    changed
}

/// Records an undo step: truncates any redo tail, seeds an empty history
/// with the pre-image, then appends the post-image as the current snapshot.
fn push_history(state: &mut BoardState, before: BoardSnapshot) {
    let keep = state.history_index.map_or(0, |i| i + 1);
    state.history.truncate(keep);
    if state.history.is_empty() {
        state.history.push(Arc::new(before));
    }
    let current = Arc::new(state.snapshot());
    state.history.push(current);

    if let Some(limit) = state.history_limit {
        let max_len = limit + 1;
        if state.history.len() > max_len {
            let excess = state.history.len() - max_len;
            state.history.drain(..excess);
        }
    }
    state.history_index = Some(state.history.len() - 1);
}

/// Keeps `history[history_index]` equal to the applied lists/cards after a
/// replacement that is not itself an undo step.
fn refresh_current_snapshot(state: &mut BoardState) {
    if let Some(index) = state.history_index {
        if let Some(slot) = state.history.get_mut(index) {
            *slot = Arc::new(BoardSnapshot {
                lists: state.lists.clone(),
                cards: state.cards.clone(),
            });
        }
    }
}

fn restore(state: &mut BoardState, index: usize) {
    let snapshot = Arc::clone(&state.history[index]);
    state.lists = snapshot.lists.clone();
    state.cards = snapshot.cards.clone();
    state.history_index = Some(index);
}

fn undo(state: &mut BoardState) -> bool {
    match state.history_index {
        Some(index) if index > 0 => {
            restore(state, index - 1);
            true
        }
        _ => false,
    }
}

fn redo(state: &mut BoardState) -> bool {
    match state.history_index {
        Some(index) if index + 1 < state.history.len() => {
            restore(state, index + 1);
            true
        }
        _ => false,
    }
}

fn add_list(
    state: &mut BoardState,
    title: String,
    id: Option<EntityId>,
    now: DateTime<Utc>,
) -> bool {
    let id = id.unwrap_or_else(EntityId::generate);
    if state.list(&id).is_some() {
        return false;
    }
    let order = state.lists.len() as u32;
    state.lists.push(List::with_id(id, title, order, now));
    true
}

fn update_list(
    state: &mut BoardState,
    id: &EntityId,
    updates: &ListUpdate,
    now: DateTime<Utc>,
) -> bool {
    match state.lists.iter_mut().find(|l| &l.id == id) {
        Some(list) => {
            list.apply_update(updates, now);
            true
        }
        None => false,
    }
}

fn delete_list(state: &mut BoardState, id: &EntityId) -> bool {
    let before = state.lists.len();
    state.lists.retain(|l| &l.id != id);
    if state.lists.len() == before {
        return false;
    }
    state.cards.retain(|c| &c.list_id != id);
    true
}

fn set_archived(state: &mut BoardState, id: &EntityId, archived: bool, now: DateTime<Utc>) -> bool {
    match state.lists.iter_mut().find(|l| &l.id == id) {
        Some(list) => {
            list.set_archived(archived, now);
            true
        }
        None => false,
    }
}

fn add_card(
    state: &mut BoardState,
    list_id: EntityId,
    mut draft: CardDraft,
    now: DateTime<Utc>,
) -> bool {
    if state.list(&list_id).is_none() {
        return false;
    }
    let id = draft.id.take().unwrap_or_else(EntityId::generate);
    if state.card(&id).is_some() {
        return false;
    }
    let order = state.cards.iter().filter(|c| c.list_id == list_id).count() as u32;
    state.cards.push(Card::from_draft(id, list_id, draft, order, now));
    true
}

fn update_card(
    state: &mut BoardState,
    id: &EntityId,
    updates: &CardUpdate,
    now: DateTime<Utc>,
) -> bool {
    match state.cards.iter_mut().find(|c| &c.id == id) {
        Some(card) => {
            card.apply_update(updates, now);
            true
        }
        None => false,
    }
}

fn delete_card(state: &mut BoardState, id: &EntityId) -> bool {
    let before = state.cards.len();
    state.cards.retain(|c| &c.id != id);
    state.cards.len() != before
}

fn move_card(
    state: &mut BoardState,
    card_id: &EntityId,
    new_list_id: &EntityId,
    new_index: usize,
    now: DateTime<Utc>,
) -> bool {
    let Some(source_list) = state.card(card_id).map(|c| c.list_id.clone()) else {
        return false;
    };
    if state.list(new_list_id).is_none() {
        return false;
    }

    let mut source: Vec<EntityId> = ordering::card_ids_in_list(&state.cards, &source_list);
    source.retain(|id| id != card_id);
    let mut target: Vec<EntityId> = ordering::card_ids_in_list(&state.cards, new_list_id);
    target.retain(|id| id != card_id);
    let index = new_index.min(target.len());
    target.insert(index, card_id.clone());

    if let Some(card) = state.cards.iter_mut().find(|c| &c.id == card_id) {
        card.list_id = new_list_id.clone();
        card.version += 1;
    }
    if &source_list != new_list_id {
        renumber(&mut state.cards, &source, now);
    }
    renumber(&mut state.cards, &target, now);
    true
}

fn reorder_cards(
    state: &mut BoardState,
    list_id: &EntityId,
    card_ids: &[EntityId],
    now: DateTime<Utc>,
) -> bool {
    let mut changed = false;
    for card in state.cards.iter_mut().filter(|c| &c.list_id == list_id) {
        if let Some(position) = card_ids.iter().position(|id| id == &card.id) {
            card.order = position as u32;
            card.last_modified_at = now;
            changed = true;
        }
    }
    changed
}

fn set_queue(state: &mut BoardState, queue: Option<Vec<PendingAction>>) -> bool {
    match queue {
        Some(queue) => {
            state.sync_queue = queue;
            true
        }
        None => false,
    }
}

fn record_conflicts(state: &mut BoardState, conflicts: Vec<Conflict>) -> bool {
    if conflicts.is_empty() {
        return false;
    }
    for conflict in conflicts {
        state.conflicts.retain(|c| c.entity_id() != conflict.entity_id());
        state.conflicts.push(conflict);
    }
    true
}

fn resolve_conflict(
    state: &mut BoardState,
    id: &EntityId,
    choice: ConflictChoice,
    now: DateTime<Utc>,
) -> bool {
    let Some(position) = state.conflicts.iter().position(|c| c.entity_id() == id) else {
        return false;
    };
    let conflict = state.conflicts.remove(position);
    let version = conflict.local.version().max(conflict.server.version()) + 1;
    let chosen = match choice {
        ConflictChoice::Local => conflict.local,
        ConflictChoice::Server => conflict.server,
    };

    match chosen {
        Entity::List(mut list) => {
            list.version = version;
            list.last_modified_at = now;
            match state.lists.iter_mut().find(|l| l.id == list.id) {
                Some(slot) => *slot = list,
                None => state.lists.push(list),
            }
        }
        Entity::Card(mut card) => {
            if state.list(&card.list_id).is_none() {
                refresh_current_snapshot(state);
                return true;
            }
            card.version = version;
            card.last_modified_at = now;
            match state.cards.iter_mut().find(|c| c.id == card.id) {
                Some(slot) => *slot = card,
                None => state.cards.push(card),
            }
        }
    }
    refresh_current_snapshot(state);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::EntityKind;
    use crate::domain::entity::TagSet;
    use crate::domain::ordering::is_dense;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn board_with_list(id: &str) -> BoardState {
        let mut state = BoardState::new();
        apply(
            &mut state,
            Action::SetInitialState {
                lists: vec![List::with_id(EntityId::from(id), "List", 0, ts(0))],
                cards: vec![],
            },
            ts(0),
        );
        state
    }

    fn add_card_to(state: &mut BoardState, list: &str, id: &str) {
        let draft = CardDraft {
            id: Some(EntityId::from(id)),
            title: Some(id.to_string()),
            ..CardDraft::default()
        };
        assert!(apply(
            state,
            Action::AddCard {
                list_id: EntityId::from(list),
                draft,
            },
            ts(1),
        ));
    }

    fn order_of(state: &BoardState, id: &str) -> u32 {
        state.card(&EntityId::from(id)).unwrap().order
    }

    #[test]
    fn test_set_initial_state_skips_history() {
        let state = board_with_list("l1");
        assert_eq!(state.lists.len(), 1);
        assert!(state.history.is_empty());
        assert_eq!(state.history_index, None);
    }

    #[test]
    fn test_add_list_appends_with_next_order() {
        let state = reduce_at(
            &board_with_list("l1"),
            Action::AddList {
                title: "Second".to_string(),
                id: None,
            },
            ts(5),
        );
        let added = &state.lists[1];
        assert_eq!(added.title, "Second");
        assert_eq!(added.order, 1);
        assert_eq!(added.version, 1);
        assert!(!added.archived);
        assert_eq!(added.last_modified_at, ts(5));
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history_index, Some(1));
    }

    #[test]
    fn test_update_list_bumps_version() {
        let state = reduce_at(
            &board_with_list("l1"),
            Action::UpdateList {
                list_id: EntityId::from("l1"),
                updates: ListUpdate::title("Renamed"),
            },
            ts(3),
        );
        let list = state.list(&EntityId::from("l1")).unwrap();
        assert_eq!(list.title, "Renamed");
        assert_eq!(list.version, 2);
        assert_eq!(list.last_modified_at, ts(3));
    }

    #[test]
    fn test_unknown_ids_are_noops_without_history() {
        let mut state = board_with_list("l1");
        let missing = EntityId::from("missing");
        for action in [
            Action::UpdateList {
                list_id: missing.clone(),
                updates: ListUpdate::title("x"),
            },
            Action::UpdateCard {
                card_id: missing.clone(),
                updates: CardUpdate::title("x"),
            },
            Action::DeleteList {
                list_id: missing.clone(),
            },
            Action::DeleteCard {
                card_id: missing.clone(),
            },
            Action::ArchiveList {
                list_id: missing.clone(),
            },
            Action::AddCard {
                list_id: missing.clone(),
                draft: CardDraft::default(),
            },
        ] {
            assert!(!apply(&mut state, action, ts(1)));
        }
        assert!(state.history.is_empty());
        assert!(state.cards.is_empty());
    }

    #[test]
    fn test_delete_list_cascades_only_its_cards() {
        let mut state = board_with_list("l1");
        apply(
            &mut state,
            Action::AddList {
                title: "Other".to_string(),
                id: Some(EntityId::from("l2")),
            },
            ts(1),
        );
        add_card_to(&mut state, "l1", "a");
        add_card_to(&mut state, "l1", "b");
        add_card_to(&mut state, "l2", "c");

        apply(
            &mut state,
            Action::DeleteList {
                list_id: EntityId::from("l1"),
            },
            ts(2),
        );

        assert_eq!(state.lists.len(), 1);
        let remaining: Vec<_> = state.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(remaining, ["c"]);
    }

    #[test]
    fn test_archive_toggles_without_version_bump() {
        let mut state = board_with_list("l1");
        let id = EntityId::from("l1");

        apply(&mut state, Action::ArchiveList { list_id: id.clone() }, ts(9));
        let list = state.list(&id).unwrap();
        assert!(list.archived);
        assert_eq!(list.version, 1);
        assert_eq!(list.last_modified_at, ts(9));

        apply(&mut state, Action::UnarchiveList { list_id: id.clone() }, ts(10));
        assert!(!state.list(&id).unwrap().archived);
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn test_add_card_defaults_and_order() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        apply(
            &mut state,
            Action::AddCard {
                list_id: EntityId::from("l1"),
                draft: CardDraft::default(),
            },
            ts(2),
        );

        let added = &state.cards[1];
        assert_eq!(added.title, "New Card");
        assert_eq!(added.description, "");
        assert!(added.tags.is_empty());
        assert_eq!(added.order, 1);
        assert_eq!(added.version, 1);
    }

    #[test]
    fn test_update_card_merges_fields() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        let tags: TagSet = vec!["x".to_string(), "y".to_string()].into();

        apply(
            &mut state,
            Action::UpdateCard {
                card_id: EntityId::from("a"),
                updates: CardUpdate::tags(tags.clone()),
            },
            ts(4),
        );

        let card = state.card(&EntityId::from("a")).unwrap();
        assert_eq!(card.title, "a");
        assert_eq!(card.tags, tags);
        assert_eq!(card.version, 2);
    }

    #[test]
    fn test_move_card_between_lists_renumbers_both() {
        let mut state = board_with_list("l1");
        apply(
            &mut state,
            Action::AddList {
                title: "Two".to_string(),
                id: Some(EntityId::from("l2")),
            },
            ts(1),
        );
        for id in ["a", "b", "c"] {
            add_card_to(&mut state, "l1", id);
        }
        for id in ["x", "y"] {
            add_card_to(&mut state, "l2", id);
        }

        apply(
            &mut state,
            Action::MoveCard {
                card_id: EntityId::from("b"),
                new_list_id: EntityId::from("l2"),
                new_index: 1,
            },
            ts(20),
        );

        let moved = state.card(&EntityId::from("b")).unwrap();
        assert_eq!(moved.list_id.as_str(), "l2");
        assert_eq!(moved.version, 2);
        assert_eq!(moved.order, 1);
        assert_eq!(order_of(&state, "x"), 0);
        assert_eq!(order_of(&state, "y"), 2);
        assert_eq!(order_of(&state, "a"), 0);
        assert_eq!(order_of(&state, "c"), 1);

        let renumbered = state.card(&EntityId::from("c")).unwrap();
        assert_eq!(renumbered.version, 1);
        assert_eq!(renumbered.last_modified_at, ts(20));

        assert!(is_dense(&state.cards, &EntityId::from("l1")));
        assert!(is_dense(&state.cards, &EntityId::from("l2")));
    }

    #[test]
    fn test_move_card_clamps_index() {
        let mut state = board_with_list("l1");
        for id in ["a", "b"] {
            add_card_to(&mut state, "l1", id);
        }

        apply(
            &mut state,
            Action::MoveCard {
                card_id: EntityId::from("a"),
                new_list_id: EntityId::from("l1"),
                new_index: 99,
            },
            ts(5),
        );

        assert_eq!(order_of(&state, "b"), 0);
        assert_eq!(order_of(&state, "a"), 1);
        assert!(is_dense(&state.cards, &EntityId::from("l1")));
    }

    #[test]
    fn test_move_card_to_missing_list_is_noop() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        let changed = apply(
            &mut state,
            Action::MoveCard {
                card_id: EntityId::from("a"),
                new_list_id: EntityId::from("nope"),
                new_index: 0,
            },
            ts(5),
        );
        assert!(!changed);
        assert_eq!(state.card(&EntityId::from("a")).unwrap().list_id.as_str(), "l1");
    }

    #[test]
    fn test_reorder_cards() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "c1");
        add_card_to(&mut state, "l1", "c2");

        apply(
            &mut state,
            Action::ReorderCards {
                list_id: EntityId::from("l1"),
                card_ids: vec![EntityId::from("c2"), EntityId::from("c1")],
            },
            ts(6),
        );

        assert_eq!(order_of(&state, "c2"), 0);
        assert_eq!(order_of(&state, "c1"), 1);
        assert_eq!(state.card(&EntityId::from("c1")).unwrap().version, 1);
    }

    #[test]
    fn test_reorder_leaves_unlisted_cards_alone() {
        let mut state = board_with_list("l1");
        for id in ["a", "b", "c"] {
            add_card_to(&mut state, "l1", id);
        }
        apply(
            &mut state,
            Action::ReorderCards {
                list_id: EntityId::from("l1"),
                card_ids: vec![EntityId::from("b")],
            },
            ts(6),
        );
        assert_eq!(order_of(&state, "b"), 0);
        assert_eq!(order_of(&state, "a"), 0);
        assert_eq!(order_of(&state, "c"), 2);
    }

    #[test]
    fn test_undo_after_first_edit_returns_to_initial_state() {
        let start = board_with_list("l1");
        let edited = reduce_at(
            &start,
            Action::AddList {
                title: "New".to_string(),
                id: None,
            },
            ts(1),
        );
        let undone = reduce_at(&edited, Action::Undo, ts(2));
        assert_eq!(undone.lists, start.lists);
        assert!(!undone.can_undo());
        assert!(undone.can_redo());
    }

    #[test]
    fn test_undo_then_redo_round_trips() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        add_card_to(&mut state, "l1", "b");
        apply(
            &mut state,
            Action::UpdateCard {
                card_id: EntityId::from("a"),
                updates: CardUpdate::title("edited"),
            },
            ts(3),
        );
        apply(
            &mut state,
            Action::DeleteCard {
                card_id: EntityId::from("b"),
            },
            ts(4),
        );

        for _ in 0..4 {
            let before = state.snapshot();
            let index = state.history_index;
            apply(&mut state, Action::Undo, ts(5));
            apply(&mut state, Action::Redo, ts(6));
            assert_eq!(state.snapshot(), before);
            assert_eq!(state.history_index, index);
            apply(&mut state, Action::Undo, ts(7));
        }
        assert!(!state.can_undo());
        assert!(state.cards.is_empty());
    }

    #[test]
    fn test_undo_redo_bounds_are_noops() {
        let mut state = BoardState::new();
        assert!(!apply(&mut state, Action::Undo, ts(0)));
        assert!(!apply(&mut state, Action::Redo, ts(0)));

        apply(
            &mut state,
            Action::AddList {
                title: "One".to_string(),
                id: None,
            },
            ts(1),
        );
        assert!(!apply(&mut state, Action::Redo, ts(2)));
        assert!(apply(&mut state, Action::Undo, ts(2)));
        assert!(!apply(&mut state, Action::Undo, ts(3)));
    }

    #[test]
    fn test_new_edit_after_undo_truncates_redo_tail() {
        let mut state = BoardState::new();
        for title in ["one", "two", "three"] {
            apply(
                &mut state,
                Action::AddList {
                    title: title.to_string(),
                    id: None,
                },
                ts(1),
            );
        }
        apply(&mut state, Action::Undo, ts(2));
        apply(&mut state, Action::Undo, ts(2));
        assert_eq!(state.history.len(), 4);

        apply(
            &mut state,
            Action::AddList {
                title: "branch".to_string(),
                id: None,
            },
            ts(3),
        );

        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history_index, Some(2));
        assert!(!state.can_redo());
        let titles: Vec<_> = state.lists.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["one", "branch"]);
    }

    #[test]
    fn test_history_limit_caps_undo_steps() {
        let mut state = BoardState::new().with_history_limit(2);
        for title in ["a", "b", "c", "d"] {
            apply(
                &mut state,
                Action::AddList {
                    title: title.to_string(),
                    id: None,
                },
                ts(1),
            );
        }
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history_index, Some(2));

        apply(&mut state, Action::Undo, ts(2));
        apply(&mut state, Action::Undo, ts(2));
        assert!(!state.can_undo());
        assert_eq!(state.lists.len(), 2);
    }

    #[test]
    fn test_set_initial_state_rewrites_current_snapshot() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        let mut merged = state.cards.clone();
        merged[0].title = "from server".to_string();

        let lists = state.lists.clone();

        apply(
            &mut state,
            Action::SetInitialState {
                lists,
                cards: merged,
            },
            ts(2),
        );
        apply(&mut state, Action::Undo, ts(3));
        apply(&mut state, Action::Redo, ts(4));

        assert_eq!(state.cards[0].title, "from server");
    }

    #[test]
    fn test_clear_all_empties_everything_and_is_undoable() {
        let mut state = board_with_list("l1");
        add_card_to(&mut state, "l1", "a");
        state.sync_queue.push(PendingAction {
            id: crate::domain::action::QueueId(1),
            op: crate::domain::action::PendingOp::DeleteCard {
                id: EntityId::from("z"),
            },
            timestamp: ts(0),
        });

        apply(&mut state, Action::ClearAll, ts(3));
        assert!(state.lists.is_empty());
        assert!(state.cards.is_empty());
        assert!(state.sync_queue.is_empty());
        assert!(state.conflicts.is_empty());

        apply(&mut state, Action::Undo, ts(4));
        assert_eq!(state.cards.len(), 1);
    }

    #[test]
    fn test_sync_success_and_failure() {
        let mut state = BoardState::new();
        let queued = PendingAction {
            id: crate::domain::action::QueueId(3),
            op: crate::domain::action::PendingOp::DeleteList {
                id: EntityId::from("l1"),
            },
            timestamp: ts(0),
        };

        apply(
            &mut state,
            Action::SyncFailure {
                queue: Some(vec![queued.clone()]),
            },
            ts(1),
        );
        assert_eq!(state.sync_queue, vec![queued]);
        assert!(!apply(&mut state, Action::SyncFailure { queue: None }, ts(1)));
        assert_eq!(state.sync_queue.len(), 1);

        apply(&mut state, Action::SyncSuccess, ts(2));
        assert!(state.sync_queue.is_empty());
        assert_eq!(state.last_sync_time, Some(ts(2)));
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_resolve_conflict_keeps_chosen_side() {
        let mut state = board_with_list("l1");
        let local = state.lists[0].clone();
        let mut server = local.clone();
        server.title = "Server title".to_string();
        server.version = 4;

        apply(
            &mut state,
            Action::RecordConflicts {
                conflicts: vec![Conflict {
                    kind: EntityKind::List,
                    name: local.title.clone(),
                    local: Entity::List(local.clone()),
                    server: Entity::List(server),
                    fields: vec!["title".to_string()],
                }],
            },
            ts(1),
        );
        assert!(state.conflict_for(&local.id).is_some());

        apply(
            &mut state,
            Action::ResolveConflict {
                entity_id: local.id.clone(),
                choice: ConflictChoice::Server,
            },
            ts(2),
        );

        let list = state.list(&local.id).unwrap();
        assert_eq!(list.title, "Server title");
        assert_eq!(list.version, 5);
        assert!(state.conflicts.is_empty());
        assert!(state.history.is_empty());
    }
}
