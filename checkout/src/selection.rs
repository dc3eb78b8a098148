//! Client-side seat selection.
//!
//! Pure and synchronous: selecting never touches the network. The server's
//! hold response stays the source of truth for what the user actually gets.

use crate::types::{SeatId, SeatMap, SeatStatus};
use serde::{Deserialize, Serialize};

/// Result of a [`SelectionSet::select`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionChange {
    /// The seat was appended
    Added,
    /// The seat was already in the set
    AlreadySelected,
    /// The set is full; nothing changed
    AtCapacity,
    /// The seat is unknown or not available; nothing changed
    Unavailable,
}

/// Ordered set of chosen seats, bounded by a cap
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    ids: Vec<SeatId>,
    max: usize,
}

impl SelectionSet {
    /// Empty selection allowing at most `max` seats
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self {
            ids: Vec::new(),
            max,
        }
    }

    /// Adds `id` if it is available and there is room.
    ///
    /// Hitting the cap is a no-op rather than an error.
    pub fn select(&mut self, id: SeatId, seats: &SeatMap) -> SelectionChange {
        if self.contains(id) {
            return SelectionChange::AlreadySelected;
        }
        if seats.status(id) != Some(SeatStatus::Available) {
            return SelectionChange::Unavailable;
        }
        if self.ids.len() >= self.max {
            return SelectionChange::AtCapacity;
        }
        self.ids.push(id);
        SelectionChange::Added
    }

    /// Removes `id`. Returns false when it was not selected.
    pub fn deselect(&mut self, id: SeatId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|selected| *selected != id);
        self.ids.len() != before
    }

    /// Keeps only the ids for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(SeatId) -> bool) {
        self.ids.retain(|id| keep(*id));
    }

    /// Whether `id` is selected
    #[must_use]
    pub fn contains(&self, id: SeatId) -> bool {
        self.ids.contains(&id)
    }

    /// Selected ids in selection order
    #[must_use]
    pub fn ids(&self) -> &[SeatId] {
        &self.ids
    }

    /// Number of selected seats
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The cap
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Drops every selected id
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{seat, seat_map};
    use proptest::prelude::*;

    #[test]
    fn fifth_seat_is_a_no_op() {
        let mut seats = seat_map();
        let mut extra = seats.iter().cloned().collect::<Vec<_>>();
        extra.push(seat(105, SeatStatus::Available));
        seats = SeatMap::new(extra);

        let mut selection = SelectionSet::new(4);
        for id in 101..=104 {
            assert_eq!(selection.select(SeatId::new(id), &seats), SelectionChange::Added);
        }
        assert_eq!(
            selection.select(SeatId::new(105), &seats),
            SelectionChange::AtCapacity
        );
        assert_eq!(selection.len(), 4);
    }

    #[test]
    fn sold_seat_cannot_be_selected() {
        let seats = SeatMap::new([seat(101, SeatStatus::Sold)]);
        let mut selection = SelectionSet::new(4);
        assert_eq!(
            selection.select(SeatId::new(101), &seats),
            SelectionChange::Unavailable
        );
        assert!(selection.is_empty());
    }

    #[test]
    fn selected_seat_can_always_be_deselected() {
        let mut seats = seat_map();
        let mut selection = SelectionSet::new(4);
        selection.select(SeatId::new(101), &seats);
        seats.reconcile(&[SeatId::new(101)], SeatStatus::Held);

        assert_eq!(
            selection.select(SeatId::new(101), &seats),
            SelectionChange::AlreadySelected
        );
        assert!(selection.deselect(SeatId::new(101)));
        assert!(!selection.deselect(SeatId::new(101)));
    }

    proptest! {
        /// Any sequence of select/deselect keeps the set within the cap, and
        /// deselecting an absent id leaves the set unchanged.
        #[test]
        fn never_exceeds_cap(ops in prop::collection::vec((any::<bool>(), 95_u64..110), 0..80)) {
            let seats = SeatMap::new((95..110).map(|id| seat(id, SeatStatus::Available)));
            let mut selection = SelectionSet::new(4);
            for (is_select, raw) in ops {
                let id = SeatId::new(raw);
                if is_select {
                    selection.select(id, &seats);
                } else {
                    let before = selection.clone();
                    let removed = selection.deselect(id);
                    if !before.contains(id) {
                        prop_assert!(!removed);
                        prop_assert_eq!(&before, &selection);
                    }
                }
                prop_assert!(selection.len() <= 4);
            }
        }
    }
}
