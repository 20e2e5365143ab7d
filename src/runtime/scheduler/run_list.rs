//! Run list: the ordered lanes a runner iterates each tick.
//!
//! A lane holds the registry handle of its current occupant. Delegation to an
//! inline child swaps the handle in place, so the lane keeps its position.
//! Finished lanes are vacated during the tick and compacted once at the end,
//! which keeps the relative order of the surviving lanes intact.

use super::registry::SlotHandle;

#[derive(Debug, Default)]
pub struct RunList {
    lanes: Vec<Option<SlotHandle>>,
    vacant: usize,
}

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lane.
    #[inline]
    pub fn push(
        &mut self,
        handle: SlotHandle,
    ) {
        self.lanes.push(Some(handle));
    }

    /// Number of lane positions, including lanes vacated this tick.
    #[inline]
    pub fn positions(&self) -> usize {
        self.lanes.len()
    }

    /// Number of occupied lanes.
    #[inline]
    pub fn len(&self) -> usize {
        self.lanes.len() - self.vacant
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<SlotHandle> {
        self.lanes.get(index).copied().flatten()
    }

    /// Replace the occupant of an occupied lane.
    #[inline]
    pub fn set(
        &mut self,
        index: usize,
        handle: SlotHandle,
    ) {
        debug_assert!(self.lanes[index].is_some(), "set on a vacant lane");
        self.lanes[index] = Some(handle);
    }

    /// Mark a lane as finished. Its position is reclaimed by [`compact`](Self::compact).
    #[inline]
    pub fn vacate(
        &mut self,
        index: usize,
    ) {
        if self.lanes[index].take().is_some() {
            self.vacant += 1;
        }
    }

    /// Drop vacated positions, keeping the order of the rest.
    ///
    /// `cursor` is a position in the uncompacted list; the returned value is
    /// the matching position after compaction.
    pub fn compact(
        &mut self,
        cursor: usize,
    ) -> usize {
        if self.vacant == 0 {
            return cursor;
        }

        let removed_before = self.lanes[..cursor.min(self.lanes.len())]
            .iter()
            .filter(|lane| lane.is_none())
            .count();
        self.lanes.retain(Option::is_some);
        self.vacant = 0;
        cursor - removed_before
    }

    pub fn clear(&mut self) {
        self.lanes.clear();
        self.vacant = 0;
    }

    /// Occupied lanes in order.
    pub fn iter(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        self.lanes.iter().filter_map(|lane| *lane)
    }
}
