//! Spawned-task registry.
//!
//! A tombstone slot store: `add` hands out a stable integer handle, `remove_at`
//! tombstones the slot and threads it onto an intrusive free-list. The most
//! recently freed slot is reused first, so alloc and free are both O(1) and
//! no live slot ever moves. Memory is bounded by the peak number of live
//! entries, not by how many have ever been added.

use std::fmt;

/// Stable handle to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle(usize);

impl SlotHandle {
    /// Get the inner value.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    /// Tombstone; `next_free` links to the next vacant slot.
    Vacant { next_free: Option<usize> },
}

const INITIAL_CAPACITY: usize = 16;
const GROWTH_FACTOR: usize = 2;

/// Tombstone-indexed slot store.
#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    len: usize,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Store `value`, returning its handle.
    pub fn add(
        &mut self,
        value: T,
    ) -> SlotHandle {
        self.len += 1;

        if let Some(head) = self.free_head {
            let slot = &mut self.slots[head];
            self.free_head = match slot {
                Slot::Vacant { next_free } => *next_free,
                Slot::Occupied(_) => unreachable!("free-list points at an occupied slot"),
            };
            *slot = Slot::Occupied(value);
            return SlotHandle(head);
        }

        if self.slots.len() == self.slots.capacity() {
            let extra = (self.slots.capacity() * (GROWTH_FACTOR - 1)).max(INITIAL_CAPACITY);
            self.slots.reserve_exact(extra);
        }

        let index = self.slots.len();
        self.slots.push(Slot::Occupied(value));
        SlotHandle(index)
    }

    /// Free the slot behind `handle`, returning its value.
    ///
    /// Returns `None` for a freed or never-allocated handle.
    pub fn remove_at(
        &mut self,
        handle: SlotHandle,
    ) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if let Slot::Vacant { .. } = slot {
            return None;
        }

        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(handle.0);
        self.len -= 1;

        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    pub fn get(
        &self,
        handle: SlotHandle,
    ) -> Option<&T> {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn get_mut(
        &mut self,
        handle: SlotHandle,
    ) -> Option<&mut T> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(
        &self,
        handle: SlotHandle,
    ) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots allocated so far, live or tombstoned.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Remove every live entry, handing each one to `f`.
    ///
    /// The backing store is kept; all handles become invalid.
    pub fn drain_with(
        &mut self,
        mut f: impl FnMut(SlotHandle, T),
    ) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Occupied(_) = slot {
                if let Slot::Occupied(value) = std::mem::replace(slot, Slot::Vacant { next_free: None }) {
                    f(SlotHandle(index), value);
                }
            }
        }
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }

    /// Drop every live entry. Same as [`drain_with`](Self::drain_with) with
    /// a no-op callback.
    pub fn clear(&mut self) {
        self.drain_with(|_, _| {});
    }

    /// Iterate over live entries.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(value) => Some((SlotHandle(i), value)),
            Slot::Vacant { .. } => None,
        })
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn handle_for_test(index: usize) -> SlotHandle {
    SlotHandle(index)
}
