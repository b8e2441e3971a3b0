//! # Id Table
//!
//! Generation-checked mapping from a handle's instance index to the position
//! of the referenced element inside its storage.

use std::collections::VecDeque;

/// Largest instance index an id table hands out. `u32::MAX` is reserved for
/// the invalidated handle.
pub const MAX_INSTANCE_INDEX: u32 = u32::MAX - 1;

#[derive(Clone, Copy, Debug, Default)]
struct IdEntry {
    /// Current generation of the slot.
    generation: u8,
    /// Storage position while the slot is live.
    value: Option<u32>,
}

/// Slot array + free list + per-slot generation counter.
///
/// Removing an entry bumps its generation (wrapping at 256), so every handle
/// issued for the previous occupant stops resolving immediately. Freed
/// indices are reused in FIFO order, which keeps a just-freed index out of
/// circulation for as long as possible.
///
/// # Example
///
/// ```rust,ignore
/// let mut table = IdTable::new();
/// let (index, generation) = table.insert(7);
/// assert_eq!(table.get(index, generation), Some(7));
///
/// table.remove(index, generation);
/// assert_eq!(table.get(index, generation), None); // stale
/// ```
#[derive(Debug, Default)]
pub struct IdTable {
    /// All slots ever handed out.
    entries: Vec<IdEntry>,
    /// Indices available for reuse.
    free_list: VecDeque<u32>,
    /// Number of live entries.
    live_count: usize,
}

impl IdTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if no entry is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Number of slots ever handed out (live or free).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// Stores `value` in a free slot and returns `(index, generation)`.
    ///
    /// # Panics
    ///
    /// Exhausting the 32-bit index space is fatal.
    pub fn insert(&mut self, value: u32) -> (u32, u8) {
        let index = if let Some(index) = self.free_list.pop_front() {
            index
        } else {
            let next = self.entries.len();
            if next > MAX_INSTANCE_INDEX as usize {
                tracing::error!(slots = next, "id table exhausted the 32-bit index space");
                panic!("id table exhausted: {next} slots in use");
            }
            self.entries.push(IdEntry::default());
            next as u32
        };

        let entry = &mut self.entries[index as usize];
        entry.value = Some(value);
        self.live_count += 1;
        (index, entry.generation)
    }

    /// Resolves `(index, generation)` to the stored value.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32, generation: u8) -> Option<u32> {
        let entry = self.entries.get(index as usize)?;
        if entry.generation != generation {
            return None;
        }
        entry.value
    }

    /// Overwrites the value of a live slot, e.g. after its element moved
    /// inside the storage.
    pub fn update(&mut self, index: u32, value: u32) {
        if let Some(entry) = self.entries.get_mut(index as usize) {
            if entry.value.is_some() {
                entry.value = Some(value);
            }
        }
    }

    /// Frees a live slot, bumping its generation.
    ///
    /// Returns the stored value, or `None` if the pair was stale.
    pub fn remove(&mut self, index: u32, generation: u8) -> Option<u32> {
        let entry = self.entries.get_mut(index as usize)?;
        if entry.generation != generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_list.push_back(index);
        self.live_count -= 1;
        Some(value)
    }

    /// Current generation of a slot, live or not.
    #[inline]
    #[must_use]
    pub fn generation_of(&self, index: u32) -> Option<u8> {
        self.entries.get(index as usize).map(|entry| entry.generation)
    }

    /// Iterates over live `(index, generation, value)` triples in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8, u32)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.value.map(|value| (index as u32, entry.generation, value)))
    }

    /// Frees every slot, bumping the generation of the live ones.
    pub fn clear(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.value.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free_list.push_back(index as u32);
            }
        }
        self.live_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table = IdTable::new();

        let (index, generation) = table.insert(42);
        assert_eq!(table.get(index, generation), Some(42));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(index, generation), Some(42));
        assert_eq!(table.get(index, generation), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut table = IdTable::new();

        let (i1, g1) = table.insert(1);
        table.remove(i1, g1);

        let (i2, g2) = table.insert(2);
        assert_eq!(i1, i2); // Same slot reused
        assert_ne!(g1, g2);
        assert_eq!(table.get(i1, g1), None);
        assert_eq!(table.get(i2, g2), Some(2));
    }

    #[test]
    fn test_double_remove_is_noop() {
        let mut table = IdTable::new();
        let (index, generation) = table.insert(5);

        assert!(table.remove(index, generation).is_some());
        assert!(table.remove(index, generation).is_none());
        assert_eq!(table.generation_of(index), Some(generation.wrapping_add(1)));
    }

    #[test]
    fn test_generation_wraps() {
        let mut table = IdTable::new();
        let (index, _) = table.insert(0);
        let mut generation = table.generation_of(index).unwrap();

        for _ in 0..300 {
            table.remove(index, generation);
            let (i, g) = table.insert(0);
            assert_eq!(i, index);
            generation = g;
        }
        assert_eq!(generation, (300 % 256) as u8);
    }

    #[test]
    fn test_update_and_iter() {
        let mut table = IdTable::new();
        let (a, _) = table.insert(10);
        let (b, gb) = table.insert(11);
        table.update(a, 20);

        let live: Vec<_> = table.iter().map(|(i, _, v)| (i, v)).collect();
        assert_eq!(live, vec![(a, 20), (b, 11)]);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.get(b, gb), None);
    }
}
