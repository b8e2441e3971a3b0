//! # Block Storage
//!
//! Dense, paged element storage built on [`BlockAllocator`].
//!
//! The storage uses a compact strategy:
//! - Elements occupy positions `0..len` with no holes
//! - Removal moves the last element into the freed position
//! - Growth appends a new block; existing blocks never move
//! - Trailing blocks that become empty go back to the allocator

use super::block_allocator::{Block, BlockAllocator};
use super::id_table::MAX_INSTANCE_INDEX;

/// Result of [`BlockStorage::swap_remove`].
#[derive(Debug)]
pub struct SwapRemoved<T> {
    /// The removed element.
    pub value: T,
    /// Previous position of the element that now fills the hole, if any.
    pub moved_from: Option<u32>,
}

/// Paged storage for a single element type.
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: BlockStorage<u64> = BlockStorage::new(4096);
/// let index = storage.push(7);
/// assert_eq!(storage.get(index), Some(&7));
/// ```
pub struct BlockStorage<T> {
    /// Source of blocks.
    allocator: BlockAllocator<Option<T>>,
    /// Blocks in position order.
    blocks: Vec<Block<Option<T>>>,
    /// Number of stored elements.
    len: usize,
}

impl<T> BlockStorage<T> {
    /// Creates empty storage using blocks of `block_size_bytes`.
    #[must_use]
    pub fn new(block_size_bytes: usize) -> Self {
        Self {
            allocator: BlockAllocator::new(block_size_bytes),
            blocks: Vec::new(),
            len: 0,
        }
    }

    /// Number of stored elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks currently held.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Elements per block.
    #[inline]
    #[must_use]
    pub const fn elements_per_block(&self) -> usize {
        self.allocator.elements_per_block()
    }

    /// The allocator backing this storage.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &BlockAllocator<Option<T>> {
        &self.allocator
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        let per_block = self.elements_per_block();
        (index / per_block, index % per_block)
    }

    /// Appends an element and returns its position.
    ///
    /// # Panics
    ///
    /// Exceeding the 32-bit position space is fatal.
    pub fn push(&mut self, value: T) -> u32 {
        if self.len > MAX_INSTANCE_INDEX as usize {
            tracing::error!(len = self.len, "block storage exhausted the 32-bit index space");
            panic!("block storage exhausted: {} elements", self.len);
        }

        if self.len == self.blocks.len() * self.elements_per_block() {
            let block = self.allocator.allocate_block();
            self.blocks.push(block);
        }

        let index = self.len;
        let (block, offset) = self.locate(index);
        self.blocks[block].as_mut_slice()[offset] = Some(value);
        self.len += 1;
        index as u32
    }

    /// Gets an element by position.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        let index = index as usize;
        if index >= self.len {
            return None;
        }
        let (block, offset) = self.locate(index);
        self.blocks[block].as_slice()[offset].as_ref()
    }

    /// Gets an element by position, mutably.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let index = index as usize;
        if index >= self.len {
            return None;
        }
        let (block, offset) = self.locate(index);
        self.blocks[block].as_mut_slice()[offset].as_mut()
    }

    fn slot_mut(&mut self, index: usize) -> &mut Option<T> {
        let (block, offset) = self.locate(index);
        &mut self.blocks[block].as_mut_slice()[offset]
    }

    /// Removes the element at `index`, moving the last element into its place.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn swap_remove(&mut self, index: u32) -> Option<SwapRemoved<T>> {
        let index = index as usize;
        if index >= self.len {
            return None;
        }

        let last = self.len - 1;
        let last_value = self.slot_mut(last).take();
        let removed = if index == last {
            SwapRemoved {
                value: last_value?,
                moved_from: None,
            }
        } else {
            let value = std::mem::replace(self.slot_mut(index), last_value)?;
            SwapRemoved {
                value,
                moved_from: Some(last as u32),
            }
        };

        self.len -= 1;
        self.release_empty_blocks();
        Some(removed)
    }

    fn release_empty_blocks(&mut self) {
        let needed = self.len.div_ceil(self.elements_per_block());
        while self.blocks.len() > needed {
            if let Some(block) = self.blocks.pop() {
                self.allocator.deallocate_block(block);
            }
        }
    }

    /// Iterates over all elements in position order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.blocks
            .iter()
            .flat_map(|block| block.as_slice().iter())
            .take(self.len)
            .filter_map(Option::as_ref)
    }

    /// Iterates mutably over all elements in position order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let len = self.len;
        self.blocks
            .iter_mut()
            .flat_map(|block| block.as_mut_slice().iter_mut())
            .take(len)
            .filter_map(Option::as_mut)
    }

    /// Splits the live positions into disjoint ranges of at most
    /// `granularity` elements (`0` = one range covering everything).
    ///
    /// Each range borrows its own part of the blocks, so ranges can be handed
    /// to different threads. A range may span a block boundary.
    pub fn partition_mut(&mut self, granularity: usize) -> Vec<StorageRange<'_, T>> {
        let chunk = if granularity == 0 { self.len.max(1) } else { granularity };
        let mut ranges = Vec::with_capacity(self.len.div_ceil(chunk));
        let mut current = StorageRange::empty(0);
        let mut remaining = self.len;

        for block in &mut self.blocks {
            if remaining == 0 {
                break;
            }
            let used = remaining.min(block.capacity());
            remaining -= used;

            let mut rest: &mut [Option<T>] = &mut block.as_mut_slice()[..used];
            while !rest.is_empty() {
                let take = (chunk - current.len).min(rest.len());
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
                current.pieces.push(head);
                current.len += take;
                rest = tail;

                if current.len == chunk {
                    let next_first = current.first_index + current.len as u32;
                    ranges.push(std::mem::replace(&mut current, StorageRange::empty(next_first)));
                }
            }
        }

        if !current.is_empty() {
            ranges.push(current);
        }
        ranges
    }

    /// Removes every element, returning all blocks to the allocator.
    pub fn clear(&mut self) {
        for mut block in self.blocks.drain(..) {
            for slot in block.as_mut_slice() {
                *slot = None;
            }
            self.allocator.deallocate_block(block);
        }
        self.len = 0;
    }
}

/// A contiguous run of storage positions borrowed mutably.
///
/// Produced by [`BlockStorage::partition_mut`]; positions
/// `first_index..first_index + len` belong to this range alone.
pub struct StorageRange<'a, T> {
    first_index: u32,
    len: usize,
    pieces: Vec<&'a mut [Option<T>]>,
}

impl<'a, T> StorageRange<'a, T> {
    fn empty(first_index: u32) -> Self {
        Self {
            first_index,
            len: 0,
            pieces: Vec::new(),
        }
    }

    /// First storage position covered by this range.
    #[inline]
    #[must_use]
    pub const fn first_index(&self) -> u32 {
        self.first_index
    }

    /// Number of positions covered.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the range covers nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the elements of this range.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pieces.iter().flat_map(|piece| piece.iter()).filter_map(Option::as_ref)
    }

    /// Iterates mutably over the elements of this range.
    pub fn iter_mut(&mut self) -> StorageRangeIterMut<'_, 'a, T> {
        StorageRangeIterMut {
            pieces: self.pieces.iter_mut(),
            current: Default::default(),
        }
    }
}

/// Mutable iterator over the elements of a [`StorageRange`].
pub struct StorageRangeIterMut<'r, 'a, T> {
    pieces: std::slice::IterMut<'r, &'a mut [Option<T>]>,
    current: std::slice::IterMut<'r, Option<T>>,
}

impl<'r, 'a, T> Iterator for StorageRangeIterMut<'r, 'a, T> {
    type Item = &'r mut T;

    fn next(&mut self) -> Option<&'r mut T> {
        loop {
            if let Some(value) = self.current.by_ref().find_map(Option::as_mut) {
                return Some(value);
            }
            let piece = self.pieces.next()?;
            self.current = piece.iter_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(count: u64, block_size: usize) -> BlockStorage<u64> {
        let mut storage = BlockStorage::new(block_size);
        for value in 0..count {
            storage.push(value);
        }
        storage
    }

    #[test]
    fn test_push_get_across_blocks() {
        // 4 u64 slots per block (Option<u64> is 16 bytes)
        let storage = storage_with(10, 64);
        assert_eq!(storage.elements_per_block(), 4);
        assert_eq!(storage.block_count(), 3);
        assert_eq!(storage.get(9), Some(&9));
        assert!(storage.get(10).is_none());
    }

    #[test]
    fn test_swap_remove_moves_last() {
        let mut storage = storage_with(5, 64);

        let removed = storage.swap_remove(1).unwrap();
        assert_eq!(removed.value, 1);
        assert_eq!(removed.moved_from, Some(4));
        assert_eq!(storage.get(1), Some(&4));
        assert_eq!(storage.len(), 4);

        let removed = storage.swap_remove(3).unwrap();
        assert_eq!(removed.moved_from, None);
        assert!(storage.swap_remove(3).is_none());
    }

    #[test]
    fn test_empty_blocks_are_recycled() {
        let mut storage = storage_with(5, 64);
        assert_eq!(storage.block_count(), 2);

        storage.swap_remove(4);
        assert_eq!(storage.block_count(), 1);
        assert_eq!(storage.allocator().stats().free_blocks, 1);

        storage.push(100);
        assert_eq!(storage.allocator().stats().blocks_created, 2);
        assert_eq!(storage.allocator().stats().free_blocks, 0);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let mut storage = storage_with(10, 64);

        let ranges = storage.partition_mut(3);
        let bounds: Vec<_> = ranges.iter().map(|r| (r.first_index(), r.len())).collect();
        assert_eq!(bounds, vec![(0, 3), (3, 3), (6, 3), (9, 1)]);

        let seen: Vec<u64> = ranges.iter().flat_map(|r| r.iter().copied()).collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_partition_zero_granularity() {
        let mut storage = storage_with(10, 64);
        let ranges = storage.partition_mut(0);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].len(), 10);

        let mut empty: BlockStorage<u64> = BlockStorage::new(64);
        assert!(empty.partition_mut(0).is_empty());
    }

    #[test]
    fn test_partition_writes() {
        let mut storage = storage_with(8, 64);
        for mut range in storage.partition_mut(5) {
            for value in range.iter_mut() {
                *value *= 10;
            }
        }
        assert_eq!(storage.iter().copied().collect::<Vec<_>>(), vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn test_range_iter_mut_spans_blocks() {
        // 4 slots per block, one range over three blocks
        let mut storage = storage_with(10, 64);
        let mut ranges = storage.partition_mut(10);
        assert_eq!(ranges.len(), 1);

        let range = &mut ranges[0];
        let visited: Vec<u64> = range.iter_mut().map(|value| *value).collect();
        assert_eq!(visited, (0..10).collect::<Vec<_>>());

        for value in range.iter_mut().skip(8) {
            *value = 0;
        }
        drop(ranges);
        assert_eq!(storage.get(8), Some(&0));
        assert_eq!(storage.get(7), Some(&7));
    }
}
