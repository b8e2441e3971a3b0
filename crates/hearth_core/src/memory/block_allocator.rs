//! # Block Allocator
//!
//! Hands out fixed-size blocks of default-initialized elements and recycles
//! returned blocks through a free list.

use hearth_shared::DEFAULT_BLOCK_SIZE;

/// A fixed-size page of elements owned by whoever allocated it.
///
/// The element buffer is boxed once and never reallocated, so the address of
/// an element stays stable for as long as the block lives.
pub struct Block<T> {
    data: Box<[T]>,
}

impl<T> Block<T> {
    /// Number of element slots in this block.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The element slots.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The element slots, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Allocation counters of a [`BlockAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockAllocatorStats {
    /// Blocks created from fresh memory.
    pub blocks_created: usize,
    /// Blocks currently handed out.
    pub blocks_in_use: usize,
    /// Largest number of blocks handed out at the same time.
    pub peak_blocks_in_use: usize,
    /// Returned blocks waiting for reuse.
    pub free_blocks: usize,
}

/// A block allocator for a single element type.
///
/// Every block holds `block_size_bytes / size_of::<T>()` elements (at least
/// one). Blocks returned through [`deallocate_block`](Self::deallocate_block)
/// are kept and handed out again, reset to `T::default()`.
///
/// # Thread Safety
///
/// Not thread-safe. Each store owns its own allocator.
///
/// # Example
///
/// ```rust,ignore
/// let mut allocator: BlockAllocator<Option<u64>> = BlockAllocator::new(4096);
/// let block = allocator.allocate_block(); // 512 slots, all None
/// allocator.deallocate_block(block);      // kept for reuse
/// ```
pub struct BlockAllocator<T> {
    /// Configured block size in bytes.
    block_size_bytes: usize,
    /// Elements per block.
    elements_per_block: usize,
    /// Blocks waiting for reuse.
    free_list: Vec<Block<T>>,
    /// Counters.
    stats: BlockAllocatorStats,
}

impl<T: Default> BlockAllocator<T> {
    /// Creates an allocator producing blocks of `block_size_bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `block_size_bytes` is zero.
    #[must_use]
    pub fn new(block_size_bytes: usize) -> Self {
        assert!(block_size_bytes > 0, "Block size must be greater than zero");

        let element_size = std::mem::size_of::<T>().max(1);
        let elements_per_block = (block_size_bytes / element_size).max(1);

        Self {
            block_size_bytes,
            elements_per_block,
            free_list: Vec::new(),
            stats: BlockAllocatorStats::default(),
        }
    }

    /// Configured block size in bytes.
    #[inline]
    #[must_use]
    pub const fn block_size_bytes(&self) -> usize {
        self.block_size_bytes
    }

    /// Number of elements in every block.
    #[inline]
    #[must_use]
    pub const fn elements_per_block(&self) -> usize {
        self.elements_per_block
    }

    /// Returns the allocation counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> BlockAllocatorStats {
        self.stats
    }

    /// Hands out a block with every slot set to `T::default()`.
    ///
    /// Reuses a returned block when one is available. Running out of memory
    /// aborts the process through the global allocator; there is no
    /// recoverable failure path here.
    pub fn allocate_block(&mut self) -> Block<T> {
        let block = if let Some(mut block) = self.free_list.pop() {
            for slot in block.as_mut_slice() {
                *slot = T::default();
            }
            block
        } else {
            self.stats.blocks_created += 1;
            let data: Vec<T> = (0..self.elements_per_block).map(|_| T::default()).collect();
            Block {
                data: data.into_boxed_slice(),
            }
        };

        self.stats.blocks_in_use += 1;
        self.stats.peak_blocks_in_use = self.stats.peak_blocks_in_use.max(self.stats.blocks_in_use);
        self.stats.free_blocks = self.free_list.len();
        block
    }

    /// Returns a block to the free list.
    pub fn deallocate_block(&mut self, block: Block<T>) {
        debug_assert_eq!(block.capacity(), self.elements_per_block);
        self.stats.blocks_in_use = self.stats.blocks_in_use.saturating_sub(1);
        self.free_list.push(block);
        self.stats.free_blocks = self.free_list.len();
    }

    /// Releases every block waiting for reuse.
    pub fn trim(&mut self) {
        self.free_list.clear();
        self.stats.free_blocks = 0;
    }
}

impl<T: Default> Default for BlockAllocator<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_capacity() {
        let allocator: BlockAllocator<u64> = BlockAllocator::new(4096);
        assert_eq!(allocator.elements_per_block(), 512);

        let oversized: BlockAllocator<[u64; 32]> = BlockAllocator::new(128);
        assert_eq!(oversized.elements_per_block(), 1);
    }

    #[test]
    fn test_block_reuse_is_zeroed() {
        let mut allocator: BlockAllocator<u32> = BlockAllocator::new(64);

        let mut block = allocator.allocate_block();
        block.as_mut_slice()[3] = 99;
        allocator.deallocate_block(block);

        let block = allocator.allocate_block();
        assert!(block.as_slice().iter().all(|&v| v == 0));
        assert_eq!(allocator.stats().blocks_created, 1);
    }

    #[test]
    fn test_stats() {
        let mut allocator: BlockAllocator<u8> = BlockAllocator::new(16);

        let a = allocator.allocate_block();
        let b = allocator.allocate_block();
        assert_eq!(allocator.stats().blocks_in_use, 2);

        allocator.deallocate_block(a);
        allocator.deallocate_block(b);
        let stats = allocator.stats();
        assert_eq!(stats.blocks_in_use, 0);
        assert_eq!(stats.peak_blocks_in_use, 2);
        assert_eq!(stats.free_blocks, 2);

        allocator.trim();
        assert_eq!(allocator.stats().free_blocks, 0);
    }
}
