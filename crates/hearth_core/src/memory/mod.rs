//! # Memory Management
//!
//! Paged storage for game objects and components.
//!
//! ## Layers
//!
//! - [`BlockAllocator`]: fixed-size blocks with a free list for reuse
//! - [`BlockStorage`]: dense element storage spread over allocator blocks
//! - [`IdTable`]: generation-checked mapping from handle index to storage position
//!
//! Storage grows one block at a time, so elements never move when more
//! elements are added. They only move when a removal compacts the storage,
//! and the owning store patches its [`IdTable`] when that happens.

mod block_allocator;
mod block_storage;
mod id_table;

pub use block_allocator::{Block, BlockAllocator, BlockAllocatorStats};
pub use block_storage::{BlockStorage, StorageRange, SwapRemoved};
pub use id_table::{IdTable, MAX_INSTANCE_INDEX};
