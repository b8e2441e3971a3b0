//! # Engine Constants
//!
//! Defaults shared by the world model and the engine configuration.

// =============================================================================
// STORAGE
// =============================================================================

/// Size of one storage block in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Maximum number of worlds that can coexist (world index is 8 bits).
pub const MAX_WORLDS: usize = 256;

/// Maximum number of component types per world (type id is 16 bits).
pub const MAX_COMPONENT_TYPES: usize = u16::MAX as usize;

// =============================================================================
// FRAME TIMING
// =============================================================================

/// Target update rate of the game loop.
pub const DEFAULT_TARGET_FPS: u32 = 60;

/// Largest delta time fed into a world update, in seconds.
pub const DEFAULT_MAX_DELTA_SECONDS: f32 = 0.1;

/// Components of custom initialization batches initialized per frame.
pub const DEFAULT_INIT_BATCH_BUDGET: usize = 256;
