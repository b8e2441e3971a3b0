//! # HEARTH Core
//!
//! The game-object/component world model:
//! - generation-checked handles for objects and components
//! - paged block storage with O(1) slot recycling
//! - a parent/child hierarchy with lazily cached global transforms
//! - one typed component manager per component type
//! - a phased frame pipeline that fans update functions out over rayon
//!
//! ## Rules
//!
//! 1. **Handles, not references** - resolve a handle every time it is used
//! 2. **Phases are barriers** - update functions only read the world; their
//!    changes go through deferred commands applied between phases
//! 3. **Stale is not an error** - lookups on dead handles return `None`
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_core::scene::{GameObjectDesc, World, WorldDesc};
//!
//! let mut world = World::new(WorldDesc::default());
//! let root = world.create_object(GameObjectDesc::new("root"))?;
//! world.update(1.0 / 60.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod scene;
pub mod sync;

pub use error::{WorldError, WorldResult};
pub use memory::{BlockAllocator, BlockStorage, IdTable, StorageRange};
pub use scene::{
    Component, ComponentContext, ComponentHandle, ComponentManager, ComponentManagerBase, ComponentMode,
    ComponentSlot, GameObject, GameObjectDesc, GameObjectHandle, Message, MessageTarget, MsgQueueType, ObjectFlags,
    UpdateContext, UpdateFunctionDesc, UpdatePhase, World, WorldDesc, WorldSnapshot, WorldStats, WorldView,
};
pub use sync::{BackgroundTask, CancellationToken, TaskError};
