//! # Scene
//!
//! The game-object/component world model.
//!
//! ```text
//! World
//!  ├─ ObjectStore ── GameObject ── GameObject ...   (hierarchy, transforms)
//!  ├─ ComponentManager<A> ── ComponentSlot<A> ...   (one per component type)
//!  ├─ ComponentManager<B> ── ComponentSlot<B> ...
//!  ├─ message queues, deferred commands
//!  └─ initialization batches, pending deletions
//! ```
//!
//! Everything outside the world refers to objects and components through
//! generation-checked handles and resolves them on every use.

pub mod commands;
pub mod component;
pub mod flags;
pub mod handle;
pub mod manager;
pub mod message;
pub mod object;
pub mod object_store;
pub mod serialize;
pub mod update;
pub mod world;

pub use commands::{DeferredFn, WorldCommand, WorldCommands};
pub use component::{AsAny, Component, ComponentContext, ComponentSlot, OnComponentFinishedAction};
pub use flags::{ComponentMode, ComponentState, ObjectFlags, VisitorExecution};
pub use handle::{
    ComponentHandle, ComponentInitBatchHandle, ComponentTypeId, GameObjectHandle, SpatialDataHandle, INVALID_INDEX,
};
pub use manager::{ComponentManager, ComponentManagerBase};
pub use message::{
    ChildChange, ComponentChange, Message, MessageTarget, MsgChildrenChanged, MsgComponentsChanged,
    MsgDeleteGameObject, MsgQueueType, MsgTransformChanged, PendingSend,
};
pub use object::{GameObject, GameObjectDesc};
pub use object_store::{ObjectStore, RemovedObject};
pub use serialize::{ComponentReader, ComponentRecord, ComponentTypeRecord, ComponentWriter, ObjectRecord, WorldSnapshot};
pub use update::{Clock, UpdateContext, UpdateFn, UpdateFunctionDesc, UpdatePhase, WorldView};
pub use world::{FrameTimings, World, WorldDesc, WorldStats};
