//! # Update Scheduling Types
//!
//! Update functions are registered per component type and run once per frame
//! in their phase. Each function is fanned out over disjoint index ranges of
//! its manager's storage:
//!
//! ```text
//! phase Async, granularity 50, 120 components
//!   task 0: [0, 50)   task 1: [50, 100)   task 2: [100, 120)
//! ```

use std::fmt;
use std::sync::Arc;

use super::commands::WorldCommands;
use super::component::ComponentSlot;
use super::object_store::ObjectStore;
use crate::memory::StorageRange;

/// Phases of a frame, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    /// Before the async phase.
    PreAsync,
    /// Main parallel phase.
    Async,
    /// After the `PostAsync` message queue.
    PostAsync,
    /// After global transforms are refreshed.
    PostTransform,
}

impl UpdatePhase {
    /// Every phase in execution order.
    pub const ALL: [Self; 4] = [Self::PreAsync, Self::Async, Self::PostAsync, Self::PostTransform];

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreAsync => "pre_async",
            Self::Async => "async",
            Self::PostAsync => "post_async",
            Self::PostTransform => "post_transform",
        }
    }
}

/// Simulation clock of a world.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Clock {
    delta_seconds: f32,
    accumulated_seconds: f64,
}

impl Clock {
    /// Delta time of the current frame.
    #[inline]
    #[must_use]
    pub const fn delta_seconds(&self) -> f32 {
        self.delta_seconds
    }

    /// Total time of all frames so far.
    #[inline]
    #[must_use]
    pub const fn accumulated_seconds(&self) -> f64 {
        self.accumulated_seconds
    }

    pub(crate) fn advance(&mut self, delta_seconds: f32) {
        self.delta_seconds = delta_seconds.max(0.0);
        self.accumulated_seconds += f64::from(self.delta_seconds);
    }
}

/// Read-only view of a world shared by all tasks of a phase.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    objects: &'a ObjectStore,
    commands: &'a WorldCommands,
    clock: Clock,
    frame: u64,
    simulating: bool,
    world_index: u8,
}

impl<'a> WorldView<'a> {
    pub(crate) fn new(
        objects: &'a ObjectStore,
        commands: &'a WorldCommands,
        clock: Clock,
        frame: u64,
        simulating: bool,
        world_index: u8,
    ) -> Self {
        Self {
            objects,
            commands,
            clock,
            frame,
            simulating,
            world_index,
        }
    }

    /// Object store as written by earlier phases.
    #[inline]
    #[must_use]
    pub const fn objects(&self) -> &'a ObjectStore {
        self.objects
    }

    /// Deferred command sink.
    #[inline]
    #[must_use]
    pub const fn commands(&self) -> &'a WorldCommands {
        self.commands
    }

    /// World clock.
    #[inline]
    #[must_use]
    pub const fn clock(&self) -> Clock {
        self.clock
    }

    /// Current frame number.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// True while the simulation runs.
    #[inline]
    #[must_use]
    pub const fn is_simulating(&self) -> bool {
        self.simulating
    }

    /// Index of the world.
    #[inline]
    #[must_use]
    pub const fn world_index(&self) -> u8 {
        self.world_index
    }
}

/// Arguments of one update task.
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    /// Phase being run.
    pub phase: UpdatePhase,
    /// First storage index of the task's range.
    pub first_component_index: u32,
    /// Number of components in the range.
    pub component_count: usize,
    /// The world.
    pub view: &'a WorldView<'a>,
}

/// Update entry point of a component type.
pub type UpdateFn<C> = Arc<dyn Fn(&mut StorageRange<'_, ComponentSlot<C>>, &UpdateContext<'_>) + Send + Sync>;

/// Registration of an update function.
///
/// # Example
///
/// ```rust,ignore
/// let desc = UpdateFunctionDesc::new("spin", UpdatePhase::Async, |range, ctx| {
///     for slot in range.iter_mut().filter(|s| s.is_active()) {
///         slot.angle += ctx.view.clock().delta_seconds();
///     }
/// })
/// .with_granularity(64)
/// .only_when_simulating();
/// ```
pub struct UpdateFunctionDesc<C> {
    /// Unique name within the component type.
    pub name: String,
    /// Phase to run in.
    pub phase: UpdatePhase,
    /// Components per task; 0 runs the whole storage as one task.
    pub granularity: usize,
    /// Skip while the world is not simulating.
    pub only_update_when_simulating: bool,
    /// Entry point.
    pub function: UpdateFn<C>,
}

impl<C> UpdateFunctionDesc<C> {
    /// Describes an update function running as a single task.
    pub fn new<F>(name: impl Into<String>, phase: UpdatePhase, function: F) -> Self
    where
        F: Fn(&mut StorageRange<'_, ComponentSlot<C>>, &UpdateContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            phase,
            granularity: 0,
            only_update_when_simulating: false,
            function: Arc::new(function),
        }
    }

    /// Sets the number of components per task.
    #[must_use]
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Runs only while the world simulates.
    #[must_use]
    pub fn only_when_simulating(mut self) -> Self {
        self.only_update_when_simulating = true;
        self
    }
}

impl<C> Clone for UpdateFunctionDesc<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            phase: self.phase,
            granularity: self.granularity,
            only_update_when_simulating: self.only_update_when_simulating,
            function: Arc::clone(&self.function),
        }
    }
}

impl<C> fmt::Debug for UpdateFunctionDesc<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateFunctionDesc")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("granularity", &self.granularity)
            .field("only_update_when_simulating", &self.only_update_when_simulating)
            .finish_non_exhaustive()
    }
}
