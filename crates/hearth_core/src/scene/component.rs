//! # Components
//!
//! A component is a piece of behavior attached to exactly one game object.
//! Concrete component types implement [`Component`]; the world stores them in
//! one [`ComponentManager`](super::ComponentManager) per type, each component
//! wrapped in a [`ComponentSlot`] that carries its bookkeeping.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──► initialize ──► on_activated ──► on_simulation_started
//!                               ▲   │
//!                               │   ▼
//!                          on_deactivated ──► deinitialize ──► freed
//! ```
//!
//! Every hook defaults to a no-op.

use std::any::Any;
use std::ops::{Deref, DerefMut};

use hearth_shared::Transform;

use super::commands::WorldCommands;
use super::flags::{ComponentMode, ComponentState, ObjectFlags};
use super::handle::{ComponentHandle, GameObjectHandle};
use super::message::{Message, MessageTarget, MsgQueueType, PendingSend};
use super::object::GameObject;
use super::serialize::{ComponentReader, ComponentWriter};
use super::update::WorldView;
use super::ComponentManager;
use crate::error::{WorldError, WorldResult};

/// Access to a value as [`Any`], for downcasting trait objects.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behavior attached to a game object.
///
/// Instance hooks receive a [`ComponentContext`] that gives read access to
/// the world and lets the component send messages or queue world changes.
/// Type-level items configure the manager for the component type.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Blinker { visible: bool }
///
/// impl Component for Blinker {
///     fn on_activated(&mut self, _ctx: &mut ComponentContext<'_>) {
///         self.visible = true;
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Component: AsAny + Send {
    /// Called once before the component is first activated.
    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) {}

    /// Called once before the component is freed, if it was initialized.
    fn deinitialize(&mut self, ctx: &mut ComponentContext<'_>) {}

    /// Called when the component becomes active.
    fn on_activated(&mut self, ctx: &mut ComponentContext<'_>) {}

    /// Called when the component stops being active.
    fn on_deactivated(&mut self, ctx: &mut ComponentContext<'_>) {}

    /// Called once per simulation run, after activation.
    fn on_simulation_started(&mut self, ctx: &mut ComponentContext<'_>) {}

    /// Handles a message. Returns true if the message was handled.
    fn handle_message(&mut self, message: &mut dyn Message, ctx: &mut ComponentContext<'_>) -> bool {
        false
    }

    /// Receives messages no component on the owner handled, if the owner has
    /// [`ObjectFlags::UNHANDLED_MESSAGE_HANDLER`].
    fn on_unhandled_message(&mut self, message: &dyn Message, ctx: &mut ComponentContext<'_>) {}

    /// Writes the persistent state.
    fn serialize(&self, writer: &mut ComponentWriter<'_>) {}

    /// Reads state written by [`serialize`](Self::serialize) of the given type
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedData`] when the data cannot be read.
    fn deserialize(&mut self, reader: &mut ComponentReader<'_>, version: u32) -> WorldResult<()> {
        Ok(())
    }

    /// Stable name of the component type, used in snapshots.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    /// Whether components of this type move their owner.
    fn mode() -> ComponentMode
    where
        Self: Sized,
    {
        ComponentMode::Static
    }

    /// Version of the serialized layout.
    fn version() -> u32
    where
        Self: Sized,
    {
        1
    }

    /// At most one instance per world.
    fn is_singleton() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Registers the update functions of this type. Called when the manager
    /// is initialized.
    fn register_update_functions(manager: &mut ComponentManager<Self>)
    where
        Self: Sized,
    {
    }
}

impl dyn Component {
    /// Downcasts to a concrete component type.
    #[must_use]
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.as_any().downcast_ref::<C>()
    }

    /// Downcasts to a concrete component type, mutably.
    pub fn downcast_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.as_any_mut().downcast_mut::<C>()
    }
}

/// A component plus the bookkeeping its manager keeps for it.
///
/// Dereferences to the component.
pub struct ComponentSlot<C> {
    pub(crate) handle: ComponentHandle,
    pub(crate) owner: GameObjectHandle,
    pub(crate) flags: ObjectFlags,
    pub(crate) state: ComponentState,
    pub(crate) component: C,
}

impl<C> ComponentSlot<C> {
    pub(crate) fn new(handle: ComponentHandle, owner: GameObjectHandle, active: bool, component: C) -> Self {
        let mut flags = ObjectFlags::empty();
        flags.set(ObjectFlags::ACTIVE_FLAG, active);
        Self {
            handle,
            owner,
            flags,
            state: ComponentState::None,
            component,
        }
    }

    /// Handle of this component.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> ComponentHandle {
        self.handle
    }

    /// Owning object.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> GameObjectHandle {
        self.owner
    }

    /// Lifecycle flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ComponentState {
        self.state
    }

    /// True while active (own flag set and owner active).
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE_STATE)
    }

    /// True once `initialize` has completed.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.flags.contains(ObjectFlags::INITIALIZED)
    }

    /// True once `on_simulation_started` ran for the current run.
    #[inline]
    #[must_use]
    pub const fn is_simulation_started(&self) -> bool {
        self.flags.contains(ObjectFlags::SIMULATION_STARTED)
    }

    /// The component itself.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> &C {
        &self.component
    }

    /// The component itself, mutably.
    #[inline]
    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }
}

impl<C> Deref for ComponentSlot<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.component
    }
}

impl<C> DerefMut for ComponentSlot<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.component
    }
}

/// What a component does once it has finished its purpose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnComponentFinishedAction {
    /// Nothing.
    #[default]
    None,
    /// Delete the component at the end of the frame.
    DeleteComponent,
    /// Delete the owner at the end of the frame.
    DeleteGameObject,
}

/// World access handed to component hooks.
///
/// Synchronous sends issued here are delivered after the current hook
/// returns but before the outer send (or lifecycle step) completes, in issue
/// order. Everything else goes through the deferred command sink.
pub struct ComponentContext<'a> {
    handle: ComponentHandle,
    owner: GameObjectHandle,
    mode: ComponentMode,
    view: &'a WorldView<'a>,
    follow_ups: &'a mut Vec<PendingSend>,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(
        handle: ComponentHandle,
        owner: GameObjectHandle,
        mode: ComponentMode,
        view: &'a WorldView<'a>,
        follow_ups: &'a mut Vec<PendingSend>,
    ) -> Self {
        Self {
            handle,
            owner,
            mode,
            view,
            follow_ups,
        }
    }

    /// Handle of the component being called.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> ComponentHandle {
        self.handle
    }

    /// Owner of the component being called.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> GameObjectHandle {
        self.owner
    }

    /// Read-only view of the world.
    #[inline]
    #[must_use]
    pub const fn view(&self) -> &'a WorldView<'a> {
        self.view
    }

    /// Deferred command sink of the world.
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &'a WorldCommands {
        self.view.commands()
    }

    /// The owning object.
    #[must_use]
    pub fn owner_object(&self) -> Option<&'a GameObject> {
        self.view.objects().try_get(self.owner)
    }

    /// Global transform of the owner.
    #[must_use]
    pub fn owner_global_transform(&self) -> Option<Transform> {
        self.view.objects().compute_global_transform(self.owner)
    }

    /// Sends a message to the components of an object.
    pub fn send_message(&mut self, object: GameObjectHandle, message: impl Message) {
        self.follow_ups.push(PendingSend::new(MessageTarget::Object(object), Box::new(message)));
    }

    /// Sends a message to the components of an object and all its descendants.
    pub fn send_message_recursive(&mut self, object: GameObjectHandle, message: impl Message) {
        self.follow_ups
            .push(PendingSend::new(MessageTarget::ObjectRecursive(object), Box::new(message)));
    }

    /// Sends a message to a single component.
    pub fn send_message_to_component(&mut self, component: ComponentHandle, message: impl Message) {
        self.follow_ups
            .push(PendingSend::new(MessageTarget::Component(component), Box::new(message)));
    }

    /// Posts a message to one of the world's message queues.
    pub fn post_message(&self, object: GameObjectHandle, message: impl Message, queue: MsgQueueType) {
        self.commands().post_message(MessageTarget::Object(object), message, queue);
    }

    /// Deletes an object at the end of the frame.
    pub fn delete_object_delayed(&self, object: GameObjectHandle) {
        self.commands().delete_object_delayed(object);
    }

    /// Deletes a component at the end of the frame.
    pub fn delete_component_delayed(&self, component: ComponentHandle) {
        self.commands().delete_component_delayed(component);
    }

    /// Moves the owner at the next barrier.
    ///
    /// # Errors
    ///
    /// Static components may not move their owner.
    pub fn set_owner_local_transform(&self, local: Transform) -> WorldResult<()> {
        if self.mode == ComponentMode::Static {
            return Err(WorldError::StaticComponentMove(self.handle.to_string()));
        }
        self.commands().set_local_transform(self.owner, local);
        Ok(())
    }

    /// Applies an [`OnComponentFinishedAction`] to this component.
    pub fn handle_finished_action(&self, action: OnComponentFinishedAction) {
        match action {
            OnComponentFinishedAction::None => {}
            OnComponentFinishedAction::DeleteComponent => self.delete_component_delayed(self.handle),
            OnComponentFinishedAction::DeleteGameObject => self.delete_object_delayed(self.owner),
        }
    }
}
