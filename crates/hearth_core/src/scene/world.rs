//! # World
//!
//! A [`World`] is one simulation instance. It owns the object store, one
//! component manager per registered component type, the message queues, the
//! deferred command sink and the initialization batches, and advances
//! everything one frame at a time.
//!
//! ## Frame pipeline
//!
//! ```text
//! update(dt)
//!   ├─ frame++, clock, new managers, staged registrations
//!   ├─ init point            (default batch + custom batches within budget)
//!   ├─ [NextFrame]
//!   ├─ PreAsync  ║ barrier ─ commands
//!   ├─ Async     ║ barrier ─ commands
//!   ├─ [PostAsync] ─ PostAsync ║ barrier ─ commands
//!   ├─ global transforms
//!   ├─ [PostTransform] ─ PostTransform ║ barrier ─ commands
//!   ├─ init point ─ [AfterInitialized]
//!   └─ deferred deletions    (components, then objects)
//! ```
//!
//! `║` marks a parallel phase: every manager with work becomes one pool
//! task, and every update function fans out over disjoint storage ranges.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use hearth_shared::{Transform, DEFAULT_BLOCK_SIZE, DEFAULT_INIT_BATCH_BUDGET, MAX_COMPONENT_TYPES};
use serde::{Deserialize, Serialize};

use super::commands::{WorldCommand, WorldCommands};
use super::component::Component;
use super::flags::{ComponentMode, ComponentState, ObjectFlags, VisitorExecution};
use super::handle::{ComponentHandle, ComponentInitBatchHandle, ComponentTypeId, GameObjectHandle, SpatialDataHandle};
use super::manager::{ComponentManager, ComponentManagerBase};
use super::message::{
    ChildChange, ComponentChange, Message, MessageQueues, MessageTarget, MsgChildrenChanged, MsgComponentsChanged,
    MsgDeleteGameObject, MsgQueueType, MsgTransformChanged, PendingSend, QueuedMessage,
};
use super::object::{GameObject, GameObjectDesc};
use super::object_store::ObjectStore;
use super::serialize::{ObjectRecord, WorldSnapshot};
use super::update::{Clock, UpdateFunctionDesc, UpdatePhase, WorldView};
use crate::error::{WorldError, WorldResult};
use crate::memory::IdTable;

/// Object flags that survive a snapshot round trip.
const PERSISTENT_FLAGS: ObjectFlags = ObjectFlags::USER_FLAGS
    .union(ObjectFlags::DYNAMIC)
    .union(ObjectFlags::FORCE_DYNAMIC)
    .union(ObjectFlags::UNHANDLED_MESSAGE_HANDLER)
    .union(ObjectFlags::CHILD_CHANGES_NOTIFICATIONS)
    .union(ObjectFlags::COMPONENT_CHANGES_NOTIFICATIONS)
    .union(ObjectFlags::STATIC_TRANSFORM_CHANGES_NOTIFICATIONS);

/// Borrows the read-only parts of a world field by field, so that the
/// managers can be borrowed mutably at the same time.
macro_rules! world_view {
    ($world:expr) => {
        WorldView::new(
            &$world.objects,
            &$world.commands,
            $world.clock,
            $world.frame,
            $world.simulating,
            $world.index,
        )
    };
}

/// Construction parameters of a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDesc {
    /// Name used in logs.
    pub name: String,
    /// World index stored in every handle (0..256).
    pub index: u8,
    /// Storage block size in bytes.
    pub block_size: usize,
    /// Components of custom initialization batches initialized per frame.
    pub max_component_inits_per_frame: usize,
    /// Start simulating right away.
    pub simulate: bool,
}

impl Default for WorldDesc {
    fn default() -> Self {
        Self {
            name: "world".to_owned(),
            index: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            max_component_inits_per_frame: DEFAULT_INIT_BATCH_BUDGET,
            simulate: false,
        }
    }
}

/// Counters describing a world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Live objects.
    pub objects: usize,
    /// Live components over all managers.
    pub components: usize,
    /// Registered component types.
    pub managers: usize,
    /// Frames run so far.
    pub frame: u64,
    /// Objects and components waiting for the end-of-frame deletion.
    pub pending_deletions: usize,
    /// Posted messages waiting in any queue.
    pub queued_messages: usize,
    /// Components waiting in an initialization batch.
    pub pending_inits: usize,
}

/// Wall-clock time spent in each part of the last [`World::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTimings {
    /// Both initialization points.
    pub init: Duration,
    /// Message queue drains.
    pub messages: Duration,
    /// Update phases, indexed like [`UpdatePhase::ALL`].
    pub phases: [Duration; 4],
    /// Global transform refresh.
    pub transforms: Duration,
    /// Deferred deletions.
    pub deletions: Duration,
    /// Whole update.
    pub total: Duration,
}

/// A group of components initialized together.
struct InitBatch {
    name: String,
    handle: ComponentInitBatchHandle,
    pending: VecDeque<ComponentHandle>,
    /// Initialized, waiting for the batch to complete before activation.
    initialized: Vec<ComponentHandle>,
    adding: bool,
}

impl InitBatch {
    fn new(name: String, handle: ComponentInitBatchHandle) -> Self {
        Self {
            name,
            handle,
            pending: VecDeque::new(),
            initialized: Vec::new(),
            adding: false,
        }
    }

    fn is_completed(&self) -> bool {
        !self.adding && self.pending.is_empty() && self.initialized.is_empty()
    }
}

/// One simulation instance.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(WorldDesc::default());
/// let unit = world.create_object(GameObjectDesc::new("unit").dynamic())?;
/// world.create_component(unit, UnitComponent::default())?;
/// world.set_simulation_enabled(true);
/// world.update(1.0 / 60.0);
/// ```
pub struct World {
    name: String,
    index: u8,
    block_size: usize,
    init_budget: usize,

    objects: ObjectStore,
    managers: Vec<Box<dyn ComponentManagerBase>>,
    type_ids: HashMap<TypeId, ComponentTypeId>,
    type_names: HashMap<String, ComponentTypeId>,

    commands: WorldCommands,
    queues: MessageQueues,

    batch_ids: IdTable,
    batches: HashMap<u32, InitBatch>,
    default_batch: ComponentInitBatchHandle,
    adding_batch: Option<ComponentInitBatchHandle>,

    pending_component_deletions: Vec<ComponentHandle>,
    pending_object_deletions: Vec<GameObjectHandle>,

    clock: Clock,
    frame: u64,
    simulating: bool,
    simulation_just_enabled: bool,
    timings: FrameTimings,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new(desc: WorldDesc) -> Self {
        let mut batch_ids = IdTable::new();
        let (index, generation) = batch_ids.insert(0);
        let default_batch = ComponentInitBatchHandle::new(index, generation);
        let batches = HashMap::from([(index, InitBatch::new("default".to_owned(), default_batch))]);

        tracing::info!(world = %desc.name, index = desc.index, block_size = desc.block_size, "world created");

        Self {
            name: desc.name,
            index: desc.index,
            block_size: desc.block_size,
            init_budget: desc.max_component_inits_per_frame.max(1),
            objects: ObjectStore::new(desc.index, desc.block_size),
            managers: Vec::new(),
            type_ids: HashMap::new(),
            type_names: HashMap::new(),
            commands: WorldCommands::new(),
            queues: MessageQueues::default(),
            batch_ids,
            batches,
            default_batch,
            adding_batch: None,
            pending_component_deletions: Vec::new(),
            pending_object_deletions: Vec::new(),
            clock: Clock::default(),
            frame: 0,
            simulating: desc.simulate,
            simulation_just_enabled: desc.simulate,
            timings: FrameTimings::default(),
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World index stored in every handle.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Number of frames run so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulation clock.
    #[must_use]
    pub const fn clock(&self) -> Clock {
        self.clock
    }

    /// Read access to the object store.
    #[must_use]
    pub const fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Deferred command sink, applied at the next barrier.
    #[must_use]
    pub const fn commands(&self) -> &WorldCommands {
        &self.commands
    }

    /// Read-only view, as handed to update functions.
    #[must_use]
    pub fn view(&self) -> WorldView<'_> {
        world_view!(self)
    }

    /// Timings of the last update.
    #[must_use]
    pub const fn last_frame_timings(&self) -> FrameTimings {
        self.timings
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            objects: self.objects.len(),
            components: self.managers.iter().map(|m| m.len()).sum(),
            managers: self.managers.len(),
            frame: self.frame,
            pending_deletions: self.pending_component_deletions.len() + self.pending_object_deletions.len(),
            queued_messages: self.queues.len(),
            pending_inits: self
                .batches
                .values()
                .map(|b| b.pending.len() + b.initialized.len())
                .sum(),
        }
    }

    // =========================================================================
    // OBJECTS
    // =========================================================================

    /// Creates a game object.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidObject`] if the parent does not resolve.
    pub fn create_object(&mut self, desc: GameObjectDesc) -> WorldResult<GameObjectHandle> {
        let parent = desc.parent;
        let handle = self.objects.create(desc)?;
        if let Some(parent) = parent {
            self.notify_child_change(parent, handle, ChildChange::Added);
        }
        Ok(handle)
    }

    /// Deletes an object and its components immediately. Children move to
    /// the object's parent. Returns false for a stale handle.
    pub fn delete_object(&mut self, handle: GameObjectHandle) -> bool {
        let Some(object) = self.objects.try_get(handle) else {
            return false;
        };
        let components = object.components.clone();
        let parent = object.parent;

        for component in components {
            self.remove_component_silently(component);
        }
        if let Some(parent) = parent {
            self.notify_child_change(parent, handle, ChildChange::Removed);
        }

        let Some(removed) = self.objects.remove(handle) else {
            return false;
        };
        self.apply_activity_changes(removed.activity_changes);
        true
    }

    /// Deletes an object at the end of the current (or next) frame.
    pub fn delete_object_delayed(&mut self, handle: GameObjectHandle) {
        self.pending_object_deletions.push(handle);
    }

    /// Resolves an object handle.
    #[must_use]
    pub fn try_get_object(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        self.objects.try_get(handle)
    }

    /// Returns true if the object handle resolves.
    #[must_use]
    pub fn contains_object(&self, handle: GameObjectHandle) -> bool {
        self.objects.contains(handle)
    }

    /// Moves an object below a new parent (`None` = root).
    ///
    /// # Errors
    ///
    /// Fails for stale handles and for moves that would create a cycle.
    pub fn set_parent(
        &mut self,
        child: GameObjectHandle,
        parent: Option<GameObjectHandle>,
        keep_global: bool,
    ) -> WorldResult<()> {
        let old_parent = self.objects.parent(child);
        let changes = self.objects.set_parent(child, parent, keep_global)?;
        if old_parent == parent {
            return Ok(());
        }

        if let Some(old_parent) = old_parent {
            self.notify_child_change(old_parent, child, ChildChange::Removed);
        }
        if let Some(parent) = parent {
            self.notify_child_change(parent, child, ChildChange::Added);
        }
        self.apply_activity_changes(changes);
        if !keep_global {
            self.notify_transform_changed(child);
        }
        Ok(())
    }

    /// Replaces the local transform of an object.
    pub fn set_local_transform(&mut self, handle: GameObjectHandle, local: Transform) -> bool {
        if !self.objects.set_local_transform(handle, local) {
            return false;
        }
        self.notify_transform_changed(handle);
        true
    }

    /// Global transform of an object, refreshing caches on the way.
    pub fn global_transform(&mut self, handle: GameObjectHandle) -> Option<Transform> {
        self.objects.global_transform(handle)
    }

    /// Moves an object so that its global transform becomes `global`.
    pub fn set_global_transform(&mut self, handle: GameObjectHandle, global: Transform) -> bool {
        if !self.objects.set_global_transform(handle, global) {
            return false;
        }
        self.notify_transform_changed(handle);
        true
    }

    /// Sets the own active flag of an object. Components of every object
    /// whose effective state changed are activated or deactivated.
    pub fn set_object_active(&mut self, handle: GameObjectHandle, active: bool) -> bool {
        if !self.objects.contains(handle) {
            return false;
        }
        let changes = self.objects.set_active_flag(handle, active);
        self.apply_activity_changes(changes);
        true
    }

    /// Renames an object.
    pub fn set_object_name(&mut self, handle: GameObjectHandle, name: impl Into<String>) -> bool {
        self.objects.set_name(handle, name)
    }

    /// Changes the team id of an object.
    pub fn set_team_id(&mut self, handle: GameObjectHandle, team_id: u16) -> bool {
        self.objects.set_team_id(handle, team_id)
    }

    /// Stores the spatial index entry of an object.
    pub fn set_spatial_data(&mut self, handle: GameObjectHandle, spatial_data: SpatialDataHandle) -> bool {
        self.objects.set_spatial_data(handle, spatial_data)
    }

    /// Sets or clears user and notification flags of an object.
    pub fn set_object_flags(&mut self, handle: GameObjectHandle, flags: ObjectFlags, enabled: bool) -> bool {
        self.objects.set_flags(handle, flags, enabled)
    }

    // =========================================================================
    // COMPONENT TYPES
    // =========================================================================

    /// Registers a component type and returns its id. Registering twice
    /// returns the existing id.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TooManyComponentTypes`] once the type id space
    /// is exhausted.
    pub fn register_component_type<C: Component + Default>(&mut self) -> WorldResult<ComponentTypeId> {
        if let Some(&id) = self.type_ids.get(&TypeId::of::<C>()) {
            return Ok(id);
        }
        if self.managers.len() >= MAX_COMPONENT_TYPES {
            return Err(WorldError::TooManyComponentTypes(MAX_COMPONENT_TYPES));
        }

        let id = self.managers.len() as ComponentTypeId;
        self.managers
            .push(Box::new(ComponentManager::<C>::new(id, self.index, self.block_size)));
        self.type_ids.insert(TypeId::of::<C>(), id);
        self.type_names.insert(C::type_name().to_owned(), id);

        tracing::debug!(world = %self.name, component = C::type_name(), type_id = id, "component type registered");
        Ok(id)
    }

    /// Type id of `C`, if registered.
    #[must_use]
    pub fn component_type_id<C: Component>(&self) -> Option<ComponentTypeId> {
        self.type_ids.get(&TypeId::of::<C>()).copied()
    }

    /// Typed manager of `C`.
    #[must_use]
    pub fn manager<C: Component>(&self) -> Option<&ComponentManager<C>> {
        let id = self.component_type_id::<C>()?;
        let manager: &dyn ComponentManagerBase = &**self.managers.get(usize::from(id))?;
        manager.as_any().downcast_ref()
    }

    /// Typed manager of `C`, mutably.
    pub fn manager_mut<C: Component>(&mut self) -> Option<&mut ComponentManager<C>> {
        let id = self.component_type_id::<C>()?;
        let manager: &mut dyn ComponentManagerBase = &mut **self.managers.get_mut(usize::from(id))?;
        manager.as_any_mut().downcast_mut()
    }

    /// Manager of a type id, untyped.
    #[must_use]
    pub fn manager_dyn(&self, type_id: ComponentTypeId) -> Option<&dyn ComponentManagerBase> {
        self.managers.get(usize::from(type_id)).map(|manager| &**manager)
    }

    /// Stages an update function of `C`; active from the next frame.
    ///
    /// # Errors
    ///
    /// Fails if `C` cannot be registered.
    pub fn register_update_function<C: Component + Default>(&mut self, desc: UpdateFunctionDesc<C>) -> WorldResult<()> {
        self.register_component_type::<C>()?;
        let manager = self
            .manager_mut::<C>()
            .ok_or_else(|| WorldError::UnknownComponentType(C::type_name().to_owned()))?;
        manager.register_update_function(desc);
        Ok(())
    }

    /// Stages the removal of an update function of `C`.
    pub fn unregister_update_function<C: Component>(&mut self, name: &str) -> bool {
        self.manager_mut::<C>()
            .map(|manager| manager.unregister_update_function(name))
            .is_some()
    }

    /// The instance of a singleton component type.
    #[must_use]
    pub fn singleton<C: Component>(&self) -> Option<&C> {
        self.manager::<C>()?.singleton().map(|slot| slot.component())
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Attaches a new component to `owner`. It is initialized and activated
    /// at the next initialization point, in the batch currently being
    /// filled (or the default batch).
    ///
    /// # Errors
    ///
    /// Fails for a stale owner or a second singleton.
    pub fn create_component<C: Component + Default>(
        &mut self,
        owner: GameObjectHandle,
        component: C,
    ) -> WorldResult<ComponentHandle> {
        if !self.objects.contains(owner) {
            return Err(WorldError::InvalidObject(owner.to_string()));
        }
        self.register_component_type::<C>()?;
        let manager = self
            .manager_mut::<C>()
            .ok_or_else(|| WorldError::UnknownComponentType(C::type_name().to_owned()))?;
        let handle = manager.create(owner, component, true)?;

        self.attach_component(owner, handle, C::mode());
        tracing::debug!(component = %handle, owner = %owner, type_name = C::type_name(), "component created");
        Ok(handle)
    }

    fn attach_component(&mut self, owner: GameObjectHandle, handle: ComponentHandle, mode: ComponentMode) {
        self.objects.link_component(owner, handle);
        if mode == ComponentMode::Dynamic {
            self.objects.set_flags(owner, ObjectFlags::DYNAMIC, true);
        }
        self.queue_for_init(handle);
        self.notify_component_change(owner, handle, ComponentChange::Added);
    }

    /// Deletes a component immediately. Returns false for a stale handle.
    pub fn delete_component(&mut self, handle: ComponentHandle) -> bool {
        let Some(owner) = self.component_owner(handle) else {
            return false;
        };
        self.notify_component_change(owner, handle, ComponentChange::Removed);
        self.remove_component_silently(handle)
    }

    fn remove_component_silently(&mut self, handle: ComponentHandle) -> bool {
        let removed = self
            .with_manager(handle.type_id(), |manager, view, follow_ups| {
                manager.remove_component(handle, view, follow_ups)
            })
            .flatten();
        match removed {
            Some(owner) => {
                self.objects.unlink_component(owner, handle);
                true
            }
            None => false,
        }
    }

    /// Deletes a component at the end of the current (or next) frame.
    pub fn delete_component_delayed(&mut self, handle: ComponentHandle) {
        self.pending_component_deletions.push(handle);
    }

    /// Resolves a component handle to its concrete type.
    #[must_use]
    pub fn try_get_component<C: Component>(&self, handle: ComponentHandle) -> Option<&C> {
        self.manager::<C>()?.try_get(handle).map(|slot| slot.component())
    }

    /// Resolves a component handle to its concrete type, mutably.
    pub fn try_get_component_mut<C: Component>(&mut self, handle: ComponentHandle) -> Option<&mut C> {
        self.manager_mut::<C>()?
            .try_get_mut(handle)
            .map(|slot| slot.component_mut())
    }

    /// Resolves a component handle without knowing its type.
    #[must_use]
    pub fn try_get_component_dyn(&self, handle: ComponentHandle) -> Option<&dyn Component> {
        self.manager_dyn(handle.type_id())?.get_dyn(handle)
    }

    /// Returns true if the component handle resolves.
    #[must_use]
    pub fn contains_component(&self, handle: ComponentHandle) -> bool {
        self.manager_dyn(handle.type_id())
            .is_some_and(|manager| manager.contains(handle))
    }

    /// Owner of a component.
    #[must_use]
    pub fn component_owner(&self, handle: ComponentHandle) -> Option<GameObjectHandle> {
        self.manager_dyn(handle.type_id())?.owner_of(handle)
    }

    /// Lifecycle state of a component.
    #[must_use]
    pub fn component_state(&self, handle: ComponentHandle) -> Option<ComponentState> {
        self.manager_dyn(handle.type_id())?.state_of(handle)
    }

    /// True while the component is active.
    #[must_use]
    pub fn is_component_active(&self, handle: ComponentHandle) -> bool {
        self.manager_dyn(handle.type_id())
            .and_then(|manager| manager.flags_of(handle))
            .is_some_and(ObjectFlags::is_active)
    }

    /// First component of type `C` on an object.
    #[must_use]
    pub fn find_component_on_object<C: Component>(&self, object: GameObjectHandle) -> Option<ComponentHandle> {
        let type_id = self.component_type_id::<C>()?;
        self.components_of(object)
            .iter()
            .copied()
            .find(|handle| handle.type_id() == type_id)
    }

    /// Components attached to an object, in attach order.
    #[must_use]
    pub fn components_of(&self, object: GameObjectHandle) -> &[ComponentHandle] {
        self.objects.try_get(object).map(GameObject::components).unwrap_or_default()
    }

    /// Sets the own active flag of a component and (de)activates it
    /// accordingly.
    pub fn set_component_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        let Some(manager) = self.managers.get_mut(usize::from(handle.type_id())) else {
            return false;
        };
        if !manager.contains(handle) {
            return false;
        }
        manager.set_active_flag(handle, active);

        if active {
            if self.activate_component(handle) {
                self.start_component(handle);
            }
        } else {
            self.deactivate_component(handle);
        }
        true
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Sends a message to the components of an object. Returns true if any
    /// component handled it.
    pub fn send_message(&mut self, object: GameObjectHandle, mut message: impl Message) -> bool {
        self.dispatch_sync(MessageTarget::Object(object), &mut message)
    }

    /// Sends a message to an object and all its descendants, depth-first.
    pub fn send_message_recursive(&mut self, object: GameObjectHandle, mut message: impl Message) -> bool {
        self.dispatch_sync(MessageTarget::ObjectRecursive(object), &mut message)
    }

    /// Sends a message to a single component.
    pub fn send_message_to_component(&mut self, component: ComponentHandle, mut message: impl Message) -> bool {
        self.dispatch_sync(MessageTarget::Component(component), &mut message)
    }

    /// Sends a message the caller keeps, so handlers can fill it in.
    pub fn send_message_to(&mut self, target: MessageTarget, message: &mut dyn Message) -> bool {
        self.dispatch_sync(target, message)
    }

    /// Posts a message to the components of an object.
    pub fn post_message(&mut self, object: GameObjectHandle, message: impl Message, queue: MsgQueueType) {
        self.enqueue(MessageTarget::Object(object), Box::new(message), queue);
    }

    /// Posts a message to an object and all its descendants.
    pub fn post_message_recursive(&mut self, object: GameObjectHandle, message: impl Message, queue: MsgQueueType) {
        self.enqueue(MessageTarget::ObjectRecursive(object), Box::new(message), queue);
    }

    /// Posts a message to a single component.
    pub fn post_message_to_component(&mut self, component: ComponentHandle, message: impl Message, queue: MsgQueueType) {
        self.enqueue(MessageTarget::Component(component), Box::new(message), queue);
    }

    fn enqueue(&mut self, target: MessageTarget, message: Box<dyn Message>, queue: MsgQueueType) {
        self.queues.push(
            queue,
            QueuedMessage {
                target,
                message,
                posted_frame: self.frame,
            },
        );
    }

    fn dispatch_sync(&mut self, target: MessageTarget, message: &mut dyn Message) -> bool {
        let mut follow_ups = Vec::new();
        let handled = self.deliver(target, message, &mut follow_ups);
        self.run_follow_ups(follow_ups);
        handled
    }

    /// Delivers follow-up sends depth-first: sends issued while handling a
    /// follow-up go out before its later siblings.
    fn run_follow_ups(&mut self, follow_ups: Vec<PendingSend>) {
        let mut queue: VecDeque<PendingSend> = follow_ups.into();
        while let Some(PendingSend { target, mut message }) = queue.pop_front() {
            let mut nested = Vec::new();
            self.deliver(target, &mut *message, &mut nested);
            for send in nested.into_iter().rev() {
                queue.push_front(send);
            }
        }
    }

    fn deliver(&mut self, target: MessageTarget, message: &mut dyn Message, follow_ups: &mut Vec<PendingSend>) -> bool {
        match target {
            MessageTarget::Component(component) => self.deliver_to_component(component, message, follow_ups),
            MessageTarget::Object(object) => self.deliver_to_object(object, message, follow_ups),
            MessageTarget::ObjectRecursive(object) => {
                let mut handled = false;
                for node in self.objects.subtree(object) {
                    handled |= self.deliver_to_object(node, message, follow_ups);
                }
                handled
            }
        }
    }

    fn deliver_to_component(
        &mut self,
        component: ComponentHandle,
        message: &mut dyn Message,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        let view = world_view!(self);
        let Some(manager) = self.managers.get_mut(usize::from(component.type_id())) else {
            return false;
        };
        manager.handle_message(component, message, &view, follow_ups)
    }

    fn deliver_to_object(
        &mut self,
        object: GameObjectHandle,
        message: &mut dyn Message,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        let Some((components, flags)) = self
            .objects
            .try_get(object)
            .map(|o| (o.components.clone(), o.flags))
        else {
            return false;
        };

        let mut handled = false;
        for &component in &components {
            handled |= self.deliver_to_component(component, message, follow_ups);
        }
        if handled {
            return true;
        }

        if flags.contains(ObjectFlags::UNHANDLED_MESSAGE_HANDLER) {
            let view = world_view!(self);
            for &component in &components {
                if let Some(manager) = self.managers.get_mut(usize::from(component.type_id())) {
                    manager.unhandled_message(component, &*message, &view, follow_ups);
                }
            }
        }
        if message.is::<MsgDeleteGameObject>() {
            self.pending_object_deletions.push(object);
        }
        false
    }

    fn notify_component_change(&mut self, owner: GameObjectHandle, component: ComponentHandle, change: ComponentChange) {
        let wants = self
            .objects
            .try_get(owner)
            .is_some_and(|o| o.flags.contains(ObjectFlags::COMPONENT_CHANGES_NOTIFICATIONS));
        if wants {
            self.send_message(owner, MsgComponentsChanged { change, owner, component });
        }
    }

    fn notify_child_change(&mut self, parent: GameObjectHandle, child: GameObjectHandle, change: ChildChange) {
        let wants = self
            .objects
            .try_get(parent)
            .is_some_and(|o| o.flags.contains(ObjectFlags::CHILD_CHANGES_NOTIFICATIONS));
        if wants {
            self.send_message(parent, MsgChildrenChanged { change, parent, child });
        }
    }

    /// Notifies every static object of the moved subtree that asked for it;
    /// their global transforms changed along with `object`.
    fn notify_transform_changed(&mut self, object: GameObjectHandle) {
        let listeners: Vec<GameObjectHandle> = self
            .objects
            .subtree(object)
            .into_iter()
            .filter(|&node| {
                self.objects.try_get(node).is_some_and(|o| {
                    !o.is_dynamic() && o.flags.contains(ObjectFlags::STATIC_TRANSFORM_CHANGES_NOTIFICATIONS)
                })
            })
            .collect();
        for node in listeners {
            self.send_message(node, MsgTransformChanged { object: node });
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Runs `f` on the manager of `type_id`, then delivers the sends its
    /// hooks issued.
    fn with_manager<R>(
        &mut self,
        type_id: ComponentTypeId,
        f: impl FnOnce(&mut dyn ComponentManagerBase, &WorldView<'_>, &mut Vec<PendingSend>) -> R,
    ) -> Option<R> {
        let mut follow_ups = Vec::new();
        let result = {
            let view = world_view!(self);
            let manager = self.managers.get_mut(usize::from(type_id))?;
            f(&mut **manager, &view, &mut follow_ups)
        };
        self.run_follow_ups(follow_ups);
        Some(result)
    }

    fn initialize_component(&mut self, handle: ComponentHandle) -> bool {
        self.with_manager(handle.type_id(), |manager, view, follow_ups| {
            manager.initialize_component(handle, view, follow_ups)
        })
        .unwrap_or(false)
    }

    fn activate_component(&mut self, handle: ComponentHandle) -> bool {
        let owner_active = self
            .component_owner(handle)
            .and_then(|owner| self.objects.try_get(owner))
            .is_some_and(GameObject::is_active);
        self.with_manager(handle.type_id(), |manager, view, follow_ups| {
            manager.activate_component(handle, owner_active, view, follow_ups)
        })
        .unwrap_or(false)
    }

    fn deactivate_component(&mut self, handle: ComponentHandle) -> bool {
        self.with_manager(handle.type_id(), |manager, view, follow_ups| {
            manager.deactivate_component(handle, view, follow_ups)
        })
        .unwrap_or(false)
    }

    fn start_component(&mut self, handle: ComponentHandle) -> bool {
        if !self.simulating {
            return false;
        }
        self.with_manager(handle.type_id(), |manager, view, follow_ups| {
            manager.start_simulation(handle, view, follow_ups)
        })
        .unwrap_or(false)
    }

    fn apply_activity_changes(&mut self, changes: Vec<(GameObjectHandle, bool)>) {
        for (object, active) in changes {
            let components = self.components_of(object).to_vec();
            for component in components {
                if active {
                    if self.activate_component(component) {
                        self.start_component(component);
                    }
                } else {
                    self.deactivate_component(component);
                }
            }
        }
    }

    /// Enables or disables the simulation. Enabling starts every active
    /// component at the next initialization point; disabling lets the next
    /// run start them again.
    pub fn set_simulation_enabled(&mut self, enabled: bool) {
        if enabled == self.simulating {
            return;
        }
        self.simulating = enabled;
        if enabled {
            self.simulation_just_enabled = true;
        } else {
            self.simulation_just_enabled = false;
            for manager in &mut self.managers {
                manager.reset_simulation();
            }
        }
        tracing::info!(world = %self.name, enabled, "simulation toggled");
    }

    /// True while the simulation runs.
    #[must_use]
    pub const fn is_simulating(&self) -> bool {
        self.simulating
    }

    // =========================================================================
    // INITIALIZATION BATCHES
    // =========================================================================

    /// Creates an initialization batch. Its components are initialized over
    /// several frames within the per-frame budget and activated together
    /// once all of them are initialized.
    pub fn create_init_batch(&mut self, name: impl Into<String>) -> ComponentInitBatchHandle {
        let (index, generation) = self.batch_ids.insert(0);
        let handle = ComponentInitBatchHandle::new(index, generation);
        self.batches.insert(index, InitBatch::new(name.into(), handle));
        handle
    }

    fn batch_mut(&mut self, handle: ComponentInitBatchHandle) -> WorldResult<&mut InitBatch> {
        self.batch_ids
            .get(handle.index(), handle.generation())
            .and_then(|_| self.batches.get_mut(&handle.index()))
            .ok_or_else(|| WorldError::InvalidInitBatch(format!("{:#x}", handle.to_raw())))
    }

    /// Routes components created from now on into `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidInitBatch`] for a stale handle.
    pub fn begin_add_to_init_batch(&mut self, batch: ComponentInitBatchHandle) -> WorldResult<()> {
        self.batch_mut(batch)?.adding = true;
        self.adding_batch = Some(batch);
        Ok(())
    }

    /// Stops routing components into `batch`; it may complete from now on.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidInitBatch`] for a stale handle.
    pub fn end_add_to_init_batch(&mut self, batch: ComponentInitBatchHandle) -> WorldResult<()> {
        self.batch_mut(batch)?.adding = false;
        if self.adding_batch == Some(batch) {
            self.adding_batch = None;
        }
        Ok(())
    }

    /// Whether every component of the batch is initialized and activated.
    /// `None` for a stale handle.
    #[must_use]
    pub fn is_init_batch_completed(&self, batch: ComponentInitBatchHandle) -> Option<bool> {
        self.batch_ids.get(batch.index(), batch.generation())?;
        self.batches.get(&batch.index()).map(InitBatch::is_completed)
    }

    /// Deletes a batch. Components still waiting move to the default batch.
    ///
    /// # Errors
    ///
    /// Fails for a stale handle or the default batch.
    pub fn delete_init_batch(&mut self, batch: ComponentInitBatchHandle) -> WorldResult<()> {
        if batch == self.default_batch {
            return Err(WorldError::InvalidInitBatch("the default batch cannot be deleted".to_owned()));
        }
        self.batch_mut(batch)?;
        self.batch_ids.remove(batch.index(), batch.generation());
        let Some(removed) = self.batches.remove(&batch.index()) else {
            return Ok(());
        };
        if self.adding_batch == Some(batch) {
            self.adding_batch = None;
        }

        let default = self.batch_mut(self.default_batch)?;
        default.pending.extend(removed.initialized);
        default.pending.extend(removed.pending);
        Ok(())
    }

    fn queue_for_init(&mut self, handle: ComponentHandle) {
        let adding = self
            .adding_batch
            .filter(|batch| self.batch_ids.get(batch.index(), batch.generation()).is_some());
        self.adding_batch = adding;
        let target = adding.unwrap_or(self.default_batch);
        if let Ok(batch) = self.batch_mut(target) {
            batch.pending.push_back(handle);
        }
    }

    fn run_init_point(&mut self) {
        let default_batch = self.default_batch;
        let pending: Vec<ComponentHandle> = self
            .batch_mut(default_batch)
            .map(|batch| batch.pending.drain(..).collect())
            .unwrap_or_default();
        for &handle in &pending {
            self.initialize_component(handle);
        }
        self.activate_and_start(&pending);

        let mut custom: Vec<ComponentInitBatchHandle> = self
            .batches
            .values()
            .map(|batch| batch.handle)
            .filter(|&handle| handle != default_batch)
            .collect();
        custom.sort_unstable_by_key(|handle| handle.index());

        for handle in custom {
            let budget = self.init_budget;
            let chunk: Vec<ComponentHandle> = match self.batch_mut(handle) {
                Ok(batch) => {
                    let take = budget.min(batch.pending.len());
                    batch.pending.drain(..take).collect()
                }
                Err(_) => continue,
            };
            for &component in &chunk {
                self.initialize_component(component);
            }

            let Ok(batch) = self.batch_mut(handle) else {
                continue;
            };
            batch.initialized.extend(chunk);
            if batch.adding || !batch.pending.is_empty() || batch.initialized.is_empty() {
                continue;
            }
            let ready = std::mem::take(&mut batch.initialized);
            let name = batch.name.clone();
            self.activate_and_start(&ready);
            tracing::debug!(world = %self.name, batch = %name, components = ready.len(), "init batch completed");
        }

        if std::mem::take(&mut self.simulation_just_enabled) {
            self.start_all_components();
        }
    }

    fn activate_and_start(&mut self, handles: &[ComponentHandle]) {
        for &handle in handles {
            self.activate_component(handle);
        }
        if self.simulating {
            for &handle in handles {
                self.start_component(handle);
            }
        }
    }

    fn start_all_components(&mut self) {
        let handles: Vec<ComponentHandle> = self.managers.iter().flat_map(|m| m.handles()).collect();
        for handle in handles {
            self.start_component(handle);
        }
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Advances the world by one frame.
    pub fn update(&mut self, delta_seconds: f32) {
        let frame_start = Instant::now();
        let mut timings = FrameTimings::default();

        self.frame += 1;
        self.clock.advance(delta_seconds);
        for manager in &mut self.managers {
            if !manager.is_initialized() {
                manager.initialize();
            }
            manager.apply_pending_registrations();
        }

        let start = Instant::now();
        self.run_init_point();
        self.apply_commands();
        timings.init += start.elapsed();

        self.timed_drain(MsgQueueType::NextFrame, &mut timings);
        self.timed_phase(UpdatePhase::PreAsync, &mut timings);
        self.timed_phase(UpdatePhase::Async, &mut timings);
        self.timed_drain(MsgQueueType::PostAsync, &mut timings);
        self.timed_phase(UpdatePhase::PostAsync, &mut timings);

        let start = Instant::now();
        let refreshed = self.objects.update_global_transforms();
        timings.transforms = start.elapsed();

        self.timed_drain(MsgQueueType::PostTransform, &mut timings);
        self.timed_phase(UpdatePhase::PostTransform, &mut timings);

        let start = Instant::now();
        self.run_init_point();
        self.apply_commands();
        timings.init += start.elapsed();
        self.timed_drain(MsgQueueType::AfterInitialized, &mut timings);

        let start = Instant::now();
        self.process_deletions();
        timings.deletions = start.elapsed();

        timings.total = frame_start.elapsed();
        self.timings = timings;
        tracing::trace!(
            world = %self.name,
            frame = self.frame,
            transforms_refreshed = refreshed,
            total_us = timings.total.as_micros() as u64,
            "frame complete"
        );
    }

    fn timed_drain(&mut self, queue: MsgQueueType, timings: &mut FrameTimings) {
        let start = Instant::now();
        self.drain_queue(queue);
        self.apply_commands();
        timings.messages += start.elapsed();
    }

    fn timed_phase(&mut self, phase: UpdatePhase, timings: &mut FrameTimings) {
        let start = Instant::now();
        self.run_phase(phase);
        self.apply_commands();
        let slot = UpdatePhase::ALL.iter().position(|&p| p == phase).unwrap_or(0);
        timings.phases[slot] = start.elapsed();
    }

    fn drain_queue(&mut self, queue: MsgQueueType) {
        let due = self.queues.take_due(queue, self.frame);
        if !due.is_empty() {
            tracing::trace!(world = %self.name, ?queue, messages = due.len(), "draining message queue");
        }
        for QueuedMessage { target, mut message, .. } in due {
            self.dispatch_sync(target, &mut *message);
        }
    }

    /// Runs one phase on the shared pool and blocks until every task is done.
    fn run_phase(&mut self, phase: UpdatePhase) {
        let view = world_view!(self);
        let managers = &mut self.managers;
        tracing::trace!(frame = view.frame(), phase = phase.name(), "phase start");
        rayon::scope(|scope| {
            for manager in managers.iter_mut() {
                manager.schedule_phase(phase, &view, scope);
            }
        });
    }

    /// Applies every deferred command, including commands issued while
    /// applying earlier ones.
    fn apply_commands(&mut self) {
        loop {
            let commands = self.commands.drain();
            if commands.is_empty() {
                break;
            }
            for command in commands {
                self.apply_command(command);
            }
        }
    }

    fn apply_command(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::PostMessage { target, message, queue } => self.enqueue(target, message, queue),
            WorldCommand::DeleteObject(handle) => self.pending_object_deletions.push(handle),
            WorldCommand::DeleteComponent(handle) => self.pending_component_deletions.push(handle),
            WorldCommand::SetObjectActive(handle, active) => {
                if !self.set_object_active(handle, active) {
                    tracing::warn!(object = %handle, "dropped activity change for stale object");
                }
            }
            WorldCommand::SetComponentActive(handle, active) => {
                if !self.set_component_active(handle, active) {
                    tracing::warn!(component = %handle, "dropped activity change for stale component");
                }
            }
            WorldCommand::SetLocalTransform(handle, local) => {
                if !self.set_local_transform(handle, local) {
                    tracing::warn!(object = %handle, "dropped transform change for stale object");
                }
            }
            WorldCommand::Deferred(f) => f(self),
        }
    }

    fn process_deletions(&mut self) {
        loop {
            let components = std::mem::take(&mut self.pending_component_deletions);
            let objects = std::mem::take(&mut self.pending_object_deletions);
            if components.is_empty() && objects.is_empty() {
                break;
            }
            for handle in components {
                self.delete_component(handle);
            }
            for handle in objects {
                self.delete_object(handle);
            }
            self.apply_commands();
        }
    }

    /// Deletes every object and drops all queued work.
    pub fn clear(&mut self) {
        let handles: Vec<GameObjectHandle> = self.objects.iter().map(GameObject::handle).collect();
        for handle in handles {
            self.delete_object(handle);
        }
        self.commands.drain();
        self.queues.clear();
        self.pending_component_deletions.clear();
        self.pending_object_deletions.clear();
        for batch in self.batches.values_mut() {
            batch.pending.clear();
            batch.initialized.clear();
        }
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Captures every object and every component.
    #[must_use]
    pub fn write_snapshot(&self) -> WorldSnapshot {
        let mut order = Vec::with_capacity(self.objects.len());
        self.objects.visit_depth_first(None, |object| {
            order.push(object.handle());
            VisitorExecution::Continue
        });
        let indices: HashMap<GameObjectHandle, u32> = order
            .iter()
            .enumerate()
            .map(|(i, &handle)| (handle, i as u32))
            .collect();

        let objects = order
            .iter()
            .filter_map(|&handle| self.objects.try_get(handle))
            .map(|object| ObjectRecord {
                name: object.name().to_owned(),
                parent: object.parent().and_then(|p| indices.get(&p).copied()),
                local_transform: *object.local_transform(),
                active: object.flags().contains(ObjectFlags::ACTIVE_FLAG),
                team_id: object.team_id(),
                user_flags: (object.flags() & PERSISTENT_FLAGS).bits(),
            })
            .collect();

        let component_types = self
            .managers
            .iter()
            .map(|manager| manager.serialize_components(&indices))
            .filter(|record| !record.components.is_empty())
            .collect();

        WorldSnapshot { objects, component_types }
    }

    /// Recreates the objects and components of a snapshot. Component types
    /// must be registered beforehand.
    ///
    /// On failure every object created so far is deleted again.
    ///
    /// # Errors
    ///
    /// [`WorldError::MalformedData`] for inconsistent records or component
    /// data, [`WorldError::UnknownComponentType`] for unregistered types.
    pub fn try_load_snapshot(&mut self, snapshot: &WorldSnapshot) -> WorldResult<Vec<GameObjectHandle>> {
        let mut created = Vec::with_capacity(snapshot.objects.len());
        if let Err(error) = self.load_records(snapshot, &mut created) {
            for &handle in created.iter().rev() {
                self.delete_object(handle);
            }
            return Err(error);
        }
        tracing::debug!(
            world = %self.name,
            objects = created.len(),
            components = snapshot.component_count(),
            "snapshot loaded"
        );
        Ok(created)
    }

    /// Like [`try_load_snapshot`](Self::try_load_snapshot), but logs the
    /// failure and returns no objects.
    pub fn load_snapshot(&mut self, snapshot: &WorldSnapshot) -> Vec<GameObjectHandle> {
        match self.try_load_snapshot(snapshot) {
            Ok(created) => created,
            Err(error) => {
                tracing::warn!(world = %self.name, %error, "snapshot rejected, loading an empty object set");
                Vec::new()
            }
        }
    }

    fn load_records(&mut self, snapshot: &WorldSnapshot, created: &mut Vec<GameObjectHandle>) -> WorldResult<()> {
        for (i, record) in snapshot.objects.iter().enumerate() {
            let parent = match record.parent {
                Some(p) if (p as usize) < i => Some(created[p as usize]),
                Some(p) => {
                    return Err(WorldError::MalformedData {
                        reason: format!("object {i} has parent {p} that does not precede it"),
                    })
                }
                None => None,
            };

            let mut flags = ObjectFlags::from_bits_retain(record.user_flags) & PERSISTENT_FLAGS;
            flags.set(ObjectFlags::ACTIVE_FLAG, record.active);
            let desc = GameObjectDesc {
                name: record.name.clone(),
                parent,
                local_transform: record.local_transform,
                flags,
                team_id: record.team_id,
            };
            created.push(self.create_object(desc)?);
        }

        for type_record in &snapshot.component_types {
            let type_id = *self
                .type_names
                .get(&type_record.type_name)
                .ok_or_else(|| WorldError::UnknownComponentType(type_record.type_name.clone()))?;

            for record in &type_record.components {
                let owner = created
                    .get(record.owner as usize)
                    .copied()
                    .ok_or_else(|| WorldError::MalformedData {
                        reason: format!("component owner {} out of range", record.owner),
                    })?;
                let manager = self
                    .managers
                    .get_mut(usize::from(type_id))
                    .ok_or_else(|| WorldError::UnknownComponentType(type_record.type_name.clone()))?;
                let mode = manager.mode();
                let handle = manager.deserialize_component(owner, record, type_record.version, created)?;
                self.attach_component(owner, handle, mode);
            }
        }
        Ok(())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.clear();
        tracing::info!(world = %self.name, frames = self.frame, "world torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::component::ComponentContext;
    use hearth_shared::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Ping(u32);
    impl Message for Ping {}

    #[derive(Default)]
    struct Recorder {
        received: Vec<u32>,
        activations: u32,
        deactivations: u32,
        starts: u32,
    }

    impl Component for Recorder {
        fn on_activated(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.activations += 1;
        }
        fn on_deactivated(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.deactivations += 1;
        }
        fn on_simulation_started(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.starts += 1;
        }
        fn handle_message(&mut self, message: &mut dyn Message, _ctx: &mut ComponentContext<'_>) -> bool {
            match message.downcast_ref::<Ping>() {
                Some(ping) => {
                    self.received.push(ping.0);
                    true
                }
                None => false,
            }
        }
    }

    fn world() -> World {
        World::new(WorldDesc::default())
    }

    #[test]
    fn test_component_activates_at_init_point() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        let component = world.create_component(object, Recorder::default()).unwrap();

        assert_eq!(world.component_state(component), Some(ComponentState::None));
        world.update(0.016);
        assert_eq!(world.component_state(component), Some(ComponentState::Active));
        assert_eq!(world.try_get_component::<Recorder>(component).unwrap().activations, 1);
        assert_eq!(world.find_component_on_object::<Recorder>(object), Some(component));
    }

    #[test]
    fn test_object_activity_cascades_to_components() {
        let mut world = world();
        let parent = world.create_object(GameObjectDesc::new("parent")).unwrap();
        let child = world.create_object(GameObjectDesc::new("child").with_parent(parent)).unwrap();
        let component = world.create_component(child, Recorder::default()).unwrap();
        world.update(0.016);

        world.set_object_active(parent, false);
        assert!(!world.is_component_active(component));
        world.set_object_active(parent, true);
        assert!(world.is_component_active(component));

        let recorder = world.try_get_component::<Recorder>(component).unwrap();
        assert_eq!((recorder.activations, recorder.deactivations), (2, 1));
    }

    #[test]
    fn test_simulation_starts_once_per_run() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        let component = world.create_component(object, Recorder::default()).unwrap();
        world.update(0.016);
        assert_eq!(world.try_get_component::<Recorder>(component).unwrap().starts, 0);

        world.set_simulation_enabled(true);
        world.update(0.016);
        world.update(0.016);
        assert_eq!(world.try_get_component::<Recorder>(component).unwrap().starts, 1);

        world.set_simulation_enabled(false);
        world.set_simulation_enabled(true);
        world.update(0.016);
        assert_eq!(world.try_get_component::<Recorder>(component).unwrap().starts, 2);
    }

    #[test]
    fn test_send_message_reaches_subtree() {
        let mut world = world();
        let root = world.create_object(GameObjectDesc::new("root")).unwrap();
        let child = world.create_object(GameObjectDesc::new("child").with_parent(root)).unwrap();
        let a = world.create_component(root, Recorder::default()).unwrap();
        let b = world.create_component(child, Recorder::default()).unwrap();
        world.update(0.016);

        assert!(world.send_message_recursive(root, Ping(7)));
        assert!(world.send_message(child, Ping(8)));
        assert_eq!(world.try_get_component::<Recorder>(a).unwrap().received, vec![7]);
        assert_eq!(world.try_get_component::<Recorder>(b).unwrap().received, vec![7, 8]);
    }

    #[test]
    fn test_inactive_component_ignores_messages() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        let component = world.create_component(object, Recorder::default()).unwrap();
        assert!(!world.send_message(object, Ping(1)));
        world.update(0.016);
        world.set_component_active(component, false);
        assert!(!world.send_message(object, Ping(2)));
        assert!(world.try_get_component::<Recorder>(component).unwrap().received.is_empty());
    }

    #[test]
    fn test_unhandled_delete_message_deletes_object() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        assert!(!world.send_message(object, MsgDeleteGameObject));
        assert!(world.contains_object(object));
        world.update(0.016);
        assert!(!world.contains_object(object));
    }

    #[test]
    fn test_delete_component_unlinks_it() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        let component = world.create_component(object, Recorder::default()).unwrap();
        world.update(0.016);

        assert!(world.delete_component(component));
        assert!(!world.contains_component(component));
        assert!(world.components_of(object).is_empty());
        assert!(!world.delete_component(component));
    }

    #[test]
    fn test_delayed_deletes_ignore_dead_handles() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        world.delete_object_delayed(object);
        world.delete_object_delayed(object);
        world.update(0.016);
        assert!(!world.contains_object(object));
        assert_eq!(world.stats().pending_deletions, 0);
    }

    #[test]
    fn test_update_function_covers_every_component() {
        #[derive(Default)]
        struct Spinner {
            angle: f32,
        }
        impl Component for Spinner {
            fn register_update_functions(manager: &mut ComponentManager<Self>) {
                manager.register_update_function(
                    UpdateFunctionDesc::<Self>::new("spin", UpdatePhase::Async, |range, ctx| {
                        for slot in range.iter_mut() {
                            slot.angle += ctx.view.clock().delta_seconds();
                        }
                    })
                    .with_granularity(16),
                );
            }
        }

        let mut world = world();
        let mut handles = Vec::new();
        for i in 0..100 {
            let object = world.create_object(GameObjectDesc::new(format!("s{i}"))).unwrap();
            handles.push(world.create_component(object, Spinner::default()).unwrap());
        }
        world.update(0.5);
        world.update(0.5);

        for handle in handles {
            let angle = world.try_get_component::<Spinner>(handle).unwrap().angle;
            assert!((angle - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_only_when_simulating_functions_wait() {
        #[derive(Default)]
        struct Ticker;
        impl Component for Ticker {}

        let counter = Arc::new(AtomicUsize::new(0));
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        world.create_component(object, Ticker).unwrap();
        let seen = Arc::clone(&counter);
        world
            .register_update_function(
                UpdateFunctionDesc::<Ticker>::new("tick", UpdatePhase::PreAsync, move |range, _ctx| {
                    seen.fetch_add(range.len(), Ordering::Relaxed);
                })
                .only_when_simulating(),
            )
            .unwrap();

        world.update(0.016);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
        world.set_simulation_enabled(true);
        world.update(0.016);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_singleton_per_world() {
        #[derive(Default)]
        struct Settings;
        impl Component for Settings {
            fn is_singleton() -> bool {
                true
            }
        }

        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        world.create_component(object, Settings).unwrap();
        let second = world.create_component(object, Settings);
        assert!(matches!(second, Err(WorldError::SingletonAlreadyExists { .. })));
        assert!(world.singleton::<Settings>().is_some());

        let mut other = World::new(WorldDesc {
            index: 1,
            ..WorldDesc::default()
        });
        let object = other.create_object(GameObjectDesc::new("b")).unwrap();
        assert!(other.create_component(object, Settings).is_ok());
    }

    #[test]
    fn test_init_batch_activates_together() {
        let mut world = World::new(WorldDesc {
            max_component_inits_per_frame: 2,
            ..WorldDesc::default()
        });
        let batch = world.create_init_batch("level");
        world.begin_add_to_init_batch(batch).unwrap();
        let mut handles = Vec::new();
        for i in 0..5 {
            let object = world.create_object(GameObjectDesc::new(format!("o{i}"))).unwrap();
            handles.push(world.create_component(object, Recorder::default()).unwrap());
        }
        world.end_add_to_init_batch(batch).unwrap();
        assert_eq!(world.is_init_batch_completed(batch), Some(false));

        world.update(0.016);
        assert!(handles.iter().all(|&h| !world.is_component_active(h)));
        world.update(0.016);
        world.update(0.016);
        assert_eq!(world.is_init_batch_completed(batch), Some(true));
        assert!(handles.iter().all(|&h| world.is_component_active(h)));

        world.delete_init_batch(batch).unwrap();
        assert_eq!(world.is_init_batch_completed(batch), None);
    }

    #[test]
    fn test_default_batch_cannot_be_deleted() {
        let mut world = world();
        let batch = world.default_batch;
        assert!(world.delete_init_batch(batch).is_err());
    }

    #[derive(Default)]
    struct Watcher {
        moved: u32,
    }

    impl Component for Watcher {
        fn handle_message(&mut self, message: &mut dyn Message, _ctx: &mut ComponentContext<'_>) -> bool {
            if message.is::<MsgTransformChanged>() {
                self.moved += 1;
                return true;
            }
            false
        }
    }

    #[test]
    fn test_static_transform_notification() {
        let mut world = world();
        let object = world
            .create_object(GameObjectDesc::new("wall").with_flags(ObjectFlags::STATIC_TRANSFORM_CHANGES_NOTIFICATIONS))
            .unwrap();
        let watcher = world.create_component(object, Watcher::default()).unwrap();
        world.update(0.016);

        world.set_local_transform(object, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(world.try_get_component::<Watcher>(watcher).unwrap().moved, 1);
    }

    #[test]
    fn test_static_descendant_notified_when_ancestor_moves() {
        let mut world = world();
        let base = world.create_object(GameObjectDesc::new("base")).unwrap();
        let tower = world
            .create_object(
                GameObjectDesc::new("tower")
                    .with_parent(base)
                    .with_flags(ObjectFlags::STATIC_TRANSFORM_CHANGES_NOTIFICATIONS),
            )
            .unwrap();
        let watcher = world.create_component(tower, Watcher::default()).unwrap();
        world.update(0.016);

        world.set_global_transform(base, Transform::from_position(Vec3::new(0.0, 0.0, 5.0)));
        assert_eq!(world.try_get_component::<Watcher>(watcher).unwrap().moved, 1);
    }

    #[test]
    fn test_deferred_commands_apply_at_barrier() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new("a")).unwrap();
        world.commands().defer(move |world| {
            world.set_object_name(object, "renamed");
        });
        assert_eq!(world.try_get_object(object).unwrap().name(), "a");
        world.update(0.016);
        assert_eq!(world.try_get_object(object).unwrap().name(), "renamed");
    }
}
