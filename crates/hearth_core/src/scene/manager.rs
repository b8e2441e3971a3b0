//! # Component Managers
//!
//! One [`ComponentManager`] per component type per world. It owns the
//! component storage and the id table that maps handles into it, keeps the
//! update-function registrations of its type and drives the lifecycle hooks.
//!
//! The world talks to managers through the object-safe
//! [`ComponentManagerBase`] trait; gameplay code uses the typed API.

use std::any::Any;
use std::collections::HashMap;

use super::component::{Component, ComponentContext, ComponentSlot};
use super::flags::{ComponentMode, ComponentState, ObjectFlags};
use super::handle::{ComponentHandle, ComponentTypeId, GameObjectHandle};
use super::message::{Message, PendingSend};
use super::serialize::{ComponentReader, ComponentRecord, ComponentTypeRecord, ComponentWriter};
use super::update::{UpdateContext, UpdateFunctionDesc, UpdatePhase, WorldView};
use crate::error::{WorldError, WorldResult};
use crate::memory::{BlockStorage, IdTable};

/// Object-safe face of a component manager.
///
/// Lifecycle methods are silent no-ops for stale handles and for components
/// already in the requested state.
pub trait ComponentManagerBase: Send {
    /// Type id of the managed component type in this world.
    fn component_type(&self) -> ComponentTypeId;

    /// Name of the managed component type.
    fn type_name(&self) -> &'static str;

    /// Mobility of the managed component type.
    fn mode(&self) -> ComponentMode;

    /// Serialized layout version of the managed component type.
    fn version(&self) -> u32;

    /// Number of live components.
    fn len(&self) -> usize;

    /// Returns true if the manager holds no component.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`initialize`](Self::initialize) has run.
    fn is_initialized(&self) -> bool;

    /// Initializes the manager and lets the component type register its
    /// update functions.
    fn initialize(&mut self);

    /// Activates staged update-function (un)registrations.
    fn apply_pending_registrations(&mut self);

    /// Spawns this manager's work for `phase` into `scope`.
    ///
    /// The manager becomes one task that runs its functions for the phase in
    /// registration order; each function is split into ranges of its
    /// granularity that run as nested tasks.
    fn schedule_phase<'s>(&'s mut self, phase: UpdatePhase, view: &'s WorldView<'s>, scope: &rayon::Scope<'s>);

    /// Returns true if the handle resolves.
    fn contains(&self, handle: ComponentHandle) -> bool;

    /// Owner of a component.
    fn owner_of(&self, handle: ComponentHandle) -> Option<GameObjectHandle>;

    /// Flags of a component.
    fn flags_of(&self, handle: ComponentHandle) -> Option<ObjectFlags>;

    /// Lifecycle state of a component.
    fn state_of(&self, handle: ComponentHandle) -> Option<ComponentState>;

    /// Handles of all components in storage order.
    fn handles(&self) -> Vec<ComponentHandle>;

    /// The component as a trait object.
    fn get_dyn(&self, handle: ComponentHandle) -> Option<&dyn Component>;

    /// The component as a mutable trait object.
    fn get_dyn_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Component>;

    /// Moves a component to a new owner (dynamic components only).
    fn set_owner(&mut self, handle: ComponentHandle, owner: GameObjectHandle) -> bool;

    /// Sets the own active flag. Returns true if the flag changed.
    fn set_active_flag(&mut self, handle: ComponentHandle, active: bool) -> bool;

    /// Runs `initialize` once. Returns false if it already ran or is running.
    fn initialize_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool;

    /// Activates an initialized component whose own flag is set, if the
    /// owner is active. Returns true if `on_activated` ran.
    fn activate_component(
        &mut self,
        handle: ComponentHandle,
        owner_active: bool,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool;

    /// Deactivates an active component. Returns true if `on_deactivated` ran.
    fn deactivate_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool;

    /// Runs `on_simulation_started` once per run for an active component.
    fn start_simulation(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool;

    /// Clears `SIMULATION_STARTED` on every component.
    fn reset_simulation(&mut self);

    /// Delivers a message to an active component. Returns true if handled.
    fn handle_message(
        &mut self,
        handle: ComponentHandle,
        message: &mut dyn Message,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool;

    /// Reports a message nobody handled.
    fn unhandled_message(
        &mut self,
        handle: ComponentHandle,
        message: &dyn Message,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    );

    /// Deactivates, deinitializes and frees a component. Returns its owner.
    fn remove_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> Option<GameObjectHandle>;

    /// Writes every component whose owner is listed in `object_indices`.
    fn serialize_components(&self, object_indices: &HashMap<GameObjectHandle, u32>) -> ComponentTypeRecord;

    /// Creates a component from serialized data. The caller links it to
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Fails on malformed data or on a second singleton.
    fn deserialize_component(
        &mut self,
        owner: GameObjectHandle,
        record: &ComponentRecord,
        version: u32,
        objects: &[GameObjectHandle],
    ) -> WorldResult<ComponentHandle>;

    /// `self` as `&dyn Any`, for downcasting to the typed manager.
    fn as_any(&self) -> &dyn Any;

    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage and lifecycle driver for components of type `C`.
pub struct ComponentManager<C: Component> {
    type_id: ComponentTypeId,
    world_index: u8,
    ids: IdTable,
    storage: BlockStorage<ComponentSlot<C>>,
    update_functions: Vec<UpdateFunctionDesc<C>>,
    pending_registrations: Vec<UpdateFunctionDesc<C>>,
    pending_unregistrations: Vec<String>,
    initialized: bool,
}

impl<C: Component> ComponentManager<C> {
    /// Creates an empty, uninitialized manager.
    #[must_use]
    pub fn new(type_id: ComponentTypeId, world_index: u8, block_size_bytes: usize) -> Self {
        Self {
            type_id,
            world_index,
            ids: IdTable::new(),
            storage: BlockStorage::new(block_size_bytes),
            update_functions: Vec::new(),
            pending_registrations: Vec::new(),
            pending_unregistrations: Vec::new(),
            initialized: false,
        }
    }

    /// Type id of `C` in this world.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Number of live components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns true if no component is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[inline]
    fn position(&self, handle: ComponentHandle) -> Option<u32> {
        if handle.type_id() != self.type_id || handle.world_index() != self.world_index {
            return None;
        }
        self.ids.get(handle.index(), handle.generation())
    }

    /// Stores a new component owned by `owner`.
    ///
    /// The caller is responsible for linking it to the owner and queueing
    /// its initialization; use `World::create_component` instead.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SingletonAlreadyExists`] for a second instance
    /// of a singleton type.
    pub(crate) fn create(&mut self, owner: GameObjectHandle, component: C, active: bool) -> WorldResult<ComponentHandle> {
        if C::is_singleton() && !self.storage.is_empty() {
            return Err(WorldError::SingletonAlreadyExists {
                type_name: C::type_name(),
            });
        }

        let position = self.storage.len() as u32;
        let (index, generation) = self.ids.insert(position);
        let handle = ComponentHandle::new(index, generation, self.world_index, self.type_id);
        self.storage.push(ComponentSlot::new(handle, owner, active, component));
        Ok(handle)
    }

    /// Resolves a handle.
    #[inline]
    #[must_use]
    pub fn try_get(&self, handle: ComponentHandle) -> Option<&ComponentSlot<C>> {
        self.storage.get(self.position(handle)?)
    }

    /// Resolves a handle, mutably.
    #[inline]
    pub fn try_get_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentSlot<C>> {
        let position = self.position(handle)?;
        self.storage.get_mut(position)
    }

    /// All components in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentSlot<C>> {
        self.storage.iter()
    }

    /// All components in storage order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentSlot<C>> {
        self.storage.iter_mut()
    }

    /// The only instance of a singleton type.
    #[must_use]
    pub fn singleton(&self) -> Option<&ComponentSlot<C>> {
        if C::is_singleton() {
            self.storage.iter().next()
        } else {
            None
        }
    }

    /// Stages an update function; it becomes active at the next frame start.
    pub fn register_update_function(&mut self, desc: UpdateFunctionDesc<C>) {
        tracing::debug!(component = C::type_name(), function = %desc.name, phase = desc.phase.name(), "update function staged");
        self.pending_registrations.push(desc);
    }

    /// Stages the removal of an update function by name.
    pub fn unregister_update_function(&mut self, name: &str) {
        self.pending_unregistrations.push(name.to_owned());
    }

    /// Names of the active update functions in registration order.
    #[must_use]
    pub fn update_function_names(&self) -> Vec<&str> {
        self.update_functions.iter().map(|desc| desc.name.as_str()).collect()
    }

    fn call_hook<F>(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
        hook: F,
    ) -> bool
    where
        F: FnOnce(&mut ComponentSlot<C>, &mut ComponentContext<'_>) -> bool,
    {
        let Some(slot) = self.try_get_mut(handle) else {
            return false;
        };
        let mut ctx = ComponentContext::new(handle, slot.owner, C::mode(), view, follow_ups);
        hook(slot, &mut ctx)
    }
}

impl<C: Component + Default> ComponentManagerBase for ComponentManager<C> {
    fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    fn type_name(&self) -> &'static str {
        C::type_name()
    }

    fn mode(&self) -> ComponentMode {
        C::mode()
    }

    fn version(&self) -> u32 {
        C::version()
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        C::register_update_functions(self);
        self.initialized = true;
        tracing::debug!(component = C::type_name(), type_id = self.type_id, "component manager initialized");
    }

    fn apply_pending_registrations(&mut self) {
        for name in self.pending_unregistrations.drain(..) {
            self.update_functions.retain(|desc| desc.name != name);
            self.pending_registrations.retain(|desc| desc.name != name);
        }
        for desc in self.pending_registrations.drain(..) {
            if let Some(existing) = self.update_functions.iter_mut().find(|d| d.name == desc.name) {
                *existing = desc;
            } else {
                self.update_functions.push(desc);
            }
        }
    }

    fn schedule_phase<'s>(&'s mut self, phase: UpdatePhase, view: &'s WorldView<'s>, scope: &rayon::Scope<'s>) {
        if !self.initialized || self.storage.is_empty() {
            return;
        }

        let functions: Vec<UpdateFunctionDesc<C>> = self
            .update_functions
            .iter()
            .filter(|desc| desc.phase == phase && (view.is_simulating() || !desc.only_update_when_simulating))
            .cloned()
            .collect();
        if functions.is_empty() {
            return;
        }

        let storage = &mut self.storage;
        scope.spawn(move |_| {
            for desc in &functions {
                let ranges = storage.partition_mut(desc.granularity);
                tracing::trace!(
                    component = C::type_name(),
                    function = %desc.name,
                    phase = phase.name(),
                    tasks = ranges.len(),
                    "running update function"
                );

                let function = &desc.function;
                rayon::scope(|inner| {
                    for mut range in ranges {
                        inner.spawn(move |_| {
                            let ctx = UpdateContext {
                                phase,
                                first_component_index: range.first_index(),
                                component_count: range.len(),
                                view,
                            };
                            function(&mut range, &ctx);
                        });
                    }
                });
            }
        });
    }

    fn contains(&self, handle: ComponentHandle) -> bool {
        self.position(handle).is_some()
    }

    fn owner_of(&self, handle: ComponentHandle) -> Option<GameObjectHandle> {
        self.try_get(handle).map(ComponentSlot::owner)
    }

    fn flags_of(&self, handle: ComponentHandle) -> Option<ObjectFlags> {
        self.try_get(handle).map(ComponentSlot::flags)
    }

    fn state_of(&self, handle: ComponentHandle) -> Option<ComponentState> {
        self.try_get(handle).map(ComponentSlot::state)
    }

    fn handles(&self) -> Vec<ComponentHandle> {
        self.storage.iter().map(ComponentSlot::handle).collect()
    }

    fn get_dyn(&self, handle: ComponentHandle) -> Option<&dyn Component> {
        self.try_get(handle).map(|slot| &slot.component as &dyn Component)
    }

    fn get_dyn_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Component> {
        self.try_get_mut(handle).map(|slot| &mut slot.component as &mut dyn Component)
    }

    fn set_owner(&mut self, handle: ComponentHandle, owner: GameObjectHandle) -> bool {
        if C::mode() != ComponentMode::Dynamic {
            return false;
        }
        self.try_get_mut(handle).map(|slot| slot.owner = owner).is_some()
    }

    fn set_active_flag(&mut self, handle: ComponentHandle, active: bool) -> bool {
        let Some(slot) = self.try_get_mut(handle) else {
            return false;
        };
        let changed = slot.flags.contains(ObjectFlags::ACTIVE_FLAG) != active;
        slot.flags.set(ObjectFlags::ACTIVE_FLAG, active);
        changed
    }

    fn initialize_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            if slot.flags.intersects(ObjectFlags::INITIALIZED | ObjectFlags::INITIALIZING) {
                return false;
            }
            slot.flags.insert(ObjectFlags::INITIALIZING);
            slot.state = ComponentState::Initializing;
            slot.component.initialize(ctx);
            slot.flags.remove(ObjectFlags::INITIALIZING);
            slot.flags.insert(ObjectFlags::INITIALIZED);
            slot.state = ComponentState::Initialized;
            true
        })
    }

    fn activate_component(
        &mut self,
        handle: ComponentHandle,
        owner_active: bool,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            let ready = slot.is_initialized() && slot.flags.contains(ObjectFlags::ACTIVE_FLAG) && owner_active;
            if !ready || slot.is_active() {
                return false;
            }
            slot.flags.insert(ObjectFlags::ACTIVE_STATE);
            slot.state = ComponentState::Active;
            slot.component.on_activated(ctx);
            true
        })
    }

    fn deactivate_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            if !slot.is_active() {
                return false;
            }
            slot.flags.remove(ObjectFlags::ACTIVE_STATE);
            slot.state = ComponentState::Deactivated;
            slot.component.on_deactivated(ctx);
            true
        })
    }

    fn start_simulation(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            let started = ObjectFlags::SIMULATION_STARTED | ObjectFlags::SIMULATION_STARTING;
            if !slot.is_active() || slot.flags.intersects(started) {
                return false;
            }
            slot.flags.insert(ObjectFlags::SIMULATION_STARTING);
            slot.component.on_simulation_started(ctx);
            slot.flags.remove(ObjectFlags::SIMULATION_STARTING);
            slot.flags.insert(ObjectFlags::SIMULATION_STARTED);
            true
        })
    }

    fn reset_simulation(&mut self) {
        for slot in self.storage.iter_mut() {
            slot.flags.remove(ObjectFlags::SIMULATION_STARTED);
        }
    }

    fn handle_message(
        &mut self,
        handle: ComponentHandle,
        message: &mut dyn Message,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> bool {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            let reachable = slot.is_active() || slot.flags.contains(ObjectFlags::INITIALIZING);
            if !reachable {
                tracing::trace!(component = %handle, ?message, "message discarded, component inactive");
                return false;
            }
            slot.component.handle_message(message, ctx)
        })
    }

    fn unhandled_message(
        &mut self,
        handle: ComponentHandle,
        message: &dyn Message,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) {
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            if slot.is_active() {
                slot.component.on_unhandled_message(message, ctx);
            }
            true
        });
    }

    fn remove_component(
        &mut self,
        handle: ComponentHandle,
        view: &WorldView<'_>,
        follow_ups: &mut Vec<PendingSend>,
    ) -> Option<GameObjectHandle> {
        if !self.contains(handle) {
            return None;
        }

        self.deactivate_component(handle, view, follow_ups);
        self.call_hook(handle, view, follow_ups, |slot, ctx| {
            if slot.is_initialized() {
                slot.component.deinitialize(ctx);
                slot.flags.remove(ObjectFlags::INITIALIZED);
            }
            slot.state = ComponentState::Deleted;
            true
        });

        let position = self.ids.remove(handle.index(), handle.generation())?;
        let removed = self.storage.swap_remove(position)?;
        if removed.moved_from.is_some() {
            if let Some(moved) = self.storage.get(position) {
                self.ids.update(moved.handle.index(), position);
            }
        }

        tracing::debug!(component = %handle, type_name = C::type_name(), "component removed");
        Some(removed.value.owner)
    }

    fn serialize_components(&self, object_indices: &HashMap<GameObjectHandle, u32>) -> ComponentTypeRecord {
        let components = self
            .storage
            .iter()
            .filter_map(|slot| {
                let owner = *object_indices.get(&slot.owner)?;
                let mut writer = ComponentWriter::new(object_indices);
                slot.component.serialize(&mut writer);
                Some(ComponentRecord {
                    owner,
                    active: slot.flags.contains(ObjectFlags::ACTIVE_FLAG),
                    data: writer.into_bytes(),
                })
            })
            .collect();

        ComponentTypeRecord {
            type_name: C::type_name().to_owned(),
            version: C::version(),
            components,
        }
    }

    fn deserialize_component(
        &mut self,
        owner: GameObjectHandle,
        record: &ComponentRecord,
        version: u32,
        objects: &[GameObjectHandle],
    ) -> WorldResult<ComponentHandle> {
        let mut component = C::default();
        let mut reader = ComponentReader::new(&record.data, objects);
        component.deserialize(&mut reader, version)?;
        self.create(owner, component, record.active)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
