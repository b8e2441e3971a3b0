//! # Object Store
//!
//! Owns every game object of a world, the hierarchy links between them and
//! their transform caches.
//!
//! ## Transform caching
//!
//! ```text
//! set_local_transform(A)        A*  -> B*  -> C*     (* = dirty)
//! global_transform(C)           walk up to nearest clean ancestor,
//!                               compose downward, cache every step
//! ```
//!
//! A dirty object only ever has dirty descendants, so invalidation stops as
//! soon as it reaches an object that is already dirty.

use hearth_shared::Transform;

use super::flags::{ObjectFlags, VisitorExecution};
use super::handle::{ComponentHandle, GameObjectHandle, SpatialDataHandle};
use super::object::{GameObject, GameObjectDesc};
use crate::error::{WorldError, WorldResult};
use crate::memory::{BlockStorage, IdTable};

/// An object taken out of the store by [`ObjectStore::remove`].
#[derive(Debug)]
pub struct RemovedObject {
    /// The object, with an empty child list.
    pub object: GameObject,
    /// Former children (and their subtrees) whose effective active state
    /// changed because they moved to a new parent.
    pub activity_changes: Vec<(GameObjectHandle, bool)>,
}

/// Storage and hierarchy of the game objects of one world.
pub struct ObjectStore {
    world_index: u8,
    ids: IdTable,
    objects: BlockStorage<GameObject>,
    roots: Vec<GameObjectHandle>,
}

impl ObjectStore {
    /// Creates an empty store for the world with index `world_index`.
    #[must_use]
    pub fn new(world_index: u8, block_size_bytes: usize) -> Self {
        Self {
            world_index,
            ids: IdTable::new(),
            objects: BlockStorage::new(block_size_bytes),
            roots: Vec::new(),
        }
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store holds no object.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Root objects in creation order.
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[GameObjectHandle] {
        &self.roots
    }

    /// Iterates over all objects in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    #[inline]
    fn position(&self, handle: GameObjectHandle) -> Option<u32> {
        if handle.world_index() != self.world_index {
            return None;
        }
        self.ids.get(handle.index(), handle.generation())
    }

    /// Creates an object and links it below its parent (or as a new root).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidObject`] if the requested parent does not
    /// resolve.
    pub fn create(&mut self, desc: GameObjectDesc) -> WorldResult<GameObjectHandle> {
        let parent_active = match desc.parent {
            Some(parent) => self
                .try_get(parent)
                .map(GameObject::is_active)
                .ok_or_else(|| WorldError::InvalidObject(parent.to_string()))?,
            None => true,
        };

        let position = self.objects.len() as u32;
        let (index, generation) = self.ids.insert(position);
        let handle = GameObjectHandle::new(index, generation, self.world_index);
        let parent = desc.parent;

        let stored = self.objects.push(GameObject::from_desc(handle, desc, parent_active));
        debug_assert_eq!(stored, position);

        match parent.and_then(|p| self.get_mut(p)) {
            Some(parent) => parent.children.push(handle),
            None => self.roots.push(handle),
        }

        tracing::debug!(object = %handle, "game object created");
        Ok(handle)
    }

    /// Resolves a handle.
    #[inline]
    #[must_use]
    pub fn try_get(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        self.objects.get(self.position(handle)?)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: GameObjectHandle) -> Option<&mut GameObject> {
        let position = self.position(handle)?;
        self.objects.get_mut(position)
    }

    /// Returns true if the handle resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: GameObjectHandle) -> bool {
        self.position(handle).is_some()
    }

    /// Parent of an object.
    #[must_use]
    pub fn parent(&self, handle: GameObjectHandle) -> Option<GameObjectHandle> {
        self.try_get(handle)?.parent
    }

    /// Children of an object, empty if the handle is stale.
    #[must_use]
    pub fn children(&self, handle: GameObjectHandle) -> &[GameObjectHandle] {
        self.try_get(handle)
            .map(|object| object.children.as_slice())
            .unwrap_or_default()
    }

    /// Returns true if `ancestor` is `handle` itself or above it.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: GameObjectHandle, handle: GameObjectHandle) -> bool {
        let mut current = Some(handle);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Depth-first pre-order traversal starting at `start` (or at every root
    /// when `start` is `None`).
    ///
    /// Returns false if the visitor stopped the traversal.
    pub fn visit_depth_first<F>(&self, start: Option<GameObjectHandle>, mut visitor: F) -> bool
    where
        F: FnMut(&GameObject) -> VisitorExecution,
    {
        let mut stack: Vec<GameObjectHandle> = match start {
            Some(handle) => vec![handle],
            None => self.roots.iter().rev().copied().collect(),
        };

        while let Some(handle) = stack.pop() {
            let Some(object) = self.try_get(handle) else {
                continue;
            };
            match visitor(object) {
                VisitorExecution::Continue => stack.extend(object.children.iter().rev().copied()),
                VisitorExecution::Skip => {}
                VisitorExecution::Stop => return false,
            }
        }
        true
    }

    /// `handle` followed by all its descendants in depth-first pre-order.
    #[must_use]
    pub fn subtree(&self, handle: GameObjectHandle) -> Vec<GameObjectHandle> {
        let mut nodes = Vec::new();
        self.visit_depth_first(Some(handle), |object| {
            nodes.push(object.handle);
            VisitorExecution::Continue
        });
        nodes
    }

    /// Finds a child by name; with `recursive` the whole subtree is searched
    /// in depth-first pre-order.
    #[must_use]
    pub fn find_child_by_name(&self, parent: GameObjectHandle, name: &str, recursive: bool) -> Option<GameObjectHandle> {
        let mut found = None;
        for &child in self.children(parent) {
            self.visit_depth_first(Some(child), |object| {
                if object.name == name {
                    found = Some(object.handle);
                    return VisitorExecution::Stop;
                }
                if recursive {
                    VisitorExecution::Continue
                } else {
                    VisitorExecution::Skip
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// Moves `child` below `parent` (`None` = make it a root).
    ///
    /// With `keep_global` the local transform is rewritten so the object does
    /// not move in world space.
    ///
    /// Returns the objects whose effective active state changed.
    ///
    /// # Errors
    ///
    /// Fails if either handle is stale or if `parent` lies in the subtree of
    /// `child`.
    pub fn set_parent(
        &mut self,
        child: GameObjectHandle,
        parent: Option<GameObjectHandle>,
        keep_global: bool,
    ) -> WorldResult<Vec<(GameObjectHandle, bool)>> {
        let old_parent = self
            .try_get(child)
            .ok_or_else(|| WorldError::InvalidObject(child.to_string()))?
            .parent;

        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(WorldError::InvalidObject(parent.to_string()));
            }
            if self.is_ancestor_or_self(child, parent) {
                return Err(WorldError::HierarchyCycle {
                    child: child.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        if old_parent == parent {
            return Ok(Vec::new());
        }

        let global = keep_global.then(|| self.global_transform(child)).flatten();

        self.detach(child, old_parent);
        self.attach(child, parent, None);
        if let Some(global) = global {
            self.write_local_for_global(child, parent, &global);
        }
        self.invalidate_subtree(child);
        Ok(self.refresh_active_state(child))
    }

    /// Unlinks `handle` from its parent (or the root list). Returns the
    /// position it occupied among its siblings.
    fn detach(&mut self, handle: GameObjectHandle, parent: Option<GameObjectHandle>) -> Option<usize> {
        let siblings = match parent {
            Some(parent) => &mut self.get_mut(parent)?.children,
            None => &mut self.roots,
        };
        let position = siblings.iter().position(|&h| h == handle)?;
        siblings.remove(position);
        Some(position)
    }

    fn attach(&mut self, handle: GameObjectHandle, parent: Option<GameObjectHandle>, at: Option<usize>) {
        let parent = parent.filter(|&p| self.contains(p));
        let siblings = match parent {
            Some(parent) => match self.get_mut(parent) {
                Some(object) => &mut object.children,
                None => return,
            },
            None => &mut self.roots,
        };
        match at {
            Some(at) if at <= siblings.len() => siblings.insert(at, handle),
            _ => siblings.push(handle),
        }
        if let Some(object) = self.get_mut(handle) {
            object.parent = parent;
        }
    }

    fn write_local_for_global(&mut self, handle: GameObjectHandle, parent: Option<GameObjectHandle>, global: &Transform) {
        let parent_global = parent
            .and_then(|p| self.global_transform(p))
            .unwrap_or(Transform::IDENTITY);
        let local = parent_global.inverse().compose(global);
        if let Some(object) = self.get_mut(handle) {
            object.local_transform = local;
        }
    }

    /// Removes an object.
    ///
    /// Children move to the removed object's parent (or become roots) at the
    /// position the removed object occupied, keeping their global
    /// transforms. The slot is freed and its generation bumped.
    ///
    /// Returns `None` if the handle was stale.
    pub fn remove(&mut self, handle: GameObjectHandle) -> Option<RemovedObject> {
        let (parent, children) = {
            let object = self.try_get(handle)?;
            (object.parent, object.children.clone())
        };

        let globals: Vec<Option<Transform>> = children.iter().map(|&c| self.global_transform(c)).collect();
        let slot = self.detach(handle, parent);
        let mut activity_changes = Vec::new();

        for (offset, (&child, global)) in children.iter().zip(globals).enumerate() {
            self.attach(child, parent, slot.map(|s| s + offset));
            if let Some(global) = global {
                self.write_local_for_global(child, parent, &global);
            }
            self.invalidate_subtree(child);
            activity_changes.extend(self.refresh_active_state(child));
        }

        let position = self.ids.remove(handle.index(), handle.generation())?;
        let removed = self.objects.swap_remove(position)?;
        if removed.moved_from.is_some() {
            if let Some(moved) = self.objects.get(position) {
                self.ids.update(moved.handle.index(), position);
            }
        }

        let mut object = removed.value;
        object.children.clear();
        tracing::debug!(object = %handle, "game object removed");
        Some(RemovedObject {
            object,
            activity_changes,
        })
    }

    /// Replaces the local transform and invalidates the subtree.
    pub fn set_local_transform(&mut self, handle: GameObjectHandle, local: Transform) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        object.local_transform = local;
        self.invalidate_subtree(handle);
        true
    }

    fn invalidate_subtree(&mut self, handle: GameObjectHandle) {
        let mut stack = vec![handle];
        while let Some(node) = stack.pop() {
            let Some(object) = self.get_mut(node) else {
                continue;
            };
            if object.global_dirty {
                continue;
            }
            object.global_dirty = true;
            stack.extend(object.children.iter().copied());
        }
    }

    /// Global transform of an object, refreshing stale caches on the way.
    pub fn global_transform(&mut self, handle: GameObjectHandle) -> Option<Transform> {
        let object = self.try_get(handle)?;
        if !object.global_dirty {
            return Some(object.global_transform);
        }

        // Dirty chain from `handle` up to (excluding) the nearest clean ancestor
        let mut chain = vec![handle];
        let mut base = Transform::IDENTITY;
        let mut current = object.parent;
        while let Some(node) = current {
            let Some(ancestor) = self.try_get(node) else {
                break;
            };
            if !ancestor.global_dirty {
                base = ancestor.global_transform;
                break;
            }
            chain.push(node);
            current = ancestor.parent;
        }

        for node in chain.into_iter().rev() {
            if let Some(object) = self.get_mut(node) {
                base = base.compose(&object.local_transform);
                object.global_transform = base;
                object.global_dirty = false;
            }
        }
        Some(base)
    }

    /// Global transform without touching any cache.
    #[must_use]
    pub fn compute_global_transform(&self, handle: GameObjectHandle) -> Option<Transform> {
        let object = self.try_get(handle)?;
        if !object.global_dirty {
            return Some(object.global_transform);
        }

        let mut locals = vec![object.local_transform];
        let mut base = Transform::IDENTITY;
        let mut current = object.parent;
        while let Some(ancestor) = current.and_then(|node| self.try_get(node)) {
            if !ancestor.global_dirty {
                base = ancestor.global_transform;
                break;
            }
            locals.push(ancestor.local_transform);
            current = ancestor.parent;
        }

        Some(locals.iter().rev().fold(base, |global, local| global.compose(local)))
    }

    /// Moves an object so that its global transform becomes `global`.
    pub fn set_global_transform(&mut self, handle: GameObjectHandle, global: Transform) -> bool {
        let Some(parent) = self.try_get(handle).map(|object| object.parent) else {
            return false;
        };
        self.write_local_for_global(handle, parent, &global);
        self.invalidate_subtree(handle);
        true
    }

    /// Refreshes every stale global transform. Returns how many were stale.
    pub fn update_global_transforms(&mut self) -> usize {
        let dirty: Vec<GameObjectHandle> = self
            .objects
            .iter()
            .filter(|object| object.global_dirty)
            .map(|object| object.handle)
            .collect();
        for &handle in &dirty {
            self.global_transform(handle);
        }
        dirty.len()
    }

    /// Sets the own active flag of an object and recomputes the effective
    /// active state of its subtree.
    ///
    /// Returns every object whose effective state changed, with its new
    /// state, in depth-first pre-order.
    pub fn set_active_flag(&mut self, handle: GameObjectHandle, active: bool) -> Vec<(GameObjectHandle, bool)> {
        let Some(object) = self.get_mut(handle) else {
            return Vec::new();
        };
        object.flags.set(ObjectFlags::ACTIVE_FLAG, active);
        self.refresh_active_state(handle)
    }

    fn refresh_active_state(&mut self, handle: GameObjectHandle) -> Vec<(GameObjectHandle, bool)> {
        let parent_active = self
            .parent(handle)
            .and_then(|parent| self.try_get(parent))
            .map_or(true, GameObject::is_active);

        let mut changed = Vec::new();
        let mut stack = vec![(handle, parent_active)];
        while let Some((node, parent_active)) = stack.pop() {
            let Some(object) = self.get_mut(node) else {
                continue;
            };
            let state = parent_active && object.flags.contains(ObjectFlags::ACTIVE_FLAG);
            if state == object.is_active() {
                continue;
            }
            object.flags.set(ObjectFlags::ACTIVE_STATE, state);
            changed.push((node, state));
            stack.extend(object.children.iter().rev().map(|&child| (child, state)));
        }
        changed
    }

    /// Renames an object.
    pub fn set_name(&mut self, handle: GameObjectHandle, name: impl Into<String>) -> bool {
        self.get_mut(handle).map(|object| object.name = name.into()).is_some()
    }

    /// Changes the team id of an object.
    pub fn set_team_id(&mut self, handle: GameObjectHandle, team_id: u16) -> bool {
        self.get_mut(handle).map(|object| object.team_id = team_id).is_some()
    }

    /// Stores the entry an external spatial index assigned to the object.
    pub fn set_spatial_data(&mut self, handle: GameObjectHandle, spatial_data: SpatialDataHandle) -> bool {
        self.get_mut(handle).map(|object| object.spatial_data = spatial_data).is_some()
    }

    /// Sets or clears user and notification flags. Lifecycle and activity
    /// bits are owned by the world and are ignored here.
    pub fn set_flags(&mut self, handle: GameObjectHandle, flags: ObjectFlags, enabled: bool) -> bool {
        let settable = ObjectFlags::USER_FLAGS
            | ObjectFlags::FORCE_DYNAMIC
            | ObjectFlags::DYNAMIC
            | ObjectFlags::UNHANDLED_MESSAGE_HANDLER
            | ObjectFlags::CHILD_CHANGES_NOTIFICATIONS
            | ObjectFlags::COMPONENT_CHANGES_NOTIFICATIONS
            | ObjectFlags::STATIC_TRANSFORM_CHANGES_NOTIFICATIONS;
        self.get_mut(handle)
            .map(|object| object.flags.set(flags & settable, enabled))
            .is_some()
    }

    pub(crate) fn link_component(&mut self, owner: GameObjectHandle, component: ComponentHandle) -> bool {
        self.get_mut(owner).map(|object| object.components.push(component)).is_some()
    }

    pub(crate) fn unlink_component(&mut self, owner: GameObjectHandle, component: ComponentHandle) {
        if let Some(object) = self.get_mut(owner) {
            object.components.retain(|&c| c != component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_shared::{Quaternion, Vec3};

    const EPS: f32 = 1e-4;

    fn store() -> ObjectStore {
        ObjectStore::new(0, 1024)
    }

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vec3::new(x, y, z))
    }

    #[test]
    fn test_create_and_resolve() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.roots(), &[a]);
        assert_eq!(store.children(a), &[b]);
        assert_eq!(store.parent(b), Some(a));
        assert_eq!(store.try_get(b).unwrap().name(), "b");
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut store = store();
        let old = store.create(GameObjectDesc::new("old")).unwrap();
        store.remove(old).unwrap();

        let new = store.create(GameObjectDesc::new("new")).unwrap();
        assert_eq!(old.index(), new.index());
        assert!(store.try_get(old).is_none());
        assert!(store.contains(new));
        assert!(store.remove(old).is_none());
    }

    #[test]
    fn test_create_with_stale_parent_fails() {
        let mut store = store();
        let parent = store.create(GameObjectDesc::new("p")).unwrap();
        store.remove(parent);
        let result = store.create(GameObjectDesc::new("c").with_parent(parent));
        assert!(matches!(result, Err(WorldError::InvalidObject(_))));
    }

    #[test]
    fn test_remove_reparents_children_in_place() {
        let mut store = store();
        let root = store.create(GameObjectDesc::new("root")).unwrap();
        let first = store.create(GameObjectDesc::new("first").with_parent(root)).unwrap();
        let a = store
            .create(GameObjectDesc::new("a").with_parent(root).with_transform(at(10.0, 0.0, 0.0)))
            .unwrap();
        let last = store.create(GameObjectDesc::new("last").with_parent(root)).unwrap();
        let b = store
            .create(GameObjectDesc::new("b").with_parent(a).with_transform(at(1.0, 0.0, 0.0)))
            .unwrap();
        let c = store.create(GameObjectDesc::new("c").with_parent(a)).unwrap();

        store.remove(a).unwrap();

        assert_eq!(store.children(root), &[first, b, c, last]);
        assert_eq!(store.parent(b), Some(root));
        let global = store.global_transform(b).unwrap();
        assert!(global.position.approx_eq(Vec3::new(11.0, 0.0, 0.0), EPS));
    }

    #[test]
    fn test_remove_root_promotes_children() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();
        store.remove(a);
        assert_eq!(store.roots(), &[b]);
        assert_eq!(store.parent(b), None);
    }

    #[test]
    fn test_remove_reports_activity_changes() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a").inactive()).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();
        assert!(!store.try_get(b).unwrap().is_active());

        let removed = store.remove(a).unwrap();
        assert_eq!(removed.object.handle(), a);
        assert_eq!(removed.activity_changes, vec![(b, true)]);
    }

    #[test]
    fn test_remove_patches_moved_object() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let _b = store.create(GameObjectDesc::new("b")).unwrap();
        let c = store.create(GameObjectDesc::new("c")).unwrap();

        // c moves into a's storage position
        store.remove(a);
        assert_eq!(store.try_get(c).unwrap().name(), "c");
    }

    #[test]
    fn test_set_parent_refuses_cycle() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();
        let c = store.create(GameObjectDesc::new("c").with_parent(b)).unwrap();

        assert!(matches!(store.set_parent(a, Some(c), false), Err(WorldError::HierarchyCycle { .. })));
        assert!(matches!(store.set_parent(a, Some(a), false), Err(WorldError::HierarchyCycle { .. })));
        assert_eq!(store.parent(a), None);
    }

    #[test]
    fn test_set_parent_keep_global() {
        let mut store = store();
        let p = store
            .create(GameObjectDesc::new("p").with_transform(Transform::new(
                Vec3::new(5.0, 0.0, 0.0),
                Quaternion::from_axis_angle(Vec3::Y, 1.0),
                2.0,
            )))
            .unwrap();
        let o = store.create(GameObjectDesc::new("o").with_transform(at(1.0, 2.0, 3.0))).unwrap();

        store.set_parent(o, Some(p), true).unwrap();
        assert!(store.global_transform(o).unwrap().approx_eq(&at(1.0, 2.0, 3.0), EPS));
        assert_eq!(store.roots(), &[p]);

        store.set_parent(o, None, false).unwrap();
        assert_eq!(store.roots(), &[p, o]);
    }

    #[test]
    fn test_global_transform_lazy_and_idempotent() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a").with_transform(at(1.0, 0.0, 0.0))).unwrap();
        let b = store
            .create(GameObjectDesc::new("b").with_parent(a).with_transform(at(0.0, 1.0, 0.0)))
            .unwrap();

        assert!(store.try_get(b).unwrap().cached_global_transform().is_none());
        assert_eq!(store.compute_global_transform(b), Some(at(1.0, 1.0, 0.0)));
        // Pure path leaves caches alone
        assert!(store.try_get(b).unwrap().cached_global_transform().is_none());

        let first = store.global_transform(b).unwrap();
        let second = store.global_transform(b).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.try_get(a).unwrap().cached_global_transform(), Some(at(1.0, 0.0, 0.0)));

        store.set_local_transform(a, at(2.0, 0.0, 0.0));
        assert!(store.try_get(b).unwrap().cached_global_transform().is_none());
        assert_eq!(store.update_global_transforms(), 2);
        assert_eq!(store.try_get(b).unwrap().cached_global_transform(), Some(at(2.0, 1.0, 0.0)));
    }

    #[test]
    fn test_set_global_transform_moves_descendants() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a").with_transform(at(1.0, 0.0, 0.0))).unwrap();
        let b = store
            .create(GameObjectDesc::new("b").with_parent(a).with_transform(at(0.0, 0.0, 1.0)))
            .unwrap();
        let c = store
            .create(GameObjectDesc::new("c").with_parent(b).with_transform(at(0.0, 1.0, 0.0)))
            .unwrap();
        store.update_global_transforms();

        let target = Transform::new(Vec3::new(0.0, 10.0, 0.0), Quaternion::from_axis_angle(Vec3::Z, 0.5), 3.0);
        store.set_global_transform(b, target);

        assert!(store.global_transform(b).unwrap().approx_eq(&target, EPS));
        let expected = target.compose(&at(0.0, 1.0, 0.0));
        assert!(store.global_transform(c).unwrap().approx_eq(&expected, EPS));
    }

    #[test]
    fn test_active_state_propagates() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();
        let c = store.create(GameObjectDesc::new("c").with_parent(b).inactive()).unwrap();

        assert!(store.try_get(b).unwrap().is_active());
        assert!(!store.try_get(c).unwrap().is_active());

        let changed = store.set_active_flag(a, false);
        assert_eq!(changed, vec![(a, false), (b, false)]);

        let changed = store.set_active_flag(c, true);
        assert!(changed.is_empty());

        let changed = store.set_active_flag(a, true);
        assert_eq!(changed, vec![(a, true), (b, true), (c, true)]);
    }

    #[test]
    fn test_visitor_skip_and_stop() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let a1 = store.create(GameObjectDesc::new("a1").with_parent(a)).unwrap();
        let _a11 = store.create(GameObjectDesc::new("a11").with_parent(a1)).unwrap();
        let a2 = store.create(GameObjectDesc::new("a2").with_parent(a)).unwrap();
        let b = store.create(GameObjectDesc::new("b")).unwrap();

        let mut seen = Vec::new();
        store.visit_depth_first(None, |object| {
            seen.push(object.handle());
            if object.handle() == a1 {
                VisitorExecution::Skip
            } else {
                VisitorExecution::Continue
            }
        });
        assert_eq!(seen, vec![a, a1, a2, b]);

        let mut count = 0;
        let completed = store.visit_depth_first(None, |_| {
            count += 1;
            if count == 2 {
                VisitorExecution::Stop
            } else {
                VisitorExecution::Continue
            }
        });
        assert!(!completed);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_find_child_by_name() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        let b = store.create(GameObjectDesc::new("b").with_parent(a)).unwrap();
        let deep = store.create(GameObjectDesc::new("deep").with_parent(b)).unwrap();

        assert_eq!(store.find_child_by_name(a, "b", false), Some(b));
        assert_eq!(store.find_child_by_name(a, "deep", false), None);
        assert_eq!(store.find_child_by_name(a, "deep", true), Some(deep));
    }

    #[test]
    fn test_set_flags_ignores_lifecycle_bits() {
        let mut store = store();
        let a = store.create(GameObjectDesc::new("a")).unwrap();
        store.set_flags(a, ObjectFlags::USER_FLAG_2 | ObjectFlags::INITIALIZED, true);

        let flags = store.try_get(a).unwrap().flags();
        assert!(flags.contains(ObjectFlags::USER_FLAG_2));
        assert!(!flags.contains(ObjectFlags::INITIALIZED));
    }
}
