//! # Game Objects
//!
//! A game object is a named node in the scene hierarchy. It owns a local
//! transform and a list of attached components; everything else about it
//! (its cached global transform, its effective active state) is derived by
//! the [`ObjectStore`](super::ObjectStore).

use hearth_shared::Transform;

use super::flags::ObjectFlags;
use super::handle::{ComponentHandle, GameObjectHandle, SpatialDataHandle};

/// Creation descriptor for a game object.
///
/// # Example
///
/// ```rust,ignore
/// let desc = GameObjectDesc::new("turret")
///     .with_parent(base)
///     .with_transform(Transform::from_position(Vec3::new(0.0, 2.0, 0.0)))
///     .dynamic();
/// let turret = world.create_object(desc)?;
/// ```
#[derive(Clone, Debug)]
pub struct GameObjectDesc {
    /// Display name, not required to be unique.
    pub name: String,
    /// Parent object, `None` for a root.
    pub parent: Option<GameObjectHandle>,
    /// Transform relative to the parent.
    pub local_transform: Transform,
    /// Initial flags. Lifecycle bits are ignored.
    pub flags: ObjectFlags,
    /// Team / owner id.
    pub team_id: u16,
}

impl GameObjectDesc {
    /// Active, static root object at the origin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: GameObjectHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the local transform.
    #[must_use]
    pub fn with_transform(mut self, local_transform: Transform) -> Self {
        self.local_transform = local_transform;
        self
    }

    /// Adds flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Sets the team id.
    #[must_use]
    pub fn with_team(mut self, team_id: u16) -> Self {
        self.team_id = team_id;
        self
    }

    /// Marks the object as dynamic.
    #[must_use]
    pub fn dynamic(self) -> Self {
        self.with_flags(ObjectFlags::DYNAMIC)
    }

    /// Creates the object inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.flags.remove(ObjectFlags::ACTIVE_FLAG);
        self
    }
}

impl Default for GameObjectDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: None,
            local_transform: Transform::IDENTITY,
            flags: ObjectFlags::NEW_ACTIVE,
            team_id: 0,
        }
    }
}

/// A live game object.
///
/// Obtained by resolving a [`GameObjectHandle`]; never keep the reference
/// past the borrow of the world.
#[derive(Clone, Debug)]
pub struct GameObject {
    pub(crate) handle: GameObjectHandle,
    pub(crate) parent: Option<GameObjectHandle>,
    pub(crate) children: Vec<GameObjectHandle>,
    pub(crate) local_transform: Transform,
    pub(crate) global_transform: Transform,
    /// Set while `global_transform` is stale. A dirty object only has dirty
    /// descendants.
    pub(crate) global_dirty: bool,
    pub(crate) name: String,
    pub(crate) components: Vec<ComponentHandle>,
    pub(crate) flags: ObjectFlags,
    pub(crate) team_id: u16,
    pub(crate) spatial_data: SpatialDataHandle,
}

impl GameObject {
    pub(crate) fn from_desc(handle: GameObjectHandle, desc: GameObjectDesc, parent_active: bool) -> Self {
        let mut flags = desc.flags
            - (ObjectFlags::ACTIVE_STATE
                | ObjectFlags::INITIALIZED
                | ObjectFlags::INITIALIZING
                | ObjectFlags::SIMULATION_STARTED
                | ObjectFlags::SIMULATION_STARTING);
        flags.set(
            ObjectFlags::ACTIVE_STATE,
            parent_active && flags.contains(ObjectFlags::ACTIVE_FLAG),
        );

        Self {
            handle,
            parent: desc.parent,
            children: Vec::new(),
            local_transform: desc.local_transform,
            global_transform: Transform::IDENTITY,
            global_dirty: true,
            name: desc.name,
            components: Vec::new(),
            flags,
            team_id: desc.team_id,
            spatial_data: SpatialDataHandle::INVALID,
        }
    }

    /// Handle of this object.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> GameObjectHandle {
        self.handle
    }

    /// Parent, or `None` for a root.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<GameObjectHandle> {
        self.parent
    }

    /// Children in insertion order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[GameObjectHandle] {
        &self.children
    }

    /// Transform relative to the parent.
    #[inline]
    #[must_use]
    pub const fn local_transform(&self) -> &Transform {
        &self.local_transform
    }

    /// Cached global transform, or `None` while it is stale.
    #[inline]
    #[must_use]
    pub const fn cached_global_transform(&self) -> Option<Transform> {
        if self.global_dirty {
            None
        } else {
            Some(self.global_transform)
        }
    }

    /// Display name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attached components in attachment order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// Current flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Team / owner id.
    #[inline]
    #[must_use]
    pub const fn team_id(&self) -> u16 {
        self.team_id
    }

    /// Entry in an external spatial index, if registered.
    #[inline]
    #[must_use]
    pub const fn spatial_data(&self) -> SpatialDataHandle {
        self.spatial_data
    }

    /// Effective activity (own flag and all ancestors).
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.is_active()
    }

    /// True if the object may move.
    #[inline]
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.flags.intersects(ObjectFlags::DYNAMIC.union(ObjectFlags::FORCE_DYNAMIC))
    }
}
