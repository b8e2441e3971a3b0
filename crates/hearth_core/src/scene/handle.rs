//! # Handles
//!
//! Handles are plain packed integers. They carry no ownership and never keep
//! anything alive; the owning store resolves them by comparing the stored
//! generation of the slot with the generation inside the handle.
//!
//! ```text
//! GameObjectHandle  | unused:16 | world:8 | generation:8 | index:32 |
//! ComponentHandle   | type:16   | world:8 | generation:8 | index:32 |
//! small handles                           | generation:8 | index:24 |
//! ```

use std::fmt;

/// Numeric id of a component type inside one world.
pub type ComponentTypeId = u16;

const INDEX_MASK: u64 = 0xFFFF_FFFF;
const GENERATION_SHIFT: u32 = 32;
const WORLD_SHIFT: u32 = 40;
const TYPE_SHIFT: u32 = 48;

/// Instance index of the invalidated handle.
pub const INVALID_INDEX: u32 = u32::MAX;

#[inline]
const fn pack(index: u32, generation: u8, world_index: u8, type_id: u16) -> u64 {
    (index as u64)
        | ((generation as u64) << GENERATION_SHIFT)
        | ((world_index as u64) << WORLD_SHIFT)
        | ((type_id as u64) << TYPE_SHIFT)
}

/// Generation-checked reference to a game object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GameObjectHandle(u64);

impl GameObjectHandle {
    /// The never-assigned handle.
    pub const INVALID: Self = Self(pack(INVALID_INDEX, 0, 0, 0));

    /// Packs a handle from its parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u8, world_index: u8) -> Self {
        Self(pack(index, generation, world_index, 0))
    }

    /// Instance index inside the object store.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Generation the slot had when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u8 {
        (self.0 >> GENERATION_SHIFT) as u8
    }

    /// Index of the world that issued this handle.
    #[inline]
    #[must_use]
    pub const fn world_index(self) -> u8 {
        (self.0 >> WORLD_SHIFT) as u8
    }

    /// Returns true only for the never-assigned sentinel.
    ///
    /// A handle whose object was deleted is not "invalidated"; ask the world.
    #[inline]
    #[must_use]
    pub const fn is_invalidated(self) -> bool {
        self.index() == INVALID_INDEX && self.generation() == 0
    }

    /// Opaque fixed-size value for boxing across a binding layer.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`to_raw`](Self::to_raw). Revalidate before use.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Default for GameObjectHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for GameObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameObjectHandle({self})")
    }
}

impl fmt::Display for GameObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalidated() {
            return f.write_str("invalid");
        }
        write!(f, "{}:{}@w{}", self.index(), self.generation(), self.world_index())
    }
}

/// Generation-checked reference to a component.
///
/// The type id always names the manager that allocated the component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentHandle(u64);

impl ComponentHandle {
    /// The never-assigned handle.
    pub const INVALID: Self = Self(pack(INVALID_INDEX, 0, 0, 0));

    /// Packs a handle from its parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u8, world_index: u8, type_id: ComponentTypeId) -> Self {
        Self(pack(index, generation, world_index, type_id))
    }

    /// Instance index inside the manager.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Generation the slot had when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u8 {
        (self.0 >> GENERATION_SHIFT) as u8
    }

    /// Index of the world that issued this handle.
    #[inline]
    #[must_use]
    pub const fn world_index(self) -> u8 {
        (self.0 >> WORLD_SHIFT) as u8
    }

    /// Type id of the manager that owns this component.
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> ComponentTypeId {
        (self.0 >> TYPE_SHIFT) as u16
    }

    /// Returns true only for the never-assigned sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalidated(self) -> bool {
        self.index() == INVALID_INDEX && self.generation() == 0
    }

    /// Opaque fixed-size value for boxing across a binding layer.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`to_raw`](Self::to_raw). Revalidate before use.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Default for ComponentHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentHandle({self})")
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalidated() {
            return f.write_str("invalid");
        }
        write!(
            f,
            "{}:{}@w{}/t{}",
            self.index(),
            self.generation(),
            self.world_index(),
            self.type_id()
        )
    }
}

macro_rules! small_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Largest index a small handle can carry.
            pub const MAX_INDEX: u32 = 0x00FF_FFFF;

            /// The never-assigned handle.
            pub const INVALID: Self = Self(Self::MAX_INDEX);

            /// Packs a handle. The index is truncated to 24 bits.
            #[inline]
            #[must_use]
            pub const fn new(index: u32, generation: u8) -> Self {
                Self((index & Self::MAX_INDEX) | ((generation as u32) << 24))
            }

            /// Slot index.
            #[inline]
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0 & Self::MAX_INDEX
            }

            /// Generation the slot had when this handle was issued.
            #[inline]
            #[must_use]
            pub const fn generation(self) -> u8 {
                (self.0 >> 24) as u8
            }

            /// Returns true only for the never-assigned sentinel.
            #[inline]
            #[must_use]
            pub const fn is_invalidated(self) -> bool {
                self.0 == Self::INVALID.0
            }

            /// Opaque packed value.
            #[inline]
            #[must_use]
            pub const fn to_raw(self) -> u32 {
                self.0
            }

            /// Rebuilds a handle from [`to_raw`](Self::to_raw).
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_invalidated() {
                    return write!(f, "{}(invalid)", stringify!($name));
                }
                write!(f, "{}({}:{})", stringify!($name), self.index(), self.generation())
            }
        }
    };
}

small_handle!(
    /// Entry of an object in an external spatial index.
    SpatialDataHandle
);

small_handle!(
    /// Group of components initialized together, possibly over several frames.
    ComponentInitBatchHandle
);
