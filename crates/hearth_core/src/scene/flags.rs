//! # Object Flags and Lifecycle Enums
//!
//! Flag set shared by game objects and components, plus the small enums that
//! describe lifecycle state, traversal control and component mobility.

use bitflags::bitflags;

bitflags! {
    /// State bits of a game object or component.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u32 {
        /// The object may move at runtime.
        const DYNAMIC = 1 << 0;
        /// Keep the object dynamic even if all its components are static.
        const FORCE_DYNAMIC = 1 << 1;
        /// Requested activity of the object itself.
        const ACTIVE_FLAG = 1 << 2;
        /// Effective activity: own flag and every ancestor's flag.
        const ACTIVE_STATE = 1 << 3;
        /// `initialize` has completed.
        const INITIALIZED = 1 << 4;
        /// `initialize` is running.
        const INITIALIZING = 1 << 5;
        /// `on_simulation_started` has completed for the current run.
        const SIMULATION_STARTED = 1 << 6;
        /// `on_simulation_started` is running.
        const SIMULATION_STARTING = 1 << 7;
        /// Messages nobody handled are reported to the components of the object.
        const UNHANDLED_MESSAGE_HANDLER = 1 << 8;
        /// Send `MsgChildrenChanged` when children are attached or detached.
        const CHILD_CHANGES_NOTIFICATIONS = 1 << 9;
        /// Send `MsgComponentsChanged` when components are added or removed.
        const COMPONENT_CHANGES_NOTIFICATIONS = 1 << 10;
        /// Send `MsgTransformChanged` even for static objects.
        const STATIC_TRANSFORM_CHANGES_NOTIFICATIONS = 1 << 11;

        /// Free for gameplay code.
        const USER_FLAG_0 = 1 << 24;
        /// Free for gameplay code.
        const USER_FLAG_1 = 1 << 25;
        /// Free for gameplay code.
        const USER_FLAG_2 = 1 << 26;
        /// Free for gameplay code.
        const USER_FLAG_3 = 1 << 27;
        /// Free for gameplay code.
        const USER_FLAG_4 = 1 << 28;
        /// Free for gameplay code.
        const USER_FLAG_5 = 1 << 29;
        /// Free for gameplay code.
        const USER_FLAG_6 = 1 << 30;
        /// Free for gameplay code.
        const USER_FLAG_7 = 1 << 31;

        /// All user flags.
        const USER_FLAGS = 0xFF00_0000;
    }
}

impl ObjectFlags {
    /// Default flags of a freshly created object or component.
    pub const NEW_ACTIVE: Self = Self::ACTIVE_FLAG;

    /// The user flag with the given number (0..8).
    #[must_use]
    pub const fn user_flag(number: u8) -> Self {
        Self::from_bits_retain(1 << (24 + (number & 7) as u32))
    }

    /// Returns true if the effective active state is set.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        self.contains(Self::ACTIVE_STATE)
    }
}

/// Whether a component may move its owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComponentMode {
    /// Never moves its owner.
    #[default]
    Static,
    /// May move its owner; makes the owner dynamic.
    Dynamic,
}

/// Lifecycle state of a component.
///
/// ```text
/// None -> Initializing -> Initialized -> Active <-> Deactivated -> Deleted
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// Created, not yet initialized.
    #[default]
    None,
    /// `initialize` is running.
    Initializing,
    /// Initialized but never activated.
    Initialized,
    /// Active.
    Active,
    /// Was active, now inactive.
    Deactivated,
    /// Removed from its manager.
    Deleted,
}

/// Result of a hierarchy visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitorExecution {
    /// Visit children, then continue.
    Continue,
    /// Do not descend into the children of this node.
    Skip,
    /// End the traversal.
    Stop,
}
