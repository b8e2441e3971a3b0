//! # World Error Types
//!
//! Errors returned by fallible world operations.
//!
//! Stale handles are not errors: lookups return `Option` or `bool`.

use thiserror::Error;

/// Errors that can occur while building or mutating a world.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The game object handle does not resolve.
    #[error("game object {0} does not exist")]
    InvalidObject(String),

    /// The component handle does not resolve.
    #[error("component {0} does not exist")]
    InvalidComponent(String),

    /// A second instance of a singleton component type was requested.
    #[error("singleton component {type_name} already exists in this world")]
    SingletonAlreadyExists {
        /// Name of the component type.
        type_name: &'static str,
    },

    /// The component type was never registered with the world.
    #[error("component type {0} is not registered")]
    UnknownComponentType(String),

    /// No more component type ids are available.
    #[error("component type limit of {0} reached")]
    TooManyComponentTypes(usize),

    /// Setting this parent would make an object its own ancestor.
    #[error("cannot parent {child} beneath its descendant {parent}")]
    HierarchyCycle {
        /// Object being moved.
        child: String,
        /// Requested parent.
        parent: String,
    },

    /// A static component tried to move its owner.
    #[error("static component {0} cannot move its owner")]
    StaticComponentMove(String),

    /// The initialization batch handle does not resolve.
    #[error("initialization batch {0} does not exist")]
    InvalidInitBatch(String),

    /// Serialized data could not be read.
    #[error("malformed serialized data: {reason}")]
    MalformedData {
        /// What went wrong.
        reason: String,
    },
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
