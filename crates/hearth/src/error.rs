//! # Engine Error Types

use hearth_core::WorldError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while setting up or driving worlds.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A world operation failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Another world already uses this index.
    #[error("world index {0} is already in use")]
    DuplicateWorldIndex(u8),

    /// Every world index is taken.
    #[error("world limit of {0} reached")]
    TooManyWorlds(usize),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
