//! # HEARTH Shared
//!
//! Value types used across the world model, the engine crate and gameplay
//! code.
//!
//! ## RULE
//!
//! This crate holds plain data only: no world state, no threads, no I/O.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_INIT_BATCH_BUDGET, DEFAULT_MAX_DELTA_SECONDS, DEFAULT_TARGET_FPS,
    MAX_COMPONENT_TYPES, MAX_WORLDS,
};
pub use math::{Quaternion, Transform, Vec3};
