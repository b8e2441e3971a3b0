//! # HEARTH
//!
//! The engine crate, built on the world model in [`hearth_core`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          HEARTH ENGINE                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  EngineConfig (TOML)                                             │
//! │     │  [world] [scheduler] [game_loop]                           │
//! │     ▼                                                            │
//! │  ┌──────────────┐   update(dt)   ┌──────────┐ ┌──────────┐      │
//! │  │  GameLoop    │───────────────>│ World 0  │ │ World 1  │ ...  │
//! │  │  FrameStats  │<───────────────│ timings  │ │ timings  │      │
//! │  └──────────────┘                └────┬─────┘ └──────────┘      │
//! │                                       │ rayon worker pool        │
//! │                                       ▼                          │
//! │              UnitComponent, ProjectileComponent, BakePreview     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: engine configuration and worker pool setup
//! - `game_loop`: frame orchestration and timing
//! - `gameplay`: components built on the world model

pub mod config;
pub mod error;
pub mod game_loop;
pub mod gameplay;

// Re-export the world model
pub use hearth_core as core;
pub use hearth_shared as shared;

pub use config::{ConfigError, EngineConfig, SchedulerConfig};
pub use error::{EngineError, EngineResult};
pub use game_loop::{FrameStats, FrameStatsAccumulator, GameLoop, GameLoopConfig};
