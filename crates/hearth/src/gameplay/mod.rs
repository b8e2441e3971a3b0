//! # Gameplay Components
//!
//! Components built on the world model:
//! - Units with health, damage and targeting
//! - Projectiles fired by units
//! - A per-world preview baked on a background thread

pub mod bake_preview;
pub mod projectile;
pub mod unit;

pub use bake_preview::{BakeOutcome, BakePreviewComponent, DEFAULT_PREVIEW_RESOLUTION};
pub use projectile::{spawn_projectile, ProjectileComponent, PROJECTILE_LIFETIME_SECONDS, PROJECTILE_NAME};
pub use unit::{
    MsgApplyDamage, MsgGatherUnitStats, MsgSetTarget, MsgStopShooting, MsgUnitDestroyed, MsgUnitHealthStatus,
    UnitComponent, UnitMode, DEFAULT_MAX_HEALTH, SHOT_INTERVAL_SECONDS,
};

use hearth_core::{World, WorldResult};

/// Registers every gameplay component type with a world.
///
/// # Errors
///
/// Fails if the world has no room for more component types.
pub fn register_components(world: &mut World) -> WorldResult<()> {
    world.register_component_type::<UnitComponent>()?;
    world.register_component_type::<ProjectileComponent>()?;
    world.register_component_type::<BakePreviewComponent>()?;
    Ok(())
}
