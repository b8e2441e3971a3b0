//! # Units
//!
//! A unit has health, takes damage through messages and can be told to
//! shoot at another unit or at a position.
//!
//! ```text
//! MsgApplyDamage ──► UnitComponent ──► MsgUnitHealthStatus (owner subtree)
//!                          │
//!                          └─ health == 0 ──► MsgUnitDestroyed (owner)
//!                                             delete owner at frame end
//! ```
//!
//! A unit with a target fires a projectile every [`SHOT_INTERVAL_SECONDS`].

use hearth_core::scene::{
    Component, ComponentContext, ComponentManager, ComponentMode, ComponentReader, ComponentWriter, GameObject,
    GameObjectDesc, GameObjectHandle, Message, UpdateFunctionDesc, UpdatePhase,
};
use hearth_core::WorldResult;
use hearth_shared::{Transform, Vec3};

use super::projectile::spawn_projectile;

/// Health a unit gets unless configured otherwise.
pub const DEFAULT_MAX_HEALTH: u16 = 100;

/// Seconds between two shots.
pub const SHOT_INTERVAL_SECONDS: f64 = 0.75;

/// What a unit is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum UnitMode {
    /// Nothing.
    #[default]
    Idle,
    /// Shooting at another object.
    ShootAtUnit(GameObjectHandle),
    /// Shooting at a point.
    ShootAtPosition(Vec3),
}

impl UnitMode {
    fn tag(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::ShootAtUnit(_) => 1,
            Self::ShootAtPosition(_) => 2,
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Deals damage to a unit. Negative damage heals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgApplyDamage {
    /// Amount of health to remove.
    pub damage: i32,
}

impl Message for MsgApplyDamage {}

/// Sent to the unit's whole subtree after its health changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgUnitHealthStatus {
    /// Health after the change.
    pub cur_health: u16,
    /// Maximum health.
    pub max_health: u16,
    /// New minus old health.
    pub difference: i32,
}

impl Message for MsgUnitHealthStatus {}

/// Sent to the unit's object when its health reaches zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgUnitDestroyed {
    /// The destroyed unit.
    pub unit: GameObjectHandle,
}

impl Message for MsgUnitDestroyed {}

/// Collects health numbers from a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgGatherUnitStats {
    /// Filled with the current health.
    pub cur_health: u16,
    /// Filled with the maximum health.
    pub max_health: u16,
}

impl Message for MsgGatherUnitStats {}

/// Tells a unit what to shoot at. A valid `object` wins over `position`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MsgSetTarget {
    /// Object to shoot at.
    pub object: GameObjectHandle,
    /// Point to shoot at when `object` is invalidated.
    pub position: Vec3,
}

impl Default for MsgSetTarget {
    fn default() -> Self {
        Self {
            object: GameObjectHandle::INVALID,
            position: Vec3::ZERO,
        }
    }
}

impl Message for MsgSetTarget {}

/// Stops a unit from shooting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgStopShooting;

impl Message for MsgStopShooting {}

// =============================================================================
// COMPONENT
// =============================================================================

/// Health and targeting of a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitComponent {
    /// Maximum health.
    pub max_health: u16,
    /// Current health; 0 before the simulation starts means "full".
    pub cur_health: u16,
    /// Name of an object spawned where the unit was destroyed; empty for
    /// none.
    pub on_destroyed_spawn: String,
    mode: UnitMode,
    last_shot_seconds: Option<f64>,
    shots_fired: u32,
}

impl Default for UnitComponent {
    fn default() -> Self {
        Self {
            max_health: DEFAULT_MAX_HEALTH,
            cur_health: 0,
            on_destroyed_spawn: String::new(),
            mode: UnitMode::Idle,
            last_shot_seconds: None,
            shots_fired: 0,
        }
    }
}

impl UnitComponent {
    /// A unit with the given health values.
    #[must_use]
    pub fn new(max_health: u16, cur_health: u16) -> Self {
        Self {
            max_health,
            cur_health,
            ..Self::default()
        }
    }

    /// Current targeting mode.
    #[must_use]
    pub const fn mode(&self) -> UnitMode {
        self.mode
    }

    /// Shots fired since creation.
    #[must_use]
    pub const fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    fn apply_damage(&mut self, damage: i32, ctx: &mut ComponentContext<'_>) {
        let last_health = i32::from(self.cur_health);
        let health = last_health.saturating_sub(damage).clamp(0, i32::from(self.max_health));
        self.cur_health = u16::try_from(health).unwrap_or(0);

        let owner = ctx.owner();
        ctx.send_message_recursive(
            owner,
            MsgUnitHealthStatus {
                cur_health: self.cur_health,
                max_health: self.max_health,
                difference: health - last_health,
            },
        );

        if self.cur_health == 0 {
            self.on_destroyed(ctx);
        }
    }

    fn on_destroyed(&mut self, ctx: &mut ComponentContext<'_>) {
        let owner = ctx.owner();
        tracing::debug!(unit = %owner, "unit destroyed");
        ctx.send_message(owner, MsgUnitDestroyed { unit: owner });

        if !self.on_destroyed_spawn.is_empty() {
            let name = self.on_destroyed_spawn.clone();
            let transform = ctx.owner_global_transform().unwrap_or(Transform::IDENTITY);
            let team = ctx.owner_object().map_or(0, GameObject::team_id);
            ctx.commands().defer(move |world| {
                let desc = GameObjectDesc::new(name).with_transform(transform).with_team(team);
                if let Err(e) = world.create_object(desc) {
                    tracing::warn!(error = %e, "failed to spawn destruction object");
                }
            });
        }

        ctx.delete_object_delayed(owner);
    }

    fn set_target(&mut self, msg: &MsgSetTarget) {
        self.mode = if msg.object.is_invalidated() {
            UnitMode::ShootAtPosition(msg.position)
        } else {
            UnitMode::ShootAtUnit(msg.object)
        };
    }

    /// Drops a target that died or is the unit itself, then fires when the
    /// shot interval has passed. Returns the target of the fired shot.
    fn update_unit(
        &mut self,
        owner: GameObjectHandle,
        now: f64,
        target_alive: impl Fn(GameObjectHandle) -> bool,
    ) -> Option<MsgSetTarget> {
        if let UnitMode::ShootAtUnit(target) = self.mode {
            if target == owner || !target_alive(target) {
                self.mode = UnitMode::Idle;
            }
        }

        let shot = match self.mode {
            UnitMode::Idle => return None,
            UnitMode::ShootAtUnit(object) => MsgSetTarget {
                object,
                ..MsgSetTarget::default()
            },
            UnitMode::ShootAtPosition(position) => MsgSetTarget {
                position,
                ..MsgSetTarget::default()
            },
        };
        let ready = self
            .last_shot_seconds
            .map_or(true, |last| now - last >= SHOT_INTERVAL_SECONDS);
        if !ready {
            return None;
        }
        self.last_shot_seconds = Some(now);
        self.shots_fired += 1;
        Some(shot)
    }
}

impl Component for UnitComponent {
    fn on_simulation_started(&mut self, _ctx: &mut ComponentContext<'_>) {
        if self.cur_health == 0 {
            self.cur_health = self.max_health;
        }
        self.cur_health = self.cur_health.min(self.max_health);
    }

    fn handle_message(&mut self, message: &mut dyn Message, ctx: &mut ComponentContext<'_>) -> bool {
        if let Some(msg) = message.downcast_ref::<MsgApplyDamage>() {
            let damage = msg.damage;
            self.apply_damage(damage, ctx);
            return true;
        }
        if let Some(msg) = message.downcast_mut::<MsgGatherUnitStats>() {
            msg.cur_health = self.cur_health;
            msg.max_health = self.max_health;
            return true;
        }
        if let Some(msg) = message.downcast_ref::<MsgSetTarget>() {
            self.set_target(msg);
            return true;
        }
        if message.is::<MsgStopShooting>() {
            self.mode = UnitMode::Idle;
            return true;
        }
        false
    }

    fn serialize(&self, writer: &mut ComponentWriter<'_>) {
        writer.write_pod(self.max_health);
        writer.write_pod(self.cur_health);
        writer.write_str(&self.on_destroyed_spawn);
        writer.write_pod(self.mode.tag());
        let (object, position) = match self.mode {
            UnitMode::Idle => (GameObjectHandle::INVALID, Vec3::ZERO),
            UnitMode::ShootAtUnit(object) => (object, Vec3::ZERO),
            UnitMode::ShootAtPosition(position) => (GameObjectHandle::INVALID, position),
        };
        writer.write_object_ref(object);
        writer.write_pod(position);
    }

    fn deserialize(&mut self, reader: &mut ComponentReader<'_>, version: u32) -> WorldResult<()> {
        self.max_health = reader.read_pod()?;
        self.cur_health = reader.read_pod()?;
        if version < 2 {
            return Ok(());
        }

        self.on_destroyed_spawn = reader.read_str()?;
        let tag: u8 = reader.read_pod()?;
        let object = reader.read_object_ref()?;
        let position: Vec3 = reader.read_pod()?;
        self.mode = match tag {
            1 if !object.is_invalidated() => UnitMode::ShootAtUnit(object),
            2 => UnitMode::ShootAtPosition(position),
            _ => UnitMode::Idle,
        };
        Ok(())
    }

    fn type_name() -> &'static str {
        "UnitComponent"
    }

    fn mode() -> ComponentMode {
        ComponentMode::Dynamic
    }

    fn version() -> u32 {
        2
    }

    fn register_update_functions(manager: &mut ComponentManager<Self>) {
        manager.register_update_function(
            UpdateFunctionDesc::<Self>::new("unit_update", UpdatePhase::PostAsync, |range, ctx| {
                let objects = ctx.view.objects();
                let now = ctx.view.clock().accumulated_seconds();
                for slot in range.iter_mut().filter(|slot| slot.is_active()) {
                    let owner = slot.owner();
                    let Some(shot) = slot.update_unit(owner, now, |target| objects.contains(target)) else {
                        continue;
                    };
                    let transform = objects.compute_global_transform(owner).unwrap_or(Transform::IDENTITY);
                    let team = objects.try_get(owner).map_or(0, GameObject::team_id);
                    ctx.view.commands().defer(move |world| {
                        if let Err(e) = spawn_projectile(world, transform, team, shot) {
                            tracing::warn!(unit = %owner, error = %e, "failed to spawn projectile");
                        }
                    });
                }
            })
            .with_granularity(64)
            .only_when_simulating(),
        );
    }
}
