//! # Projectiles
//!
//! Spawned by units when they fire. A projectile learns its target through
//! an `AfterInitialized` message, flies toward it and damages the target
//! object on arrival.

use hearth_core::scene::{
    Component, ComponentContext, ComponentManager, ComponentMode, GameObjectDesc, GameObjectHandle, Message,
    MessageTarget, MsgQueueType, UpdateFunctionDesc, UpdatePhase, World,
};
use hearth_core::WorldResult;
use hearth_shared::{Transform, Vec3};

use super::unit::{MsgApplyDamage, MsgSetTarget};

/// Name of spawned projectile objects.
pub const PROJECTILE_NAME: &str = "projectile";

/// Seconds a projectile flies before it is removed.
pub const PROJECTILE_LIFETIME_SECONDS: f64 = 5.0;

/// Distance at which a projectile counts as arrived.
const HIT_RADIUS: f32 = 0.5;

/// Where a projectile goes this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Flight {
    /// No target yet.
    Waiting,
    /// Still on the way.
    Moved(Vec3),
    /// Reached its goal; carries the object to damage, if any.
    Arrived(Option<GameObjectHandle>),
    /// Lifetime over or target gone.
    Expired,
}

/// A shot in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectileComponent {
    /// Units per second.
    pub speed: f32,
    /// Damage dealt to a target object.
    pub damage: i32,
    target_object: GameObjectHandle,
    target_position: Vec3,
    launched_at: Option<f64>,
}

impl Default for ProjectileComponent {
    fn default() -> Self {
        Self {
            speed: 40.0,
            damage: 10,
            target_object: GameObjectHandle::INVALID,
            target_position: Vec3::ZERO,
            launched_at: None,
        }
    }
}

impl ProjectileComponent {
    /// True once a target arrived.
    #[must_use]
    pub const fn is_launched(&self) -> bool {
        self.launched_at.is_some()
    }

    /// Object being chased; invalidated for position targets.
    #[must_use]
    pub const fn target_object(&self) -> GameObjectHandle {
        self.target_object
    }

    /// Point being chased when no object is targeted.
    #[must_use]
    pub const fn target_position(&self) -> Vec3 {
        self.target_position
    }

    fn advance(
        &self,
        now: f64,
        delta_seconds: f32,
        position: Vec3,
        locate: impl Fn(GameObjectHandle) -> Option<Vec3>,
    ) -> Flight {
        let Some(launched_at) = self.launched_at else {
            return Flight::Waiting;
        };
        if now - launched_at >= PROJECTILE_LIFETIME_SECONDS {
            return Flight::Expired;
        }

        let (goal, victim) = if self.target_object.is_invalidated() {
            (self.target_position, None)
        } else {
            match locate(self.target_object) {
                Some(goal) => (goal, Some(self.target_object)),
                None => return Flight::Expired,
            }
        };

        let offset = goal - position;
        let distance = offset.length();
        let step = self.speed * delta_seconds;
        if distance <= HIT_RADIUS + step {
            Flight::Arrived(victim)
        } else {
            Flight::Moved(position + offset * (step / distance))
        }
    }
}

impl Component for ProjectileComponent {
    fn handle_message(&mut self, message: &mut dyn Message, ctx: &mut ComponentContext<'_>) -> bool {
        let Some(msg) = message.downcast_ref::<MsgSetTarget>() else {
            return false;
        };
        self.target_object = msg.object;
        self.target_position = msg.position;
        self.launched_at = Some(ctx.view().clock().accumulated_seconds());
        true
    }

    fn type_name() -> &'static str {
        "ProjectileComponent"
    }

    fn mode() -> ComponentMode {
        ComponentMode::Dynamic
    }

    fn register_update_functions(manager: &mut ComponentManager<Self>) {
        manager.register_update_function(
            UpdateFunctionDesc::<Self>::new("projectile_update", UpdatePhase::PostAsync, |range, ctx| {
                let objects = ctx.view.objects();
                let commands = ctx.view.commands();
                let clock = ctx.view.clock();
                for slot in range.iter().filter(|slot| slot.is_active()) {
                    let owner = slot.owner();
                    let Some(current) = objects.compute_global_transform(owner) else {
                        continue;
                    };
                    let flight = slot.advance(
                        clock.accumulated_seconds(),
                        clock.delta_seconds(),
                        current.position,
                        |target| objects.compute_global_transform(target).map(|t| t.position),
                    );
                    match flight {
                        Flight::Waiting => {}
                        Flight::Moved(position) => {
                            commands.set_local_transform(owner, Transform { position, ..current });
                        }
                        Flight::Arrived(victim) => {
                            if let Some(victim) = victim {
                                commands.post_message(
                                    MessageTarget::Object(victim),
                                    MsgApplyDamage { damage: slot.damage },
                                    MsgQueueType::PostTransform,
                                );
                            }
                            commands.delete_object_delayed(owner);
                        }
                        Flight::Expired => commands.delete_object_delayed(owner),
                    }
                }
            })
            .only_when_simulating(),
        );
    }
}

/// Creates a projectile at `transform` and hands it `target` once it is
/// initialized.
///
/// # Errors
///
/// Fails if the object or its component cannot be created.
pub fn spawn_projectile(
    world: &mut World,
    transform: Transform,
    team_id: u16,
    target: MsgSetTarget,
) -> WorldResult<GameObjectHandle> {
    let object = world.create_object(
        GameObjectDesc::new(PROJECTILE_NAME)
            .with_transform(transform)
            .with_team(team_id)
            .dynamic(),
    )?;
    world.create_component(object, ProjectileComponent::default())?;
    world.post_message(object, target, MsgQueueType::AfterInitialized);
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launched(target: MsgSetTarget) -> ProjectileComponent {
        ProjectileComponent {
            target_object: target.object,
            target_position: target.position,
            launched_at: Some(0.0),
            ..ProjectileComponent::default()
        }
    }

    #[test]
    fn test_waits_for_target() {
        let projectile = ProjectileComponent::default();
        assert_eq!(projectile.advance(1.0, 0.1, Vec3::ZERO, |_| None), Flight::Waiting);
    }

    #[test]
    fn test_moves_toward_position() {
        let projectile = launched(MsgSetTarget {
            position: Vec3::new(0.0, 0.0, 100.0),
            ..MsgSetTarget::default()
        });
        let Flight::Moved(position) = projectile.advance(0.1, 0.1, Vec3::ZERO, |_| None) else {
            panic!("projectile should still be flying");
        };
        assert!(position.approx_eq(Vec3::new(0.0, 0.0, 4.0), 1e-4));
    }

    #[test]
    fn test_arrival_reports_victim() {
        let target = GameObjectHandle::new(3, 0, 0);
        let projectile = launched(MsgSetTarget {
            object: target,
            ..MsgSetTarget::default()
        });
        let flight = projectile.advance(0.1, 0.1, Vec3::ZERO, |_| Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(flight, Flight::Arrived(Some(target)));
    }

    #[test]
    fn test_expires() {
        let target = GameObjectHandle::new(3, 0, 0);
        let projectile = launched(MsgSetTarget {
            object: target,
            ..MsgSetTarget::default()
        });
        assert_eq!(projectile.advance(0.1, 0.1, Vec3::ZERO, |_| None), Flight::Expired);
        assert_eq!(
            projectile.advance(PROJECTILE_LIFETIME_SECONDS, 0.1, Vec3::ZERO, |_| Some(Vec3::Z)),
            Flight::Expired
        );
    }
}
