//! Movement Replication
//!
//! Input sampling, delta computation, prediction and containment.
//!
//! The controlling participant applies its own delta immediately and asks
//! the host to commit it. Everyone else integrates the last committed
//! deltas once per tick. There is no reconciliation.

use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::config::MovementConfig;
use crate::core::vec3::Vec3;
use crate::game::authority::{Authority, FieldUpdate, Mutation};
use crate::game::state::{ArenaState, ClientId, EntityId, EntityState};

/// One tick of controller input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    /// Forward/back axis, [-1, 1]
    pub vertical: f32,
    /// Turn or strafe axis, [-1, 1]
    pub horizontal: f32,
    /// Routes the horizontal axis to strafe instead of turn
    pub strafe_modifier: bool,
    /// Fire pressed this tick
    pub fire: bool,
}

impl InputSample {
    /// Create a sample with axes clamped to [-1, 1].
    pub fn new(vertical: f32, horizontal: f32, strafe_modifier: bool, fire: bool) -> Self {
        Self {
            vertical: clamp_axis(vertical),
            horizontal: clamp_axis(horizontal),
            strafe_modifier,
            fire,
        }
    }

    /// No input.
    pub fn idle() -> Self {
        Self::default()
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Per-tick translation and rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementDelta {
    pub move_delta: Vec3,
    pub rotate_delta: Vec3,
}

/// Turn input into deltas.
///
/// Horizontal input strafes while the modifier is held and turns otherwise,
/// never both in the same tick.
pub fn compute_deltas(input: &InputSample, config: &MovementConfig) -> MovementDelta {
    let (strafe, turn) = if input.strafe_modifier {
        (input.horizontal, 0.0)
    } else {
        (0.0, input.horizontal)
    };

    MovementDelta {
        move_delta: Vec3::new(strafe, 0.0, input.vertical) * config.movement_speed,
        rotate_delta: Vec3::new(0.0, turn, 0.0) * config.rotation_speed,
    }
}

/// Integrate a delta into the local transform.
#[inline]
pub fn apply_delta(entity: &mut EntityState, delta: &MovementDelta) {
    entity.position += delta.move_delta;
    entity.rotation += delta.rotate_delta;
}

/// Integrate the last committed deltas (non-controlling participants).
pub fn apply_replicated(entity: &mut EntityState) {
    let delta = MovementDelta {
        move_delta: *entity.position_delta.get(),
        rotate_delta: *entity.rotation_delta.get(),
    };
    apply_delta(entity, &delta);
}

/// Snap back to spawn when at or beyond `radius`. Returns true on snap.
pub fn enforce_containment(entity: &mut EntityState, radius: f32) -> bool {
    if entity.distance_from_spawn() >= radius {
        trace!(entity = entity.id.0, "containment snap");
        entity.position = entity.spawn_position;
        true
    } else {
        false
    }
}

/// Host side of `RequestMovement`: commit both deltas.
///
/// Only the entity's owner may move it.
pub fn commit_movement(
    authority: &Authority,
    state: &mut ArenaState,
    caller: ClientId,
    entity: EntityId,
    delta: MovementDelta,
) -> Vec<FieldUpdate> {
    match state.entity(entity) {
        Some(e) if e.owner == caller => {}
        Some(e) => {
            trace!(entity = entity.0, caller, owner = e.owner, "movement dropped: not owner");
            return Vec::new();
        }
        None => {
            trace!(entity = entity.0, caller, "movement dropped: unknown entity");
            return Vec::new();
        }
    }

    [
        Mutation::PositionDelta(delta.move_delta),
        Mutation::RotationDelta(delta.rotate_delta),
    ]
    .into_iter()
    .filter_map(|m| authority.request_mutation(state, entity, m))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Color;
    use crate::game::authority::{FieldValue, ProcessRole};

    fn entity_at(spawn: Vec3) -> EntityState {
        EntityState::new(EntityId(1), 2, spawn, Color::RED, 50, 1, 30.0)
    }

    #[test]
    fn test_turn_without_modifier() {
        let config = MovementConfig::default();
        let delta = compute_deltas(&InputSample::new(1.0, -1.0, false, false), &config);
        assert_eq!(delta.move_delta, Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(delta.rotate_delta, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_strafe_with_modifier() {
        let config = MovementConfig::default();
        let delta = compute_deltas(&InputSample::new(0.0, 1.0, true, false), &config);
        assert_eq!(delta.move_delta, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(delta.rotate_delta, Vec3::ZERO);
    }

    #[test]
    fn test_axes_clamped() {
        let input = InputSample::new(4.0, f32::NAN, false, false);
        assert_eq!(input.vertical, 1.0);
        assert_eq!(input.horizontal, 0.0);
    }

    #[test]
    fn test_containment_snaps_exactly_at_radius() {
        let spawn = Vec3::new(1.0, 0.0, 1.0);
        let mut entity = entity_at(spawn);

        entity.position = Vec3::new(1.0, 0.0, 10.9);
        assert!(!enforce_containment(&mut entity, 10.0));

        entity.position = Vec3::new(1.0, 0.0, 11.0);
        assert!(enforce_containment(&mut entity, 10.0));
        assert_eq!(entity.position, spawn);
    }

    #[test]
    fn test_apply_replicated_uses_committed_deltas() {
        let host = Authority::new(ProcessRole::Host, 0);
        let mut state = ArenaState::new(1, 30.0);
        state.insert_entity(entity_at(Vec3::ZERO));
        let delta = MovementDelta {
            move_delta: Vec3::new(0.0, 0.0, 0.5),
            rotate_delta: Vec3::new(0.0, 1.0, 0.0),
        };
        assert_eq!(commit_movement(&host, &mut state, 2, EntityId(1), delta).len(), 2);

        let entity = state.entity_mut(EntityId(1)).unwrap();
        apply_replicated(entity);
        apply_replicated(entity);
        assert_eq!(entity.position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(entity.rotation, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_commit_requires_owner() {
        let host = Authority::new(ProcessRole::Host, 0);
        let mut state = ArenaState::new(1, 30.0);
        let id = host.spawn_entity(&mut state, 5, Vec3::ZERO, 1).unwrap().id;
        let delta = MovementDelta {
            move_delta: Vec3::new(0.0, 0.0, 0.5),
            rotate_delta: Vec3::ZERO,
        };

        assert!(commit_movement(&host, &mut state, 6, id, delta).is_empty());

        let updates = commit_movement(&host, &mut state, 5, id, delta);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].value, FieldValue::PositionDelta(delta.move_delta));
    }

    #[test]
    fn test_commit_on_client_is_noop() {
        let host = Authority::new(ProcessRole::Host, 0);
        let mut state = ArenaState::new(1, 30.0);
        let id = host.spawn_entity(&mut state, 5, Vec3::ZERO, 1).unwrap().id;
        let client = Authority::new(ProcessRole::Client, 5);

        let delta = MovementDelta {
            move_delta: Vec3::new(0.5, 0.0, 0.0),
            rotate_delta: Vec3::new(0.0, 1.0, 0.0),
        };
        assert!(commit_movement(&client, &mut state, 5, id, delta).is_empty());
        assert_eq!(state.entity(id).unwrap().position_delta.seq(), 0);
    }
}
