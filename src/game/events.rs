//! Tick Events, Remote Calls and Replication Records
//!
//! Two producers feed the tick queue: local input sampling and physics
//! contacts. The queue is drained once per step. Remote calls flow from
//! participants to the host; replication records flow back out.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::game::authority::FieldUpdate;
use crate::game::combat::{PickupState, ProjectileState};
use crate::game::movement::{InputSample, MovementDelta};
use crate::game::state::{EntityId, EntitySnapshot, PickupId, ProjectileId};

// =============================================================================
// TICK QUEUE
// =============================================================================

/// Something that happened since the last step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TickEvent {
    /// Controller input for an entity
    Input {
        entity: EntityId,
        sample: InputSample,
    },
    /// Entity overlapped a projectile
    ProjectileContact {
        entity: EntityId,
        projectile: ProjectileId,
    },
    /// Entity overlapped a pickup
    PickupOverlap {
        entity: EntityId,
        pickup: PickupId,
    },
}

impl TickEvent {
    /// Whether this event came from the physics producer.
    pub fn is_physics(&self) -> bool {
        !matches!(self, TickEvent::Input { .. })
    }
}

/// FIFO of events for the next step.
#[derive(Debug, Default)]
pub struct TickQueue {
    events: VecDeque<TickEvent>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TickEvent) {
        self.events.push_back(event);
    }

    /// Take every queued event in arrival order.
    pub fn drain(&mut self) -> Vec<TickEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// =============================================================================
// REMOTE CALLS
// =============================================================================

/// Fire-and-forget request to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RemoteCall {
    RequestMovement {
        entity: EntityId,
        move_delta: Vec3,
        rotate_delta: Vec3,
    },
    RequestSetScore {
        entity: EntityId,
        value: i32,
    },
    RequestFire {
        entity: EntityId,
    },
}

impl RemoteCall {
    /// Build a movement request from a delta.
    pub fn movement(entity: EntityId, delta: MovementDelta) -> Self {
        RemoteCall::RequestMovement {
            entity,
            move_delta: delta.move_delta,
            rotate_delta: delta.rotate_delta,
        }
    }

    /// Target entity.
    pub fn entity(&self) -> EntityId {
        match self {
            RemoteCall::RequestMovement { entity, .. }
            | RemoteCall::RequestSetScore { entity, .. }
            | RemoteCall::RequestFire { entity } => *entity,
        }
    }
}

// =============================================================================
// REPLICATION
// =============================================================================

/// Host-to-all record of a committed change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Replication {
    /// Replicated field update
    Field(FieldUpdate),
    EntitySpawned(EntitySnapshot),
    EntityDespawned(EntityId),
    ProjectileSpawned(ProjectileState),
    ProjectileDestroyed(ProjectileId),
    PickupSpawned(PickupState),
    PickupRemoved(PickupId),
}

impl From<FieldUpdate> for Replication {
    fn from(update: FieldUpdate) -> Self {
        Replication::Field(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drains_in_order() {
        let mut queue = TickQueue::new();
        queue.push(TickEvent::Input {
            entity: EntityId(1),
            sample: InputSample::idle(),
        });
        queue.push(TickEvent::PickupOverlap {
            entity: EntityId(1),
            pickup: PickupId(4),
        });

        let events = queue.drain();
        assert!(queue.is_empty());
        assert!(!events[0].is_physics());
        assert!(events[1].is_physics());
    }

    #[test]
    fn test_call_entity() {
        let call = RemoteCall::RequestSetScore {
            entity: EntityId(9),
            value: 50,
        };
        assert_eq!(call.entity(), EntityId(9));
    }
}
