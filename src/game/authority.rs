//! Entity Authority Model
//!
//! Gates every write to replicated entity state. The process role (host or
//! client) decides who may commit; the entity role (owner or observer)
//! decides who drives an entity with input. The host can hold both roles at
//! once when it is also a player.

use serde::{Serialize, Deserialize};
use tracing::{debug, info, trace, warn};

use crate::DEFAULT_SCORE;
use crate::core::color::Color;
use crate::core::vec3::Vec3;
use crate::game::state::{ArenaState, ClientId, EntityId, EntitySnapshot, EntityState};

// =============================================================================
// ROLES
// =============================================================================

/// Role of the running process within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessRole {
    /// Sole authority over shared state
    Host,
    /// Reads replicated state, sends intent
    Client,
}

impl ProcessRole {
    /// Whether this role may commit replicated values.
    #[inline]
    pub fn is_authority(self) -> bool {
        matches!(self, ProcessRole::Host)
    }
}

/// Relation of a participant to one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityRole {
    /// Drives the entity with local input
    Owner,
    /// Renders the entity from replicated state
    Observer,
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// A requested change to one replicated field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    PositionDelta(Vec3),
    RotationDelta(Vec3),
    Color(Color),
    Score(i32),
    /// Relative score change, resolved against the current value
    AddScore(i32),
    DamageTier(u8),
}

/// Absolute value of a replicated field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    PositionDelta(Vec3),
    RotationDelta(Vec3),
    Color(Color),
    Score(i32),
    DamageTier(u8),
}

/// A committed change, fanned out from the host to every participant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub entity: EntityId,
    pub seq: u64,
    pub value: FieldValue,
}

// =============================================================================
// AUTHORITY
// =============================================================================

/// Write gate for one participant.
#[derive(Clone, Copy, Debug)]
pub struct Authority {
    role: ProcessRole,
    local_client: ClientId,
}

impl Authority {
    pub fn new(role: ProcessRole, local_client: ClientId) -> Self {
        Self { role, local_client }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn local_client(&self) -> ClientId {
        self.local_client
    }

    #[inline]
    pub fn is_host(&self) -> bool {
        self.role.is_authority()
    }

    /// Role of this participant for `entity`.
    pub fn entity_role(&self, entity: &EntityState) -> EntityRole {
        entity.role_for(self.local_client)
    }

    /// Request a change to one replicated field.
    ///
    /// Callable anywhere; a silent no-op unless this process is the host.
    /// This is the only path that assigns a replicated variable. Returns the
    /// update to fan out, or `None` if nothing was committed.
    pub fn request_mutation(
        &self,
        state: &mut ArenaState,
        entity_id: EntityId,
        mutation: Mutation,
    ) -> Option<FieldUpdate> {
        if !self.is_host() {
            trace!(entity = entity_id.0, ?mutation, "mutation dropped: not host");
            return None;
        }
        let Some(entity) = state.entity_mut(entity_id) else {
            trace!(entity = entity_id.0, ?mutation, "mutation dropped: unknown entity");
            return None;
        };

        let role = self.role;
        let (seq, value) = match mutation {
            Mutation::PositionDelta(delta) => {
                let change = entity.position_delta.assign(role, delta)?;
                (change.seq, FieldValue::PositionDelta(change.current))
            }
            Mutation::RotationDelta(delta) => {
                let change = entity.rotation_delta.assign(role, delta)?;
                (change.seq, FieldValue::RotationDelta(change.current))
            }
            Mutation::Color(color) => {
                let change = entity.color.assign(role, color)?;
                (change.seq, FieldValue::Color(change.current))
            }
            Mutation::Score(score) => {
                let change = entity.score.assign(role, score)?;
                (change.seq, FieldValue::Score(change.current))
            }
            Mutation::AddScore(amount) => {
                let next = entity.score.get().saturating_add(amount);
                let change = entity.score.assign(role, next)?;
                (change.seq, FieldValue::Score(change.current))
            }
            Mutation::DamageTier(tier) => {
                let change = entity.damage_tier.assign(role, tier)?;
                (change.seq, FieldValue::DamageTier(change.current))
            }
        };

        Some(FieldUpdate {
            entity: entity_id,
            seq,
            value,
        })
    }

    /// Apply a committed update received from the host to a mirror.
    ///
    /// Returns false if the entity is unknown or the update is stale.
    pub fn apply_update(&self, state: &mut ArenaState, update: &FieldUpdate) -> bool {
        let Some(entity) = state.entity_mut(update.entity) else {
            trace!(entity = update.entity.0, seq = update.seq, "update for unknown entity");
            return false;
        };

        match update.value {
            FieldValue::PositionDelta(v) => entity.position_delta.apply_remote(update.seq, v),
            FieldValue::RotationDelta(v) => entity.rotation_delta.apply_remote(update.seq, v),
            FieldValue::Color(c) => entity.color.apply_remote(update.seq, c),
            FieldValue::Score(s) => entity.score.apply_remote(update.seq, s),
            FieldValue::DamageTier(t) => entity.damage_tier.apply_remote(update.seq, t),
        }
    }

    /// Spawn the entity for a newly connected participant (host only).
    ///
    /// Assigns the next palette color, the default score and the initial
    /// damage tier. Returns the snapshot to replicate.
    pub fn spawn_entity(
        &self,
        state: &mut ArenaState,
        owner: ClientId,
        position: Vec3,
        initial_tier: u8,
    ) -> Option<EntitySnapshot> {
        if !self.is_host() {
            trace!(owner, "spawn dropped: not host");
            return None;
        }
        if let Some(existing) = state.entity_of(owner) {
            warn!(owner, entity = existing.0, "client already has an entity");
            return None;
        }

        let id = state.allocate_entity_id();
        let color = Color::from_palette(state.next_spawn_index());
        let entity = EntityState::new(
            id,
            owner,
            position,
            color,
            DEFAULT_SCORE,
            initial_tier,
            state.round_seconds(),
        );
        let snapshot = entity.snapshot();
        state.insert_entity(entity);

        info!(owner, entity = id.0, color = %color.to_hex(), "entity spawned");
        Some(snapshot)
    }

    /// Remove an entity (host only). Other entities are untouched.
    pub fn despawn_entity(&self, state: &mut ArenaState, entity: EntityId) -> Option<EntityState> {
        if !self.is_host() {
            trace!(entity = entity.0, "despawn dropped: not host");
            return None;
        }
        let removed = state.remove_entity(entity)?;
        debug!(entity = entity.0, owner = removed.owner, "entity despawned");
        Some(removed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
