//! Arena State Definitions
//!
//! Entity registry and per-entity state for one participant's view of the
//! arena. The host's copy is authoritative; clients hold mirrors of it.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::color::Color;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::authority::EntityRole;
use crate::game::combat::{PickupState, ProjectileState};
use crate::game::timer::RoundTimer;
use crate::replication::{ReplicatedVar, Sequenced};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Connected participant identifier, assigned by the host.
pub type ClientId = u64;

/// The host's own client id.
pub const HOST_CLIENT_ID: ClientId = 0;

/// Arena key of an entity. Never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Arena key of a projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u32);

/// Arena key of a damage-boost pickup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PickupId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

// =============================================================================
// ENTITY STATE
// =============================================================================

/// A participant's actor in the arena.
#[derive(Debug)]
pub struct EntityState {
    /// Arena key
    pub id: EntityId,
    /// Controlling participant
    pub owner: ClientId,
    /// Containment anchor, fixed at spawn
    pub spawn_position: Vec3,
    /// Local rendered position (not replicated)
    pub position: Vec3,
    /// Local rendered rotation, Euler degrees (not replicated)
    pub rotation: Vec3,
    /// Last committed per-tick translation
    pub position_delta: ReplicatedVar<Vec3>,
    /// Last committed per-tick rotation
    pub rotation_delta: ReplicatedVar<Vec3>,
    /// Host-assigned color
    pub color: ReplicatedVar<Color>,
    /// Score
    pub score: ReplicatedVar<i32>,
    /// Damage carried by projectiles this entity fires
    pub damage_tier: ReplicatedVar<u8>,
    /// Local countdown
    pub timer: RoundTimer,
}

impl EntityState {
    /// Create a freshly spawned entity (all replicated values at sequence 0).
    pub fn new(
        id: EntityId,
        owner: ClientId,
        spawn_position: Vec3,
        color: Color,
        score: i32,
        damage_tier: u8,
        round_seconds: f32,
    ) -> Self {
        Self {
            id,
            owner,
            spawn_position,
            position: spawn_position,
            rotation: Vec3::ZERO,
            position_delta: ReplicatedVar::new(Vec3::ZERO),
            rotation_delta: ReplicatedVar::new(Vec3::ZERO),
            color: ReplicatedVar::new(color),
            score: ReplicatedVar::new(score),
            damage_tier: ReplicatedVar::new(damage_tier),
            timer: RoundTimer::new(round_seconds),
        }
    }

    /// Rebuild a mirror from a host snapshot. The timer starts fresh.
    pub fn from_snapshot(snapshot: &EntitySnapshot, round_seconds: f32) -> Self {
        Self {
            id: snapshot.id,
            owner: snapshot.owner,
            spawn_position: snapshot.spawn_position,
            position: snapshot.position,
            rotation: snapshot.rotation,
            position_delta: ReplicatedVar::from_sequenced(snapshot.position_delta),
            rotation_delta: ReplicatedVar::from_sequenced(snapshot.rotation_delta),
            color: ReplicatedVar::from_sequenced(snapshot.color),
            score: ReplicatedVar::from_sequenced(snapshot.score),
            damage_tier: ReplicatedVar::from_sequenced(snapshot.damage_tier),
            timer: RoundTimer::new(round_seconds),
        }
    }

    /// Snapshot for replication to a joining participant.
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            owner: self.owner,
            spawn_position: self.spawn_position,
            position: self.position,
            rotation: self.rotation,
            position_delta: self.position_delta.sequenced(),
            rotation_delta: self.rotation_delta.sequenced(),
            color: self.color.sequenced(),
            score: self.score.sequenced(),
            damage_tier: self.damage_tier.sequenced(),
        }
    }

    /// Role of `client` with respect to this entity.
    #[inline]
    pub fn role_for(&self, client: ClientId) -> EntityRole {
        if self.owner == client {
            EntityRole::Owner
        } else {
            EntityRole::Observer
        }
    }

    /// Distance of the local transform from the spawn anchor.
    pub fn distance_from_spawn(&self) -> f32 {
        self.position.distance(self.spawn_position)
    }

    /// Hash the replicated values (never the local transform or timer).
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_u64(self.owner);
        hasher.update_u64(self.position_delta.seq());
        hasher.update_vec3(*self.position_delta.get());
        hasher.update_u64(self.rotation_delta.seq());
        hasher.update_vec3(*self.rotation_delta.get());
        hasher.update_u64(self.color.seq());
        hasher.update_color(*self.color.get());
        hasher.update_u64(self.score.seq());
        hasher.update_i32(*self.score.get());
        hasher.update_u64(self.damage_tier.seq());
        hasher.update_u8(*self.damage_tier.get());
    }
}

/// Wire form of an entity at spawn or join time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub owner: ClientId,
    pub spawn_position: Vec3,
    pub position: Vec3,
    pub rotation: Vec3,
    pub position_delta: Sequenced<Vec3>,
    pub rotation_delta: Sequenced<Vec3>,
    pub color: Sequenced<Color>,
    pub score: Sequenced<i32>,
    pub damage_tier: Sequenced<u8>,
}

// =============================================================================
// ARENA STATE
// =============================================================================

/// One participant's view of the arena.
#[derive(Debug)]
pub struct ArenaState {
    /// Entities by id (BTreeMap for deterministic order)
    pub entities: BTreeMap<EntityId, EntityState>,
    /// Live projectiles
    pub projectiles: BTreeMap<ProjectileId, ProjectileState>,
    /// Boost pickups, consumed ones included
    pub pickups: BTreeMap<PickupId, PickupState>,
    /// Spawn placement RNG (host only draws from it)
    pub rng: DeterministicRng,
    owners: BTreeMap<ClientId, EntityId>,
    next_entity_id: u32,
    next_projectile_id: u32,
    next_pickup_id: u32,
    spawn_count: usize,
    round_seconds: f32,
}

impl ArenaState {
    /// Create an empty arena.
    pub fn new(rng_seed: u64, round_seconds: f32) -> Self {
        Self {
            entities: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            pickups: BTreeMap::new(),
            rng: DeterministicRng::new(rng_seed),
            owners: BTreeMap::new(),
            next_entity_id: 1,
            next_projectile_id: 1,
            next_pickup_id: 1,
            spawn_count: 0,
            round_seconds,
        }
    }

    /// Countdown every entity starts with.
    pub fn round_seconds(&self) -> f32 {
        self.round_seconds
    }

    /// Get entity by id.
    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    /// Get mutable entity by id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    /// Entity controlled by `owner`, if any.
    pub fn entity_of(&self, owner: ClientId) -> Option<EntityId> {
        self.owners.get(&owner).copied()
    }

    /// Insert an entity, keeping the owner index current.
    pub fn insert_entity(&mut self, entity: EntityState) -> Option<EntityState> {
        let replaced = self.remove_entity(entity.id);
        self.next_entity_id = self.next_entity_id.max(entity.id.0 + 1);
        self.owners.insert(entity.owner, entity.id);
        self.entities.insert(entity.id, entity);
        replaced
    }

    /// Remove an entity and its owner index entry.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<EntityState> {
        let entity = self.entities.remove(&id)?;
        if self.owners.get(&entity.owner) == Some(&id) {
            self.owners.remove(&entity.owner);
        }
        Some(entity)
    }

    /// Allocate the next entity id.
    pub fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Allocate the next projectile id.
    pub fn allocate_projectile_id(&mut self) -> ProjectileId {
        let id = ProjectileId(self.next_projectile_id);
        self.next_projectile_id += 1;
        id
    }

    /// Allocate the next pickup id.
    pub fn allocate_pickup_id(&mut self) -> PickupId {
        let id = PickupId(self.next_pickup_id);
        self.next_pickup_id += 1;
        id
    }

    /// Spawn order index, used for palette assignment.
    pub fn next_spawn_index(&mut self) -> usize {
        let index = self.spawn_count;
        self.spawn_count += 1;
        index
    }

    /// True if any entity's score has reached zero or below.
    pub fn any_score_depleted(&self) -> bool {
        self.entities.values().any(|e| *e.score.get() <= 0)
    }

    /// Drop everything (session teardown).
    pub fn clear(&mut self) {
        self.entities.clear();
        self.projectiles.clear();
        self.pickups.clear();
        self.owners.clear();
    }

    /// Digest of every replicated value.
    ///
    /// Host and clients agree on this once all pending updates are delivered.
    /// Local transforms, timers and projectile positions are excluded.
    pub fn replicated_digest(&self) -> StateHash {
        compute_state_hash(|hasher| {
            hasher.update_u32(self.entities.len() as u32);
            for entity in self.entities.values() {
                entity.hash_into(hasher);
            }

            hasher.update_u32(self.projectiles.len() as u32);
            for projectile in self.projectiles.values() {
                hasher.update_u32(projectile.id.0);
                hasher.update_u64(projectile.owner);
                hasher.update_u32(projectile.shooter.0);
                hasher.update_u8(projectile.damage);
            }

            hasher.update_u32(self.pickups.len() as u32);
            for pickup in self.pickups.values() {
                hasher.update_u32(pickup.id.0);
                hasher.update_bool(pickup.consumed);
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::authority::{Authority, Mutation, ProcessRole};

    fn entity(id: u32, owner: ClientId) -> EntityState {
        EntityState::new(EntityId(id), owner, Vec3::ZERO, Color::RED, 50, 1, 30.0)
    }

    #[test]
    fn test_owner_index_follows_insert_and_remove() {
        let mut state = ArenaState::new(1, 30.0);
        state.insert_entity(entity(1, 0));
        state.insert_entity(entity(2, 7));

        assert_eq!(state.entity_of(7), Some(EntityId(2)));
        state.remove_entity(EntityId(2));
        assert_eq!(state.entity_of(7), None);
        assert_eq!(state.entity_of(0), Some(EntityId(1)));
    }

    #[test]
    fn test_ids_not_reused_after_mirror_insert() {
        let mut state = ArenaState::new(1, 30.0);
        state.insert_entity(entity(5, 3));
        assert_eq!(state.allocate_entity_id(), EntityId(6));
    }

    #[test]
    fn test_snapshot_mirror_has_same_digest() {
        let authority = Authority::new(ProcessRole::Host, 0);
        let mut host = ArenaState::new(1, 30.0);
        host.insert_entity(entity(1, 4));
        authority.request_mutation(&mut host, EntityId(1), Mutation::Score(47));
        authority.request_mutation(&mut host, EntityId(1), Mutation::DamageTier(2));
        let snapshot = host.entity(EntityId(1)).unwrap().snapshot();

        let mut mirror = ArenaState::new(99, 30.0);
        mirror.insert_entity(EntityState::from_snapshot(&snapshot, 30.0));

        assert_eq!(host.replicated_digest(), mirror.replicated_digest());
    }

    #[test]
    fn test_digest_ignores_local_transform() {
        let mut a = ArenaState::new(1, 30.0);
        let mut b = ArenaState::new(1, 30.0);
        a.insert_entity(entity(1, 0));
        let mut moved = entity(1, 0);
        moved.position = Vec3::new(3.0, 0.0, 1.0);
        moved.timer.tick(5.0);
        b.insert_entity(moved);

        assert_eq!(a.replicated_digest(), b.replicated_digest());
    }

    #[test]
    fn test_any_score_depleted() {
        let mut state = ArenaState::new(1, 30.0);
        state.insert_entity(entity(1, 0));
        assert!(!state.any_score_depleted());

        Authority::new(ProcessRole::Host, 0).request_mutation(&mut state, EntityId(1), Mutation::Score(0));
        assert!(state.any_score_depleted());
    }
}
