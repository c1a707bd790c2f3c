//! Combat & Score Resolution
//!
//! Host-only projectile and damage-boost resolution. Every mutation goes
//! through the [`Authority`] so it fans out like any other replicated
//! change. Clients move projectile mirrors locally but never resolve or
//! destroy anything themselves.

use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

use crate::config::CombatConfig;
use crate::core::vec3::Vec3;
use crate::game::authority::{Authority, Mutation};
use crate::game::events::{Replication, TickEvent};
use crate::game::state::{ArenaState, ClientId, EntityId, PickupId, ProjectileId};

// =============================================================================
// TYPES
// =============================================================================

/// A fired projectile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: ProjectileId,
    /// Client that fired it
    pub owner: ClientId,
    /// Entity that fired it
    pub shooter: EntityId,
    /// Damage tier of the shooter at fire time
    pub damage: u8,
    pub position: Vec3,
    /// Units per second
    pub velocity: Vec3,
    /// Seconds left before the host destroys it
    pub remaining_lifetime: f32,
}

impl ProjectileState {
    /// Move by one tick. Returns true once the lifetime has run out.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.position += self.velocity * dt;
        self.remaining_lifetime = (self.remaining_lifetime - dt).max(0.0);
        self.remaining_lifetime <= 0.0
    }
}

/// A damage-boost pickup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickupState {
    pub id: PickupId,
    pub position: Vec3,
    pub consumed: bool,
}

impl PickupState {
    pub fn new(id: PickupId, position: Vec3) -> Self {
        Self {
            id,
            position,
            consumed: false,
        }
    }

    /// Mark consumed. Returns false if it already was.
    pub fn consume(&mut self) -> bool {
        !std::mem::replace(&mut self.consumed, true)
    }
}

// =============================================================================
// SPAWNING
// =============================================================================

/// Host side of `RequestFire`: spawn a projectile in front of the shooter.
///
/// Only the entity's owner may fire it.
pub fn fire(
    authority: &Authority,
    state: &mut ArenaState,
    caller: ClientId,
    shooter: EntityId,
    config: &CombatConfig,
) -> Option<ProjectileState> {
    if !authority.is_host() {
        trace!(entity = shooter.0, "fire dropped: not host");
        return None;
    }
    let Some(entity) = state.entity(shooter) else {
        trace!(entity = shooter.0, "fire dropped: unknown entity");
        return None;
    };
    if entity.owner != caller {
        trace!(entity = shooter.0, caller, owner = entity.owner, "fire dropped: not owner");
        return None;
    }

    let facing = Vec3::from_yaw_degrees(entity.rotation.y);
    let owner = entity.owner;
    let position = entity.position + facing * config.muzzle_offset;
    let damage = *entity.damage_tier.get();

    let projectile = ProjectileState {
        id: state.allocate_projectile_id(),
        owner,
        shooter,
        damage,
        position,
        velocity: facing * config.projectile_speed,
        remaining_lifetime: config.projectile_lifetime,
    };
    state.projectiles.insert(projectile.id, projectile.clone());

    debug!(projectile = projectile.id.0, shooter = shooter.0, damage, "projectile fired");
    Some(projectile)
}

/// Place `config.pickup_count` pickups around the origin (host only).
pub fn spawn_pickups(
    authority: &Authority,
    state: &mut ArenaState,
    config: &CombatConfig,
) -> Vec<Replication> {
    if !authority.is_host() {
        return Vec::new();
    }

    (0..config.pickup_count)
        .map(|_| {
            let position = state.rng.random_ground_point(
                Vec3::ZERO,
                config.spawn_min_radius,
                config.spawn_max_radius,
            );
            let pickup = PickupState::new(state.allocate_pickup_id(), position);
            state.pickups.insert(pickup.id, pickup.clone());
            Replication::PickupSpawned(pickup)
        })
        .collect()
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve a projectile hitting `victim` (host only).
///
/// The victim loses the projectile's damage, the shooter's entity gains it,
/// then the projectile is destroyed. A contact with an already destroyed
/// projectile does nothing, so duplicate contacts are harmless. Self-hits
/// are ignored and leave the projectile alive.
pub fn resolve_projectile_hit(
    authority: &Authority,
    state: &mut ArenaState,
    victim: EntityId,
    projectile_id: ProjectileId,
) -> Vec<Replication> {
    let mut out = Vec::new();
    if !authority.is_host() {
        return out;
    }

    let Some(projectile) = state.projectiles.get(&projectile_id) else {
        trace!(projectile = projectile_id.0, "contact with destroyed projectile");
        return out;
    };
    let Some(victim_entity) = state.entity(victim) else {
        trace!(entity = victim.0, "contact with unknown entity");
        return out;
    };
    if victim_entity.owner == projectile.owner {
        trace!(entity = victim.0, projectile = projectile_id.0, "self-hit ignored");
        return out;
    }

    let Some(projectile) = state.projectiles.remove(&projectile_id) else {
        return out;
    };
    let damage = i32::from(projectile.damage);

    out.extend(
        authority
            .request_mutation(state, victim, Mutation::AddScore(-damage))
            .map(Replication::from),
    );

    // The shooter may have disconnected; the victim still takes the hit.
    match state.entity_of(projectile.owner) {
        Some(shooter) => out.extend(
            authority
                .request_mutation(state, shooter, Mutation::AddScore(damage))
                .map(Replication::from),
        ),
        None => trace!(owner = projectile.owner, "shooter gone, no credit"),
    }

    out.push(Replication::ProjectileDestroyed(projectile_id));
    debug!(victim = victim.0, projectile = projectile_id.0, damage, "projectile hit resolved");
    out
}

/// Resolve an entity overlapping a boost pickup (host only).
///
/// Raises the damage tier by one step, capped at the maximum, and consumes
/// the pickup. At the maximum tier the pickup stays live. Consumed pickups
/// remain in the registry so late joiners mirror the same flag.
pub fn resolve_boost_pickup(
    authority: &Authority,
    state: &mut ArenaState,
    entity_id: EntityId,
    pickup_id: PickupId,
    config: &CombatConfig,
) -> Vec<Replication> {
    let mut out = Vec::new();
    if !authority.is_host() {
        return out;
    }

    match state.pickups.get(&pickup_id) {
        Some(pickup) if !pickup.consumed => {}
        _ => {
            trace!(pickup = pickup_id.0, "overlap with removed pickup");
            return out;
        }
    }
    let Some(entity) = state.entity(entity_id) else {
        return out;
    };

    let tier = *entity.damage_tier.get();
    if tier >= config.max_damage_tier {
        trace!(entity = entity_id.0, tier, "already at max damage");
        return out;
    }
    let next = tier.saturating_add(config.damage_step).min(config.max_damage_tier);

    out.extend(
        authority
            .request_mutation(state, entity_id, Mutation::DamageTier(next))
            .map(Replication::from),
    );
    if let Some(pickup) = state.pickups.get_mut(&pickup_id) {
        pickup.consume();
    }
    out.push(Replication::PickupRemoved(pickup_id));

    debug!(entity = entity_id.0, pickup = pickup_id.0, tier = next, "damage boost picked up");
    out
}

// =============================================================================
// PHYSICS PRODUCER
// =============================================================================

/// Move every projectile one tick.
///
/// The host destroys projectiles whose lifetime ran out; clients keep their
/// mirrors until the host says otherwise.
pub fn advance_projectiles(authority: &Authority, state: &mut ArenaState, dt: f32) -> Vec<Replication> {
    let mut expired = Vec::new();
    for projectile in state.projectiles.values_mut() {
        if projectile.advance(dt) {
            expired.push(projectile.id);
        }
    }

    if !authority.is_host() {
        return Vec::new();
    }

    expired
        .into_iter()
        .filter_map(|id| state.projectiles.remove(&id))
        .map(|p| {
            trace!(projectile = p.id.0, "projectile expired");
            Replication::ProjectileDestroyed(p.id)
        })
        .collect()
}

/// Sphere-overlap contacts between entities and projectiles/pickups.
///
/// Emitted in entity order, projectiles before pickups.
pub fn detect_contacts(state: &ArenaState, config: &CombatConfig) -> Vec<TickEvent> {
    let hit_range = config.entity_radius + config.projectile_radius;
    let pickup_range = config.entity_radius + config.pickup_radius;
    let mut events = Vec::new();

    for entity in state.entities.values() {
        for projectile in state.projectiles.values() {
            if entity.position.distance_squared(projectile.position) <= hit_range * hit_range {
                events.push(TickEvent::ProjectileContact {
                    entity: entity.id,
                    projectile: projectile.id,
                });
            }
        }
        for pickup in state.pickups.values().filter(|p| !p.consumed) {
            if entity.position.distance_squared(pickup.position) <= pickup_range * pickup_range {
                events.push(TickEvent::PickupOverlap {
                    entity: entity.id,
                    pickup: pickup.id,
                });
            }
        }
    }

    events
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::authority::{FieldValue, ProcessRole};

    struct Arena {
        host: Authority,
        state: ArenaState,
        a: EntityId,
        b: EntityId,
    }

    /// Client 1 owns A at the origin, client 2 owns B two units ahead.
    fn arena() -> Arena {
        let host = Authority::new(ProcessRole::Host, 0);
        let mut state = ArenaState::new(3, 30.0);
        let a = host.spawn_entity(&mut state, 1, Vec3::ZERO, 1).unwrap().id;
        let b = host.spawn_entity(&mut state, 2, Vec3::new(0.0, 0.0, 2.0), 1).unwrap().id;
        Arena { host, state, a, b }
    }

    fn score(state: &ArenaState, id: EntityId) -> i32 {
        *state.entity(id).unwrap().score.get()
    }

    #[test]
    fn test_fire_snapshots_damage_and_faces_forward() {
        let mut arena = arena();
        let config = CombatConfig::default();

        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &config).unwrap();
        assert_eq!(p.damage, 1);
        assert_eq!(p.owner, 1);
        assert!((p.position.z - config.muzzle_offset).abs() < 1e-6);

        // Tier changes later do not touch the live projectile
        arena.host.request_mutation(&mut arena.state, arena.a, Mutation::DamageTier(3));
        assert_eq!(arena.state.projectiles[&p.id].damage, 1);
    }

    #[test]
    fn test_fire_requires_owner() {
        let mut arena = arena();
        assert!(fire(&arena.host, &mut arena.state, 2, arena.a, &CombatConfig::default()).is_none());
    }

    #[test]
    fn test_hit_transfers_score_once() {
        let mut arena = arena();
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &CombatConfig::default()).unwrap();

        let out = resolve_projectile_hit(&arena.host, &mut arena.state, arena.b, p.id);
        assert_eq!(score(&arena.state, arena.b), 49);
        assert_eq!(score(&arena.state, arena.a), 51);
        assert_eq!(out.last(), Some(&Replication::ProjectileDestroyed(p.id)));
        assert_eq!(
            out.iter().filter(|r| matches!(r, Replication::ProjectileDestroyed(_))).count(),
            1
        );

        // Duplicate contact in the same tick
        let again = resolve_projectile_hit(&arena.host, &mut arena.state, arena.b, p.id);
        assert!(again.is_empty());
        assert_eq!(score(&arena.state, arena.b), 49);
    }

    #[test]
    fn test_self_hit_ignored() {
        let mut arena = arena();
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &CombatConfig::default()).unwrap();

        assert!(resolve_projectile_hit(&arena.host, &mut arena.state, arena.a, p.id).is_empty());
        assert!(arena.state.projectiles.contains_key(&p.id));
        assert_eq!(score(&arena.state, arena.a), 50);
    }

    #[test]
    fn test_hit_after_shooter_left() {
        let mut arena = arena();
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &CombatConfig::default()).unwrap();
        arena.host.despawn_entity(&mut arena.state, arena.a);

        let out = resolve_projectile_hit(&arena.host, &mut arena.state, arena.b, p.id);
        assert_eq!(score(&arena.state, arena.b), 49);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_client_cannot_resolve() {
        let mut arena = arena();
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &CombatConfig::default()).unwrap();
        let client = Authority::new(ProcessRole::Client, 2);

        assert!(resolve_projectile_hit(&client, &mut arena.state, arena.b, p.id).is_empty());
        assert!(arena.state.projectiles.contains_key(&p.id));
    }

    #[test]
    fn test_boost_pickup_once() {
        let mut arena = arena();
        let config = CombatConfig::default();
        arena.host.request_mutation(&mut arena.state, arena.a, Mutation::DamageTier(0));
        let pickup = PickupState::new(arena.state.allocate_pickup_id(), Vec3::ZERO);
        let id = pickup.id;
        arena.state.pickups.insert(id, pickup);

        let out = resolve_boost_pickup(&arena.host, &mut arena.state, arena.a, id, &config);
        assert!(matches!(
            out[0],
            Replication::Field(u) if u.value == FieldValue::DamageTier(1)
        ));
        assert_eq!(out[1], Replication::PickupRemoved(id));
        assert!(arena.state.pickups[&id].consumed);

        let again = resolve_boost_pickup(&arena.host, &mut arena.state, arena.a, id, &config);
        assert!(again.is_empty());
        assert_eq!(*arena.state.entity(arena.a).unwrap().damage_tier.get(), 1);
    }

    #[test]
    fn test_boost_at_max_keeps_pickup() {
        let mut arena = arena();
        let config = CombatConfig::default();
        arena.host.request_mutation(&mut arena.state, arena.a, Mutation::DamageTier(config.max_damage_tier));
        let pickup = PickupState::new(arena.state.allocate_pickup_id(), Vec3::ZERO);
        let id = pickup.id;
        arena.state.pickups.insert(id, pickup);

        assert!(resolve_boost_pickup(&arena.host, &mut arena.state, arena.a, id, &config).is_empty());
        assert!(!arena.state.pickups[&id].consumed);
    }

    #[test]
    fn test_expired_projectiles_destroyed_by_host_only() {
        let mut arena = arena();
        let config = CombatConfig {
            projectile_lifetime: 0.05,
            ..CombatConfig::default()
        };
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &config).unwrap();

        let client = Authority::new(ProcessRole::Client, 2);
        assert!(advance_projectiles(&client, &mut arena.state, 0.1).is_empty());
        assert!(arena.state.projectiles.contains_key(&p.id));

        let out = advance_projectiles(&arena.host, &mut arena.state, 0.1);
        assert_eq!(out, vec![Replication::ProjectileDestroyed(p.id)]);
    }

    #[test]
    fn test_detect_contacts() {
        let mut arena = arena();
        let config = CombatConfig::default();
        let p = fire(&arena.host, &mut arena.state, 1, arena.a, &config).unwrap();
        // Muzzle at z=1.5, B at z=2.0: within 0.6
        let events = detect_contacts(&arena.state, &config);
        assert_eq!(
            events,
            vec![TickEvent::ProjectileContact {
                entity: arena.b,
                projectile: p.id
            }]
        );
    }

    #[test]
    fn test_spawn_pickups_in_ring() {
        let mut arena = arena();
        let config = CombatConfig::default();
        let out = spawn_pickups(&arena.host, &mut arena.state, &config);

        assert_eq!(out.len(), config.pickup_count as usize);
        for pickup in arena.state.pickups.values() {
            let d = pickup.position.length();
            assert!(d >= config.spawn_min_radius - 1e-4 && d <= config.spawn_max_radius + 1e-4);
        }
    }
}
