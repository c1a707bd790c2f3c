//! Simulation Tick
//!
//! One step of a participant's simulation. Host and clients run the same
//! function; the authority decides which parts commit anything.

use tracing::trace;

use crate::config::ArenaConfig;
use crate::game::authority::{Authority, EntityRole, Mutation};
use crate::game::combat::{
    advance_projectiles, detect_contacts, fire, resolve_boost_pickup, resolve_projectile_hit,
};
use crate::game::events::{RemoteCall, Replication, TickEvent};
use crate::game::movement::{
    apply_delta, apply_replicated, commit_movement, compute_deltas, enforce_containment,
    MovementDelta,
};
use crate::game::state::{ArenaState, ClientId};
use crate::game::timer::{RoundState, RoundTransition};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Committed changes to fan out (host only)
    pub replications: Vec<Replication>,
    /// Calls for the host, produced by local input
    pub calls: Vec<RemoteCall>,
    /// Round transition taken this tick
    pub transition: Option<RoundTransition>,
    /// Timer text of the locally controlled entity
    pub timer_text: Option<String>,
    /// Physics events dropped because this participant is not the host
    pub discarded_physics: usize,
}

/// Run one simulation tick.
///
/// # Order
///
/// 1. Local input: predict, then emit movement/fire calls
/// 2. Non-controlled entities integrate their committed deltas
/// 3. Containment
/// 4. Projectiles advance (host destroys expired ones)
/// 5. Physics events resolve (host only)
/// 6. Timers count down
/// 7. Termination
///
/// Nothing runs unless the round is active.
pub fn tick(
    authority: &Authority,
    state: &mut ArenaState,
    round: &mut RoundState,
    events: Vec<TickEvent>,
    config: &ArenaConfig,
) -> TickResult {
    let mut result = TickResult::default();

    if !round.is_active() {
        trace!(phase = ?round.phase(), dropped = events.len(), "tick skipped, round not active");
        return result;
    }

    let local = authority.local_client();
    let (inputs, physics): (Vec<_>, Vec<_>) = events.into_iter().partition(|e| !e.is_physics());

    // 1. Local input
    for event in inputs {
        if let TickEvent::Input { entity, sample } = event {
            let Some(target) = state.entity_mut(entity) else {
                trace!(entity = entity.0, "input for unknown entity");
                continue;
            };
            if authority.entity_role(target) != EntityRole::Owner {
                trace!(entity = entity.0, "input for entity we do not control");
                continue;
            }

            let delta = compute_deltas(&sample, &config.movement);
            apply_delta(target, &delta);
            result.calls.push(RemoteCall::movement(entity, delta));
            if sample.fire {
                result.calls.push(RemoteCall::RequestFire { entity });
            }
        }
    }

    // 2. Integrate committed deltas for everything we don't drive
    for entity in state.entities.values_mut().filter(|e| e.owner != local) {
        apply_replicated(entity);
    }

    // 3. Containment
    let radius = config.movement.containment_radius;
    for entity in state.entities.values_mut() {
        enforce_containment(entity, radius);
    }

    // 4. Projectiles
    let dt = config.tick_duration();
    result
        .replications
        .extend(advance_projectiles(authority, state, dt));

    // 5. Physics
    if authority.is_host() {
        let contacts = physics.into_iter().chain(detect_contacts(state, &config.combat));
        for event in contacts.collect::<Vec<_>>() {
            let out = match event {
                TickEvent::ProjectileContact { entity, projectile } => {
                    resolve_projectile_hit(authority, state, entity, projectile)
                }
                TickEvent::PickupOverlap { entity, pickup } => {
                    resolve_boost_pickup(authority, state, entity, pickup, &config.combat)
                }
                TickEvent::Input { .. } => Vec::new(),
            };
            result.replications.extend(out);
        }
    } else if !physics.is_empty() {
        trace!(count = physics.len(), "physics events discarded on client");
        result.discarded_physics = physics.len();
    }

    // 6. Timers
    let mut local_expired = false;
    for entity in state.entities.values_mut() {
        let expired = entity.timer.tick(dt);
        if entity.owner == local {
            local_expired = expired;
            result.timer_text = Some(entity.timer.display());
        }
    }

    // 7. Termination
    result.transition = round.evaluate(local_expired, state.any_score_depleted());

    result
}

/// Host dispatch of a remote call from `caller`.
///
/// Every call is owner-only: a caller may only move, fire or set the score
/// of the entity it owns. Calls arriving at a client, or failing their
/// ownership check, commit nothing.
pub fn apply_remote_call(
    authority: &Authority,
    state: &mut ArenaState,
    caller: ClientId,
    call: &RemoteCall,
    config: &ArenaConfig,
) -> Vec<Replication> {
    match *call {
        RemoteCall::RequestMovement {
            entity,
            move_delta,
            rotate_delta,
        } => {
            let delta = MovementDelta {
                move_delta,
                rotate_delta,
            };
            commit_movement(authority, state, caller, entity, delta)
                .into_iter()
                .map(Replication::from)
                .collect()
        }
        RemoteCall::RequestSetScore { entity, value } => {
            let owner = state.entity(entity).map(|e| e.owner);
            if owner != Some(caller) {
                trace!(entity = entity.0, caller, ?owner, "set score dropped: not owner");
                return Vec::new();
            }
            authority
                .request_mutation(state, entity, Mutation::Score(value))
                .map(Replication::from)
                .into_iter()
                .collect()
        }
        RemoteCall::RequestFire { entity } => fire(authority, state, caller, entity, &config.combat)
            .map(Replication::ProjectileSpawned)
            .into_iter()
            .collect(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
