//! Game Logic Module
//!
//! Entity state, authority, and the per-tick simulation shared by host and
//! clients.
//!
//! ## Module Structure
//!
//! - `authority`: process/entity roles, the mutation gate, spawn/despawn
//! - `state`: entity registry and per-entity state
//! - `movement`: input to deltas, prediction, containment
//! - `combat`: projectiles, boost pickups, score transfer (host only)
//! - `timer`: per-entity countdown and round phase
//! - `events`: tick queue, remote calls, replication records
//! - `tick`: one simulation step

pub mod authority;
pub mod combat;
pub mod events;
pub mod movement;
pub mod state;
pub mod tick;
pub mod timer;

// Re-export key types
pub use authority::{Authority, EntityRole, FieldUpdate, FieldValue, Mutation, ProcessRole};
pub use combat::{PickupState, ProjectileState};
pub use events::{RemoteCall, Replication, TickEvent, TickQueue};
pub use movement::{InputSample, MovementDelta};
pub use state::{ArenaState, ClientId, EntityId, EntitySnapshot, EntityState, HOST_CLIENT_ID};
pub use tick::{apply_remote_call, tick, TickResult};
pub use timer::{RoundPhase, RoundState, RoundTimer, RoundTransition};
