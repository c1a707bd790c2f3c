//! # Arena Sync
//!
//! Host-authoritative session and state replication for a small arena
//! shooter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ARENA SYNC                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Math and digests                          │
//! │  ├── vec3.rs     - 3D vector                                 │
//! │  ├── color.rs    - RGBA color and spawn palette              │
//! │  ├── rng.rs      - Seeded Xorshift128+ for placement         │
//! │  └── hash.rs     - Replicated-state digests                  │
//! │                                                              │
//! │  replication/    - Authoritative values                      │
//! │  ├── var.rs      - ReplicatedVar<T>                          │
//! │  └── observer.rs - Change observers and tokens               │
//! │                                                              │
//! │  game/           - Simulation (host and clients)             │
//! │  ├── authority.rs- Roles and the mutation gate               │
//! │  ├── state.rs    - Entity registry                           │
//! │  ├── movement.rs - Prediction and containment                │
//! │  ├── combat.rs   - Projectiles and pickups (host only)       │
//! │  ├── timer.rs    - Countdown and round phase                 │
//! │  ├── events.rs   - Tick queue, calls, replication records    │
//! │  └── tick.rs     - One simulation step                       │
//! │                                                              │
//! │  network/        - Sessions and transport                    │
//! │  ├── bootstrap.rs- Connection form and session start         │
//! │  ├── session.rs  - Host/client participants                  │
//! │  ├── protocol.rs - Wire messages                             │
//! │  └── transport.rs- Loopback links                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Only the host commits replicated values. Clients predict their own
//! movement, send intent as remote calls, and apply the host's committed
//! changes in order. Every committed change notifies observers with
//! `(previous, current)` on every participant.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod presentation;
pub mod replication;

// Re-export commonly used types
pub use config::ArenaConfig;
pub use core::{Color, Vec3};
pub use game::{ArenaState, EntityId, ProcessRole};
pub use network::{LocalNetwork, Participant};
pub use replication::ReplicatedVar;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 30;

/// Score every entity spawns with
pub const DEFAULT_SCORE: i32 = 50;

/// Default countdown per entity, in seconds
pub const ROUND_SECONDS: f32 = 30.0;
