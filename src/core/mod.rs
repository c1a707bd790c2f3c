//! Core primitives.
//!
//! Math, colors, seeded randomness and state digests shared by the
//! replication and game layers.

pub mod vec3;
pub mod color;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec3::Vec3;
pub use color::Color;
pub use rng::DeterministicRng;
pub use hash::{StateHash, compute_state_hash};
