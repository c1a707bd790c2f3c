//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded from the session id. The host uses it for spawn
//! points and boost placement, so a given seed always lays out the same arena.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::vec3::Vec3;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use arena_sync::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to spread weak seeds over the state.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift must never sit on the all-zero state
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // Top 24 bits fill the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn next_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        min + self.next_f32() * (max - min)
    }

    /// Random point on the ground plane within an annulus around `center`.
    pub fn random_ground_point(&mut self, center: Vec3, min_radius: f32, max_radius: f32) -> Vec3 {
        let angle = self.next_range(0.0, 360.0);
        let radius = self.next_range(min_radius, max_radius);
        center + Vec3::from_yaw_degrees(angle).scale(radius)
    }

    /// Get internal state (for checkpointing).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 step, used only to expand seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive an arena seed from the session id.
///
/// An explicit override (from config) wins, so tests and demos can pin
/// the layout.
pub fn derive_session_seed(session_id: &[u8; 16], override_seed: Option<u64>) -> u64 {
    if let Some(seed) = override_seed {
        return seed;
    }

    let mut hasher = Sha256::new();
    hasher.update(b"ARENA_SYNC_SEED_V1");
    hasher.update(session_id);
    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
