//! Replicated State Digests
//!
//! SHA-256 digests over the replicated values of an arena. Host and clients
//! compute the same digest once every pending update has been delivered,
//! which makes convergence checks a single comparison.

use sha2::{Sha256, Digest};

use super::color::Color;
use super::vec3::Vec3;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Incremental hasher over replicated values.
///
/// Order of updates matters; callers iterate in key order.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for replicated arena state.
    pub fn for_arena_state() -> Self {
        Self::new(b"ARENA_SYNC_STATE_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with the raw bits of an f32.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Update with a Vec3.
    #[inline]
    pub fn update_vec3(&mut self, value: Vec3) {
        self.update_f32(value.x);
        self.update_f32(value.y);
        self.update_f32(value.z);
    }

    /// Update with a Color.
    #[inline]
    pub fn update_color(&mut self, value: Color) {
        self.update_f32(value.r);
        self.update_f32(value.g);
        self.update_f32(value.b);
        self.update_f32(value.a);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute an arena digest.
///
/// The closure adds the state-specific data after the domain separator.
pub fn compute_state_hash<F>(add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_arena_state();
    add_state(&mut hasher);
    hasher.finalize()
}

/// Short hex prefix of a digest, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_hash() {
        let a = compute_state_hash(|h| {
            h.update_i32(50);
            h.update_vec3(Vec3::new(0.5, 0.0, 1.0));
        });
        let b = compute_state_hash(|h| {
            h.update_i32(50);
            h.update_vec3(Vec3::new(0.5, 0.0, 1.0));
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_matters() {
        let a = compute_state_hash(|h| {
            h.update_u8(1);
            h.update_u8(2);
        });
        let b = compute_state_hash(|h| {
            h.update_u8(2);
            h.update_u8(1);
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_negative_zero_distinct() {
        // Digests track bits, so -0.0 and 0.0 differ
        let a = compute_state_hash(|h| h.update_f32(0.0));
        let b = compute_state_hash(|h| h.update_f32(-0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_hex_len() {
        let h = compute_state_hash(|h| h.update_bool(true));
        assert_eq!(short_hex(&h).len(), 12);
    }
}
