//! Arena Configuration
//!
//! Loaded from environment variables; anything missing or malformed falls
//! back to the defaults below.

use std::str::FromStr;

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::{ROUND_SECONDS, TICK_RATE};

/// How the process starts once the bootstrap comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Show Host/Client controls and wait for a choice
    #[default]
    Choose,
    /// Start as host immediately with the configured scene
    Host,
    /// Start as client immediately
    Client,
}

impl FromStr for StartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "choose" => Ok(StartMode::Choose),
            "host" => Ok(StartMode::Host),
            "client" => Ok(StartMode::Client),
            other => Err(format!("unknown start mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for StartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StartMode::Choose => "CHOOSE",
            StartMode::Host => "HOST",
            StartMode::Client => "CLIENT",
        };
        f.write_str(name)
    }
}

/// Connection and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Address shown in the connection form
    pub address: String,
    /// Port shown in the connection form
    pub port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub start_mode: StartMode,
    /// Scene the host loads on start
    pub start_scene: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7777,
            tick_rate: TICK_RATE,
            start_mode: StartMode::Choose,
            start_scene: "Lobby".to_string(),
        }
    }
}

/// Input-to-motion scaling and containment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    pub movement_speed: f32,
    /// Degrees per tick at full deflection
    pub rotation_speed: f32,
    /// Distance from spawn at which an entity snaps back
    pub containment_radius: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            movement_speed: 0.5,
            rotation_speed: 1.0,
            containment_radius: 10.0,
        }
    }
}

/// Projectiles, pickups and damage tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Damage tier assigned at spawn
    pub initial_damage_tier: u8,
    pub max_damage_tier: u8,
    /// Tier gained per boost pickup
    pub damage_step: u8,
    /// Units per second
    pub projectile_speed: f32,
    /// Seconds before the host destroys an unresolved projectile
    pub projectile_lifetime: f32,
    /// Spawn distance in front of the shooter
    pub muzzle_offset: f32,
    pub entity_radius: f32,
    pub projectile_radius: f32,
    pub pickup_radius: f32,
    /// Pickups placed by the host at session start
    pub pickup_count: u32,
    /// Ring around the origin where entities and pickups are placed
    pub spawn_min_radius: f32,
    pub spawn_max_radius: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            initial_damage_tier: 1,
            max_damage_tier: 3,
            damage_step: 1,
            projectile_speed: 12.0,
            projectile_lifetime: 2.0,
            muzzle_offset: 1.5,
            entity_radius: 0.5,
            projectile_radius: 0.1,
            pickup_radius: 0.5,
            pickup_count: 3,
            spawn_min_radius: 2.0,
            spawn_max_radius: 6.0,
        }
    }
}

/// Round length and termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Countdown each entity starts with
    pub round_seconds: f32,
    /// Scene loaded when a score is depleted
    pub game_over_scene: String,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_seconds: ROUND_SECONDS,
            game_over_scene: "GameOver".to_string(),
        }
    }
}

/// Demo binary parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// In-process clients joined to the host
    pub clients: u32,
    /// Ticks to run (0 runs until the round ends)
    pub ticks: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { clients: 2, ticks: 0 }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub net: NetConfig,
    pub movement: MovementConfig,
    pub combat: CombatConfig,
    pub round: RoundConfig,
    pub demo: DemoConfig,
    /// Fixed RNG seed; derived from the session id when absent
    pub seed: Option<u64>,
}

impl ArenaConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup("ARENA_ADDRESS") {
            config.net.address = address;
        }
        config.net.port = parse_or(&lookup, "ARENA_PORT", config.net.port);
        config.net.tick_rate = parse_or(&lookup, "ARENA_TICK_RATE", config.net.tick_rate);
        if config.net.tick_rate == 0 {
            warn!("ARENA_TICK_RATE must be positive, using {}", TICK_RATE);
            config.net.tick_rate = TICK_RATE;
        }
        config.net.start_mode = parse_or(&lookup, "ARENA_START_MODE", config.net.start_mode);
        if let Some(scene) = lookup("ARENA_START_SCENE") {
            config.net.start_scene = scene;
        }

        config.round.round_seconds =
            parse_positive_or(&lookup, "ARENA_ROUND_SECONDS", config.round.round_seconds);
        config.movement.containment_radius =
            parse_positive_or(&lookup, "ARENA_CONTAINMENT_RADIUS", config.movement.containment_radius);
        config.combat.max_damage_tier =
            parse_or(&lookup, "ARENA_MAX_DAMAGE_TIER", config.combat.max_damage_tier);
        config.combat.initial_damage_tier =
            parse_or(&lookup, "ARENA_INITIAL_DAMAGE_TIER", config.combat.initial_damage_tier);
        if config.combat.initial_damage_tier > config.combat.max_damage_tier {
            warn!(
                "ARENA_INITIAL_DAMAGE_TIER above max, using {}",
                config.combat.max_damage_tier
            );
            config.combat.initial_damage_tier = config.combat.max_damage_tier;
        }

        config.demo.clients = parse_or(&lookup, "ARENA_DEMO_CLIENTS", config.demo.clients);
        config.demo.ticks = parse_or(&lookup, "ARENA_DEMO_TICKS", config.demo.ticks);
        config.seed = lookup("ARENA_SEED").and_then(|raw| match raw.parse() {
            Ok(seed) => Some(seed),
            Err(_) => {
                warn!("ignoring invalid ARENA_SEED '{}'", raw);
                None
            }
        });

        config
    }

    /// Seconds per tick.
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.net.tick_rate as f32
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("invalid {}='{}', using default {:?}", key, raw, default);
                default
            }
        },
    }
}

/// Like [`parse_or`], but the value must be finite and above zero.
fn parse_positive_or<F>(lookup: &F, key: &str, default: f32) -> f32
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("{} must be finite and positive, using {}", key, default);
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_tuning() {
        let config = ArenaConfig::default();
        assert_eq!(config.net.tick_rate, 30);
        assert_eq!(config.net.start_scene, "Lobby");
        assert_eq!(config.movement.movement_speed, 0.5);
        assert_eq!(config.movement.containment_radius, 10.0);
        assert_eq!(config.round.round_seconds, 30.0);
        assert_eq!(config.combat.max_damage_tier, 3);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            ("ARENA_PORT", "9000"),
            ("ARENA_START_MODE", "Host"),
            ("ARENA_START_SCENE", "Arena"),
            ("ARENA_SEED", "42"),
        ]));
        assert_eq!(config.net.port, 9000);
        assert_eq!(config.net.start_mode, StartMode::Host);
        assert_eq!(config.net.start_scene, "Arena");
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            ("ARENA_PORT", "70000"),
            ("ARENA_TICK_RATE", "0"),
            ("ARENA_START_MODE", "spectate"),
            ("ARENA_SEED", "abc"),
        ]));
        assert_eq!(config.net.port, 7777);
        assert_eq!(config.net.tick_rate, 30);
        assert_eq!(config.net.start_mode, StartMode::Choose);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_non_finite_or_negative_floats_fall_back() {
        for raw in ["NaN", "inf", "-inf", "-5", "0"] {
            let config = ArenaConfig::from_lookup(lookup_from(&[
                ("ARENA_ROUND_SECONDS", raw),
                ("ARENA_CONTAINMENT_RADIUS", raw),
            ]));
            assert_eq!(config.round.round_seconds, 30.0, "round seconds from {}", raw);
            assert_eq!(config.movement.containment_radius, 10.0, "radius from {}", raw);
        }

        let config = ArenaConfig::from_lookup(lookup_from(&[("ARENA_ROUND_SECONDS", "12.5")]));
        assert_eq!(config.round.round_seconds, 12.5);
    }

    #[test]
    fn test_initial_damage_tier_capped_at_max() {
        let config = ArenaConfig::from_lookup(lookup_from(&[("ARENA_INITIAL_DAMAGE_TIER", "0")]));
        assert_eq!(config.combat.initial_damage_tier, 0);

        let config = ArenaConfig::from_lookup(lookup_from(&[
            ("ARENA_MAX_DAMAGE_TIER", "2"),
            ("ARENA_INITIAL_DAMAGE_TIER", "5"),
        ]));
        assert_eq!(config.combat.initial_damage_tier, 2);
    }
}
