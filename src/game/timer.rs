//! Round Timer & Termination
//!
//! Per-entity countdown plus the participant's round phase. Both terminal
//! phases are absorbing: once left, `Active` is never re-entered.

use serde::{Serialize, Deserialize};

/// Per-entity countdown in seconds. Decremented locally on every participant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundTimer {
    remaining: f32,
}

impl RoundTimer {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Seconds left (may dip just below zero on the expiring tick).
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Count down by `dt`. Returns true once the timer has expired.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.remaining > 0.0 {
            self.remaining -= dt;
        }
        self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Text shown by the timer display.
    pub fn display(&self) -> String {
        format_timer(self.remaining)
    }
}

/// Fixed-width timer text: two decimals, first three characters.
///
/// `29.97 -> "29."`, `9.53 -> "9.5"`, `0 -> "0.0"`. Negative values show
/// as zero.
pub fn format_timer(remaining: f32) -> String {
    let clamped = if remaining > 0.0 { remaining } else { 0.0 };
    let text = format!("{:.2}", clamped);
    text.chars().take(3).collect()
}

/// Round phase of one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Simulation running
    Active,
    /// Local timer ran out
    Paused,
    /// Some entity's score reached zero
    RoundOver,
}

/// Transition taken on a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundTransition {
    Paused,
    RoundOver,
}

/// Phase machine: `Active -> Paused | RoundOver`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundState {
    phase: RoundPhase,
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundState {
    pub fn new() -> Self {
        Self { phase: RoundPhase::Active }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// Evaluate the termination conditions for this tick.
    ///
    /// Score depletion wins over timer expiry when both hold.
    pub fn evaluate(&mut self, local_timer_expired: bool, score_depleted: bool) -> Option<RoundTransition> {
        if !self.is_active() {
            return None;
        }

        if score_depleted {
            self.phase = RoundPhase::RoundOver;
            Some(RoundTransition::RoundOver)
        } else if local_timer_expired {
            self.phase = RoundPhase::Paused;
            Some(RoundTransition::Paused)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timer_truncates() {
        assert_eq!(format_timer(29.97), "29.");
        assert_eq!(format_timer(9.53), "9.5");
        assert_eq!(format_timer(0.0), "0.0");
        assert_eq!(format_timer(-0.02), "0.0");
        assert_eq!(format_timer(30.0), "30.");
    }

    #[test]
    fn test_timer_stops_at_expiry() {
        let mut timer = RoundTimer::new(0.05);
        assert!(!timer.tick(0.03));
        assert!(timer.tick(0.03));
        let after = timer.remaining();
        timer.tick(0.03);
        assert_eq!(timer.remaining(), after);
    }

    #[test]
    fn test_round_over_wins_tie() {
        let mut round = RoundState::new();
        assert_eq!(round.evaluate(true, true), Some(RoundTransition::RoundOver));
        assert_eq!(round.phase(), RoundPhase::RoundOver);
    }

    #[test]
    fn test_terminal_phases_absorb() {
        let mut round = RoundState::new();
        assert_eq!(round.evaluate(true, false), Some(RoundTransition::Paused));
        assert_eq!(round.evaluate(false, true), None);
        assert_eq!(round.phase(), RoundPhase::Paused);
    }
}
