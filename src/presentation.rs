//! Presentation Boundary
//!
//! Everything the core asks of the UI layer goes through [`Presenter`].
//! Implementations must be shareable: change observers hold a handle and
//! call into it synchronously from inside a replicated assignment.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::core::color::Color;
use crate::game::state::EntityId;

/// Shared presenter handle.
pub type SharedPresenter = Arc<dyn Presenter>;

/// Core -> presentation calls.
pub trait Presenter: Send + Sync {
    /// Re-render an entity's score.
    fn display_score(&self, entity: EntityId, value: i32);
    /// Show the local entity's countdown text.
    fn display_timer(&self, text: &str);
    /// Show a bootstrap/session status line.
    fn set_status_text(&self, text: &str);
    /// Recolor an entity.
    fn apply_color(&self, entity: EntityId, color: Color);
    /// Load a named scene.
    fn load_scene(&self, name: &str);
    /// Freeze the local game.
    fn pause_game(&self);
}

/// Presenter that only logs.
#[derive(Debug, Clone, Default)]
pub struct TracingPresenter {
    label: String,
}

impl TracingPresenter {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Wrap into a shared handle.
    pub fn shared(label: impl Into<String>) -> SharedPresenter {
        Arc::new(Self::new(label))
    }
}

impl Presenter for TracingPresenter {
    fn display_score(&self, entity: EntityId, value: i32) {
        info!(view = %self.label, entity = entity.0, value, "score");
    }

    fn display_timer(&self, _text: &str) {
        // Every tick; too noisy for info
    }

    fn set_status_text(&self, text: &str) {
        info!(view = %self.label, "status: {}", text);
    }

    fn apply_color(&self, entity: EntityId, color: Color) {
        info!(view = %self.label, entity = entity.0, color = %color.to_hex(), "color");
    }

    fn load_scene(&self, name: &str) {
        info!(view = %self.label, scene = name, "load scene");
    }

    fn pause_game(&self) {
        info!(view = %self.label, "game paused");
    }
}

/// One recorded presenter call.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterCall {
    Score(EntityId, i32),
    Timer(String),
    Status(String),
    Color(EntityId, Color),
    Scene(String),
    Pause,
}

/// Presenter that records every call, for tests and headless inspection.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<PresenterCall>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: PresenterCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Copy of everything recorded so far.
    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Last status text shown.
    pub fn last_status(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            PresenterCall::Status(text) => Some(text),
            _ => None,
        })
    }

    /// Last timer text shown.
    pub fn last_timer(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            PresenterCall::Timer(text) => Some(text),
            _ => None,
        })
    }

    /// Last score shown for `entity`.
    pub fn last_score(&self, entity: EntityId) -> Option<i32> {
        self.calls().into_iter().rev().find_map(|c| match c {
            PresenterCall::Score(e, value) if e == entity => Some(value),
            _ => None,
        })
    }

    /// Scenes loaded, in order.
    pub fn scenes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PresenterCall::Scene(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Number of `pause_game` calls.
    pub fn pause_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PresenterCall::Pause))
            .count()
    }
}

impl Presenter for RecordingPresenter {
    fn display_score(&self, entity: EntityId, value: i32) {
        self.record(PresenterCall::Score(entity, value));
    }

    fn display_timer(&self, text: &str) {
        self.record(PresenterCall::Timer(text.to_string()));
    }

    fn set_status_text(&self, text: &str) {
        self.record(PresenterCall::Status(text.to_string()));
    }

    fn apply_color(&self, entity: EntityId, color: Color) {
        self.record(PresenterCall::Color(entity, color));
    }

    fn load_scene(&self, name: &str) {
        self.record(PresenterCall::Scene(name.to_string()));
    }

    fn pause_game(&self) {
        self.record(PresenterCall::Pause);
    }
}
