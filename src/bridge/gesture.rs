//! Surface-side gesture and progress reporting state machines
//!
//! These mirror the injected `swipe-shift.js` and `reading-progress.js`
//! runtime and decide which bridge messages a touch sequence produces.

use super::message::{SwipeDirection, SurfaceMessage};

/// Thresholds for swipe/tap classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Longest touch that still counts as a swipe, in ms
    pub max_swipe_ms: u64,
    /// Vertical travel (px) at which the gesture becomes a scroll
    pub vertical_threshold: f64,
    pub min_swipe_distance: f64,
    pub tap_max_ms: u64,
    pub tap_max_distance: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            max_swipe_ms: 600,
            vertical_threshold: 60.0,
            min_swipe_distance: 60.0,
            tap_max_ms: 200,
            tap_max_distance: 10.0,
        }
    }
}

/// A touch sample: position in px, timestamp in ms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
    pub t_ms: u64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64, t_ms: u64) -> Self {
        Self { x, y, t_ms }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Active { start: TouchPoint },
    Dragging { start: TouchPoint },
}

#[derive(Debug)]
pub struct GestureTracker {
    config: GestureConfig,
    state: GestureState,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn touch_start(&mut self, point: TouchPoint) {
        self.state = GestureState::Active { start: point };
    }

    pub fn touch_move(&mut self, point: TouchPoint) -> Option<SurfaceMessage> {
        let start = match self.state {
            GestureState::Idle => return None,
            GestureState::Active { start } | GestureState::Dragging { start } => start,
        };

        let dx = point.x - start.x;
        let dy = point.y - start.y;

        if dy.abs() >= self.config.vertical_threshold {
            self.state = GestureState::Idle;
            return Some(SurfaceMessage::SwipeCancel);
        }

        self.state = GestureState::Dragging { start };
        Some(SurfaceMessage::SwipeProgress { delta_x: dx })
    }

    pub fn touch_end(&mut self, point: TouchPoint) -> Option<SurfaceMessage> {
        let start = match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => return None,
            GestureState::Active { start } | GestureState::Dragging { start } => start,
        };

        let dx = point.x - start.x;
        let dy = point.y - start.y;
        let elapsed = point.t_ms.saturating_sub(start.t_ms);
        let cfg = &self.config;

        if elapsed <= cfg.max_swipe_ms
            && dy.abs() < cfg.vertical_threshold
            && dx.abs() >= cfg.min_swipe_distance
        {
            let direction = if dx < 0.0 {
                SwipeDirection::Left
            } else {
                SwipeDirection::Right
            };
            Some(SurfaceMessage::SwipeEnd { direction })
        } else if elapsed <= cfg.tap_max_ms
            && dx.abs() <= cfg.tap_max_distance
            && dy.abs() <= cfg.tap_max_distance
        {
            Some(SurfaceMessage::Tap)
        } else {
            Some(SurfaceMessage::SwipeCancel)
        }
    }
}

/// Emits `progress` only when the first visible anchor changes
#[derive(Debug, Default)]
pub struct ProgressReporter {
    last_id: Option<String>,
}

impl ProgressReporter {
    pub fn observe(&mut self, id: &str, index: usize, top: f64) -> Option<SurfaceMessage> {
        if self.last_id.as_deref() == Some(id) {
            return None;
        }
        self.last_id = Some(id.to_string());
        Some(SurfaceMessage::Progress {
            id: id.to_string(),
            index,
            top,
        })
    }

    /// Forget the last id, e.g. after a chapter change
    pub fn reset(&mut self) {
        self.last_id = None;
    }
}
