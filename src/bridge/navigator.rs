//! Host-side chapter navigation state machine

use std::time::Duration;

use tokio::time::Instant;

use super::message::SwipeDirection;
use crate::error::{ReaderError, Result};

/// Leading-edge debounce: drops events within `window` of the last accepted one
#[derive(Debug)]
pub struct SwipeGate {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl SwipeGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

/// Result of a navigation input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: usize, to: usize },
    Unchanged,
}

/// `Viewing(index)` over a book's spine
#[derive(Debug)]
pub struct ChapterNavigator {
    index: usize,
    count: usize,
    gate: SwipeGate,
}

impl ChapterNavigator {
    pub fn new(count: usize, start: usize, swipe_debounce: Duration) -> Self {
        Self {
            index: start.min(count.saturating_sub(1)),
            count,
            gate: SwipeGate::new(swipe_debounce),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Apply a `swipe-end`; left advances, right goes back, edges hold.
    pub fn on_swipe(&mut self, direction: SwipeDirection, now: Instant) -> Transition {
        if !self.gate.accept(now) {
            tracing::debug!(?direction, "Swipe debounced");
            return Transition::Unchanged;
        }

        let target = match direction {
            SwipeDirection::Left if self.index + 1 < self.count => self.index + 1,
            SwipeDirection::Right if self.index > 0 => self.index - 1,
            _ => return Transition::Unchanged,
        };
        self.move_to(target)
    }

    /// Jump to an explicit chapter
    pub fn go_to(&mut self, target: usize) -> Result<Transition> {
        if target >= self.count {
            return Err(ReaderError::NavigationOutOfRange {
                index: target,
                count: self.count,
            });
        }
        if target == self.index {
            return Ok(Transition::Unchanged);
        }
        Ok(self.move_to(target))
    }

    fn move_to(&mut self, target: usize) -> Transition {
        let from = self.index;
        self.index = target;
        Transition::Moved { from, to: target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_swipes_move_within_bounds() {
        let start = Instant::now();
        let mut nav = ChapterNavigator::new(3, 0, WINDOW);

        assert_eq!(
            nav.on_swipe(SwipeDirection::Right, start),
            Transition::Unchanged
        );
        assert_eq!(
            nav.on_swipe(SwipeDirection::Left, start + Duration::from_secs(1)),
            Transition::Moved { from: 0, to: 1 }
        );
        assert_eq!(
            nav.on_swipe(SwipeDirection::Left, start + Duration::from_secs(2)),
            Transition::Moved { from: 1, to: 2 }
        );
        assert_eq!(
            nav.on_swipe(SwipeDirection::Left, start + Duration::from_secs(3)),
            Transition::Unchanged
        );
        assert_eq!(nav.index(), 2);
    }

    #[test]
    fn test_two_swipes_within_window_move_once() {
        let start = Instant::now();
        let mut nav = ChapterNavigator::new(10, 4, WINDOW);

        assert_eq!(
            nav.on_swipe(SwipeDirection::Left, start),
            Transition::Moved { from: 4, to: 5 }
        );
        assert_eq!(
            nav.on_swipe(SwipeDirection::Left, start + Duration::from_millis(499)),
            Transition::Unchanged
        );
        assert_eq!(nav.index(), 5);
        assert_eq!(
            nav.on_swipe(SwipeDirection::Right, start + Duration::from_millis(500)),
            Transition::Moved { from: 5, to: 4 }
        );
    }

    #[test]
    fn test_go_to() {
        let mut nav = ChapterNavigator::new(4, 0, WINDOW);
        assert_eq!(nav.go_to(3).unwrap(), Transition::Moved { from: 0, to: 3 });
        assert_eq!(nav.go_to(3).unwrap(), Transition::Unchanged);
        assert!(matches!(
            nav.go_to(4),
            Err(ReaderError::NavigationOutOfRange { index: 4, count: 4 })
        ));
        assert_eq!(nav.index(), 3);
    }

    #[test]
    fn test_start_clamped() {
        assert_eq!(ChapterNavigator::new(2, 9, WINDOW).index(), 1);
        assert_eq!(ChapterNavigator::new(0, 0, WINDOW).index(), 0);
    }
}
