use serde::{Deserialize, Serialize};

/// Position published to the UI on a frame tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    /// Fraction of the buffer played, 0.0 to 1.0
    pub position: f64,
    pub duration: f64,
}

impl PositionUpdate {
    pub fn position_secs(&self) -> f64 {
        self.position * self.duration
    }
}

/// Frame-driven position scheduler.
///
/// At most one cycle is outstanding: `start` while already scheduled is a
/// no-op, and `cancel` takes effect before the next tick is processed.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    scheduled: bool,
    last: Option<PositionUpdate>,
    ticks: u64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule tracking; returns false if a cycle was already scheduled
    pub fn start(&mut self) -> bool {
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        true
    }

    pub fn cancel(&mut self) {
        self.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Record a tick's position if a cycle is scheduled
    pub fn publish(&mut self, position: f64, duration: f64) -> Option<PositionUpdate> {
        if !self.scheduled {
            return None;
        }

        let update = PositionUpdate {
            position: position.clamp(0.0, 1.0),
            duration,
        };
        self.last = Some(update);
        self.ticks += 1;
        Some(update)
    }

    /// Last published update, kept after cancellation
    pub fn last_update(&self) -> Option<PositionUpdate> {
        self.last
    }

    /// Number of updates published since creation
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Forget the last update, e.g. when a new sample replaces the old one
    pub fn reset(&mut self) {
        self.scheduled = false;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_outstanding_cycle() {
        let mut tracker = PositionTracker::new();

        assert!(tracker.start());
        assert!(!tracker.start());
        assert!(tracker.is_scheduled());

        tracker.cancel();
        assert!(!tracker.is_scheduled());
        assert!(tracker.start());
    }

    #[test]
    fn test_publish_requires_schedule() {
        let mut tracker = PositionTracker::new();
        assert_eq!(tracker.publish(0.5, 10.0), None);

        tracker.start();
        let update = tracker.publish(0.5, 10.0).unwrap();
        assert_eq!(update.position_secs(), 5.0);
        assert_eq!(tracker.ticks(), 1);

        tracker.cancel();
        assert_eq!(tracker.publish(0.6, 10.0), None);
        assert_eq!(tracker.last_update(), Some(update));
    }

    #[test]
    fn test_publish_clamps_fraction() {
        let mut tracker = PositionTracker::new();
        tracker.start();

        assert_eq!(tracker.publish(1.2, 1.0).map(|u| u.position), Some(1.0));
        assert_eq!(tracker.publish(-0.1, 1.0).map(|u| u.position), Some(0.0));
    }

    #[test]
    fn test_reset_clears_last_update() {
        let mut tracker = PositionTracker::new();
        tracker.start();
        tracker.publish(0.3, 2.0);

        tracker.reset();
        assert!(tracker.last_update().is_none());
        assert!(!tracker.is_scheduled());
    }
}
