//! Touch point tracking (component C6 "Touch"), spec.md §4.6.

use std::collections::HashMap;

use smithay::utils::{Logical, Point};

/// libinput touch slot id.
pub type TouchId = i32;

#[derive(Debug, Clone, Copy)]
struct TouchPoint {
    location: Point<f64, Logical>,
}

/// Tracks active touch points per spec.md §4.6: down creates the
/// entry, motion updates it, up removes it, cancel clears the table.
#[derive(Default)]
pub struct TouchTracker {
    points: HashMap<TouchId, TouchPoint>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new touch point. Returns `true` if `touch_down` should
    /// actually be delivered (a surface was under the point).
    pub fn down(&mut self, id: TouchId, location: Point<f64, Logical>, surface_present: bool) -> bool {
        self.points.insert(id, TouchPoint { location });
        surface_present
    }

    /// Update a tracked point's location. Returns `true` if the point
    /// was known (and `touch_motion` should be delivered).
    pub fn motion(&mut self, id: TouchId, location: Point<f64, Logical>) -> bool {
        match self.points.get_mut(&id) {
            Some(point) => {
                point.location = location;
                true
            },
            None => false,
        }
    }

    /// Remove a touch point. Returns `true` if it was known (and
    /// `touch_up` should be delivered).
    pub fn up(&mut self, id: TouchId) -> bool {
        self.points.remove(&id).is_some()
    }

    /// Clear every tracked point, returning the ids that were live so
    /// the caller can broadcast `cancel` to each affected client.
    pub fn cancel(&mut self) -> Vec<TouchId> {
        self.points.drain().map(|(id, _)| id).collect()
    }

    pub fn location(&self, id: TouchId) -> Option<Point<f64, Logical>> {
        self.points.get(&id).map(|point| point.location)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_motion_up_round_trip() {
        let mut touch = TouchTracker::new();
        assert!(touch.down(0, Point::from((10., 10.)), true));
        assert!(touch.motion(0, Point::from((20., 15.))));
        assert_eq!(touch.location(0), Some(Point::from((20., 15.))));
        assert!(touch.up(0));
        assert!(touch.location(0).is_none());
    }

    #[test]
    fn cancel_clears_every_point() {
        let mut touch = TouchTracker::new();
        touch.down(0, Point::from((0., 0.)), true);
        touch.down(1, Point::from((5., 5.)), false);
        let mut cancelled = touch.cancel();
        cancelled.sort();
        assert_eq!(cancelled, vec![0, 1]);
        assert!(touch.is_empty());
    }

    #[test]
    fn motion_on_unknown_point_is_noop() {
        let mut touch = TouchTracker::new();
        assert!(!touch.motion(5, Point::from((0., 0.))));
    }
}
