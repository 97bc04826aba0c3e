//! Pointer constraint and drag-icon tracking (component C6), spec.md
//! §4.6.

use smithay::utils::{Logical, Point, Rectangle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Lock,
    Confine,
}

/// A pointer constraint attached to a surface. *Armed* on creation
/// against the currently focused surface; becomes *active* only once
/// the cursor actually enters its region (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct PointerConstraint {
    pub kind: ConstraintKind,
    /// `None` means the constraint covers the whole surface.
    pub region: Option<Rectangle<i32, Logical>>,
    active: bool,
}

impl PointerConstraint {
    pub fn new(kind: ConstraintKind, region: Option<Rectangle<i32, Logical>>) -> Self {
        Self { kind, region, active: false }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Called on pointer motion while armed; activates once the
    /// cursor is inside the region, and stays active afterward.
    /// Returns whether the cursor is (now) inside.
    pub fn activate_if_inside(&mut self, cursor: Point<f64, Logical>) -> bool {
        let inside = self.region.map_or(true, |region| region.to_f64().contains(cursor));
        if inside {
            self.active = true;
        }
        inside
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Adjust a relative motion delta according to this constraint.
    /// Locked constraints swallow motion entirely; confined
    /// constraints clip the delta so the resulting position stays
    /// inside the region. Inactive constraints pass motion through
    /// unchanged.
    pub fn adjust_motion(&self, cursor: Point<f64, Logical>, dx: f64, dy: f64) -> (f64, f64) {
        if !self.active {
            return (dx, dy);
        }

        match self.kind {
            ConstraintKind::Lock => (0., 0.),
            ConstraintKind::Confine => {
                let Some(region) = self.region else { return (dx, dy) };
                let region = region.to_f64();
                let target_x = (cursor.x + dx).clamp(region.loc.x, region.loc.x + region.size.w);
                let target_y = (cursor.y + dy).clamp(region.loc.y, region.loc.y + region.size.h);
                (target_x - cursor.x, target_y - cursor.y)
            },
        }
    }
}

/// One drag-and-drop icon, tracked by the seat that owns the drag.
pub struct DragIcon {
    pub seat: u32,
    pub offset: Point<i32, Logical>,
}

/// Iterates scene drag-icon nodes and repositions those whose source
/// seat matches the cursor that moved, per spec.md §4.6.
#[derive(Default)]
pub struct DragIcons {
    icons: Vec<DragIcon>,
}

impl DragIcons {
    pub fn push(&mut self, icon: DragIcon) {
        self.icons.push(icon);
    }

    pub fn remove_for_seat(&mut self, seat: u32) {
        self.icons.retain(|icon| icon.seat != seat);
    }

    pub fn positions_for_seat(
        &self,
        seat: u32,
        cursor: Point<i32, Logical>,
    ) -> Vec<Point<i32, Logical>> {
        self.icons.iter().filter(|icon| icon.seat == seat).map(|icon| cursor + icon.offset).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_swallows_all_motion_once_active() {
        let mut constraint = PointerConstraint::new(ConstraintKind::Lock, None);
        assert!(constraint.activate_if_inside(Point::from((0., 0.))));
        assert_eq!(constraint.adjust_motion(Point::from((0., 0.)), 5., 5.), (0., 0.));
    }

    #[test]
    fn confine_clips_motion_to_region() {
        let region = Rectangle::from_loc_and_size((0, 0), (100, 100));
        let mut constraint = PointerConstraint::new(ConstraintKind::Confine, Some(region));
        assert!(constraint.activate_if_inside(Point::from((50., 50.))));
        let (dx, dy) = constraint.adjust_motion(Point::from((95., 95.)), 20., 20.);
        assert_eq!((95. + dx, 95. + dy), (100., 100.));
    }

    #[test]
    fn inactive_constraint_passes_motion_through() {
        let region = Rectangle::from_loc_and_size((0, 0), (10, 10));
        let constraint = PointerConstraint::new(ConstraintKind::Confine, Some(region));
        assert_eq!(constraint.adjust_motion(Point::from((50., 50.)), 3., 4.), (3., 4.));
    }

    #[test]
    fn drag_icons_follow_only_their_own_seat() {
        let mut icons = DragIcons::default();
        icons.push(DragIcon { seat: 1, offset: Point::from((5, 5)) });
        icons.push(DragIcon { seat: 2, offset: Point::from((0, 0)) });
        let positions = icons.positions_for_seat(1, Point::from((10, 10)));
        assert_eq!(positions, vec![Point::from((15, 15))]);
    }
}
