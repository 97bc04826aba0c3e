//! Cursor mode state machine (component C5).
//!
//! No direct analogue exists in the teacher; authored fresh as a pure
//! state machine per spec.md §4.5, in the same plain-enum-with-methods
//! style as [`crate::output::LockRenderState`] (itself grounded on
//! niri's `RedrawState`/`LockRenderState`).

use crate::windows::window::WindowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeEdges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeState {
    pub window: WindowId,
    pub edges: ResizeEdges,
    pub initial_w: i32,
    pub initial_h: i32,
}

/// Cursor location and surface-local coordinates captured at the start
/// of a `down` grab, per spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownOrigin {
    pub lx: f64,
    pub ly: f64,
    pub sx: f64,
    pub sy: f64,
}

impl DownOrigin {
    /// Surface-local coordinates to forward motion at, given the
    /// cursor's current layout position (spec.md §4.5 `down` motion
    /// semantics).
    pub fn surface_coords(&self, cursor_x: f64, cursor_y: f64) -> (f64, f64) {
        (self.sx + (cursor_x - self.lx), self.sy + (cursor_y - self.ly))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind {
    Resize(ResizeState),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CursorMode {
    #[default]
    Passthrough,
    Down(DownOrigin),
    Ignore,
    Op {
        kind: OpKind,
        /// Fractional carry-over not yet reflected in an integer
        /// displacement, one component per axis (spec.md §4.5).
        carry_x: f64,
        carry_y: f64,
    },
}

/// Drives the transitions and motion semantics of §4.5. Owned by a
/// Seat.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorModeMachine {
    mode: CursorMode,
}

impl CursorModeMachine {
    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self.mode, CursorMode::Passthrough)
    }

    /// `passthrough -> down`: pointer press while a surface is under
    /// the cursor.
    pub fn enter_down(&mut self, origin: DownOrigin) {
        debug_assert!(self.is_passthrough(), "enter_down from a non-passthrough mode");
        self.mode = CursorMode::Down(origin);
    }

    /// `passthrough -> ignore`: pointer press with no surface under
    /// the cursor, or a binding matched. Also reachable directly from
    /// `op`/`resize` when the wm ends the operation into `ignore`.
    pub fn enter_ignore(&mut self) {
        self.mode = CursorMode::Ignore;
    }

    /// `down -> passthrough`: the final pressed button was released.
    pub fn release_down(&mut self) {
        if matches!(self.mode, CursorMode::Down(_)) {
            self.mode = CursorMode::Passthrough;
        }
    }

    /// `ignore -> passthrough`: only legal once the pressed-button
    /// table is empty and no binding is otherwise sustaining `ignore`.
    /// A no-op if either condition doesn't hold, matching §8 property
    /// 6 (idempotence).
    pub fn exit_ignore(&mut self, pressed_table_empty: bool, binding_sustaining: bool) {
        if matches!(self.mode, CursorMode::Ignore) && pressed_table_empty && !binding_sustaining {
            self.mode = CursorMode::Passthrough;
        }
    }

    /// `passthrough -> op`: an interactive operation (e.g. resize)
    /// initiated by the wm client.
    pub fn enter_op(&mut self, kind: OpKind) {
        debug_assert!(self.is_passthrough(), "enter_op from a non-passthrough mode");
        self.mode = CursorMode::Op { kind, carry_x: 0., carry_y: 0. };
    }

    /// `op -> passthrough`: the wm ended the operation, or the final
    /// button release ended it implicitly.
    pub fn end_op_to_passthrough(&mut self) {
        if matches!(self.mode, CursorMode::Op { .. }) {
            self.mode = CursorMode::Passthrough;
        }
    }

    /// `op -> ignore`: the wm ended the operation directly into
    /// `ignore` (e.g. a binding is still held).
    pub fn end_op_to_ignore(&mut self) {
        if matches!(self.mode, CursorMode::Op { .. }) {
            self.mode = CursorMode::Ignore;
        }
    }

    /// Accumulate a relative motion delta while in `op` mode, applying
    /// carry-over so slow high-DPI motion is not truncated to zero
    /// (spec.md §4.5, §8 property 7). Returns the integer displacement
    /// to apply this call, or `None` outside `op` mode.
    pub fn accumulate(&mut self, dx: f64, dy: f64) -> Option<(i32, i32)> {
        let CursorMode::Op { carry_x, carry_y, .. } = &mut self.mode else {
            return None;
        };
        let total_x = *carry_x + dx;
        let total_y = *carry_y + dy;
        let whole_x = total_x.trunc();
        let whole_y = total_y.trunc();
        *carry_x = total_x - whole_x;
        *carry_y = total_y - whole_y;
        Some((whole_x as i32, whole_y as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;

    #[test]
    fn down_then_final_release_returns_to_passthrough() {
        let mut machine = CursorModeMachine::default();
        machine.enter_down(DownOrigin { lx: 10., ly: 10., sx: 5., sy: 5. });
        assert!(matches!(machine.mode(), CursorMode::Down(_)));
        machine.release_down();
        assert!(machine.is_passthrough());
    }

    #[test]
    fn down_motion_forwards_relative_to_origin() {
        let origin = DownOrigin { lx: 100., ly: 100., sx: 20., sy: 20. };
        assert_eq!(origin.surface_coords(137., 118.), (57., 38.));
    }

    #[test]
    fn exit_ignore_is_idempotent_and_gated() {
        let mut machine = CursorModeMachine::default();
        machine.enter_ignore();
        machine.exit_ignore(false, false);
        assert!(matches!(machine.mode(), CursorMode::Ignore), "must not exit while pressed table nonempty");

        machine.exit_ignore(true, true);
        assert!(matches!(machine.mode(), CursorMode::Ignore), "must not exit while a binding sustains it");

        machine.exit_ignore(true, false);
        assert!(machine.is_passthrough());

        // Repeated calls once already passthrough are no-ops.
        machine.exit_ignore(true, false);
        assert!(machine.is_passthrough());
    }

    #[test]
    fn op_accumulates_fractional_motion_without_loss() {
        let mut machine = CursorModeMachine::default();
        let resize = ResizeState {
            window: Id::for_test(1),
            edges: ResizeEdges { right: true, bottom: true, ..Default::default() },
            initial_w: 400,
            initial_h: 300,
        };
        machine.enter_op(OpKind::Resize(resize));

        let mut total = 0i32;
        for _ in 0..10 {
            let (dx, _) = machine.accumulate(0.3, 0.0).unwrap();
            total += dx;
        }
        // 10 * 0.3 == 3.0 exactly in floating point here; assert no
        // net loss versus the running fractional sum.
        assert_eq!(total, 3);
    }

    #[test]
    fn op_ends_into_passthrough_or_ignore() {
        let mut machine = CursorModeMachine::default();
        let resize = ResizeState {
            window: Id::for_test(1),
            edges: ResizeEdges::default(),
            initial_w: 100,
            initial_h: 100,
        };
        machine.enter_op(OpKind::Resize(resize));
        machine.end_op_to_ignore();
        assert!(matches!(machine.mode(), CursorMode::Ignore));

        machine.enter_ignore();
        let mut machine2 = CursorModeMachine::default();
        machine2.enter_op(OpKind::Resize(resize));
        machine2.end_op_to_passthrough();
        assert!(machine2.is_passthrough());
    }
}
