//! Output lifecycle (component C7).
//!
//! Outputs carry a pending/sent/current triple mirroring [`Window`]'s,
//! simplified per spec.md §3/§4.7: `sendDirty` creates the protocol
//! object on first exposure and keeps `sent` in sync with `pending`;
//! `current` only changes once a transaction involving this output
//! commits.

use smithay::utils::{Logical, Physical, Point, Size, Transform};

use crate::ids::Id;

/// Operational state of an output, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Enabled,
    DisabledSoft,
    DisabledHard,
    Destroying,
}

/// Presentation-driven render state for the session-lock manager's
/// "fully blanked" observation, per spec.md §3/§4.7.
///
/// Grounded on niri's `LockRenderState`/`RedrawState` pure-enum style
/// (`niri::types` in the example pack): purely data, advanced only by
/// explicit calls from the frame-commit and presentation-event paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockRenderState {
    #[default]
    PendingUnlock,
    Unlocked,
    PendingBlank,
    Blanked,
    PendingLockSurface,
    LockSurface,
}

impl LockRenderState {
    /// Advance the state after a frame has been submitted for
    /// presentation, given whether the frame was blank or carried a
    /// lock surface.
    pub fn frame_committed(self, blank: bool, has_lock_surface: bool) -> Self {
        match (self, blank, has_lock_surface) {
            (Self::Unlocked, _, true) | (Self::PendingLockSurface, _, true) => {
                Self::PendingLockSurface
            },
            (Self::Unlocked, true, false) => Self::PendingBlank,
            (Self::PendingBlank, true, false) => Self::PendingBlank,
            (other, _, _) => other,
        }
    }

    /// Advance the state after a `wp_presentation` feedback event for
    /// the most recently committed frame.
    pub fn presented(self) -> Self {
        match self {
            Self::PendingBlank => Self::Blanked,
            Self::PendingLockSurface => Self::LockSurface,
            other => other,
        }
    }

    /// Whether the session-lock manager may consider the output fully
    /// blanked or showing its lock surface.
    pub fn is_secured(self) -> bool {
        matches!(self, Self::Blanked | Self::LockSurface)
    }
}

/// A logical screen's geometry, mirrored across pending/sent/current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputGeometry {
    pub position: Point<i32, Logical>,
    pub size: Size<i32, Logical>,
    pub scale: f64,
    pub transform: Transform,
    pub adaptive_sync: bool,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self {
            position: Point::from((0, 0)),
            size: Size::from((0, 0)),
            scale: 1.,
            transform: Transform::Normal,
            adaptive_sync: false,
        }
    }
}

pub struct OutputMarker;

pub struct Output {
    pub id: Id<OutputMarker>,

    pending: OutputGeometry,
    sent: Option<OutputGeometry>,
    current: OutputGeometry,

    op_state: OpState,
    lock_render_state: LockRenderState,

    /// Whether the wm-facing protocol object for this output has been
    /// created yet; `send_dirty` lazily creates it on first exposure.
    announced: bool,
}

impl Output {
    pub fn new(id: Id<OutputMarker>, geometry: OutputGeometry) -> Self {
        Self {
            id,
            pending: geometry,
            sent: None,
            current: geometry,
            op_state: OpState::Enabled,
            lock_render_state: LockRenderState::default(),
            announced: false,
        }
    }

    pub fn pending_mut(&mut self) -> &mut OutputGeometry {
        &mut self.pending
    }

    pub fn current(&self) -> &OutputGeometry {
        &self.current
    }

    pub fn op_state(&self) -> OpState {
        self.op_state
    }

    pub fn lock_render_state(&self) -> LockRenderState {
        self.lock_render_state
    }

    /// Called once a frame has been submitted to this output.
    pub fn mark_frame_committed(&mut self, blank: bool, has_lock_surface: bool) {
        self.lock_render_state = self.lock_render_state.frame_committed(blank, has_lock_surface);
    }

    /// Called on successful `wp_presentation` feedback for this output.
    pub fn mark_presented(&mut self) {
        self.lock_render_state = self.lock_render_state.presented();
    }

    /// Transfer `pending` into `current`. Called by the transaction
    /// coordinator once this output's participation in the active
    /// transaction is resolved.
    pub fn commit_transaction(&mut self) {
        self.current = self.pending;
    }

    /// Compute the announcement/delta batch that must reach the wm
    /// client, and update `sent` to match. Returns `None` if nothing
    /// changed since the last call (no-op update).
    pub fn send_dirty(&mut self) -> Option<OutputDelta> {
        if self.sent == Some(self.pending) {
            return None;
        }

        let newly_announced = !self.announced;
        self.announced = true;
        let delta = OutputDelta { newly_announced, geometry: self.pending };
        self.sent = Some(self.pending);
        Some(delta)
    }

    /// Begin soft/hard disable or destruction, per spec.md §4.7.
    pub fn set_op_state(&mut self, state: OpState) {
        self.op_state = state;
    }

    pub fn is_destroying(&self) -> bool {
        self.op_state == OpState::Destroying
    }
}

/// What must be sent to the wm client for an output that changed.
#[derive(Debug, Clone, Copy)]
pub struct OutputDelta {
    pub newly_announced: bool,
    pub geometry: OutputGeometry,
}

/// Physical resolution helper, used by screencopy-style consumers.
pub fn physical_size(geometry: &OutputGeometry) -> Size<i32, Physical> {
    geometry.size.to_physical_precise_round(geometry.scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_dirty_only_once_per_unchanged_state() {
        let mut output = Output::new(Id::for_test(1), OutputGeometry::default());
        let first = output.send_dirty();
        assert!(first.is_some());
        assert!(first.unwrap().newly_announced);

        // No pending change: second call is a no-op.
        assert!(output.send_dirty().is_none());

        output.pending_mut().scale = 2.;
        let second = output.send_dirty();
        assert!(second.is_some());
        assert!(!second.unwrap().newly_announced);
    }

    #[test]
    fn lock_render_state_tracks_blank_then_presented() {
        let mut state = LockRenderState::Unlocked;
        state = state.frame_committed(true, false);
        assert_eq!(state, LockRenderState::PendingBlank);
        state = state.presented();
        assert_eq!(state, LockRenderState::Blanked);
        assert!(state.is_secured());
    }
}
