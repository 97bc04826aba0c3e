//! Backend seam.
//!
//! The real wlroots/DRM/libinput glue is an external collaborator (spec.md
//! §1 "Out of scope"); this crate only needs a name for the seat it's
//! running against and a place to plug that glue in once it exists.
//! Grounded on catacomb's `Udev`/`Winit` split (`main.rs`), reduced to the
//! one thing the core actually consumes from a backend.

pub trait Backend {
    /// The `wl_seat` name this backend's input devices are grouped under.
    fn seat_name(&self) -> String;

    /// Invoke the session backend's VT switch, per spec.md §4.4's
    /// `XF86Switch_VT_N` built-in. Returns whether the switch actually
    /// happened; a headless/winit backend with no real session has
    /// nothing to switch and returns `false`.
    fn change_vt(&mut self, vt: u32) -> bool;
}

/// Stand-in used for headless operation and tests. A real build wires in
/// a DRM/libinput-backed implementation instead.
pub struct HeadlessBackend {
    seat_name: String,
}

impl HeadlessBackend {
    pub fn new(seat_name: impl Into<String>) -> Self {
        Self { seat_name: seat_name.into() }
    }
}

impl Backend for HeadlessBackend {
    fn seat_name(&self) -> String {
        self.seat_name.clone()
    }

    fn change_vt(&mut self, vt: u32) -> bool {
        tracing::debug!(vt, "headless backend has no session to switch VTs on");
        false
    }
}
