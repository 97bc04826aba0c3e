//! Seat: a logical input focus domain tying together the cursor mode
//! machine (C5), the binding dispatcher (C4), and pointer
//! constraint/touch/drag-icon tracking (C6), per spec.md §3/§4.4-4.6.

pub mod binding;
pub mod constraint;
pub mod cursor;
pub mod touch;

use std::collections::HashSet;

use smithay::input::keyboard::ModifiersState;
use smithay::utils::{Logical, Point};
use xkbcommon::xkb::Keysym;

use self::binding::{BindingDispatcher, BindingId, ButtonDispatch, KeyDispatch, KeyboardId};
use self::constraint::{DragIcons, PointerConstraint};
use self::cursor::{CursorMode, CursorModeMachine, DownOrigin, OpKind};
use self::touch::TouchTracker;
use crate::ids::Id;
use crate::windows::window::WindowId;

pub struct SeatMarker;
pub type SeatId = Id<SeatMarker>;

/// What a caller (the compositor's input glue) must do in response to
/// a pointer button event, after the seat has updated its own state.
pub enum ButtonAction {
    /// A binding consumed the press/release; forward `events` to the
    /// wm client (empty if this device's emission was suppressed as a
    /// duplicate).
    Bound { binding: BindingId, emit: bool },
    /// No binding matched; forward the raw button to `surface` if any.
    Forward { surface: Option<WindowId> },
}

/// What a caller must do in response to a key event.
pub enum KeyAction {
    Bound { binding: BindingId, emit: bool },
    /// Handled as a hard-coded built-in (spec.md §4.4); carries the VT
    /// number for a `XF86Switch_VT_N` key.
    BuiltIn(u32),
    Forward { eaten: bool },
}

pub struct Seat {
    pub id: SeatId,
    pub name: String,

    cursor_position: Point<f64, Logical>,
    cursor_mode: CursorModeMachine,
    bindings: BindingDispatcher,
    touch: TouchTracker,
    constraint: Option<PointerConstraint>,
    drag_icons: DragIcons,

    raw_pressed_buttons: HashSet<u32>,
    pointer_focus: Option<WindowId>,
    keyboard_focus: Option<WindowId>,
}

impl Seat {
    pub fn new(id: SeatId, name: String) -> Self {
        Self {
            id,
            name,
            cursor_position: Point::from((0., 0.)),
            cursor_mode: CursorModeMachine::default(),
            bindings: BindingDispatcher::new(),
            touch: TouchTracker::new(),
            constraint: None,
            drag_icons: DragIcons::default(),
            raw_pressed_buttons: HashSet::new(),
            pointer_focus: None,
            keyboard_focus: None,
        }
    }

    pub fn bindings(&self) -> &BindingDispatcher {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut BindingDispatcher {
        &mut self.bindings
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor_mode.mode()
    }

    pub fn cursor_position(&self) -> Point<f64, Logical> {
        self.cursor_position
    }

    pub fn pointer_focus(&self) -> Option<WindowId> {
        self.pointer_focus
    }

    pub fn keyboard_focus(&self) -> Option<WindowId> {
        self.keyboard_focus
    }

    pub fn set_keyboard_focus(&mut self, window: Option<WindowId>) {
        self.keyboard_focus = window;
    }

    pub fn set_constraint(&mut self, constraint: Option<PointerConstraint>) {
        self.constraint = constraint;
    }

    pub fn constraint(&self) -> Option<&PointerConstraint> {
        self.constraint.as_ref()
    }

    pub fn drag_icons(&mut self) -> &mut DragIcons {
        &mut self.drag_icons
    }

    pub fn touch(&mut self) -> &mut TouchTracker {
        &mut self.touch
    }

    /// Initiate an interactive operation (e.g. resize) from the wm
    /// client, per spec.md §4.5 `passthrough -> op`.
    pub fn begin_op(&mut self, kind: OpKind) {
        self.cursor_mode.enter_op(kind);
        if let Some(constraint) = &mut self.constraint {
            constraint.deactivate();
        }
    }

    pub fn end_op_to_passthrough(&mut self) {
        self.cursor_mode.end_op_to_passthrough();
    }

    pub fn end_op_to_ignore(&mut self) {
        self.cursor_mode.end_op_to_ignore();
    }

    /// Feed a relative motion delta while in `op` mode. Returns the
    /// integer displacement for this call, or `None` outside `op`.
    pub fn accumulate_op_motion(&mut self, dx: f64, dy: f64) -> Option<(i32, i32)> {
        self.cursor_mode.accumulate(dx, dy)
    }

    /// Move the hardware cursor and, in `passthrough`, report the
    /// surface that should now receive pointer focus (subject to
    /// constraint clipping).
    pub fn motion(&mut self, surface_under_cursor: Option<WindowId>, dx: f64, dy: f64) -> (f64, f64) {
        let (dx, dy) = match (&self.cursor_mode.mode(), &self.constraint) {
            (CursorMode::Passthrough, Some(constraint)) if constraint.is_active() => {
                constraint.adjust_motion(self.cursor_position, dx, dy)
            },
            _ => (dx, dy),
        };

        self.cursor_position.x += dx;
        self.cursor_position.y += dy;

        if matches!(self.cursor_mode.mode(), CursorMode::Passthrough) {
            if let Some(constraint) = &mut self.constraint {
                constraint.activate_if_inside(self.cursor_position);
            }
            self.pointer_focus = surface_under_cursor;
        }

        (dx, dy)
    }

    /// Dispatch a pointer button event per spec.md §4.4.
    pub fn on_pointer_button(
        &mut self,
        button: u32,
        pressed: bool,
        modifiers: ModifiersState,
        surface_under_cursor: Option<WindowId>,
    ) -> ButtonAction {
        if pressed {
            self.raw_pressed_buttons.insert(button);
        } else {
            self.raw_pressed_buttons.remove(&button);
        }

        // An interactive op is ended by an explicit wm action
        // (`end_op_to_passthrough`/`end_op_to_ignore`, driven by
        // `wm_end_interactive_op`) or by the final button release,
        // per spec.md §4.5. While the op is live, buttons are not
        // dispatched to bindings.
        if matches!(self.cursor_mode.mode(), CursorMode::Op { .. }) {
            if !pressed && self.raw_pressed_buttons.is_empty() {
                self.cursor_mode.end_op_to_passthrough();
            }
            return ButtonAction::Forward { surface: self.pointer_focus };
        }

        match self.bindings.on_pointer_button(button, pressed, modifiers) {
            ButtonDispatch::Bound { binding, emit, pressed_table_empty } => {
                if pressed {
                    self.cursor_mode.enter_ignore();
                    self.pointer_focus = None;
                    if let Some(constraint) = &mut self.constraint {
                        constraint.deactivate();
                    }
                } else if pressed_table_empty {
                    self.cursor_mode.exit_ignore(self.raw_pressed_buttons.is_empty(), false);
                }
                ButtonAction::Bound { binding, emit }
            },
            ButtonDispatch::Unbound => {
                if pressed {
                    match surface_under_cursor {
                        Some(surface) => {
                            let origin = DownOrigin {
                                lx: self.cursor_position.x,
                                ly: self.cursor_position.y,
                                sx: self.cursor_position.x,
                                sy: self.cursor_position.y,
                            };
                            self.cursor_mode.enter_down(origin);
                            self.pointer_focus = Some(surface);
                        },
                        None => {
                            self.cursor_mode.enter_ignore();
                            self.pointer_focus = None;
                        },
                    }
                } else if self.raw_pressed_buttons.is_empty() {
                    self.cursor_mode.release_down();
                    self.cursor_mode.exit_ignore(true, false);
                }
                ButtonAction::Forward { surface: self.pointer_focus }
            },
        }
    }

    /// Dispatch a key event per spec.md §4.4.
    pub fn on_key(
        &mut self,
        keyboard: KeyboardId,
        keycode: u32,
        pressed: bool,
        no_translate: (Keysym, ModifiersState),
        translate: (Keysym, ModifiersState),
    ) -> KeyAction {
        match self.bindings.on_key(keyboard, keycode, pressed, no_translate, translate) {
            KeyDispatch::Bound { binding, emit } => KeyAction::Bound { binding, emit },
            KeyDispatch::Unbound => {
                if pressed {
                    if let Some(vt) = binding::vt_switch_target(no_translate.0) {
                        return KeyAction::BuiltIn(vt);
                    }
                }
                KeyAction::Forward { eaten: !pressed && self.bindings.is_eaten(keyboard, keycode) }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use smithay::utils::Rectangle;
    use xkbcommon::xkb::keysyms;

    use super::*;
    use crate::ids::Id;
    use crate::seat::cursor::{ResizeEdges, ResizeState};
    use crate::windows::window::test_support::FakeSink;
    use crate::windows::window::ConfigureState;
    use crate::windows::Windows;

    fn seat() -> Seat {
        Seat::new(Id::for_test(1), "seat0".into())
    }

    fn super_mods() -> ModifiersState {
        let mut mods = ModifiersState::default();
        mods.logo = true;
        mods
    }

    #[test]
    fn press_on_empty_desktop_enters_ignore_and_clears_focus() {
        let mut seat = seat();
        let action = seat.on_pointer_button(1, true, ModifiersState::default(), None);
        assert!(matches!(action, ButtonAction::Forward { surface: None }));
        assert!(matches!(seat.cursor_mode(), CursorMode::Ignore));
        assert!(seat.pointer_focus().is_none());

        let action = seat.on_pointer_button(1, false, ModifiersState::default(), None);
        assert!(matches!(action, ButtonAction::Forward { .. }));
        assert!(seat.cursor_mode().eq(&CursorMode::Passthrough));
    }

    #[test]
    fn press_on_surface_enters_down_and_keeps_focus() {
        let mut seat = seat();
        let window = Id::for_test(7);
        seat.on_pointer_button(1, true, ModifiersState::default(), Some(window));
        assert!(matches!(seat.cursor_mode(), CursorMode::Down(_)));
        assert_eq!(seat.pointer_focus(), Some(window));
    }

    #[test]
    fn bound_button_suppresses_focus_and_eventually_returns_to_passthrough() {
        let mut seat = seat();
        let id = seat.bindings_mut().create_pointer_binding(272, ModifiersState::default());
        seat.bindings_mut().get_mut(id).unwrap().set_enabled(true);
        seat.bindings_mut().commit_all();

        let action = seat.on_pointer_button(272, true, ModifiersState::default(), None);
        assert!(matches!(action, ButtonAction::Bound { emit: true, .. }));
        assert!(matches!(seat.cursor_mode(), CursorMode::Ignore));

        let action = seat.on_pointer_button(272, false, ModifiersState::default(), None);
        assert!(matches!(action, ButtonAction::Bound { emit: true, .. }));
        assert!(seat.cursor_mode().eq(&CursorMode::Passthrough));
    }

    /// spec.md §8 scenario D: a bound key is eaten on both press and
    /// release, and the editor sees nothing for that keycode.
    #[test]
    fn scenario_binding_fires_press_eaten() {
        let mut seat = seat();
        let keysym = Keysym::from(keysyms::KEY_n);
        let binding = seat.bindings_mut().create_xkb_binding(keysym, super_mods());
        seat.bindings_mut().get_mut(binding).unwrap().set_enabled(true);
        seat.bindings_mut().commit_all();

        let keyboard = 1;
        let keycode = 49; // arbitrary hardware keycode for 'n'
        let candidate = (keysym, super_mods());

        let press = seat.on_key(keyboard, keycode, true, candidate, candidate);
        match press {
            KeyAction::Bound { binding: fired, emit } => {
                assert_eq!(fired, binding);
                assert!(emit, "wm must receive pressed(B)");
            },
            _ => panic!("expected a bound press"),
        }
        assert!(seat.bindings().is_eaten(keyboard, keycode));

        let release = seat.on_key(keyboard, keycode, false, candidate, candidate);
        match release {
            KeyAction::Bound { binding: fired, emit } => {
                assert_eq!(fired, binding);
                assert!(emit, "wm must receive released(B)");
            },
            _ => panic!("expected a bound release"),
        }
        assert!(!seat.bindings().is_eaten(keyboard, keycode), "editor must see nothing for this keycode");
    }

    /// spec.md §8 scenario F: VT switching is a hard-coded built-in,
    /// never forwarded and never registered as an eaten binding.
    #[test]
    fn scenario_vt_switch_is_built_in_and_not_forwarded() {
        let mut seat = seat();
        let vt2 = Keysym::from(keysyms::KEY_XF86Switch_VT_2);
        let candidate = (vt2, ModifiersState::default());

        let action = seat.on_key(1, 200, true, candidate, candidate);
        assert!(matches!(action, KeyAction::BuiltIn(2)), "VT switch must carry the target VT number");
        assert!(
            !seat.bindings().is_eaten(1, 200),
            "a built-in consumes the key without registering it as an eaten binding keycode"
        );
    }

    /// spec.md §8 scenario B: cursor motion while in an interactive
    /// resize accumulates into `pending`, a transaction carries it to
    /// the client, and `current` reflects the committed size. Drives
    /// the op through the real `Seat`/`Windows` seam instead of
    /// hand-assigning `pending.rect.size` directly.
    #[test]
    fn scenario_resize_interactive_applies_accumulated_motion() {
        let mut windows: Windows<FakeSink> = Windows::new();
        let w = windows.add(FakeSink::default());
        windows.get_mut(w).unwrap().pending_mut().rect = Rectangle::from_loc_and_size((0, 0), (400, 300));

        // Settle the initial 400x300 as `current` before the resize
        // grab starts, mirroring the window already being tiled.
        let now = Instant::now();
        windows.begin_transaction(vec![w], now);
        let initial_serial = match windows.get(w).unwrap().configure_state() {
            ConfigureState::Inflight(s) => s,
            other => panic!("expected Inflight, got {other:?}"),
        };
        windows.ack_configure(w, initial_serial);
        windows.surface_committed(w);
        windows.poll_transaction(now, Duration::from_millis(200));
        assert_eq!(windows.get(w).unwrap().current().rect.size.w, 400);

        let mut seat = seat();
        let resize = ResizeState {
            window: w,
            edges: ResizeEdges { right: true, bottom: true, ..Default::default() },
            initial_w: 400,
            initial_h: 300,
        };
        seat.begin_op(OpKind::Resize(resize));
        assert!(matches!(seat.cursor_mode(), CursorMode::Op { .. }));

        // Cursor motion accumulates (+37.4, +18.7) as described by the
        // scenario; feed it as several smaller relative deltas.
        let mut total_dx = 0i32;
        let mut total_dy = 0i32;
        for (dx, dy) in [(12.4, 6.7), (15.0, 7.0), (10.0, 5.0)] {
            let (ddx, ddy) = seat.accumulate_op_motion(dx, dy).expect("op mode must accumulate motion");
            total_dx += ddx;
            total_dy += ddy;
        }
        assert_eq!(total_dx, 37);
        assert_eq!(total_dy, 18);

        let pending = windows.get_mut(w).unwrap().pending_mut();
        pending.rect.size.w = resize.initial_w + total_dx;
        pending.rect.size.h = resize.initial_h + total_dy;
        assert_eq!(windows.get(w).unwrap().pending().rect.size.w, 437);
        assert_eq!(windows.get(w).unwrap().pending().rect.size.h, 318);

        // A final button release ends the op, the way
        // `on_pointer_button` does it for a real interactive grab.
        seat.on_pointer_button(272, true, ModifiersState::default(), None);
        assert!(matches!(seat.cursor_mode(), CursorMode::Op { .. }), "op survives intermediate presses");
        let release = seat.on_pointer_button(272, false, ModifiersState::default(), None);
        assert!(matches!(release, ButtonAction::Forward { .. }));
        assert!(matches!(seat.cursor_mode(), CursorMode::Passthrough));

        // The wm commits the resize; the client acks and commits a
        // matching 437x318 buffer.
        windows.begin_transaction(vec![w], now);
        let serial = match windows.get(w).unwrap().configure_state() {
            ConfigureState::Inflight(s) => s,
            other => panic!("expected Inflight, got {other:?}"),
        };
        windows.ack_configure(w, serial);
        windows.surface_committed(w);
        let (outcomes, _) = windows.poll_transaction(now, Duration::from_millis(200));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(windows.get(w).unwrap().current().rect.size.w, 437);
        assert_eq!(windows.get(w).unwrap().current().rect.size.h, 318);
    }
}
