//! Central compositor state.
//!
//! Grounded on catacomb's `Catacomb` (`catacomb.rs`): one struct owns
//! every protocol state plus this crate's own window/seat/wm-cycle
//! bookkeeping, with handler trait impls that delegate straight into the
//! owned state and a `tick`-style per-cycle entry point standing in for
//! catacomb's `create_frame`. Rendering and backend glue are external
//! collaborators (spec.md §1) and are not wired in here.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::os::unix::io::AsRawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use smithay::input::keyboard::{FilterResult, ModifiersState};
use smithay::input::pointer::CursorImageStatus;
use smithay::input::{Seat as SmithaySeat, SeatHandler, SeatState};
use smithay::reexports::calloop::generic::Generic;
use smithay::reexports::calloop::timer::{TimeoutAction, Timer};
use smithay::reexports::calloop::{Interest, LoopHandle, Mode as TriggerMode, PostAction};
use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel::State as XdgToplevelState;
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::reexports::wayland_server::{Display, DisplayHandle};
use smithay::utils::{Logical, Point, Serial};
use smithay::wayland::compositor::{self, CompositorHandler, CompositorState};
use smithay::wayland::shell::xdg::{
    Configure, PopupSurface, PositionerState, ToplevelSurface, XdgShellHandler, XdgShellState,
    XdgToplevelSurfaceData,
};
use smithay::{delegate_compositor, delegate_seat, delegate_xdg_shell};
use xkbcommon::xkb::Keysym;

use crate::backend::Backend;
use crate::config::Config;
use crate::delegate_window_manager;
use crate::error::{handle_recoverable, CoreError};
use crate::ids::{Id, IdAllocator};
use crate::output::{Output, OutputGeometry, OutputMarker};
use crate::protocols::wm::{WindowManagerHandler, WindowManagerState};
use crate::seat::binding::BindingId;
use crate::seat::cursor::{CursorMode, OpKind, ResizeEdges, ResizeState};
use crate::seat::{ButtonAction, KeyAction, Seat, SeatMarker};
use crate::windows::window::{ConfigureSink, WindowId, WindowState};
use crate::windows::Windows;
use crate::wm::WmUpdateCycle;

/// Adapts a `ToplevelSurface` to the [`ConfigureSink`] contract C1's
/// state machine drives. Grounded on catacomb's own `set_state` calls
/// over `ToplevelSurface` (`windows/mod.rs`), generalized to cover the
/// full `WindowState` rather than one flag at a time.
pub struct ToplevelSink(pub ToplevelSurface);

impl ConfigureSink for ToplevelSink {
    fn send_configure(&mut self, state: &WindowState) -> Serial {
        self.0.with_pending_state(|toplevel_state| {
            toplevel_state.size = Some((state.rect.size.w, state.rect.size.h).into());

            let set_flag = |flag, on: bool| {
                if on {
                    toplevel_state.states.set(flag);
                } else {
                    toplevel_state.states.unset(flag);
                }
            };
            set_flag(XdgToplevelState::Activated, state.focus_count > 0);
            set_flag(XdgToplevelState::Fullscreen, state.fullscreen);
            set_flag(XdgToplevelState::Resizing, state.resizing);
        });
        self.0.send_configure()
    }

    fn last_observed_size(&self) -> (i32, i32) {
        let size = self.0.current_state().size.unwrap_or_default();
        (size.w, size.h)
    }
}

fn modifiers_from_bits(bits: u32) -> ModifiersState {
    let mut modifiers = ModifiersState::default();
    modifiers.shift = bits & crate::protocols::wm::modifier::SHIFT != 0;
    modifiers.ctrl = bits & crate::protocols::wm::modifier::CTRL != 0;
    modifiers.alt = bits & crate::protocols::wm::modifier::ALT != 0;
    modifiers.logo = bits & crate::protocols::wm::modifier::SUPER != 0;
    modifiers
}

/// Which core state a mutating wm request touched, so `wm_commit` knows
/// what needs to be folded into the next transaction/update batch.
#[derive(Default)]
struct PendingBatch {
    windows: HashSet<WindowId>,
}

pub struct Compositor<B: Backend> {
    pub event_loop: LoopHandle<'static, Self>,
    pub display_handle: DisplayHandle,
    pub backend: B,
    pub terminated: bool,

    pub windows: Windows<ToplevelSink>,
    toplevels: HashMap<WindowId, ToplevelSurface>,
    surface_windows: HashMap<WlSurface, WindowId>,

    pub outputs: HashMap<Id<OutputMarker>, Output>,
    output_ids: IdAllocator<OutputMarker>,

    pub seat: Seat,
    smithay_seat: SmithaySeat<Self>,
    seat_id_alloc: IdAllocator<SeatMarker>,
    config: Config,

    cycle: WmUpdateCycle,
    pending: PendingBatch,
    wm_state: WindowManagerState<Self>,

    compositor_state: CompositorState,
    xdg_shell_state: XdgShellState,
    seat_state: SeatState<Self>,

    // Must be last: dropped after every global it backs.
    display: Rc<RefCell<Display<Self>>>,
}

impl<B: Backend> Compositor<B> {
    pub fn new(event_loop: LoopHandle<'static, Self>, backend: B, config: Config) -> Self {
        let display = Display::<Self>::new().expect("wayland display creation");
        let display_handle = display.handle();

        event_loop
            .insert_source(
                Generic::new(display.backend().poll_fd().as_raw_fd(), Interest::READ, TriggerMode::Level),
                |_, _, state: &mut Self| Ok(state.handle_socket_readiness()),
            )
            .expect("register display event source");

        let compositor_state = CompositorState::new::<Self>(&display_handle);
        let xdg_shell_state = XdgShellState::new::<Self>(&display_handle);
        let mut seat_state = SeatState::new();

        let seat_name = backend.seat_name();
        let mut smithay_seat = seat_state.new_wl_seat(&display_handle, seat_name.clone());
        smithay_seat
            .add_keyboard(config.xkb_config(), config.repeat_rate, config.repeat_delay)
            .expect("adding keyboard");
        smithay_seat.add_pointer();

        let wm_state = WindowManagerState::new(&display_handle);
        let seat_id_alloc = IdAllocator::<SeatMarker>::default();
        let seat_id = seat_id_alloc.alloc();

        let mut compositor = Self {
            event_loop: event_loop.clone(),
            display_handle,
            backend,
            terminated: false,
            windows: Windows::new(),
            toplevels: HashMap::new(),
            surface_windows: HashMap::new(),
            outputs: HashMap::new(),
            output_ids: IdAllocator::default(),
            seat: Seat::new(seat_id, seat_name),
            smithay_seat,
            seat_id_alloc,
            config,
            cycle: WmUpdateCycle::new(),
            pending: PendingBatch::default(),
            wm_state,
            compositor_state,
            xdg_shell_state,
            seat_state,
            display: Rc::new(RefCell::new(display)),
        };

        compositor.schedule_transaction_poll();
        compositor.wm_state.register_seat(&compositor.display_handle);
        compositor
    }

    fn handle_socket_readiness(&mut self) -> PostAction {
        let display = self.display.clone();
        let mut display = display.borrow_mut();
        if let Err(err) = display.dispatch_clients(self) {
            handle_recoverable(CoreError::ResourceExhaustion(err.to_string()));
        }
        PostAction::Continue
    }

    /// Poll the active transaction once per tick, driven by a recurring
    /// calloop timer, mirroring catacomb's redraw-stall timer pattern
    /// but for the transaction deadline instead of a frame clock.
    fn schedule_transaction_poll(&mut self) {
        let timer = Timer::from_duration(Duration::from_millis(16));
        self.event_loop
            .insert_source(timer, |_, _, state: &mut Self| {
                state.drive_transaction();
                TimeoutAction::ToDuration(Duration::from_millis(16))
            })
            .expect("register transaction poll timer");
    }

    fn drive_transaction(&mut self) {
        let (_outcomes, reaped) =
            self.windows.poll_transaction(Instant::now(), self.config.transaction_timeout);
        for id in reaped {
            self.toplevels.remove(&id);
            self.wm_state.window_closed(id);
        }
        // A transaction that just settled may have left ids accumulated
        // in `pending` by an overlapping `wm_commit`/resize while it was
        // inflight; start the next one immediately (spec.md §4.3).
        self.maybe_begin_transaction();
        self.seal_wm_update_if_dirty();
    }

    fn seal_wm_update_if_dirty(&mut self) {
        if let Some(serial) = self.cycle.seal_update() {
            self.wm_state.send_update(serial);
        }
    }

    /// Drain `pending.windows` into a new transaction, unless one is
    /// already active — in which case the ids are left in place so
    /// they coalesce into the transaction that starts once the active
    /// one settles (spec.md §4.3, testable property 2).
    fn maybe_begin_transaction(&mut self) {
        if self.windows.is_transaction_active() || self.pending.windows.is_empty() {
            return;
        }
        let participants: Vec<WindowId> = self.pending.windows.drain().collect();
        self.windows.begin_transaction(participants, Instant::now());
    }

    /// Apply an interactive resize's accumulated motion to the target
    /// window's pending size and fold it into the transaction path the
    /// same way any other wm-committed change is (spec.md §4.5, §5).
    fn apply_resize_delta(&mut self, resize: ResizeState, ddx: i32, ddy: i32) {
        let Some(window) = self.windows.get_mut(resize.window) else { return };
        let pending = window.pending_mut();
        if resize.edges.right {
            pending.rect.size.w = (pending.rect.size.w + ddx).max(1);
        }
        if resize.edges.left {
            pending.rect.size.w = (pending.rect.size.w - ddx).max(1);
        }
        if resize.edges.bottom {
            pending.rect.size.h = (pending.rect.size.h + ddy).max(1);
        }
        if resize.edges.top {
            pending.rect.size.h = (pending.rect.size.h - ddy).max(1);
        }
        self.pending.windows.insert(resize.window);
        self.maybe_begin_transaction();
    }

    fn window_id_for(&self, surface: &WlSurface) -> Option<WindowId> {
        self.surface_windows.get(surface).copied()
    }

    fn refresh_window_metadata(&mut self, surface: &WlSurface, id: WindowId) {
        let (title, app_id) = compositor::with_states(surface, |states| {
            let data = states.data_map.get::<XdgToplevelSurfaceData>();
            data.map_or((None, None), |data| {
                let data = data.lock().unwrap();
                (data.title.clone(), data.app_id.clone())
            })
        });

        if let Some(window) = self.windows.get_mut(id) {
            window.title = title.clone();
            window.app_id = app_id.clone();
        }
        self.wm_state.window_title_changed(id, title.as_deref());
        self.wm_state.window_app_id_changed(id, app_id.as_deref());
    }

    /// Route a pointer button event through the seat's cursor-mode and
    /// binding state, per spec.md §4.4/§4.5.
    pub fn pointer_button(&mut self, button: u32, pressed: bool, serial: Serial) {
        let modifiers = self.smithay_seat.get_keyboard().map(|kb| kb.modifier_state()).unwrap_or_default();
        let surface_under = self.seat.pointer_focus();

        match self.seat.on_pointer_button(button, pressed, modifiers, surface_under) {
            ButtonAction::Bound { binding, emit } => {
                if emit {
                    if pressed {
                        self.wm_state.binding_pressed(binding);
                    } else {
                        self.wm_state.binding_released(binding);
                    }
                }
            },
            ButtonAction::Forward { .. } => {
                let _ = serial;
                // Forwarding the raw button to the focused surface's
                // wl_pointer is backend/input-plumbing territory; out
                // of scope here (spec.md §1). The seat's focus/mode
                // bookkeeping above is what this crate owns.
            },
        }
    }

    /// Route pointer motion through the seat's cursor-mode machine. In
    /// `op`/`resize` the accumulated displacement is applied to the
    /// target window's pending size instead of moving focus (spec.md
    /// §4.5/§4.6); otherwise delegates straight to `Seat::motion`.
    pub fn pointer_motion(
        &mut self,
        surface_under_cursor: Option<WindowId>,
        dx: f64,
        dy: f64,
    ) -> (f64, f64) {
        if let CursorMode::Op { kind: OpKind::Resize(resize), .. } = self.seat.cursor_mode() {
            if let Some((ddx, ddy)) = self.seat.accumulate_op_motion(dx, dy) {
                self.apply_resize_delta(resize, ddx, ddy);
            }
            return (dx, dy);
        }
        self.seat.motion(surface_under_cursor, dx, dy)
    }

    /// Touch seam (component C6, spec.md §4.6). Resize/move initiated
    /// via touch is left unimplemented per spec.md §9; these methods
    /// only track touch points for focus/drag-icon purposes.
    pub fn touch_down(&mut self, id: i32, location: Point<f64, Logical>, surface_present: bool) -> bool {
        self.seat.touch().down(id, location, surface_present)
    }

    pub fn touch_motion(&mut self, id: i32, location: Point<f64, Logical>) -> bool {
        self.seat.touch().motion(id, location)
    }

    pub fn touch_up(&mut self, id: i32) -> bool {
        self.seat.touch().up(id)
    }

    pub fn touch_cancel(&mut self) -> Vec<i32> {
        self.seat.touch().cancel()
    }

    /// Route a key event through the binding dispatcher, per spec.md
    /// §4.4. `no_translate`/`translate` are the pre-computed XKB keysym
    /// candidates under the current and a fully-translated modifier
    /// set; keymap handling itself is out of scope (spec.md §1).
    pub fn keyboard_key(
        &mut self,
        keyboard: u32,
        keycode: u32,
        pressed: bool,
        no_translate: (Keysym, ModifiersState),
        translate: (Keysym, ModifiersState),
    ) -> FilterResult<()> {
        match self.seat.on_key(keyboard, keycode, pressed, no_translate, translate) {
            KeyAction::Bound { binding, emit } => {
                if emit {
                    if pressed {
                        self.wm_state.binding_pressed(binding);
                    } else {
                        self.wm_state.binding_released(binding);
                    }
                }
                FilterResult::Intercept(())
            },
            KeyAction::BuiltIn(vt) => {
                if !self.backend.change_vt(vt) {
                    tracing::warn!(vt, "VT switch request failed");
                }
                FilterResult::Intercept(())
            },
            KeyAction::Forward { eaten } => {
                if eaten {
                    FilterResult::Intercept(())
                } else {
                    FilterResult::Forward
                }
            },
        }
    }

    pub fn add_output(&mut self, geometry: OutputGeometry) -> Id<OutputMarker> {
        let id = self.output_ids.alloc();
        self.outputs.insert(id, Output::new(id, geometry));
        self.wm_state.register_output(&self.display_handle, id);
        self.cycle.dirty_pending();
        id
    }

    pub fn remove_output(&mut self, id: Id<OutputMarker>) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.set_op_state(crate::output::OpState::Destroying);
        }
        self.outputs.remove(&id);
        self.wm_state.output_removed(id);
        self.cycle.dirty_pending();
    }
}

impl<B: Backend> CompositorHandler for Compositor<B> {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(
        &self,
        client: &'a smithay::reexports::wayland_server::Client,
    ) -> &'a compositor::CompositorClientState {
        client.get_data::<compositor::CompositorClientState>().unwrap()
    }

    fn commit(&mut self, surface: &WlSurface) {
        if compositor::is_sync_subsurface(surface) {
            return;
        }

        if let Some(id) = self.window_id_for(surface) {
            self.windows.surface_committed(id);
            self.refresh_window_metadata(surface, id);
        }
    }
}
delegate_compositor!(@<B: Backend + 'static> Compositor<B>);

impl<B: Backend> XdgShellHandler for Compositor<B> {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        let wl_surface = surface.wl_surface().clone();
        let id = self.windows.add(ToplevelSink(surface.clone()));
        self.toplevels.insert(id, surface);
        self.surface_windows.insert(wl_surface, id);
        self.wm_state.register_window(&self.display_handle, id);
        self.cycle.dirty_pending();
    }

    fn new_popup(&mut self, _surface: PopupSurface, _positioner: PositionerState) {
        // Popups are positioned relative to their parent's `current`
        // geometry by the renderer; the transaction engine does not
        // track them as independent participants (spec.md §3).
    }

    fn ack_configure(&mut self, surface: WlSurface, configure: Configure) {
        let Configure::Toplevel(configure) = configure else { return };
        if let Some(id) = self.window_id_for(&surface) {
            self.windows.ack_configure(id, configure.serial);
        }
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        let wl_surface = surface.wl_surface().clone();
        if let Some(id) = self.surface_windows.remove(&wl_surface) {
            self.toplevels.remove(&id);
            self.windows.mark_destroying(id);
            self.cycle.dirty_pending();
        }
    }

    fn popup_destroyed(&mut self, _surface: PopupSurface) {}

    fn fullscreen_request(
        &mut self,
        surface: ToplevelSurface,
        _output: Option<smithay::reexports::wayland_server::protocol::wl_output::WlOutput>,
    ) {
        if let Some(id) = self.window_id_for(surface.wl_surface()) {
            if let Some(window) = self.windows.get_mut(id) {
                window.pending_mut().fullscreen = true;
                self.wm_state.window_requested_fullscreen(id, true);
            }
        }
    }

    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        if let Some(id) = self.window_id_for(surface.wl_surface()) {
            if let Some(window) = self.windows.get_mut(id) {
                window.pending_mut().fullscreen = false;
                self.wm_state.window_requested_fullscreen(id, false);
            }
        }
    }

    fn grab(
        &mut self,
        _surface: PopupSurface,
        _seat: smithay::reexports::wayland_server::protocol::wl_seat::WlSeat,
        _serial: Serial,
    ) {
    }
}
delegate_xdg_shell!(@<B: Backend + 'static> Compositor<B>);

impl<B: Backend> SeatHandler for Compositor<B> {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<Self> {
        &mut self.seat_state
    }

    fn cursor_image(&mut self, _seat: &SmithaySeat<Self>, _image: CursorImageStatus) {}

    fn focus_changed(&mut self, _seat: &SmithaySeat<Self>, surface: Option<&WlSurface>) {
        let id = surface.and_then(|surface| self.window_id_for(surface));
        self.seat.set_keyboard_focus(id);
        self.windows.set_focus(id);
        self.cycle.dirty_pending();
    }
}
delegate_seat!(@<B: Backend + 'static> Compositor<B>);

impl<B: Backend> WindowManagerHandler for Compositor<B> {
    fn wm_state(&mut self) -> &mut WindowManagerState<Self> {
        &mut self.wm_state
    }

    fn wm_ack_update(&mut self, serial: Serial) {
        self.cycle.ack_update(serial);
    }

    fn wm_commit(&mut self) {
        // `commit()` only actually transitions (and returns `true`) if a
        // matching `ack_update` preceded it; a client that commits
        // without acking, or after a stale ack, is not silently
        // accepted (spec.md §7).
        if !self.cycle.commit() {
            return;
        }
        self.seat.bindings_mut().commit_all();
        self.maybe_begin_transaction();
        self.seal_wm_update_if_dirty();
    }

    fn wm_set_window_size(&mut self, window: WindowId, width: i32, height: i32) {
        if let Some(w) = self.windows.get_mut(window) {
            w.pending_mut().rect.size.w = width;
            w.pending_mut().rect.size.h = height;
            self.pending.windows.insert(window);
        }
    }

    fn wm_set_window_position(&mut self, window: WindowId, x: i32, y: i32) {
        if let Some(w) = self.windows.get_mut(window) {
            w.pending_mut().rect.loc = Point::from((x, y));
            self.pending.windows.insert(window);
        }
    }

    fn wm_set_window_state(&mut self, window: WindowId, state_bits: u32) {
        use river_wm_protocol::server::river_window_v1::State as WireState;
        if let Some(w) = self.windows.get_mut(window) {
            let pending = w.pending_mut();
            pending.fullscreen = state_bits & WireState::Fullscreen as u32 != 0;
            pending.urgent = state_bits & WireState::Urgent as u32 != 0;
            pending.resizing = state_bits & WireState::Resizing as u32 != 0;
            pending.server_side_decorations = state_bits & WireState::Ssd as u32 != 0;
            self.pending.windows.insert(window);
        }
    }

    fn wm_set_window_focus(&mut self, window: WindowId, focused: bool) {
        let target = if focused { Some(window) } else { None };
        self.windows.set_focus(target);
        self.pending.windows.insert(window);
    }

    fn wm_close_window(&mut self, window: WindowId) {
        if let Some(surface) = self.toplevels.get(&window) {
            surface.send_close();
        }
    }

    fn wm_begin_resize(&mut self, window: WindowId, edges: u32) {
        use river_wm_protocol::server::river_window_v1::Edge as WireEdge;
        let Some(w) = self.windows.get(window) else { return };
        let size = w.current().rect.size;
        let resize = ResizeState {
            window,
            edges: ResizeEdges {
                top: edges & WireEdge::Top as u32 != 0,
                bottom: edges & WireEdge::Bottom as u32 != 0,
                left: edges & WireEdge::Left as u32 != 0,
                right: edges & WireEdge::Right as u32 != 0,
            },
            initial_w: size.w,
            initial_h: size.h,
        };
        self.seat.begin_op(OpKind::Resize(resize));
    }

    fn wm_end_interactive_op(&mut self) {
        self.seat.end_op_to_passthrough();
    }

    fn wm_create_pointer_binding(&mut self, button: u32, modifiers: u32) -> BindingId {
        let id = self.seat.bindings_mut().create_pointer_binding(button, modifiers_from_bits(modifiers));
        self.cycle.dirty_pending();
        id
    }

    fn wm_create_xkb_binding(&mut self, keysym: u32, modifiers: u32) -> BindingId {
        let id = self
            .seat
            .bindings_mut()
            .create_xkb_binding(Keysym::from(keysym), modifiers_from_bits(modifiers));
        self.cycle.dirty_pending();
        id
    }

    fn wm_destroy_binding(&mut self, binding: BindingId) {
        self.seat.bindings_mut().remove_binding(binding);
    }

    fn wm_set_binding_enabled(&mut self, binding: BindingId, enabled: bool) {
        if let Some(b) = self.seat.bindings_mut().get_mut(binding) {
            b.set_enabled(enabled);
        }
    }

    fn wm_set_binding_layout_override(&mut self, binding: BindingId, layout: Option<u32>) {
        if let Some(b) = self.seat.bindings_mut().get_mut(binding) {
            b.set_layout_override(layout);
        }
    }
}
delegate_window_manager!(@<B: Backend + 'static> Compositor<B>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_from_bits_decodes_every_flag() {
        let bits = crate::protocols::wm::modifier::SHIFT
            | crate::protocols::wm::modifier::CTRL
            | crate::protocols::wm::modifier::ALT
            | crate::protocols::wm::modifier::SUPER;
        let modifiers = modifiers_from_bits(bits);
        assert!(modifiers.shift && modifiers.ctrl && modifiers.alt && modifiers.logo);
        assert!(!modifiers_from_bits(0).shift);
    }
}
