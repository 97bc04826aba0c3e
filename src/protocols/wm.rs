//! Wayland-protocol glue for the window-manager control protocol
//! (`river_window_management_v1`) — the wire surface of components C3
//! and C4's binding-registration requests.
//!
//! Grounded on catacomb's own custom-protocol pattern
//! (`protocols/idle_notify/mod.rs`, `protocols/screencopy/mod.rs`): a
//! `*State<D>` struct owning the global id and the live resource maps,
//! a handler trait the compositor implements to reach its own state,
//! and a `delegate_*!` macro wiring `GlobalDispatch`/`Dispatch`.

use std::collections::HashMap;

use river_wm_protocol::server::river_output_v1::RiverOutputV1;
use river_wm_protocol::server::river_pointer_binding_v1::{self, RiverPointerBindingV1};
use river_wm_protocol::server::river_seat_v1::RiverSeatV1;
use river_wm_protocol::server::river_window_manager_v1::{self, RiverWindowManagerV1};
use river_wm_protocol::server::river_window_v1::{self, RiverWindowV1};
use river_wm_protocol::server::river_xkb_binding_v1::{self, RiverXkbBindingV1};
use smithay::reexports::wayland_server::backend::{ClientId, GlobalId, ObjectId};
use smithay::reexports::wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};
use smithay::utils::Serial;

use crate::output::OutputMarker;
use crate::seat::binding::BindingId;
use crate::windows::window::WindowId;

/// Bits of `river_window_manager_v1.modifier`, matching the protocol's
/// bitfield enum.
pub mod modifier {
    pub const SHIFT: u32 = 1;
    pub const CTRL: u32 = 2;
    pub const ALT: u32 = 4;
    pub const SUPER: u32 = 8;
}

/// Implemented by the compositor to answer wm requests and reach its
/// own window/output/binding state.
pub trait WindowManagerHandler: Sized {
    fn wm_state(&mut self) -> &mut WindowManagerState<Self>;

    fn wm_ack_update(&mut self, serial: Serial);
    fn wm_commit(&mut self);
    fn wm_set_window_size(&mut self, window: WindowId, width: i32, height: i32);
    fn wm_set_window_position(&mut self, window: WindowId, x: i32, y: i32);
    fn wm_set_window_state(&mut self, window: WindowId, state_bits: u32);
    fn wm_set_window_focus(&mut self, window: WindowId, focused: bool);
    fn wm_close_window(&mut self, window: WindowId);
    /// Begin an interactive resize grab on the seat's cursor
    /// (component C5, spec.md §4.5 `passthrough -> op`). `edges` is a
    /// bitmask of `river_window_v1.edge`.
    fn wm_begin_resize(&mut self, window: WindowId, edges: u32);
    /// End the current interactive operation without waiting for a
    /// final button release (spec.md §4.5 `op -> passthrough | ignore`,
    /// "ended by wm action").
    fn wm_end_interactive_op(&mut self);
    fn wm_create_pointer_binding(&mut self, button: u32, modifiers: u32) -> BindingId;
    fn wm_create_xkb_binding(&mut self, keysym: u32, modifiers: u32) -> BindingId;
    fn wm_destroy_binding(&mut self, binding: BindingId);
    fn wm_set_binding_enabled(&mut self, binding: BindingId, enabled: bool);
    fn wm_set_binding_layout_override(&mut self, binding: BindingId, layout: Option<u32>);
}

/// Live wm-protocol resource bookkeeping: one global, at most one
/// connected wm client, and the object maps needed to translate
/// between core ids and protocol objects in both directions.
pub struct WindowManagerState<D> {
    global: GlobalId,
    manager: Option<RiverWindowManagerV1>,
    windows: HashMap<WindowId, RiverWindowV1>,
    window_ids: HashMap<ObjectId, WindowId>,
    outputs: HashMap<Id<OutputMarker>, RiverOutputV1>,
    pointer_bindings: HashMap<BindingId, RiverPointerBindingV1>,
    xkb_bindings: HashMap<BindingId, RiverXkbBindingV1>,
    _marker: std::marker::PhantomData<fn() -> D>,
}

use crate::ids::Id;

impl<D: WindowManagerHandler + 'static> WindowManagerState<D> {
    pub fn new(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<RiverWindowManagerV1, ()>,
    {
        let global = display.create_global::<D, RiverWindowManagerV1, _>(1, ());
        Self {
            global,
            manager: None,
            windows: HashMap::new(),
            window_ids: HashMap::new(),
            outputs: HashMap::new(),
            pointer_bindings: HashMap::new(),
            xkb_bindings: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_some()
    }

    /// Seal the current batch by sending `update(serial)` to the
    /// connected wm client, if any.
    pub fn send_update(&self, serial: Serial) {
        if let Some(manager) = &self.manager {
            manager.update(serial.into());
        }
    }

    fn window_object(&self, window: WindowId) -> Option<&RiverWindowV1> {
        self.windows.get(&window)
    }

    /// Create a new `river_window_v1` object and announce it to the
    /// connected wm client via `window(id)`, server-initiated the same
    /// way `wlr-foreign-toplevel-management`'s manager announces
    /// toplevels: the object is created on the manager's own client
    /// connection with [`Client::create_resource`], not in response to
    /// a client request.
    pub fn register_window(&mut self, dh: &DisplayHandle, window: WindowId) {
        let Some(manager) = &self.manager else { return };
        let Some(client) = manager.client() else { return };
        let Ok(object) = client.create_resource::<RiverWindowV1, _, D>(
            dh,
            manager.version(),
            WindowObjectData(window),
        ) else {
            return;
        };
        manager.window(&object);
        self.window_ids.insert(object.id(), window);
        self.windows.insert(window, object);
    }

    pub fn register_output(&mut self, dh: &DisplayHandle, output: Id<OutputMarker>) {
        let Some(manager) = &self.manager else { return };
        let Some(client) = manager.client() else { return };
        let Ok(object) =
            client.create_resource::<RiverOutputV1, _, D>(dh, manager.version(), ())
        else {
            return;
        };
        manager.output(&object);
        self.outputs.insert(output, object);
    }

    pub fn register_seat(&mut self, dh: &DisplayHandle) {
        let Some(manager) = &self.manager else { return };
        let Some(client) = manager.client() else { return };
        let Ok(object) = client.create_resource::<RiverSeatV1, _, D>(dh, manager.version(), ())
        else {
            return;
        };
        manager.seat(&object);
    }

    pub fn window_title_changed(&self, window: WindowId, title: Option<&str>) {
        if let Some(object) = self.window_object(window) {
            object.title(title.map(str::to_owned));
        }
    }

    pub fn window_app_id_changed(&self, window: WindowId, app_id: Option<&str>) {
        if let Some(object) = self.window_object(window) {
            object.app_id(app_id.map(str::to_owned));
        }
    }

    pub fn window_requested_fullscreen(&self, window: WindowId, fullscreen: bool) {
        if let Some(object) = self.window_object(window) {
            object.requested_fullscreen(fullscreen as u32);
        }
    }

    pub fn window_closed(&mut self, window: WindowId) {
        if let Some(object) = self.windows.remove(&window) {
            self.window_ids.retain(|_, id| *id != window);
            object.closed();
        }
    }

    pub fn output_dimensions_changed(&self, output: Id<OutputMarker>, width: i32, height: i32) {
        if let Some(object) = self.outputs.get(&output) {
            object.dimensions(width, height);
        }
    }

    pub fn output_position_changed(&self, output: Id<OutputMarker>, x: i32, y: i32) {
        if let Some(object) = self.outputs.get(&output) {
            object.position(x, y);
        }
    }

    pub fn output_removed(&mut self, output: Id<OutputMarker>) {
        if let Some(object) = self.outputs.remove(&output) {
            object.removed();
        }
    }

    pub fn binding_pressed(&self, binding: BindingId) {
        if let Some(object) = self.pointer_bindings.get(&binding) {
            object.pressed();
        }
        if let Some(object) = self.xkb_bindings.get(&binding) {
            object.pressed();
        }
    }

    pub fn binding_released(&self, binding: BindingId) {
        if let Some(object) = self.pointer_bindings.get(&binding) {
            object.released();
        }
        if let Some(object) = self.xkb_bindings.get(&binding) {
            object.released();
        }
    }
}

impl<D> GlobalDispatch<RiverWindowManagerV1, (), D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
    D: Dispatch<RiverWindowManagerV1, ()>,
    D: Dispatch<RiverWindowV1, WindowObjectData>,
    D: Dispatch<RiverOutputV1, ()>,
    D: Dispatch<RiverSeatV1, ()>,
    D: Dispatch<RiverPointerBindingV1, BindingId>,
    D: Dispatch<RiverXkbBindingV1, BindingId>,
{
    fn bind(
        state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<RiverWindowManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let wm_state = state.wm_state();
        if wm_state.manager.is_some() {
            // Only one wm client may hold this global at a time.
            let object = data_init.init(resource, ());
            object.post_error(
                river_window_manager_v1::Error::AlreadyBound as u32,
                "a window-manager client is already connected",
            );
            return;
        }
        let manager = data_init.init(resource, ());
        wm_state.manager = Some(manager);
    }
}

/// Per-`river_window_v1` user data: just the core window id, so
/// request handlers can translate straight into `WindowId`.
#[derive(Debug, Clone, Copy)]
pub struct WindowObjectData(pub WindowId);

impl<D> Dispatch<RiverWindowManagerV1, (), D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
    D: Dispatch<RiverWindowV1, WindowObjectData>,
    D: Dispatch<RiverPointerBindingV1, BindingId>,
    D: Dispatch<RiverXkbBindingV1, BindingId>,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &RiverWindowManagerV1,
        request: river_window_manager_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            river_window_manager_v1::Request::AckUpdate { serial } => {
                state.wm_ack_update(Serial::from(serial));
            },
            river_window_manager_v1::Request::Commit => state.wm_commit(),
            river_window_manager_v1::Request::CreatePointerBinding { id, button, modifiers } => {
                let binding = state.wm_create_pointer_binding(button, modifiers);
                let object = data_init.init(id, binding);
                state.wm_state().pointer_bindings.insert(binding, object);
            },
            river_window_manager_v1::Request::CreateXkbBinding { id, keysym, modifiers } => {
                let binding = state.wm_create_xkb_binding(keysym, modifiers);
                let object = data_init.init(id, binding);
                state.wm_state().xkb_bindings.insert(binding, object);
            },
            river_window_manager_v1::Request::Destroy => {},
            _ => unimplemented!(),
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, _resource: &RiverWindowManagerV1, _data: &()) {
        state.wm_state().manager = None;
    }
}

impl<D> Dispatch<RiverWindowV1, WindowObjectData, D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &RiverWindowV1,
        request: river_window_v1::Request,
        data: &WindowObjectData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let window = data.0;
        match request {
            river_window_v1::Request::SetSize { width, height } => {
                state.wm_set_window_size(window, width, height);
            },
            river_window_v1::Request::SetPosition { x, y } => {
                state.wm_set_window_position(window, x, y);
            },
            river_window_v1::Request::SetState { state: bits } => {
                state.wm_set_window_state(window, bits);
            },
            river_window_v1::Request::SetFocus { focused } => {
                state.wm_set_window_focus(window, focused != 0);
            },
            river_window_v1::Request::BeginResize { edges } => {
                state.wm_begin_resize(window, edges);
            },
            river_window_v1::Request::EndInteractiveOp => {
                state.wm_end_interactive_op();
            },
            river_window_v1::Request::Close => state.wm_close_window(window),
            river_window_v1::Request::Destroy => {},
            _ => unimplemented!(),
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, resource: &RiverWindowV1, data: &WindowObjectData) {
        let wm_state = state.wm_state();
        wm_state.windows.remove(&data.0);
        wm_state.window_ids.remove(&resource.id());
    }
}

impl<D> Dispatch<RiverOutputV1, (), D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &RiverOutputV1,
        request: river_wm_protocol::server::river_output_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        // Only `destroy` exists on this interface.
        let _ = request;
    }
}

impl<D> Dispatch<RiverSeatV1, (), D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &RiverSeatV1,
        request: river_wm_protocol::server::river_seat_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let _ = request;
    }
}

impl<D> Dispatch<RiverPointerBindingV1, BindingId, D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &RiverPointerBindingV1,
        request: river_pointer_binding_v1::Request,
        data: &BindingId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let binding = *data;
        match request {
            river_pointer_binding_v1::Request::Enable => state.wm_set_binding_enabled(binding, true),
            river_pointer_binding_v1::Request::Disable => state.wm_set_binding_enabled(binding, false),
            river_pointer_binding_v1::Request::Destroy => {},
            _ => unimplemented!(),
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, _resource: &RiverPointerBindingV1, data: &BindingId) {
        state.wm_destroy_binding(*data);
        state.wm_state().pointer_bindings.remove(data);
    }
}

impl<D> Dispatch<RiverXkbBindingV1, BindingId, D> for WindowManagerState<D>
where
    D: WindowManagerHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &RiverXkbBindingV1,
        request: river_xkb_binding_v1::Request,
        data: &BindingId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let binding = *data;
        match request {
            river_xkb_binding_v1::Request::Enable => state.wm_set_binding_enabled(binding, true),
            river_xkb_binding_v1::Request::Disable => state.wm_set_binding_enabled(binding, false),
            river_xkb_binding_v1::Request::SetLayoutOverride { layout_index } => {
                let layout = (layout_index >= 0).then_some(layout_index as u32);
                state.wm_set_binding_layout_override(binding, layout);
            },
            river_xkb_binding_v1::Request::Destroy => {},
            _ => unimplemented!(),
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, _resource: &RiverXkbBindingV1, data: &BindingId) {
        state.wm_destroy_binding(*data);
        state.wm_state().xkb_bindings.remove(data);
    }
}

/// Wires `GlobalDispatch`/`Dispatch` for every object in the
/// window-management protocol onto `$ty`.
#[macro_export]
macro_rules! delegate_window_manager {
    ($(@< $( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+ >)? $ty: ty) => {
        smithay::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                river_wm_protocol::server::river_window_manager_v1::RiverWindowManagerV1: ()
            ] => $crate::protocols::wm::WindowManagerState<$ty>
        );

        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                river_wm_protocol::server::river_window_manager_v1::RiverWindowManagerV1: (),
                river_wm_protocol::server::river_window_v1::RiverWindowV1: $crate::protocols::wm::WindowObjectData,
                river_wm_protocol::server::river_output_v1::RiverOutputV1: (),
                river_wm_protocol::server::river_seat_v1::RiverSeatV1: (),
                river_wm_protocol::server::river_pointer_binding_v1::RiverPointerBindingV1:
                    $crate::seat::binding::BindingId,
                river_wm_protocol::server::river_xkb_binding_v1::RiverXkbBindingV1:
                    $crate::seat::binding::BindingId
            ] => $crate::protocols::wm::WindowManagerState<$ty>
        );
    };
}
