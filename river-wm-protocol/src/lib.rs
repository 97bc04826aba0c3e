//! Generated server-side bindings for the river window-management protocol.
//!
//! The wire format itself is not part of the compositor's contract with
//! its window-manager client (see the core spec's non-goals); this crate
//! only needs to exist so the request/event pairs the core relies on have
//! concrete Rust types to dispatch against.

#![allow(non_upper_case_globals, non_camel_case_types, unused_imports, clippy::all)]

pub mod server {
    use wayland_backend::server::*;
    use wayland_server::{protocol::*, *};

    pub mod __interfaces {
        use wayland_backend::protocol::*;
        include!(concat!(env!("OUT_DIR"), "/river_window_management_v1.rs"));
    }
    use self::__interfaces::*;

    include!(concat!(env!("OUT_DIR"), "/river_window_management_v1.rs"));
}
