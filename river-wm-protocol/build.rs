use std::path::PathBuf;

use wayland_scanner::{generate_code, Side};

fn main() {
    let protocol = "protocol/river-window-management-v1.xml";
    println!("cargo:rerun-if-changed={protocol}");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    generate_code(protocol, out_dir.join("river_window_management_v1.rs"), Side::Server);
}
