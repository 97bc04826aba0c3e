//! Entry point. Grounded on catacomb's `main.rs`: pick a backend, build
//! the event loop, hand it off. Backend selection here is reduced to a
//! single headless stand-in since the DRM/libinput/winit glue is an
//! external collaborator (spec.md §1). The dispatch loop itself follows
//! the manual `while running { event_loop.dispatch(...) }` shape used
//! by smithay's own winit-backed examples, so `Compositor::terminated`
//! has somewhere to actually stop the process.

use river::backend::HeadlessBackend;
use river::compositor::Compositor;
use river::config::Config;
use smithay::reexports::calloop::EventLoop;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut event_loop: EventLoop<Compositor<HeadlessBackend>> =
        EventLoop::try_new().expect("initialize event loop");

    let backend = HeadlessBackend::new("seat0");
    let mut state = Compositor::new(event_loop.handle(), backend, Config::default());

    while !state.terminated {
        if let Err(err) = event_loop.dispatch(None, &mut state) {
            tracing::error!("event loop dispatch failed: {err}");
            break;
        }
    }
}
