//! Error taxonomy for the core.
//!
//! Every fallible boundary returns one of these instead of unwinding;
//! recovery is local (per-window, per-client) except for
//! [`CoreError::Fatal`], which is only ever produced during startup.

use thiserror::Error;

/// Errors raised while handling a single input or protocol event.
///
/// None of these, aside from [`CoreError::Fatal`], should ever
/// terminate the process — see the error handling design in
/// `SPEC_FULL.md` §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Allocation failed while handling an input or protocol event.
    #[error("resource exhaustion handling event: {0}")]
    ResourceExhaustion(String),

    /// A client violated protocol invariants (duplicate press, stale
    /// ack, etc). Logged and ignored.
    #[error("protocol misuse by client: {0}")]
    ProtocolMisuse(String),

    /// A backend output commit failed; the frame is skipped.
    #[error("output commit failed: {0}")]
    BackendCommit(String),

    /// A client committed a buffer whose size does not match its last
    /// configure while tiled/fullscreen. Not fatal: `current` is
    /// overridden with the client's actual geometry.
    #[error("client committed unrequested size {width}x{height} for window {window_id}")]
    UnrequestedSize { window_id: u64, width: i32, height: i32 },

    /// Unrecoverable failure during startup; the process must exit
    /// before entering the main loop.
    #[error("fatal initialization failure: {0}")]
    Fatal(String),
}

/// Log a recoverable [`CoreError`] at the appropriate level and
/// continue. Callers at the edges of the event loop use this instead
/// of propagating further, per the "no exception-style unwinding"
/// policy.
pub fn handle_recoverable(err: CoreError) {
    match &err {
        CoreError::ResourceExhaustion(_) => tracing::error!("{err}"),
        CoreError::ProtocolMisuse(_) => tracing::warn!("{err}"),
        CoreError::BackendCommit(_) => tracing::error!("{err}"),
        CoreError::UnrequestedSize { .. } => tracing::warn!("{err}"),
        CoreError::Fatal(_) => unreachable!("fatal errors must be handled at startup, not here"),
    }
}
