//! Window arena and transaction orchestration (components C1 + C2).
//!
//! Grounded on catacomb's `Windows` container (`windows/mod.rs`): a
//! single owner of all live windows plus the one-at-a-time transaction
//! state, exposing `begin_transaction`/`update_transaction`-style entry
//! points to the compositor's per-tick cycle. Cross-window references
//! go through `Id`s into this arena rather than the teacher's direct
//! `Rc<RefCell<Window>>` sharing, per spec.md §9's redesign note.

pub mod transaction;
pub mod window;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use smithay::utils::Serial;

use self::transaction::{Poll, Resolution, TransactionCoordinator};
use self::window::{ConfigureSink, Window, WindowId};
use crate::ids::IdAllocator;

pub struct Windows<S: ConfigureSink> {
    arena: HashMap<WindowId, Window<S>>,
    id_alloc: IdAllocator<window::WindowMarker>,
    focus: Option<WindowId>,
    coordinator: TransactionCoordinator,
}

impl<S: ConfigureSink> Default for Windows<S> {
    fn default() -> Self {
        Self {
            arena: HashMap::new(),
            id_alloc: IdAllocator::default(),
            focus: None,
            coordinator: TransactionCoordinator::default(),
        }
    }
}

impl<S: ConfigureSink> Windows<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a freshly created toplevel into the arena.
    pub fn add(&mut self, sink: S) -> WindowId {
        let id = self.id_alloc.alloc();
        self.arena.insert(id, Window::new(id, sink));
        tracing::debug!(window = id.value(), "window mapped");
        id
    }

    pub fn get(&self, id: WindowId) -> Option<&Window<S>> {
        self.arena.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window<S>> {
        self.arena.get_mut(&id)
    }

    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Change the keyboard focus target. Bumps `focus_count` on the
    /// newly focused window's pending state so a subsequent
    /// transaction carries the activation change, per spec.md §3.
    pub fn set_focus(&mut self, id: Option<WindowId>) {
        if self.focus == id {
            return;
        }
        if let Some(id) = id {
            if let Some(window) = self.arena.get_mut(&id) {
                window.pending_mut().focus_count += 1;
            }
        }
        self.focus = id;
    }

    /// Stage a window for removal. If it is mid-transaction its saved
    /// surface lingers until that transaction clears (spec.md §4.1).
    pub fn mark_destroying(&mut self, id: WindowId) {
        if let Some(window) = self.arena.get_mut(&id) {
            window.mark_destroying();
            if self.focus == Some(id) {
                self.focus = None;
            }
        }
    }

    /// Whether a transaction is currently in flight. Callers must not
    /// start a new one while this holds (spec.md §4.3).
    pub fn is_transaction_active(&self) -> bool {
        self.coordinator.is_active()
    }

    /// Move every participant's pending state into `inflight`, send
    /// configures where required, and open the coordinator's tracking
    /// for whichever participants must be waited on.
    pub fn begin_transaction(&mut self, participants: Vec<WindowId>, now: Instant) {
        for &id in &participants {
            if let Some(window) = self.arena.get_mut(&id) {
                window.apply_pending();
                window.configure();
            }
        }
        self.coordinator.begin(participants, now);
    }

    /// Poll the active transaction, committing and reaping as it
    /// resolves. Returns the per-window outcomes if the transaction
    /// just finished (empty otherwise), and the ids of any windows
    /// reaped as a result.
    pub fn poll_transaction(
        &mut self,
        now: Instant,
        timeout: Duration,
    ) -> (Vec<(WindowId, Resolution)>, Vec<WindowId>) {
        let Windows { arena, coordinator, .. } = self;

        let poll = coordinator.poll(now, timeout, |id| {
            arena.get(&id).map_or(true, Window::is_transaction_settled)
        });

        let outcomes = match poll {
            Poll::Pending => return (Vec::new(), Vec::new()),
            Poll::Ready { outcomes } => outcomes,
        };

        for &(id, _) in &outcomes {
            if let Some(window) = self.arena.get_mut(&id) {
                window.commit_transaction();
            }
        }

        let reaped = self.reap_destroyed();
        (outcomes, reaped)
    }

    /// Remove every window that is marked destroying and no longer has
    /// a transaction holding its saved surface open.
    fn reap_destroyed(&mut self) -> Vec<WindowId> {
        let dead: Vec<WindowId> = self
            .arena
            .values()
            .filter(|w| w.is_destroying() && !w.inflight_transaction())
            .map(|w| w.id)
            .collect();
        for id in &dead {
            self.arena.remove(id);
            tracing::debug!(window = id.value(), "window reaped");
        }
        dead
    }

    pub fn ack_configure(&mut self, id: WindowId, serial: Serial) {
        if let Some(window) = self.arena.get_mut(&id) {
            window.ack_configure(serial);
        }
    }

    pub fn surface_committed(&mut self, id: WindowId) {
        if let Some(window) = self.arena.get_mut(&id) {
            window.surface_committed();
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.arena.keys().copied()
    }
}
