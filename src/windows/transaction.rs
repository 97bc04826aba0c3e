//! Transaction coordinator (component C2).
//!
//! Grounded on pinnacle's blocker-based `TransactionBuilder`/`Transaction`
//! (`util/transaction.rs`, itself credited there to niri), adapted from
//! that multi-threaded `Arc<Mutex<..>>`/`Blocker` design down to the
//! single-threaded cooperative scheduling this core runs under, and on
//! catacomb's `Windows::update_transaction` (`windows/mod.rs`) for the
//! "poll once per frame tick, force-commit past a deadline" shape.

use std::time::{Duration, Instant};

use crate::windows::window::WindowId;

/// How a participant's side of a transaction was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The window reached `committed` (or `timed_out_acked`) before the
    /// deadline.
    Settled,
    /// The deadline elapsed before this window settled; its current
    /// state was force-committed from last observed geometry.
    TimedOut,
}

struct ActiveTransaction {
    participants: Vec<WindowId>,
    started_at: Instant,
}

/// Outcome of [`TransactionCoordinator::poll`].
pub enum Poll {
    /// Nothing to do: no transaction active, or it is still waiting
    /// and hasn't hit its deadline.
    Pending,
    /// The active transaction is done. Every participant must now have
    /// `commit_transaction` called on it; `outcomes` reports how each
    /// one settled for logging/diagnostics.
    Ready { outcomes: Vec<(WindowId, Resolution)> },
}

/// Drives at most one in-flight transaction at a time (spec.md §4.3).
#[derive(Default)]
pub struct TransactionCoordinator {
    active: Option<ActiveTransaction>,
}

impl TransactionCoordinator {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Open a new transaction for the given participants. Only legal
    /// when no transaction is currently active.
    pub fn begin(&mut self, participants: Vec<WindowId>, now: Instant) {
        debug_assert!(self.active.is_none(), "begin() called while a transaction is already active");
        tracing::debug!(count = participants.len(), "transaction opened");
        self.active = Some(ActiveTransaction { participants, started_at: now });
    }

    /// Poll the active transaction, if any. `is_settled` reports
    /// whether a given participant has already reached a terminal
    /// configure sub-state (`committed` or `timed_out_acked`).
    ///
    /// Returns `Poll::Ready` once every participant is settled, or once
    /// `timeout` has elapsed since `begin` — whichever comes first. The
    /// caller is responsible for calling `commit_transaction` on every
    /// window named in the returned outcomes; this coordinator only
    /// tracks membership and deadlines, never window state itself.
    pub fn poll(
        &mut self,
        now: Instant,
        timeout: Duration,
        mut is_settled: impl FnMut(WindowId) -> bool,
    ) -> Poll {
        let Some(txn) = &self.active else {
            return Poll::Pending;
        };

        let deadline_elapsed = now.saturating_duration_since(txn.started_at) >= timeout;
        let all_settled = txn.participants.iter().all(|&id| is_settled(id));

        if !all_settled && !deadline_elapsed {
            return Poll::Pending;
        }

        if deadline_elapsed && !all_settled {
            tracing::warn!(
                count = txn.participants.len(),
                "transaction deadline elapsed with unsettled participants, force-committing"
            );
        }

        let outcomes = txn
            .participants
            .iter()
            .map(|&id| {
                let resolution =
                    if is_settled(id) { Resolution::Settled } else { Resolution::TimedOut };
                (id, resolution)
            })
            .collect();

        self.active = None;
        Poll::Ready { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;

    #[test]
    fn pending_while_unsettled_and_within_deadline() {
        let mut coordinator = TransactionCoordinator::default();
        let a = Id::for_test(1);
        let now = Instant::now();
        coordinator.begin(vec![a], now);

        let poll = coordinator.poll(now, Duration::from_millis(200), |_| false);
        assert!(matches!(poll, Poll::Pending));
        assert!(coordinator.is_active());
    }

    #[test]
    fn ready_once_all_participants_settle() {
        let mut coordinator = TransactionCoordinator::default();
        let a = Id::for_test(1);
        let b = Id::for_test(2);
        let now = Instant::now();
        coordinator.begin(vec![a, b], now);

        let poll = coordinator.poll(now, Duration::from_millis(200), |_| true);
        match poll {
            Poll::Ready { outcomes } => {
                assert_eq!(outcomes.len(), 2);
                assert!(outcomes.iter().all(|(_, r)| *r == Resolution::Settled));
            },
            Poll::Pending => panic!("expected Ready"),
        }
        assert!(!coordinator.is_active());
    }

    #[test]
    fn force_commits_past_deadline_even_if_unsettled() {
        let mut coordinator = TransactionCoordinator::default();
        let a = Id::for_test(1);
        let b = Id::for_test(2);
        let now = Instant::now();
        let timeout = Duration::from_millis(200);
        coordinator.begin(vec![a, b], now);

        // b never settles; a does.
        let later = now + timeout + Duration::from_millis(1);
        let poll = coordinator.poll(later, timeout, |id| id == a);
        match poll {
            Poll::Ready { outcomes } => {
                let resolution_of = |id: WindowId| {
                    outcomes.iter().find(|(i, _)| *i == id).map(|(_, r)| *r).unwrap()
                };
                assert_eq!(resolution_of(a), Resolution::Settled);
                assert_eq!(resolution_of(b), Resolution::TimedOut);
            },
            Poll::Pending => panic!("expected Ready after deadline"),
        }
    }

    #[test]
    fn begin_panics_if_already_active() {
        let mut coordinator = TransactionCoordinator::default();
        let now = Instant::now();
        coordinator.begin(vec![Id::for_test(1)], now);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            coordinator.begin(vec![Id::for_test(2)], now);
        }));
        assert!(result.is_err());
    }
}
