//! Single-flight coordination for access token refreshes.
//!
//! Many requests can hit a 401 at once when an access token expires. The first
//! one becomes the refresh *owner*; every other request that fails while the
//! owner is working is parked on a oneshot channel and released, in the order
//! it arrived, with the owner's outcome.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

/// Outcome delivered to parked requests: the new access token, or `None` if
/// the refresh failed.
pub(crate) type RefreshOutcome = Option<String>;

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    /// Bumped every time a refresh settles, successfully or not.
    generation: u64,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// What a request that just got a 401 should do next.
pub(crate) enum Ticket<'a> {
    /// No refresh was running; this caller must perform it and then call
    /// [`RefreshGuard::finish`].
    Owner(RefreshGuard<'a>),
    /// A refresh is running; await the receiver for its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
    /// A refresh settled after the request was sent. Its outcome is already
    /// in the token store, so the caller must not start another one.
    Settled,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current settle count. Read before sending a request and hand it back
    /// to [`begin`](Self::begin) if the request gets a 401.
    pub(crate) fn generation(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Join or start a refresh for a request sent at `sent_at`.
    ///
    /// Only state owned by the coordinator is touched under the lock; token
    /// stores are never read here.
    pub(crate) fn begin(&self, sent_at: u64) -> Ticket<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_progress {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "Refresh in progress, queueing request");
            return Ticket::Waiter(rx);
        }
        if state.generation != sent_at {
            return Ticket::Settled;
        }
        state.in_progress = true;
        Ticket::Owner(RefreshGuard {
            coordinator: self,
            settled: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_refreshing(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_progress
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.state.try_lock().is_err()
    }

    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_progress = false;
            state.generation = state.generation.wrapping_add(1);
            std::mem::take(&mut state.waiters)
        };
        debug!(released = waiters.len(), success = outcome.is_some(), "Refresh settled");
        for waiter in waiters {
            // A waiter whose request was dropped is simply gone.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Held by the refresh owner. Dropping it without calling `finish` (the owner
/// future was cancelled, or panicked) releases every waiter with a failure and
/// clears the in-progress flag.
pub(crate) struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    pub(crate) fn finish(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(ticket: Ticket<'_>) -> RefreshGuard<'_> {
        match ticket {
            Ticket::Owner(guard) => guard,
            _ => panic!("expected to own the refresh"),
        }
    }

    fn waiter(ticket: Ticket<'_>) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            Ticket::Waiter(rx) => rx,
            _ => panic!("expected to wait for the refresh"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_owns_refresh() {
        let coordinator = RefreshCoordinator::new();
        let guard = owner(coordinator.begin(0));
        assert!(coordinator.is_refreshing());

        let rx1 = waiter(coordinator.begin(0));
        let rx2 = waiter(coordinator.begin(0));

        guard.finish(Some("new-token".to_string()));
        assert!(!coordinator.is_refreshing());

        assert_eq!(rx1.await.unwrap().as_deref(), Some("new-token"));
        assert_eq!(rx2.await.unwrap().as_deref(), Some("new-token"));
    }

    #[tokio::test]
    async fn test_failed_refresh_releases_waiters_with_none() {
        let coordinator = RefreshCoordinator::new();
        let guard = owner(coordinator.begin(0));
        let rx = waiter(coordinator.begin(0));

        guard.finish(None);

        assert_eq!(rx.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_waiters_and_clears_flag() {
        let coordinator = RefreshCoordinator::new();
        let guard = owner(coordinator.begin(0));
        let rx = waiter(coordinator.begin(0));

        drop(guard);

        assert!(!coordinator.is_refreshing());
        assert_eq!(rx.await.unwrap(), None);

        // A new refresh can start afterwards
        let _guard = owner(coordinator.begin(coordinator.generation()));
    }

    #[test]
    fn test_every_waiter_receives_outcome() {
        let coordinator = RefreshCoordinator::new();
        let guard = owner(coordinator.begin(0));
        let mut receivers: Vec<_> = (0..5).map(|_| waiter(coordinator.begin(0))).collect();

        {
            let state = coordinator.state.lock().unwrap();
            assert_eq!(state.waiters.len(), 5);
        }
        guard.finish(Some("t".to_string()));

        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap().as_deref(), Some("t"));
        }
    }

    #[test]
    fn test_waiters_queued_in_arrival_order() {
        let coordinator = RefreshCoordinator::new();
        let _guard = owner(coordinator.begin(0));
        let first = waiter(coordinator.begin(0));
        let second = waiter(coordinator.begin(0));
        let third = waiter(coordinator.begin(0));

        // Closing one receiver shows up on the sender at the same queue position
        drop(second);
        let state = coordinator.state.lock().unwrap();
        let closed: Vec<bool> = state.waiters.iter().map(|tx| tx.is_closed()).collect();
        assert_eq!(closed, vec![false, true, false]);
        drop((first, third));
    }

    #[test]
    fn test_request_sent_before_a_settle_does_not_refresh_again() {
        let coordinator = RefreshCoordinator::new();
        let sent_at = coordinator.generation();
        owner(coordinator.begin(sent_at)).finish(Some("new".to_string()));

        assert!(matches!(coordinator.begin(sent_at), Ticket::Settled));
        assert!(!coordinator.is_refreshing());

        // A request sent after the settle may start a fresh refresh
        let _guard = owner(coordinator.begin(coordinator.generation()));
    }

    #[test]
    fn test_failed_and_dropped_refreshes_advance_generation() {
        let coordinator = RefreshCoordinator::new();
        owner(coordinator.begin(0)).finish(None);
        assert_eq!(coordinator.generation(), 1);

        drop(owner(coordinator.begin(1)));
        assert_eq!(coordinator.generation(), 2);
    }

    #[test]
    fn test_stale_request_waits_while_refreshing() {
        let coordinator = RefreshCoordinator::new();
        owner(coordinator.begin(0)).finish(Some("t1".to_string()));
        let _guard = owner(coordinator.begin(1));

        // Sent before the first refresh, but a second one is now running
        let _rx = waiter(coordinator.begin(0));
    }
}
