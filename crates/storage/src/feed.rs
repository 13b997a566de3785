//! Per-session change feed shared by every store backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lift_core::model::{SessionId, WorkoutSession};
use tokio::sync::watch;

/// Fan-out of session writes to subscribers, one `watch` channel per session.
///
/// Backends call `publish` after every successful write. Slow subscribers see
/// the latest record rather than every intermediate one. Channels of finished
/// sessions are dropped once nobody listens; a later subscription reseeds them
/// from the store.
#[derive(Clone, Default)]
pub struct SessionFeed {
    channels: Arc<Mutex<HashMap<SessionId, watch::Sender<WorkoutSession>>>>,
}

impl SessionFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a freshly written record to current and future subscribers.
    pub fn publish(&self, session: &WorkoutSession) {
        let mut guard = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if session.status().is_terminal() {
            if let Some(tx) = guard.get(&session.id()) {
                tx.send_replace(session.clone());
            }
            prune(&mut guard);
            return;
        }
        match guard.get(&session.id()) {
            Some(tx) => {
                tx.send_replace(session.clone());
            }
            None => {
                let (tx, _rx) = watch::channel(session.clone());
                guard.insert(session.id(), tx);
            }
        }
    }

    /// Subscribe to a session. `stored` seeds the channel when nothing has been
    /// published for this id in the current process yet.
    #[must_use]
    pub fn subscribe(&self, stored: WorkoutSession) -> SessionSubscription {
        let mut guard = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune(&mut guard);
        let tx = guard
            .entry(stored.id())
            .or_insert_with(|| watch::channel(stored).0);
        SessionSubscription {
            rx: tx.subscribe(),
            primed: false,
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, id: SessionId) -> usize {
        let guard = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(&id).map_or(0, watch::Sender::receiver_count)
    }
}

/// Forget finished sessions nobody is listening to.
fn prune(channels: &mut HashMap<SessionId, watch::Sender<WorkoutSession>>) {
    channels.retain(|_, tx| tx.receiver_count() > 0 || !tx.borrow().status().is_terminal());
}

/// Stream of one session's values: the current one first, then each write.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<WorkoutSession>,
    primed: bool,
}

impl SessionSubscription {
    /// Latest known value without waiting.
    #[must_use]
    pub fn latest(&self) -> WorkoutSession {
        self.rx.borrow().clone()
    }

    /// Next value. The first call returns immediately with the current record.
    ///
    /// Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<WorkoutSession> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
