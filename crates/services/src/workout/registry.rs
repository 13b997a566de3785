use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use lift_core::model::SessionId;
use tokio::sync::watch;

use crate::error::SessionError;

/// Sessions currently observed through a live handle.
///
/// A session id holds at most one lease at a time. A released lease still
/// blocks the next one until its worker has drained.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    entries: Arc<Mutex<HashMap<SessionId, Entry>>>,
}

struct Entry {
    handle: Weak<()>,
    worker: watch::Receiver<()>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.handle.strong_count() > 0 || self.worker.has_changed().is_ok()
    }
}

/// Exclusive right to run a worker for one session.
///
/// `token` lives in the handle; `alive` lives in the worker task.
pub(crate) struct Lease {
    pub(crate) token: Arc<()>,
    pub(crate) alive: watch::Sender<()>,
}

impl SessionRegistry {
    /// Reserve `id`, then wait for any previous worker of it to finish.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyObserved` while another handle for the
    /// same session is alive.
    pub(crate) async fn acquire(&self, id: SessionId) -> Result<Lease, SessionError> {
        let (lease, previous) = {
            let mut guard = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.retain(|_, entry| entry.is_live());
            if guard
                .get(&id)
                .is_some_and(|entry| entry.handle.strong_count() > 0)
            {
                return Err(SessionError::AlreadyObserved(id));
            }
            let token = Arc::new(());
            let (alive, worker) = watch::channel(());
            let previous = guard.insert(
                id,
                Entry {
                    handle: Arc::downgrade(&token),
                    worker,
                },
            );
            (Lease { token, alive }, previous.map(|entry| entry.worker))
        };

        if let Some(mut worker) = previous {
            tracing::debug!(target: "lift::workout", session = %id, "waiting for previous worker to drain");
            // The sender never sends; this resolves once the old worker is gone.
            while worker.changed().await.is_ok() {}
        }
        Ok(lease)
    }

    #[must_use]
    pub(crate) fn is_observed(&self, id: SessionId) -> bool {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&id)
            .is_some_and(|entry| entry.handle.strong_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_lease_per_session() {
        let registry = SessionRegistry::default();
        let id = SessionId::generate();

        let lease = registry.acquire(id).await.unwrap();
        assert!(registry.is_observed(id));
        assert!(matches!(
            registry.acquire(id).await,
            Err(SessionError::AlreadyObserved(other)) if other == id
        ));

        // Other sessions are independent.
        registry.acquire(SessionId::generate()).await.unwrap();

        drop(lease);
        assert!(!registry.is_observed(id));
        registry.acquire(id).await.unwrap();
    }

    #[tokio::test]
    async fn a_new_lease_waits_for_the_old_worker() {
        let registry = SessionRegistry::default();
        let id = SessionId::generate();

        let Lease { token, alive } = registry.acquire(id).await.unwrap();
        drop(token);

        let waiting = tokio::spawn({
            let registry = registry.clone();
            async move { registry.acquire(id).await.map(|_| ()) }
        });
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        drop(alive);
        waiting.await.unwrap().unwrap();
    }
}
