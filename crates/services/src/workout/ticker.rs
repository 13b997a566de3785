use std::time::Duration;

use lift_core::model::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use super::worker::Command;

/// Periodic driver for one session.
///
/// It only enqueues `Tick` commands and never waits for them to be handled.
/// Dropping the ticker stops it.
pub struct SessionTicker {
    session_id: SessionId,
    period: Duration,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl SessionTicker {
    pub(crate) fn new(
        session_id: SessionId,
        period: Duration,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            session_id,
            period,
            commands,
            task: None,
        }
    }

    /// Start ticking. The first tick fires one period from now.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let period = self.period;
        let commands = self.commands.clone();
        let session_id = self.session_id;
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if commands.send(Command::Tick(None)).is_err() {
                    tracing::debug!(target: "lift::ticker", session = %session_id, "worker gone, ticker exiting");
                    break;
                }
            }
        }));
        tracing::debug!(target: "lift::ticker", session = %self.session_id, ?period, "ticker started");
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(target: "lift::ticker", session = %self.session_id, "ticker stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
