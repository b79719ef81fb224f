//! Waiter registry.
//!
//! Turns "the connection reached phase X" into resumable operations. The
//! registry is owned by the controller task and never locked.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::connection::Message;
use crate::connection::state::Phase;
use crate::connection::timer::{TimerEvent, TimerHandle, WaiterId};
use crate::error::{Error, Result, timeout_ms};

/// What to do with a waiter once its phase is reached.
#[derive(Debug)]
pub(crate) enum Resume {
    /// Caller of `ensure_connected`, waiting for `Connected` or `Disconnected`.
    Connect(oneshot::Sender<Result<()>>),
    /// Caller of `disconnect_and_await`, waiting for `Disconnected`.
    Disconnect(oneshot::Sender<Result<()>>),
    /// Caller of `ensure_connected` that arrived while disconnecting; it
    /// starts a fresh connection once `Disconnected` is reached.
    Reconnect(oneshot::Sender<Result<()>>),
}

impl Resume {
    /// Resumes the waiting caller with `err`.
    pub(crate) fn fail(self, err: Error) {
        let (Self::Connect(reply) | Self::Disconnect(reply) | Self::Reconnect(reply)) = self;
        let _ = reply.send(Err(err));
    }
}

#[derive(Debug)]
struct TransitionWaiter {
    id: WaiterId,
    accepts: Vec<Phase>,
    resume: Resume,
    timeout: Option<Duration>,
    _deadline: Option<TimerHandle>,
}

/// Pending transition waiters, in registration order.
#[derive(Debug)]
pub(crate) struct WaiterRegistry {
    tx: mpsc::UnboundedSender<Message>,
    next_id: u64,
    waiters: Vec<TransitionWaiter>,
}

impl WaiterRegistry {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            tx,
            next_id: 1,
            waiters: Vec::new(),
        }
    }

    /// Allocates an id for any kind of waiter.
    pub(crate) const fn next_id(&mut self) -> WaiterId {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds a transition waiter. With a `deadline`, a timer is armed that
    /// later expires the waiter through [`WaiterRegistry::expire`].
    pub(crate) fn register(
        &mut self,
        accepts: &[Phase],
        deadline: Option<Duration>,
        resume: Resume,
    ) -> WaiterId {
        let id = self.next_id();
        let timer = deadline
            .map(|after| TimerHandle::arm(after, &self.tx, TimerEvent::TransitionDeadline(id)));
        tracing::debug!("registered {id} waiting for {accepts:?} (deadline {deadline:?})");
        self.waiters.push(TransitionWaiter {
            id,
            accepts: accepts.to_vec(),
            resume,
            timeout: deadline,
            _deadline: timer,
        });
        id
    }

    /// Removes every waiter that accepts `phase` and returns them in
    /// registration order.
    pub(crate) fn notify(&mut self, phase: Phase) -> Vec<Resume> {
        let (matched, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|w| w.accepts.contains(&phase));
        self.waiters = rest;

        matched
            .into_iter()
            .map(|w| {
                tracing::debug!("resuming {} on {}", w.id, phase);
                w.resume
            })
            .collect()
    }

    /// Removes an expired waiter, returning it with the timeout error it
    /// should be resumed with. Returns `None` if it was already resumed.
    pub(crate) fn expire(&mut self, id: WaiterId) -> Option<(Resume, Error)> {
        let index = self.waiters.iter().position(|w| w.id == id)?;
        let waiter = self.waiters.remove(index);
        let err = Error::ConnectionTimeout {
            timeout_ms: waiter.timeout.map_or(0, timeout_ms),
        };
        tracing::debug!("{id} expired");
        Some((waiter.resume, err))
    }

    /// Resumes every pending waiter with `reason`.
    pub(crate) fn cancel_all(&mut self, reason: &Error) -> usize {
        let waiters = std::mem::take(&mut self.waiters);
        let count = waiters.len();
        for waiter in waiters {
            tracing::debug!("cancelling {}: {}", waiter.id, reason);
            waiter.resume.fail(reason.clone());
        }
        count
    }

    /// Number of pending transition waiters.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}
