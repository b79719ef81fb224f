//! Deadline timers for the connection controller.
//!
//! A timer is a sleeping task that posts a [`TimerEvent`] back onto the
//! controller queue. Dropping the [`TimerHandle`] aborts the task, so a timer
//! stored inside a state or waiter dies with it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::Message;
use crate::transport::LinkId;

/// Identifies one registered waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct WaiterId(pub(crate) u64);

impl std::fmt::Display for WaiterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "waiter#{}", self.0)
    }
}

/// Expiry notices delivered to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// A transition waiter's deadline passed.
    TransitionDeadline(WaiterId),
    /// A write waiter's deadline passed.
    WriteDeadline(WaiterId),
    /// A notification waiter's deadline passed.
    NotificationDeadline(WaiterId),
    /// The idle window of a connected link elapsed. `generation` tells
    /// re-armed countdowns apart.
    IdleElapsed { link: LinkId, generation: u64 },
    /// The post-discovery settle delay of a link elapsed.
    Settled(LinkId),
    /// A disconnect request went unconfirmed.
    DisconnectDeadline(LinkId),
}

/// Owns a pending timer; aborts it on drop.
#[derive(Debug)]
pub(crate) struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    /// Posts `event` to `tx` once `after` has elapsed.
    pub(crate) fn arm(
        after: Duration,
        tx: &mpsc::UnboundedSender<Message>,
        event: TimerEvent,
    ) -> Self {
        let tx = tx.clone();
        Self(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Message::Timer(event));
        }))
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = TimerHandle::arm(
            Duration::from_secs(2),
            &tx,
            TimerEvent::WriteDeadline(WaiterId(1)),
        );

        match rx.recv().await {
            Some(Message::Timer(event)) => {
                assert_eq!(event, TimerEvent::WriteDeadline(WaiterId(1)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = TimerHandle::arm(
            Duration::from_secs(2),
            &tx,
            TimerEvent::IdleElapsed {
                link: LinkId(1),
                generation: 0,
            },
        );
        drop(timer);

        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(got.is_err());
    }
}
