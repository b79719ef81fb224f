//! Connection phases and the per-phase data they own.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::connection::idle::IdleTimer;
use crate::connection::timer::{TimerHandle, WaiterId};
use crate::error::{Error, Result};
use crate::transport::{GattStatus, LinkId};

/// Observable connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No link held.
    Disconnected,
    /// Link opened, capability discovery not finished.
    Connecting,
    /// Link usable.
    Connected,
    /// Disconnect requested, awaiting confirmation.
    Disconnecting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Write waiter: resumed with the low-level write status.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub(crate) id: WaiterId,
    pub(crate) characteristic: Uuid,
    pub(crate) timeout: Duration,
    pub(crate) reply: oneshot::Sender<Result<GattStatus>>,
    pub(crate) _deadline: TimerHandle,
}

/// Notification waiter: resumed with the raw value of one notification.
#[derive(Debug)]
pub(crate) struct PendingNotification {
    pub(crate) id: WaiterId,
    pub(crate) characteristic: Uuid,
    pub(crate) timeout: Duration,
    pub(crate) reply: oneshot::Sender<Result<Bytes>>,
    pub(crate) _deadline: TimerHandle,
}

/// Data owned by the connected phase.
#[derive(Debug)]
pub(crate) struct Connected<L> {
    pub(crate) link_id: LinkId,
    pub(crate) link: L,
    pub(crate) idle: Option<IdleTimer>,
    pub(crate) pending_write: Option<PendingWrite>,
    pub(crate) pending_notification: Option<PendingNotification>,
}

impl<L> Connected<L> {
    pub(crate) const fn new(link_id: LinkId, link: L) -> Self {
        Self {
            link_id,
            link,
            idle: None,
            pending_write: None,
            pending_notification: None,
        }
    }
}

/// The single connection state of an adapter. Each variant owns the link it
/// refers to; only `Disconnected` holds none.
#[derive(Debug)]
pub(crate) enum ConnectionState<L> {
    Disconnected,
    Connecting {
        link_id: LinkId,
        link: L,
        settle: Option<TimerHandle>,
    },
    Connected(Connected<L>),
    Disconnecting {
        link_id: LinkId,
        link: L,
    },
}

impl<L> ConnectionState<L> {
    pub(crate) const fn phase(&self) -> Phase {
        match self {
            Self::Disconnected => Phase::Disconnected,
            Self::Connecting { .. } => Phase::Connecting,
            Self::Connected(_) => Phase::Connected,
            Self::Disconnecting { .. } => Phase::Disconnecting,
        }
    }

    pub(crate) const fn link_id(&self) -> Option<LinkId> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { link_id, .. } | Self::Disconnecting { link_id, .. } => {
                Some(*link_id)
            }
            Self::Connected(connected) => Some(connected.link_id),
        }
    }

    pub(crate) fn link_mut(&mut self) -> Option<&mut L> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { link, .. } | Self::Disconnecting { link, .. } => Some(link),
            Self::Connected(connected) => Some(&mut connected.link),
        }
    }

    pub(crate) fn connected_mut(&mut self) -> Option<&mut Connected<L>> {
        match self {
            Self::Connected(connected) => Some(connected),
            _ => None,
        }
    }

    /// Tears the state down: drops its timers, resumes its waiters with
    /// `reason` and hands back the link, if any.
    pub(crate) fn retire(self, reason: &Error) -> Option<(LinkId, L)> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { link_id, link, .. } | Self::Disconnecting { link_id, link } => {
                Some((link_id, link))
            }
            Self::Connected(connected) => {
                let Connected {
                    link_id,
                    link,
                    idle,
                    pending_write,
                    pending_notification,
                } = connected;
                drop(idle);
                if let Some(waiter) = pending_write {
                    tracing::debug!("cancelling {} (write): {}", waiter.id, reason);
                    let _ = waiter.reply.send(Err(reason.clone()));
                }
                if let Some(waiter) = pending_notification {
                    tracing::debug!("cancelling {} (notification): {}", waiter.id, reason);
                    let _ = waiter.reply.send(Err(reason.clone()));
                }
                Some((link_id, link))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::timer::TimerEvent;

    #[test]
    fn test_phase_and_link_accessors() {
        let mut state: ConnectionState<&str> = ConnectionState::Disconnected;
        assert_eq!(state.phase(), Phase::Disconnected);
        assert_eq!(state.link_id(), None);
        assert!(state.link_mut().is_none());

        state = ConnectionState::Disconnecting {
            link_id: LinkId(3),
            link: "gatt",
        };
        assert_eq!(state.phase(), Phase::Disconnecting);
        assert_eq!(state.link_id(), Some(LinkId(3)));
        assert!(state.connected_mut().is_none());
    }

    #[tokio::test]
    async fn test_retire_cancels_both_waiters_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = oneshot::channel();
        let (notif_tx, notif_rx) = oneshot::channel();

        let mut connected = Connected::new(LinkId(1), "gatt");
        connected.pending_write = Some(PendingWrite {
            id: WaiterId(1),
            characteristic: Uuid::nil(),
            timeout: Duration::from_secs(2),
            reply: write_tx,
            _deadline: TimerHandle::arm(
                Duration::from_secs(2),
                &tx,
                TimerEvent::WriteDeadline(WaiterId(1)),
            ),
        });
        connected.pending_notification = Some(PendingNotification {
            id: WaiterId(2),
            characteristic: Uuid::nil(),
            timeout: Duration::from_secs(10),
            reply: notif_tx,
            _deadline: TimerHandle::arm(
                Duration::from_secs(10),
                &tx,
                TimerEvent::NotificationDeadline(WaiterId(2)),
            ),
        });

        let state = ConnectionState::Connected(connected);
        let link = state.retire(&Error::ShuttingDown);
        assert_eq!(link, Some((LinkId(1), "gatt")));

        assert_eq!(write_rx.await.unwrap(), Err(Error::ShuttingDown));
        assert_eq!(notif_rx.await.unwrap(), Err(Error::ShuttingDown));
    }
}
