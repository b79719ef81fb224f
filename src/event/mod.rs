//! Event system for observers.
//!
//! The adapter publishes phase changes, antenna-state notices and command
//! outcomes here. Delivery is broadcast and lossy: a subscriber that falls
//! behind skips the events it missed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::connection::Phase;
use crate::error::Error;
use crate::protocol::{AntennaState, SendRfStoredCode};

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The connection moved to a new phase.
    PhaseChanged(Phase),
    /// The peripheral reported its antenna state. Informational only.
    AntennaState(AntennaState),
    /// A stored code was transmitted.
    CommandCompleted(SendRfStoredCode),
    /// A stored-code command failed.
    CommandFailed {
        code: SendRfStoredCode,
        error: Error,
    },
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PhaseChanged(_) => EventKind::PhaseChanged,
            Self::AntennaState(_) => EventKind::AntennaState,
            Self::CommandCompleted(_) => EventKind::CommandCompleted,
            Self::CommandFailed { .. } => EventKind::CommandFailed,
        }
    }
}

/// Discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PhaseChanged,
    AntennaState,
    CommandCompleted,
    CommandFailed,
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: Arc<broadcast::Sender<Event>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventDispatcher {
    /// Creates a new event dispatcher buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(Event::PhaseChanged(Phase::Connecting));

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap();

        assert_eq!(event, Some(Event::PhaseChanged(Phase::Connecting)));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_outcomes() {
        let dispatcher = EventDispatcher::new(16);
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();

        let failed = Event::CommandFailed {
            code: SendRfStoredCode::ParentsGarageA,
            error: Error::NotConnected,
        };
        dispatcher.dispatch(failed.clone());

        assert_eq!(first.recv().await, Some(failed.clone()));
        assert_eq!(second.recv().await, Some(failed.clone()));
        assert_eq!(failed.kind(), EventKind::CommandFailed);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_newest() {
        let dispatcher = EventDispatcher::new(2);
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(Event::PhaseChanged(Phase::Connecting));
        dispatcher.dispatch(Event::PhaseChanged(Phase::Connected));
        dispatcher.dispatch(Event::AntennaState(AntennaState::Busy));

        assert_eq!(sub.recv().await, Some(Event::PhaseChanged(Phase::Connected)));
        assert_eq!(sub.recv().await, Some(Event::AntennaState(AntennaState::Busy)));
    }

    #[tokio::test]
    async fn test_recv_ends_with_dispatcher() {
        let dispatcher = EventDispatcher::new(2);
        let mut sub = dispatcher.subscribe();
        drop(dispatcher);
        assert_eq!(sub.recv().await, None);
    }
}
