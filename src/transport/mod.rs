//! Transport layer for RF companion communication.
//!
//! A [`Transport`] opens [`Link`]s to the peripheral. Link operations are
//! non-blocking requests; their outcomes arrive later as [`LinkEvent`]s pushed
//! through the [`EventSink`] handed over at open time. The sink marshals every
//! event onto the connection controller's queue, so implementations may call
//! it from any thread.

#[cfg(test)]
pub mod mock;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::connection::Message;
use crate::error::TransportError;
use crate::types::DeviceAddress;

/// Identifies one opened link for the lifetime of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Low-level GATT status code reported with write completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub u8);

impl GattStatus {
    /// Operation completed successfully.
    pub const SUCCESS: Self = Self(0x00);

    /// Returns true for [`GattStatus::SUCCESS`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }
}

impl std::fmt::Display for GattStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// A service found during capability discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    /// Service identifier.
    pub uuid: Uuid,
    /// Characteristics exposed by the service.
    pub characteristics: Vec<Uuid>,
}

impl DiscoveredService {
    /// Complete RF companion service layout.
    #[cfg(test)]
    pub(crate) fn rf_companion() -> Self {
        use crate::protocol::gatt;
        Self {
            uuid: gatt::SVC_RF_COMPANION,
            characteristics: gatt::REQUIRED_CHARACTERISTICS.to_vec(),
        }
    }
}

/// Asynchronous outcome reported by a link.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Physical connection established.
    Connected,
    /// The link started tearing down.
    Disconnecting,
    /// The link is gone.
    Disconnected,
    /// Capability discovery finished.
    ServicesDiscovered(Result<Vec<DiscoveredService>, TransportError>),
    /// A previously accepted write finished.
    WriteCompleted {
        characteristic: Uuid,
        status: GattStatus,
    },
    /// A subscribed characteristic notified a new value.
    ValueChanged { characteristic: Uuid, value: Bytes },
}

/// Delivers [`LinkEvent`]s for one link to the connection controller.
#[derive(Debug, Clone)]
pub struct EventSink {
    link: LinkId,
    tx: mpsc::UnboundedSender<Message>,
}

impl EventSink {
    pub(crate) const fn new(link: LinkId, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { link, tx }
    }

    /// Returns the link this sink reports for.
    #[must_use]
    pub const fn link(&self) -> LinkId {
        self.link
    }

    /// Pushes an event to the controller.
    ///
    /// Returns false if the controller has stopped.
    pub fn emit(&self, event: LinkEvent) -> bool {
        self.tx.send(Message::Link(self.link, event)).is_ok()
    }
}

/// Factory for links to the peripheral.
pub trait Transport: Send + 'static {
    /// Link type produced by this transport.
    type Link: Link;

    /// Starts connecting to `device`. Completion is signalled by
    /// [`LinkEvent::Connected`] or [`LinkEvent::Disconnected`] on `events`.
    fn open(&mut self, device: &DeviceAddress, events: EventSink)
    -> Result<Self::Link, TransportError>;
}

/// One physical connection to the peripheral.
pub trait Link: Send + 'static {
    /// Starts capability discovery; answered by [`LinkEvent::ServicesDiscovered`].
    fn discover_services(&mut self) -> Result<(), TransportError>;

    /// Enables value-changed notifications for a characteristic.
    fn subscribe(&mut self, characteristic: Uuid) -> Result<(), TransportError>;

    /// Queues a write; answered by [`LinkEvent::WriteCompleted`].
    fn write(&mut self, characteristic: Uuid, value: Bytes) -> Result<(), TransportError>;

    /// Requests disconnection; answered by [`LinkEvent::Disconnected`] when the
    /// link had finished connecting.
    fn disconnect(&mut self);

    /// Releases the link.
    fn close(self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gatt_status() {
        assert!(GattStatus::SUCCESS.is_success());
        assert!(!GattStatus(0x85).is_success());
        assert_eq!(GattStatus(0x85).to_string(), "0x85");
    }

    #[tokio::test]
    async fn test_event_sink_tags_link() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(LinkId(7), tx);
        assert!(sink.emit(LinkEvent::Connected));

        match rx.recv().await {
            Some(Message::Link(link, LinkEvent::Connected)) => assert_eq!(link, LinkId(7)),
            other => panic!("unexpected message: {other:?}"),
        }

        drop(rx);
        assert!(!sink.emit(LinkEvent::Disconnected));
    }
}
