//! Scripted in-memory peripheral used by the test suites.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::TransportError;
use crate::protocol::CHR_SEND_RF;
use crate::transport::{DiscoveredService, EventSink, GattStatus, Link, LinkEvent, Transport};
use crate::types::DeviceAddress;

/// A call made by the core against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(DeviceAddress),
    Discover,
    Subscribe(Uuid),
    Write(Uuid, Bytes),
    Disconnect,
    Close,
}

/// Spacing between scripted acknowledgements after the first one.
pub const RESPONSE_GAP: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Script {
    auto_connect: bool,
    services: Result<Vec<DiscoveredService>, TransportError>,
    write_status: Option<GattStatus>,
    reject_writes: bool,
    responses: VecDeque<(Vec<Bytes>, Duration)>,
    confirm_disconnect: bool,
    calls: Vec<Call>,
    sink: Option<EventSink>,
}

/// Shared control surface for the mock peripheral.
#[derive(Debug, Clone)]
pub struct MockPeripheral {
    script: Arc<Mutex<Script>>,
}

impl Default for MockPeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPeripheral {
    /// Well-behaved peripheral: connects, exposes the full layout, completes writes.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                auto_connect: true,
                services: Ok(vec![DiscoveredService::rf_companion()]),
                write_status: Some(GattStatus::SUCCESS),
                reject_writes: false,
                responses: VecDeque::new(),
                confirm_disconnect: true,
                calls: Vec::new(),
                sink: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Creates a transport bound to this peripheral.
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            peripheral: self.clone(),
        }
    }

    /// Never emits `Connected` on its own.
    pub fn manual_connect(self) -> Self {
        self.lock().auto_connect = false;
        self
    }

    /// Reports these services on discovery.
    pub fn with_services(self, services: Vec<DiscoveredService>) -> Self {
        self.lock().services = Ok(services);
        self
    }

    /// Completes writes with the given status.
    pub fn with_write_status(self, status: GattStatus) -> Self {
        self.lock().write_status = Some(status);
        self
    }

    /// Accepts writes but never reports completion.
    pub fn without_write_completion(self) -> Self {
        self.lock().write_status = None;
        self
    }

    /// Refuses writes synchronously.
    pub fn rejecting_writes(self) -> Self {
        self.lock().reject_writes = true;
        self
    }

    /// Never confirms a disconnect request.
    pub fn silent_disconnect(self) -> Self {
        self.lock().confirm_disconnect = false;
        self
    }

    /// Queues acknowledgement bytes to notify after the next send-RF write.
    /// The first is notified right away, each further one [`RESPONSE_GAP`]
    /// after the previous.
    pub fn respond(&self, codes: &[u8]) {
        self.respond_spaced(codes, RESPONSE_GAP);
    }

    /// Like [`MockPeripheral::respond`], with `gap` between acknowledgements.
    pub fn respond_spaced(&self, codes: &[u8], gap: Duration) {
        let notifications = codes
            .iter()
            .map(|c| Bytes::copy_from_slice(&[*c]))
            .collect();
        self.lock().responses.push_back((notifications, gap));
    }

    /// Emits an event on the most recently opened link.
    pub fn inject(&self, event: LinkEvent) {
        let sink = self.lock().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// Notifies a value on the most recently opened link.
    pub fn notify(&self, characteristic: Uuid, value: &[u8]) {
        self.inject(LinkEvent::ValueChanged {
            characteristic,
            value: Bytes::copy_from_slice(value),
        });
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Returns the payloads written to the send-RF characteristic.
    pub fn writes(&self) -> Vec<Bytes> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Write(chr, value) if *chr == CHR_SEND_RF => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Counts calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

/// Transport half of the mock.
#[derive(Debug)]
pub struct MockTransport {
    peripheral: MockPeripheral,
}

impl Transport for MockTransport {
    type Link = MockLink;

    fn open(
        &mut self,
        device: &DeviceAddress,
        events: EventSink,
    ) -> Result<Self::Link, TransportError> {
        let mut script = self.peripheral.lock();
        script.calls.push(Call::Open(*device));
        script.sink = Some(events.clone());
        if script.auto_connect {
            events.emit(LinkEvent::Connected);
        }
        Ok(MockLink {
            peripheral: self.peripheral.clone(),
            events,
        })
    }
}

/// Link half of the mock.
#[derive(Debug)]
pub struct MockLink {
    peripheral: MockPeripheral,
    events: EventSink,
}

impl Link for MockLink {
    fn discover_services(&mut self) -> Result<(), TransportError> {
        let mut script = self.peripheral.lock();
        script.calls.push(Call::Discover);
        self.events
            .emit(LinkEvent::ServicesDiscovered(script.services.clone()));
        Ok(())
    }

    fn subscribe(&mut self, characteristic: Uuid) -> Result<(), TransportError> {
        self.peripheral
            .lock()
            .calls
            .push(Call::Subscribe(characteristic));
        Ok(())
    }

    fn write(&mut self, characteristic: Uuid, value: Bytes) -> Result<(), TransportError> {
        let mut script = self.peripheral.lock();
        script.calls.push(Call::Write(characteristic, value));
        if script.reject_writes {
            return Err(TransportError::Rejected("write queue full".into()));
        }
        if let Some(status) = script.write_status {
            self.events.emit(LinkEvent::WriteCompleted {
                characteristic,
                status,
            });
        }
        if characteristic == CHR_SEND_RF {
            let (responses, gap) = script.responses.pop_front().unwrap_or_default();
            for (i, value) in responses.into_iter().enumerate() {
                let event = LinkEvent::ValueChanged {
                    characteristic,
                    value,
                };
                if i == 0 {
                    self.events.emit(event);
                } else {
                    let events = self.events.clone();
                    let delay = gap * u32::try_from(i).unwrap_or(u32::MAX);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        events.emit(event);
                    });
                }
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let script = {
            let mut script = self.peripheral.lock();
            script.calls.push(Call::Disconnect);
            script.confirm_disconnect
        };
        if script {
            self.events.emit(LinkEvent::Disconnecting);
            self.events.emit(LinkEvent::Disconnected);
        }
    }

    fn close(self) {
        self.peripheral.lock().calls.push(Call::Close);
    }
}
