//! The connection controller task.
//!
//! A single task owns the [`ConnectionState`], the transition waiters and the
//! transport. Caller requests, link events and timer expiries all arrive on
//! one queue and are handled to completion one at a time, so nothing here is
//! locked.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::AdapterConfig;
use crate::connection::idle::IdleSupervisor;
use crate::connection::registry::{Resume, WaiterRegistry};
use crate::connection::state::{
    Connected, ConnectionState, PendingNotification, PendingWrite, Phase,
};
use crate::connection::timer::{TimerEvent, TimerHandle, WaiterId};
use crate::connection::{Message, Request};
use crate::error::{Error, Result, TransportError, WriteFailure, timeout_ms};
use crate::event::{Event, EventDispatcher};
use crate::protocol::AntennaState;
use crate::protocol::gatt::{self, CHR_ANTENNA_STATE, REQUIRED_CHARACTERISTICS};
use crate::transport::{DiscoveredService, EventSink, GattStatus, Link, LinkEvent, LinkId, Transport};
use crate::types::DeviceAddress;

/// Reason reported to connect waiters when the link drops without a more
/// specific failure.
const DEVICE_DISCONNECTED: &str = "device disconnected";

pub(crate) struct Controller<T: Transport> {
    transport: T,
    config: AdapterConfig,
    state: ConnectionState<T::Link>,
    registry: WaiterRegistry,
    idle: IdleSupervisor,
    tx: mpsc::UnboundedSender<Message>,
    dispatcher: EventDispatcher,
    next_link: u64,
    disconnect_deadline: Option<TimerHandle>,
    connect_failure: Option<String>,
    shutting_down: bool,
}

impl<T: Transport> Controller<T> {
    pub(crate) fn new(
        transport: T,
        config: AdapterConfig,
        tx: mpsc::UnboundedSender<Message>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            transport,
            idle: IdleSupervisor::new(config.idle_timeout),
            config,
            state: ConnectionState::Disconnected,
            registry: WaiterRegistry::new(tx.clone()),
            tx,
            dispatcher,
            next_link: 0,
            disconnect_deadline: None,
            connect_failure: None,
            shutting_down: false,
        }
    }

    /// Processes messages until a shutdown request arrives.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        tracing::debug!("connection controller started for {}", self.config.device);

        while let Some(message) = rx.recv().await {
            match message {
                Message::Request(Request::Shutdown { reply }) => {
                    self.shutdown();
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                    break;
                }
                Message::Request(request) => self.handle_request(request),
                Message::Link(link, event) => self.handle_link_event(link, event),
                Message::Timer(event) => self.handle_timer(event),
            }
        }

        tracing::debug!("connection controller stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect { reply } => self.connect(reply),
            Request::Disconnect { reply } => self.disconnect(reply),
            Request::Write {
                characteristic,
                value,
                timeout,
                reply,
            } => self.write(characteristic, value, timeout, reply),
            Request::ExpectNotification {
                characteristic,
                timeout,
                registered,
                reply,
            } => self.expect_notification(characteristic, timeout, registered, reply),
            Request::ResetIdle => {
                if let Some(connected) = self.state.connected_mut() {
                    self.idle.reset(connected, &self.tx);
                }
            }
            Request::Phase { reply } => {
                let _ = reply.send(self.state.phase());
            }
            Request::SelectDevice { device } => self.select_device(device),
            Request::Shutdown { .. } => {}
        }
    }

    // Requests

    fn connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.shutting_down {
            let _ = reply.send(Err(Error::ShuttingDown));
            return;
        }

        let timeout = Some(self.config.connection_timeout);
        match self.state.phase() {
            Phase::Connected => {
                let _ = reply.send(Ok(()));
            }
            Phase::Connecting => {
                self.registry.register(
                    &[Phase::Connected, Phase::Disconnected],
                    timeout,
                    Resume::Connect(reply),
                );
            }
            Phase::Disconnecting => {
                tracing::debug!("connect requested while disconnecting, deferring");
                self.registry
                    .register(&[Phase::Disconnected], timeout, Resume::Reconnect(reply));
            }
            Phase::Disconnected => self.open(reply),
        }
    }

    fn open(&mut self, reply: oneshot::Sender<Result<()>>) {
        self.next_link += 1;
        let link_id = LinkId(self.next_link);
        let events = EventSink::new(link_id, self.tx.clone());

        tracing::info!("connecting to {} on {}", self.config.device, link_id);
        match self.transport.open(&self.config.device, events) {
            Ok(link) => {
                self.connect_failure = None;
                self.install(ConnectionState::Connecting {
                    link_id,
                    link,
                    settle: None,
                });
                self.registry.register(
                    &[Phase::Connected, Phase::Disconnected],
                    Some(self.config.connection_timeout),
                    Resume::Connect(reply),
                );
            }
            Err(err) => {
                tracing::warn!("failed to open link to {}: {}", self.config.device, err);
                let _ = reply.send(Err(Error::ConnectFailed {
                    reason: err.to_string(),
                }));
            }
        }
    }

    fn disconnect(&mut self, reply: Option<oneshot::Sender<Result<()>>>) {
        self.begin_disconnect();

        let Some(reply) = reply else {
            return;
        };
        if self.state.phase() == Phase::Disconnected {
            let _ = reply.send(Ok(()));
        } else {
            self.registry
                .register(&[Phase::Disconnected], None, Resume::Disconnect(reply));
        }
    }

    fn write(
        &mut self,
        characteristic: Uuid,
        value: Bytes,
        timeout: Duration,
        reply: oneshot::Sender<Result<GattStatus>>,
    ) {
        let id = self.registry.next_id();
        let Some(connected) = self.state.connected_mut() else {
            let _ = reply.send(Err(Error::NotConnected));
            return;
        };
        if connected.pending_write.is_some() {
            let _ = reply.send(Err(Error::CommandInProgress));
            return;
        }

        tracing::debug!(
            "{}: writing {} to {}",
            id,
            hex::encode(&value),
            characteristic
        );
        connected.pending_write = Some(PendingWrite {
            id,
            characteristic,
            timeout,
            reply,
            _deadline: TimerHandle::arm(timeout, &self.tx, TimerEvent::WriteDeadline(id)),
        });

        if let Err(err) = connected.link.write(characteristic, value) {
            tracing::warn!("write to {} rejected: {}", characteristic, err);
            if let Some(waiter) = connected.pending_write.take() {
                let _ = waiter
                    .reply
                    .send(Err(Error::WriteFailed(WriteFailure::Rejected(err))));
            }
        }
    }

    fn expect_notification(
        &mut self,
        characteristic: Uuid,
        timeout: Duration,
        registered: oneshot::Sender<Result<()>>,
        reply: oneshot::Sender<Result<Bytes>>,
    ) {
        let id = self.registry.next_id();
        let Some(connected) = self.state.connected_mut() else {
            let _ = registered.send(Err(Error::NotConnected));
            return;
        };
        if connected.pending_notification.is_some() {
            let _ = registered.send(Err(Error::CommandInProgress));
            return;
        }

        tracing::debug!("{}: awaiting notification on {}", id, characteristic);
        connected.pending_notification = Some(PendingNotification {
            id,
            characteristic,
            timeout,
            reply,
            _deadline: TimerHandle::arm(timeout, &self.tx, TimerEvent::NotificationDeadline(id)),
        });
        let _ = registered.send(Ok(()));
    }

    fn select_device(&mut self, device: DeviceAddress) {
        if device == self.config.device {
            return;
        }
        tracing::info!("target device changed from {} to {}", self.config.device, device);
        self.config.device = device;
        self.begin_disconnect();
    }

    fn shutdown(&mut self) {
        tracing::info!("shutting down connection to {}", self.config.device);
        self.shutting_down = true;
        let cancelled = self.registry.cancel_all(&Error::ShuttingDown);
        if cancelled > 0 {
            tracing::debug!("cancelled {} transition waiters", cancelled);
        }
        if let Some(link) = self.state.link_mut() {
            link.disconnect();
        }
        self.release();
    }

    // Link events

    fn handle_link_event(&mut self, link: LinkId, event: LinkEvent) {
        if self.state.link_id() != Some(link) {
            tracing::warn!("discarding {:?} from stale {}", event, link);
            return;
        }

        match event {
            LinkEvent::Connected => self.on_connected(),
            LinkEvent::ServicesDiscovered(services) => self.on_services_discovered(services),
            LinkEvent::Disconnecting => {
                if matches!(self.state.phase(), Phase::Connecting | Phase::Connected) {
                    self.carry(|link_id, link| ConnectionState::Disconnecting { link_id, link });
                }
                self.arm_disconnect_deadline();
            }
            LinkEvent::Disconnected => self.release(),
            LinkEvent::WriteCompleted {
                characteristic,
                status,
            } => self.on_write_completed(characteristic, status),
            LinkEvent::ValueChanged {
                characteristic,
                value,
            } => self.on_value_changed(characteristic, value),
        }
    }

    fn on_connected(&mut self) {
        let phase = self.state.phase();
        let ConnectionState::Connecting { link_id, link, .. } = &mut self.state else {
            tracing::debug!("ignoring connected event in {}", phase);
            return;
        };

        tracing::debug!("{} up, discovering services", link_id);
        if let Err(err) = link.discover_services() {
            self.fail_connect(format!("service discovery failed: {err}"));
        }
    }

    fn on_services_discovered(
        &mut self,
        services: std::result::Result<Vec<DiscoveredService>, TransportError>,
    ) {
        if self.state.phase() != Phase::Connecting {
            tracing::debug!("ignoring service discovery in {}", self.state.phase());
            return;
        }
        if let Err(reason) = self.prepare_link(services) {
            self.fail_connect(reason);
        }
    }

    /// Validates the discovered layout, subscribes to the required
    /// characteristics and starts the settle delay.
    fn prepare_link(
        &mut self,
        services: std::result::Result<Vec<DiscoveredService>, TransportError>,
    ) -> std::result::Result<(), String> {
        let services = services.map_err(|err| format!("service discovery failed: {err}"))?;
        gatt::check_required(&services)?;

        let ConnectionState::Connecting {
            link_id,
            link,
            settle,
        } = &mut self.state
        else {
            return Err("link is no longer connecting".into());
        };

        for characteristic in REQUIRED_CHARACTERISTICS {
            link.subscribe(characteristic)
                .map_err(|err| format!("subscribing to {characteristic} failed: {err}"))?;
        }

        tracing::debug!(
            "{} ready, settling for {:?}",
            link_id,
            self.config.settle_delay
        );
        *settle = Some(TimerHandle::arm(
            self.config.settle_delay,
            &self.tx,
            TimerEvent::Settled(*link_id),
        ));
        Ok(())
    }

    fn on_write_completed(&mut self, characteristic: Uuid, status: GattStatus) {
        let waiter = self
            .state
            .connected_mut()
            .and_then(|c| c.pending_write.take_if(|w| w.characteristic == characteristic));

        match waiter {
            Some(waiter) => {
                tracing::debug!("{}: write completed with status {}", waiter.id, status);
                let _ = waiter.reply.send(Ok(status));
            }
            None => tracing::warn!(
                "write completion on {} (status {}) with nobody waiting",
                characteristic,
                status
            ),
        }
    }

    fn on_value_changed(&mut self, characteristic: Uuid, value: Bytes) {
        if characteristic == CHR_ANTENNA_STATE {
            match AntennaState::from_payload(&value) {
                Some(state) => {
                    tracing::info!("antenna state: {:?}", state);
                    self.dispatcher.dispatch(Event::AntennaState(state));
                }
                None => tracing::warn!("empty antenna-state notification"),
            }
            return;
        }

        let waiter = self.state.connected_mut().and_then(|c| {
            c.pending_notification
                .take_if(|w| w.characteristic == characteristic)
        });

        match waiter {
            Some(waiter) => {
                tracing::debug!("{}: notified {}", waiter.id, hex::encode(&value));
                let _ = waiter.reply.send(Ok(value));
            }
            None => tracing::warn!(
                "discarding notification {} on {} with nobody waiting",
                hex::encode(&value),
                characteristic
            ),
        }
    }

    // Timers

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::TransitionDeadline(id) => self.on_transition_deadline(id),
            TimerEvent::WriteDeadline(id) => self.on_write_deadline(id),
            TimerEvent::NotificationDeadline(id) => self.on_notification_deadline(id),
            TimerEvent::IdleElapsed { link, generation } => {
                let Some(connected) = self.state.connected_mut() else {
                    return;
                };
                if connected.link_id != link || !IdleSupervisor::is_current(connected, generation)
                {
                    return;
                }
                if connected.pending_write.is_some() || connected.pending_notification.is_some() {
                    tracing::debug!("{} idle window elapsed mid-command, re-arming", link);
                    self.idle.reset(connected, &self.tx);
                    return;
                }
                tracing::info!(
                    "{} idle for {:?}, disconnecting",
                    link,
                    self.config.idle_timeout
                );
                self.begin_disconnect();
            }
            TimerEvent::Settled(settled) => {
                if matches!(self.state, ConnectionState::Connecting { link_id, .. } if link_id == settled)
                {
                    self.carry(|link_id, link| {
                        ConnectionState::Connected(Connected::new(link_id, link))
                    });
                }
            }
            TimerEvent::DisconnectDeadline(link) => {
                if self.state.link_id() == Some(link) {
                    tracing::warn!(
                        "{} did not confirm disconnect within {:?}, dropping it",
                        link,
                        self.config.disconnect_timeout
                    );
                    self.release();
                }
            }
        }
    }

    fn on_transition_deadline(&mut self, id: WaiterId) {
        let Some((resume, err)) = self.registry.expire(id) else {
            return;
        };

        if let Resume::Connect(_) = resume {
            tracing::warn!("connection to {} timed out", self.config.device);
            self.connect_failure = Some(err.to_string());
            self.begin_disconnect();
        }
        resume.fail(err);
    }

    fn on_write_deadline(&mut self, id: WaiterId) {
        let waiter = self
            .state
            .connected_mut()
            .and_then(|c| c.pending_write.take_if(|w| w.id == id));

        if let Some(waiter) = waiter {
            tracing::warn!("{}: no write completion on {}", id, waiter.characteristic);
            let _ = waiter
                .reply
                .send(Err(Error::WriteFailed(WriteFailure::Timeout {
                    timeout_ms: timeout_ms(waiter.timeout),
                })));
        }
    }

    fn on_notification_deadline(&mut self, id: WaiterId) {
        let waiter = self
            .state
            .connected_mut()
            .and_then(|c| c.pending_notification.take_if(|w| w.id == id));

        if let Some(waiter) = waiter {
            tracing::warn!("{}: no notification on {}", id, waiter.characteristic);
            let _ = waiter.reply.send(Err(Error::ResponseTimeout {
                timeout_ms: timeout_ms(waiter.timeout),
            }));
        }
    }

    // Transitions

    /// Requests disconnection of whatever link is held. A connected link
    /// moves to `Disconnecting` at once so nothing new is started on it; a
    /// link that never finished connecting is released at once since it may
    /// never confirm.
    fn begin_disconnect(&mut self) {
        match self.state.phase() {
            Phase::Disconnected => {}
            Phase::Connecting => {
                if let Some(link) = self.state.link_mut() {
                    link.disconnect();
                }
                self.release();
            }
            Phase::Connected => {
                if let Some(link) = self.state.link_mut() {
                    link.disconnect();
                }
                self.carry(|link_id, link| ConnectionState::Disconnecting { link_id, link });
                self.arm_disconnect_deadline();
            }
            Phase::Disconnecting => self.arm_disconnect_deadline(),
        }
    }

    fn fail_connect(&mut self, reason: String) {
        tracing::warn!("connection to {} failed: {}", self.config.device, reason);
        self.connect_failure = Some(reason);
        self.begin_disconnect();
    }

    fn arm_disconnect_deadline(&mut self) {
        if self.disconnect_deadline.is_some() {
            return;
        }
        if let Some(link) = self.state.link_id() {
            self.disconnect_deadline = Some(TimerHandle::arm(
                self.config.disconnect_timeout,
                &self.tx,
                TimerEvent::DisconnectDeadline(link),
            ));
        }
    }

    /// Moves to `Disconnected`, closing the held link.
    fn release(&mut self) {
        self.disconnect_deadline = None;
        if self.state.phase() != Phase::Disconnected {
            self.install(ConnectionState::Disconnected);
        }
    }

    /// Replaces the state. The previous state is retired and its link closed.
    fn install(&mut self, next: ConnectionState<T::Link>) {
        let from = self.state.phase();
        let reason = self.cancel_reason();
        let previous = std::mem::replace(&mut self.state, next);
        if let Some((link_id, link)) = previous.retire(&reason) {
            tracing::debug!("closing {}", link_id);
            link.close();
        }
        self.after_transition(from);
    }

    /// Moves the held link into the state built by `build`.
    fn carry(&mut self, build: impl FnOnce(LinkId, T::Link) -> ConnectionState<T::Link>) {
        let from = self.state.phase();
        let reason = self.cancel_reason();
        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        let Some((link_id, link)) = previous.retire(&reason) else {
            return;
        };
        self.state = build(link_id, link);
        self.after_transition(from);
    }

    fn after_transition(&mut self, from: Phase) {
        let to = self.state.phase();
        if from == to {
            return;
        }

        tracing::info!("connection {} -> {}", from, to);
        self.dispatcher.dispatch(Event::PhaseChanged(to));

        if let Some(connected) = self.state.connected_mut() {
            self.idle.reset(connected, &self.tx);
        }

        for resume in self.registry.notify(to) {
            match resume {
                Resume::Connect(reply) => {
                    let result = if to == Phase::Connected {
                        Ok(())
                    } else {
                        Err(Error::ConnectFailed {
                            reason: self
                                .connect_failure
                                .clone()
                                .unwrap_or_else(|| DEVICE_DISCONNECTED.into()),
                        })
                    };
                    let _ = reply.send(result);
                }
                Resume::Disconnect(reply) => {
                    let _ = reply.send(Ok(()));
                }
                Resume::Reconnect(reply) => self.connect(reply),
            }
        }
    }

    fn cancel_reason(&self) -> Error {
        if self.shutting_down {
            Error::ShuttingDown
        } else {
            Error::ConnectionLost
        }
    }
}
