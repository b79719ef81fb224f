//! Connection state machine.
//!
//! The state machine runs as a spawned controller task; [`Connection`] is the
//! cloneable handle used to talk to it. Every operation is a message on the
//! controller queue answered through a oneshot channel, so callers suspend
//! while the controller itself never blocks.

mod controller;
mod idle;
mod registry;
mod state;
mod timer;

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AdapterConfig;
use crate::error::{Error, Result, WriteFailure};
use crate::event::EventDispatcher;
use crate::transport::{GattStatus, LinkEvent, LinkId, Transport};
use crate::types::DeviceAddress;

use controller::Controller;
use timer::TimerEvent;

pub use state::Phase;

/// Everything the controller task consumes.
#[derive(Debug)]
pub(crate) enum Message {
    Request(Request),
    Link(LinkId, LinkEvent),
    Timer(TimerEvent),
}

/// Caller requests.
#[derive(Debug)]
pub(crate) enum Request {
    Connect {
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Write {
        characteristic: Uuid,
        value: Bytes,
        timeout: Duration,
        reply: oneshot::Sender<Result<GattStatus>>,
    },
    ExpectNotification {
        characteristic: Uuid,
        timeout: Duration,
        registered: oneshot::Sender<Result<()>>,
        reply: oneshot::Sender<Result<Bytes>>,
    },
    ResetIdle,
    Phase {
        reply: oneshot::Sender<Phase>,
    },
    SelectDevice {
        device: DeviceAddress,
    },
    Shutdown {
        reply: Option<oneshot::Sender<()>>,
    },
}

/// Handle to a running connection controller.
#[derive(Debug, Clone)]
pub struct Connection {
    tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Spawns the controller task for `transport`.
    pub(crate) fn spawn<T: Transport>(
        transport: T,
        config: &AdapterConfig,
        dispatcher: EventDispatcher,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Controller::new(transport, config.clone(), tx.clone(), dispatcher);
        let task = tokio::spawn(controller.run(rx));
        (Self { tx }, task)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(Message::Request(request))
            .map_err(|_| Error::ShuttingDown)
    }

    async fn call<R>(&self, request: impl FnOnce(oneshot::Sender<R>) -> Request) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.send(request(reply))?;
        rx.await.map_err(|_| Error::ShuttingDown)
    }

    /// Returns once the connection is usable, connecting first if needed.
    ///
    /// Fails with [`Error::ConnectFailed`] if the link drops or lacks the
    /// required capabilities, and with [`Error::ConnectionTimeout`] if it is
    /// not usable within the connection timeout. Both leave the connection
    /// `Disconnected`.
    pub async fn ensure_connected(&self) -> Result<()> {
        self.call(|reply| Request::Connect { reply }).await?
    }

    /// Requests disconnection and waits until the connection is `Disconnected`.
    ///
    /// Returns immediately if already disconnected.
    pub async fn disconnect_and_await(&self) -> Result<()> {
        self.call(|reply| Request::Disconnect { reply: Some(reply) })
            .await?
    }

    /// Requests disconnection without waiting for it.
    pub fn disconnect(&self) {
        let _ = self.send(Request::Disconnect { reply: None });
    }

    /// Returns the current phase.
    pub async fn phase(&self) -> Result<Phase> {
        self.call(|reply| Request::Phase { reply }).await
    }

    /// Fails with [`Error::NotConnected`] unless the phase is `Connected`.
    pub async fn check_connected(&self) -> Result<()> {
        match self.phase().await? {
            Phase::Connected => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Writes `value` to `characteristic` and waits for the write completion.
    ///
    /// A non-success completion status is reported as
    /// [`WriteFailure::Status`].
    pub async fn write(&self, characteristic: Uuid, value: Bytes, timeout: Duration) -> Result<()> {
        let status = self
            .call(|reply| Request::Write {
                characteristic,
                value,
                timeout,
                reply,
            })
            .await??;

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::WriteFailed(WriteFailure::Status(status)))
        }
    }

    /// Registers for the next notification on `characteristic`.
    ///
    /// Returns once the controller holds the registration, so a write issued
    /// afterwards cannot be answered before the waiter exists. Fails with
    /// [`Error::CommandInProgress`] if another wait on the connection is
    /// still outstanding.
    pub async fn expect_notification(
        &self,
        characteristic: Uuid,
        timeout: Duration,
    ) -> Result<Notification> {
        let (reply, rx) = oneshot::channel();
        self.call(|registered| Request::ExpectNotification {
            characteristic,
            timeout,
            registered,
            reply,
        })
        .await??;
        Ok(Notification { rx })
    }

    /// Restarts the idle countdown of the current connection.
    pub(crate) fn reset_idle(&self) {
        let _ = self.send(Request::ResetIdle);
    }

    /// Targets another device. A current connection is dropped; the next
    /// connect goes to `device`.
    pub fn select_device(&self, device: DeviceAddress) {
        let _ = self.send(Request::SelectDevice { device });
    }

    /// Cancels every waiter, drops the link and stops the controller.
    pub(crate) async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Request::Shutdown { reply: Some(reply) }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Like [`Connection::shutdown`], without waiting.
    pub(crate) fn shutdown_now(&self) {
        let _ = self.send(Request::Shutdown { reply: None });
    }
}

/// A registered wait for one notification.
///
/// The registration stays with the controller until the value arrives, the
/// timeout passes or the connection goes away, even if this is dropped.
#[derive(Debug)]
pub struct Notification {
    rx: oneshot::Receiver<Result<Bytes>>,
}

impl Notification {
    /// Waits for the notified value.
    pub async fn recv(self) -> Result<Bytes> {
        self.rx.await.map_err(|_| Error::ShuttingDown)?
    }
}
