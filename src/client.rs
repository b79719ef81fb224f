//! Main [`RfCompanion`] client implementation.
//!
//! This module provides the high-level [`RfCompanion`] client that combines
//! transport, connection state machine, command execution and events into a
//! unified interface.

use tokio::task::JoinHandle;

use crate::commands::CommandExecutor;
use crate::config::AdapterConfig;
use crate::connection::{Connection, Phase};
use crate::error::Result;
use crate::event::{EventDispatcher, Subscription};
use crate::protocol::SendRfStoredCode;
use crate::transport::Transport;
use crate::types::DeviceAddress;

/// Capacity of the observer event channel.
const EVENT_CAPACITY: usize = 256;

/// Client for an RF companion peripheral.
///
/// Must be created inside a tokio runtime. Dropping the client tears the
/// connection down without waiting; [`RfCompanion::shutdown`] waits for it.
#[derive(Debug)]
pub struct RfCompanion {
    connection: Connection,
    executor: CommandExecutor,
    dispatcher: EventDispatcher,

    // Background task
    controller_task: Option<JoinHandle<()>>,
}

impl RfCompanion {
    /// Creates a client for the device in `config`. No connection is made
    /// until one is needed.
    #[must_use]
    pub fn new<T: Transport>(transport: T, config: &AdapterConfig) -> Self {
        let dispatcher = EventDispatcher::new(EVENT_CAPACITY);
        let (connection, controller_task) =
            Connection::spawn(transport, config, dispatcher.clone());
        let executor = CommandExecutor::new(connection.clone(), dispatcher.clone(), config);

        Self {
            connection,
            executor,
            dispatcher,
            controller_task: Some(controller_task),
        }
    }

    /// Connects unless already connected.
    pub async fn ensure_connected(&self) -> Result<()> {
        self.connection.ensure_connected().await
    }

    /// Transmits a stored code.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: &rfcompanion::RfCompanion) -> rfcompanion::Result<()> {
    /// use rfcompanion::SendRfStoredCode;
    ///
    /// client.run_stored_command(SendRfStoredCode::Home1GarageExit).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_stored_command(&self, code: SendRfStoredCode) -> Result<()> {
        self.executor.run_stored_command(code).await
    }

    /// Disconnects and waits until the link is gone.
    pub async fn disconnect_and_await(&self) -> Result<()> {
        self.connection.disconnect_and_await().await
    }

    /// Requests disconnection without waiting.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Returns the current connection phase.
    pub async fn phase(&self) -> Result<Phase> {
        self.connection.phase().await
    }

    /// Fails with [`Error::NotConnected`](crate::Error::NotConnected) unless connected.
    pub async fn check_connected(&self) -> Result<()> {
        self.connection.check_connected().await
    }

    /// Switches to another device; the current connection, if any, is dropped.
    pub fn select_device(&self, device: DeviceAddress) {
        self.connection.select_device(device);
    }

    /// Subscribes to phase changes, antenna-state notices and command outcomes.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Returns the event dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Returns the connection handle.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Cancels everything pending, disconnects and stops the background task.
    pub async fn shutdown(mut self) {
        self.connection.shutdown().await;
        if let Some(task) = self.controller_task.take() {
            if let Err(e) = task.await {
                tracing::error!("connection controller failed: {}", e);
            }
        }
    }
}

impl Drop for RfCompanion {
    fn drop(&mut self) {
        if self.controller_task.take().is_some() {
            self.connection.shutdown_now();
        }
    }
}
