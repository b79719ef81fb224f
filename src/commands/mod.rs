//! Stored-code command execution.
//!
//! A command is one write of the code byte to the send-RF characteristic,
//! answered by one or two acknowledgement notifications on the same
//! characteristic:
//!
//! - `COMPLETED` ends the command successfully.
//! - `ANTENNA_BUSY` or `UNKNOWN_SIGNAL` ends it with a rejection.
//! - `PROCESSING` means a second notification follows, which must be
//!   `COMPLETED`.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::AdapterConfig;
use crate::connection::Connection;
use crate::error::{Error, ProtocolError, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{CHR_SEND_RF, Rejection, SendRfCommandResult, SendRfStoredCode};

/// Runs stored-code commands over a [`Connection`], one at a time.
#[derive(Debug)]
pub struct CommandExecutor {
    connection: Connection,
    dispatcher: EventDispatcher,
    write_timeout: Duration,
    response_timeout: Duration,
    gate: Mutex<()>,
}

impl CommandExecutor {
    /// Creates an executor using the timeouts of `config`.
    #[must_use]
    pub fn new(connection: Connection, dispatcher: EventDispatcher, config: &AdapterConfig) -> Self {
        Self {
            connection,
            dispatcher,
            write_timeout: config.write_timeout,
            response_timeout: config.response_timeout,
            gate: Mutex::new(()),
        }
    }

    /// Transmits a stored code, connecting first if needed.
    ///
    /// Only one command runs at a time; an overlapping call fails with
    /// [`Error::CommandInProgress`] without touching the connection, and
    /// nothing is written. Any other failure also drops the connection, so
    /// the next call starts from a fresh link. Nothing is retried.
    pub async fn run_stored_command(&self, code: SendRfStoredCode) -> Result<()> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::warn!("rejecting {}: another command is in progress", code);
            return Err(Error::CommandInProgress);
        };

        tracing::info!("sending {}", code);
        match self.execute(code).await {
            Ok(()) => {
                tracing::info!("{} completed", code);
                self.connection.reset_idle();
                self.dispatcher.dispatch(Event::CommandCompleted(code));
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{} failed: {}", code, err);
                if !matches!(err, Error::ShuttingDown | Error::CommandInProgress) {
                    if let Err(e) = self.connection.disconnect_and_await().await {
                        tracing::debug!("disconnect after failed {} did not finish: {}", code, e);
                    }
                }
                self.dispatcher.dispatch(Event::CommandFailed {
                    code,
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    async fn execute(&self, code: SendRfStoredCode) -> Result<()> {
        self.connection.ensure_connected().await?;
        self.connection.reset_idle();

        // Registered before the write so a fast answer is not missed.
        let first = self
            .connection
            .expect_notification(CHR_SEND_RF, self.response_timeout)
            .await?;
        self.connection
            .write(CHR_SEND_RF, code.encode(), self.write_timeout)
            .await?;

        match SendRfCommandResult::decode(&first.recv().await?)? {
            SendRfCommandResult::Completed => Ok(()),
            SendRfCommandResult::Processing => {
                tracing::debug!("{} processing, awaiting completion", code);
                let second = self
                    .connection
                    .expect_notification(CHR_SEND_RF, self.response_timeout)
                    .await?
                    .recv()
                    .await?;
                match SendRfCommandResult::decode(&second)? {
                    SendRfCommandResult::Completed => Ok(()),
                    received => Err(ProtocolError::UnexpectedStage {
                        expected: SendRfCommandResult::Completed,
                        received,
                    }
                    .into()),
                }
            }
            SendRfCommandResult::AntennaBusy => Err(Error::DeviceRejected(Rejection::AntennaBusy)),
            SendRfCommandResult::UnknownSignal => {
                Err(Error::DeviceRejected(Rejection::UnknownSignal))
            }
        }
    }
}
