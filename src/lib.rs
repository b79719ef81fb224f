//! # rfcompanion
//!
//! A Rust client library for the RF companion, a Bluetooth LE peripheral
//! that replays stored remote-control codes (garage doors, charge-port
//! openers) on request.
//!
//! The library owns the connection lifecycle and the command transport; the
//! platform BLE stack is plugged in through the [`Transport`] trait.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Single-task connection state machine, no locks around connection state
//! - Two-stage acknowledgement protocol with typed failures
//! - Automatic disconnect after two minutes of inactivity
//! - Event stream for phase changes, antenna state and command outcomes
//!
//! ## Quick Start
//!
//! ```no_run
//! use rfcompanion::{AdapterConfig, DeviceAddress, RfCompanion, SendRfStoredCode, Transport};
//!
//! async fn open_garage(transport: impl Transport) -> rfcompanion::Result<()> {
//!     let device = DeviceAddress::new([0x94, 0xE6, 0x86, 0x3D, 0x73, 0x8A]);
//!     let client = RfCompanion::new(transport, &AdapterConfig::new(device));
//!
//!     // Connects on demand, writes the code and waits for the acknowledgement.
//!     client.run_stored_command(SendRfStoredCode::Home1GarageExit).await?;
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire types (stored codes, acknowledgements, GATT identifiers)
//! - [`types`] - Data structures (device addresses)
//! - [`transport`] - The BLE transport contract
//! - [`connection`] - Connection state machine and its handle
//! - [`event`] - Async event system for observers
//! - [`commands`] - Stored-code command execution
//! - [`client`] - High-level [`RfCompanion`] client

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::RfCompanion;
pub use commands::CommandExecutor;
pub use config::AdapterConfig;
pub use connection::{Connection, Notification, Phase};
pub use error::{Error, ProtocolError, Result, TransportError, WriteFailure};
pub use event::{Event, EventDispatcher, EventKind, Subscription};
pub use protocol::{AntennaState, Rejection, SendRfCommandResult, SendRfStoredCode};
pub use transport::{DiscoveredService, EventSink, GattStatus, Link, LinkEvent, LinkId, Transport};
pub use types::DeviceAddress;
