//! Protocol definitions for RF companion communication.
//!
//! This module contains the wire-level types:
//! - Stored RF codes written to the device
//! - Acknowledgement and antenna-state notifications
//! - GATT service and characteristic identifiers

pub mod command;
pub mod gatt;
pub mod response;

pub use command::SendRfStoredCode;
pub use gatt::{CHR_ANTENNA_STATE, CHR_SEND_RF, SVC_RF_COMPANION};
pub use response::{AntennaState, Rejection, SendRfCommandResult};
