//! Acknowledgement and antenna-state notifications.
//!
//! Both capabilities notify with exactly one byte.

use crate::error::ProtocolError;

/// Result codes carried by send-RF acknowledgement notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SendRfCommandResult {
    /// Command accepted, transmission still running.
    Processing = 1,
    /// Antenna is busy with a previous transmission.
    AntennaBusy = 2,
    /// Transmission finished.
    Completed = 3,
    /// The requested code is not stored on the device.
    UnknownSignal = 4,
}

impl SendRfCommandResult {
    /// Attempts to parse a result code from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Processing),
            2 => Some(Self::AntennaBusy),
            3 => Some(Self::Completed),
            4 => Some(Self::UnknownSignal),
            _ => None,
        }
    }

    /// Decodes a raw notification payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        match payload {
            [] => Err(ProtocolError::EmptyPayload),
            [byte] => Self::from_byte(*byte).ok_or(ProtocolError::UnknownResultCode(*byte)),
            _ => Err(ProtocolError::UnexpectedLength(payload.len())),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::AntennaBusy => "ANTENNA_BUSY",
            Self::Completed => "COMPLETED",
            Self::UnknownSignal => "UNKNOWN_SIGNAL",
        }
    }
}

impl std::fmt::Display for SendRfCommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why the device refused a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The antenna was still busy.
    AntennaBusy,
    /// The device does not know the requested code.
    UnknownSignal,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AntennaBusy => f.write_str("antenna busy"),
            Self::UnknownSignal => f.write_str("unknown signal"),
        }
    }
}

/// Informational antenna state pushed by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntennaState {
    /// Antenna idle.
    Idle,
    /// Antenna transmitting.
    Busy,
}

impl AntennaState {
    /// Parses an antenna-state payload. Only the first byte is significant.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        payload
            .first()
            .map(|&b| if b == 1 { Self::Busy } else { Self::Idle })
    }
}
