//! Stored RF codes.
//!
//! Each stored code identifies one preconfigured physical remote-control
//! action on the peripheral. The command write is the single code byte.

use bytes::Bytes;

/// Stored actions the peripheral knows how to transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SendRfStoredCode {
    /// Home 1 garage, exit button.
    Home1GarageExit = 1,
    /// Home 1 garage, enter button.
    Home1GarageEnter = 2,
    /// Parents' garage, left button.
    ParentsGarageA = 3,
    /// Parents' garage, right button.
    ParentsGarageB = 4,
    /// Charge port opener.
    TeslaChargerOpener = 5,
    /// Home 2 garage, exit button.
    Home2GarageExit = 6,
    /// Home 2 garage, enter button.
    Home2GarageEnter = 7,
}

impl SendRfStoredCode {
    /// Every stored code, in code order.
    pub const ALL: [Self; 7] = [
        Self::Home1GarageExit,
        Self::Home1GarageEnter,
        Self::ParentsGarageA,
        Self::ParentsGarageB,
        Self::TeslaChargerOpener,
        Self::Home2GarageExit,
        Self::Home2GarageEnter,
    ];

    /// Attempts to parse a stored code from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Home1GarageExit),
            2 => Some(Self::Home1GarageEnter),
            3 => Some(Self::ParentsGarageA),
            4 => Some(Self::ParentsGarageB),
            5 => Some(Self::TeslaChargerOpener),
            6 => Some(Self::Home2GarageExit),
            7 => Some(Self::Home2GarageEnter),
            _ => None,
        }
    }

    /// Returns the numeric code sent on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns a stable, human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Home1GarageExit => "HOME_1_GARAGE_EXIT",
            Self::Home1GarageEnter => "HOME_1_GARAGE_ENTER",
            Self::ParentsGarageA => "PARENTS_GARAGE_A",
            Self::ParentsGarageB => "PARENTS_GARAGE_B",
            Self::TeslaChargerOpener => "TESLA_CHARGER_OPENER",
            Self::Home2GarageExit => "HOME_2_GARAGE_EXIT",
            Self::Home2GarageEnter => "HOME_2_GARAGE_ENTER",
        }
    }

    /// Encodes the command write payload.
    #[must_use]
    pub fn encode(self) -> Bytes {
        Bytes::copy_from_slice(&[self.code()])
    }
}

impl std::fmt::Display for SendRfStoredCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte_covers_all() {
        for code in SendRfStoredCode::ALL {
            assert_eq!(SendRfStoredCode::from_byte(code.code()), Some(code));
        }
        assert_eq!(SendRfStoredCode::from_byte(0), None);
        assert_eq!(SendRfStoredCode::from_byte(8), None);
    }

    #[test]
    fn test_encode_is_single_byte() {
        assert_eq!(
            SendRfStoredCode::TeslaChargerOpener.encode(),
            Bytes::from_static(&[5])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SendRfStoredCode::ParentsGarageB.to_string(),
            "PARENTS_GARAGE_B(4)"
        );
    }
}
