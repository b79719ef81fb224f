//! Peripheral identity.

use std::str::FromStr;

/// Length of a Bluetooth device address in bytes.
pub const DEVICE_ADDRESS_LEN: usize = 6;

/// A 48-bit Bluetooth device address, e.g. `94:E6:86:3D:73:8A`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress([u8; DEVICE_ADDRESS_LEN]);

impl DeviceAddress {
    /// Creates an address from its six bytes, most significant first.
    #[must_use]
    pub const fn new(bytes: [u8; DEVICE_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the address bytes, most significant first.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DEVICE_ADDRESS_LEN] {
        &self.0
    }

    /// Parses an address with or without `:`/`-` separators.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 6 bytes long.
    pub fn parse(s: &str) -> Result<Self, hex::FromHexError> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        let bytes = hex::decode(digits)?;
        let bytes: [u8; DEVICE_ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(bytes))
    }
}

impl FromStr for DeviceAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| hex::encode_upper([*b])).collect();
        f.write_str(&parts.join(":"))
    }
}

impl std::fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_form() {
        let addr: DeviceAddress = "94:E6:86:3D:73:8A".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0x94, 0xE6, 0x86, 0x3D, 0x73, 0x8A]);
        assert_eq!(addr.to_string(), "94:E6:86:3D:73:8A");
    }

    #[test]
    fn test_parse_bare_and_lowercase() {
        let addr = DeviceAddress::parse("94e6863d738a").unwrap();
        assert_eq!(addr.to_string(), "94:E6:86:3D:73:8A");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(DeviceAddress::parse("94:E6:86").is_err());
        assert!(DeviceAddress::parse("zz:E6:86:3D:73:8A").is_err());
        assert!(DeviceAddress::parse("94:E6:86:3D:73:8A:00").is_err());
    }
}
