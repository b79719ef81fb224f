//! Data types shared across the library.

pub mod device;

pub use device::{DEVICE_ADDRESS_LEN, DeviceAddress};
