//! Adapter configuration.

use std::time::Duration;

use crate::types::DeviceAddress;

/// Default time allowed for connect plus capability discovery.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a write-completion event.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time allowed for each acknowledgement notification.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default inactivity window before the link is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default delay between capability discovery and the first write.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Default time allowed for a disconnect confirmation before the link is dropped locally.
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for an [`RfCompanion`](crate::RfCompanion) adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Address of the peripheral to connect to.
    pub device: DeviceAddress,
    /// Connect plus capability discovery deadline.
    pub connection_timeout: Duration,
    /// Write-completion deadline.
    pub write_timeout: Duration,
    /// Deadline for each acknowledgement notification.
    pub response_timeout: Duration,
    /// Inactivity window before an automatic disconnect.
    pub idle_timeout: Duration,
    /// Delay after capability discovery before the link is reported connected.
    pub settle_delay: Duration,
    /// Deadline for a disconnect confirmation.
    pub disconnect_timeout: Duration,
}

impl AdapterConfig {
    /// Creates a configuration with default timings.
    #[must_use]
    pub const fn new(device: DeviceAddress) -> Self {
        Self {
            device,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the write-completion timeout.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the acknowledgement timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the idle-disconnect window.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the post-discovery settle delay.
    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the disconnect-confirmation timeout.
    #[must_use]
    pub const fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }
}
