//! Controller configuration.

use crate::netlink::message::NLMSG_HDRLEN;
use crate::netlink::{Error, Result};
use crate::util::ifname;

/// Smallest receive buffer that can hold a netlink error response.
pub const MIN_RECV_BUFFER: usize = NLMSG_HDRLEN + 4 + NLMSG_HDRLEN;

/// Tunables for [`XfrmController`](crate::XfrmController).
///
/// # Example
///
/// ```
/// use xfrmctl::ControllerConfig;
///
/// let config = ControllerConfig::new()
///     .interface_prefix("vpn")
///     .spi_range(0x1000, 0x1fff);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct ControllerConfig {
    /// Name prefix of the tunnel interfaces owned by the controller.
    /// Every interface with this prefix is removed by `init`.
    pub interface_prefix: String,
    /// Name of the disposable interface used to probe XFRM interface support.
    pub probe_interface_name: String,
    /// Interface id of the probe interface.
    pub probe_interface_id: u32,
    /// Lowest SPI handed out by `allocate_spi`.
    pub spi_min: u32,
    /// Highest SPI handed out by `allocate_spi`.
    pub spi_max: u32,
    /// Anti-replay window of new SAs, in packets.
    pub replay_window: u8,
    /// Receive buffer for one netlink response datagram.
    pub recv_buffer_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interface_prefix: "ipsec".to_string(),
            probe_interface_name: "ipsec_test".to_string(),
            probe_interface_id: 0xFFFF,
            spi_min: 256,
            spi_max: 0xFFFF_FFFE,
            replay_window: 4,
            recv_buffer_size: crate::netlink::connection::DEFAULT_RECV_BUFFER,
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tunnel interface name prefix.
    pub fn interface_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.interface_prefix = prefix.into();
        self
    }

    /// Set the name and id of the capability probe interface.
    pub fn probe_interface(mut self, name: impl Into<String>, if_id: u32) -> Self {
        self.probe_interface_name = name.into();
        self.probe_interface_id = if_id;
        self
    }

    /// Set the SPI allocation range (inclusive).
    pub fn spi_range(mut self, min: u32, max: u32) -> Self {
        self.spi_min = min;
        self.spi_max = max;
        self
    }

    /// Set the replay window of new SAs.
    pub fn replay_window(mut self, window: u8) -> Self {
        self.replay_window = window;
        self
    }

    /// Set the netlink receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Check the configuration for values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.interface_prefix.is_empty() {
            return Err(Error::InvalidArgument(
                "interface prefix must not be empty".into(),
            ));
        }
        ifname::validate(&self.probe_interface_name)?;
        if self.spi_min == 0 {
            return Err(Error::InvalidArgument("SPI 0 is reserved".into()));
        }
        if self.spi_min > self.spi_max {
            return Err(Error::InvalidArgument(format!(
                "empty SPI range {:#x}..={:#x}",
                self.spi_min, self.spi_max
            )));
        }
        if self.recv_buffer_size < MIN_RECV_BUFFER {
            return Err(Error::InvalidArgument(format!(
                "receive buffer of {} bytes cannot hold a netlink error (min {})",
                self.recv_buffer_size, MIN_RECV_BUFFER
            )));
        }
        Ok(())
    }
}
