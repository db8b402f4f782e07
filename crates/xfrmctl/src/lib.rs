//! Netlink IPsec (XFRM) control plane for Linux.
//!
//! This crate programs the kernel Security Association and Security Policy
//! databases over `NETLINK_XFRM` and manages the virtual interfaces backing
//! IPsec tunnels over `NETLINK_ROUTE`. All calls are synchronous: every
//! operation opens its own socket, sends one request and blocks until the
//! kernel answers.
//!
//! # Features
//!
//! - `serde` - Serialize dump records and (de)serialize [`ControllerConfig`]
//! - `integration` - Live kernel tests (need root)
//!
//! # Example
//!
//! ```ignore
//! use xfrmctl::{ControllerConfig, Mode, PolicyParams, SaParams, XfrmController};
//! use xfrmctl::{AddressFamily, Direction, TunnelParams};
//!
//! let mut xfrm = XfrmController::new(ControllerConfig::default())?;
//! xfrm.init()?;
//!
//! let spi = xfrm.allocate_spi(1, "198.51.100.1", "203.0.113.1", 0)?;
//! xfrm.add_or_update_security_association(
//!     &SaParams::new(1, Mode::Tunnel, "198.51.100.1", "203.0.113.1", spi)
//!         .underlying_network(100)
//!         .crypt("cbc(aes)", enc_key, 0)
//!         .auth("hmac(sha256)", auth_key, 128)
//!         .xfrm_if_id(42),
//! )?;
//! xfrm.add_security_policy(
//!     &PolicyParams::new(1, AddressFamily::Inet, Direction::Out)
//!         .template("198.51.100.1", "203.0.113.1", spi)
//!         .xfrm_if_id(42),
//! )?;
//! xfrm.add_or_update_tunnel_interface(
//!     &TunnelParams::new("ipsec42", 42).endpoints("198.51.100.1", "203.0.113.1"),
//!     false,
//! )?;
//! ```

pub mod config;
pub mod controller;
pub mod fwmark;
pub mod info;
pub mod netlink;
pub mod sys;
pub mod util;

// Re-export common types at crate root for convenience
pub use config::ControllerConfig;
pub use controller::XfrmController;
pub use info::{
    AddressFamily, Algorithm, Direction, Encap, EncapType, Mode, PolicyParams, SaId, SaParams,
    TunnelParams,
};
pub use netlink::{Connection, Error, Protocol, Result};
pub use sys::{FdStat, KernelSyscalls, Syscalls};
