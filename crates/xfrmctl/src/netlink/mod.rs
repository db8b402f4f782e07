//! Blocking netlink protocol implementation for XFRM and tunnel links.
//!
//! This module implements the subset of netlink needed to program the
//! kernel IPsec databases (`NETLINK_XFRM`) and to manage tunnel interfaces
//! (`NETLINK_ROUTE`).
//!
//! # Quick Start
//!
//! ```ignore
//! use xfrmctl::netlink::{Connection, Protocol};
//! use xfrmctl::netlink::xfrm::request;
//!
//! let conn = Connection::new(Protocol::Xfrm)?;
//! conn.send_message(request::flush_sa())?;
//!
//! for sa in conn.security_associations()? {
//!     println!("{:?} -> {:?} spi {:#x}", sa.src_addr, sa.dst_addr, sa.spi);
//! }
//! ```
//!
//! Every request travels on its own short-lived socket:
//!
//! - [`builder`]: message and attribute framing
//! - [`connection`]: one request, one validated response
//! - [`xfrm`]: SA and policy requests
//! - [`link`]: VTI and XFRM interface requests

pub mod attr;
pub mod builder;
pub mod connection;
mod error;
pub mod link;
pub mod message;
pub mod socket;
pub mod xfrm;

pub use builder::MessageBuilder;
pub use connection::Connection;
pub use error::{Error, Result};
pub use message::{MessageIter, NlMsgError, NlMsgHdr, NlMsgType};
pub use socket::{NetlinkSocket, NetlinkTransport, Protocol};
