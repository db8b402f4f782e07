//! Tunnel interface requests (`RTM_NEWLINK`/`RTM_DELLINK`).
//!
//! Two interface kinds back an IPsec tunnel:
//!
//! - [`XfrmInterfaceLink`] - XFRM virtual interface, matched to SAs and
//!   policies by interface id
//! - [`VtiLink`] - legacy VTI/VTI6, matched by mark through its keys
//!
//! Both encode the same skeleton:
//!
//! ```text
//! ifinfomsg
//! IFLA_IFNAME     "name\0"
//! IFLA_LINKINFO
//!   IFLA_INFO_KIND  "xfrm" | "vti" | "vti6"
//!   IFLA_INFO_DATA  kind-specific attributes
//! ```
//!
//! # Example
//!
//! ```ignore
//! use xfrmctl::netlink::link::{LinkConfig, XfrmInterfaceLink, LINK_CREATE_FLAGS};
//!
//! let msg = XfrmInterfaceLink::new("ipsec11", 11).build(LINK_CREATE_FLAGS)?;
//! conn.send_message(msg)?;
//! ```

use std::net::IpAddr;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{NETLINK_REQUEST_FLAGS, NETLINK_ROUTE_CREATE_FLAGS, NlMsgType};
use crate::util::ifname;

/// Flags for creating a link that must not exist yet.
pub const LINK_CREATE_FLAGS: u16 = NETLINK_ROUTE_CREATE_FLAGS;
/// Flags for modifying an existing link in place.
///
/// `NLM_F_REPLACE` is not used: the kernel answers `EOPNOTSUPP` to it for
/// an existing link, while a plain request modifies the link.
pub const LINK_UPDATE_FLAGS: u16 = NETLINK_REQUEST_FLAGS;

/// IFLA_IFNAME attribute.
pub const IFLA_IFNAME: u16 = 3;
/// IFLA_LINKINFO attribute.
pub const IFLA_LINKINFO: u16 = 18;
/// IFLA_INFO_KIND attribute (inside IFLA_LINKINFO).
pub const IFLA_INFO_KIND: u16 = 1;
/// IFLA_INFO_DATA attribute (inside IFLA_LINKINFO).
pub const IFLA_INFO_DATA: u16 = 2;

/// Loopback device index, the underlying link of every XFRM interface.
pub const LOOPBACK_IFINDEX: u32 = 1;

/// VTI-specific attributes (IFLA_VTI_*)
mod vti {
    pub const IFLA_VTI_IKEY: u16 = 2;
    pub const IFLA_VTI_OKEY: u16 = 3;
    pub const IFLA_VTI_LOCAL: u16 = 4;
    pub const IFLA_VTI_REMOTE: u16 = 5;
}

/// XFRM interface attributes (IFLA_XFRM_*)
mod xfrmi {
    pub const IFLA_XFRM_LINK: u16 = 1;
    pub const IFLA_XFRM_IF_ID: u16 = 2;
}

/// Interface info message (struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    /// Address family (usually AF_UNSPEC).
    pub ifi_family: u8,
    /// Padding.
    pub __ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    /// Interface index.
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    /// Change mask.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    /// Create a new interface info message.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Trait for tunnel interface configurations.
pub trait LinkConfig {
    /// Get the name of this interface.
    fn name(&self) -> &str;

    /// Get the kind string for this link type.
    fn kind(&self) -> &str;

    /// Build the `RTM_NEWLINK` request with the given netlink flags.
    fn build(&self, flags: u16) -> Result<MessageBuilder>;
}

// ============================================================================
// XFRM interface
// ============================================================================

/// Configuration for an XFRM virtual interface.
///
/// The underlying link is always loopback: packets are steered onto a real
/// network by the SA output mark, not by the interface.
#[derive(Debug, Clone)]
pub struct XfrmInterfaceLink {
    name: String,
    if_id: u32,
    link: u32,
}

impl XfrmInterfaceLink {
    /// Create an XFRM interface configuration.
    pub fn new(name: impl Into<String>, if_id: u32) -> Self {
        Self {
            name: name.into(),
            if_id,
            link: LOOPBACK_IFINDEX,
        }
    }

    /// Interface id shared with SAs and policies.
    pub fn if_id(&self) -> u32 {
        self.if_id
    }
}

impl LinkConfig for XfrmInterfaceLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "xfrm"
    }

    fn build(&self, flags: u16) -> Result<MessageBuilder> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("xfrm interface name is empty".into()));
        }
        ifname::validate(&self.name)?;

        let mut builder = link_message(&self.name, flags);

        let linkinfo = builder.nest_start(IFLA_LINKINFO);
        builder.append_attr_str(IFLA_INFO_KIND, self.kind());

        let data = builder.nest_start(IFLA_INFO_DATA);
        builder.append_attr_u32(xfrmi::IFLA_XFRM_LINK, self.link);
        builder.append_attr_u32(xfrmi::IFLA_XFRM_IF_ID, self.if_id);
        builder.nest_end(data);

        builder.nest_end(linkinfo);
        Ok(builder)
    }
}

// ============================================================================
// VTI / VTI6
// ============================================================================

/// Configuration for a VTI (IPv4) or VTI6 (IPv6) interface.
///
/// The kind follows the address family of the endpoints.
///
/// # Example
///
/// ```ignore
/// use xfrmctl::netlink::link::VtiLink;
///
/// let vti = VtiLink::new("ipsec1", "10.0.0.1".parse()?, "10.0.0.2".parse()?)
///     .ikey(100)
///     .okey(100);
/// ```
#[derive(Debug, Clone)]
pub struct VtiLink {
    name: String,
    local: IpAddr,
    remote: IpAddr,
    ikey: u32,
    okey: u32,
}

impl VtiLink {
    /// Create a new VTI interface configuration.
    pub fn new(name: impl Into<String>, local: IpAddr, remote: IpAddr) -> Self {
        Self {
            name: name.into(),
            local,
            remote,
            ikey: 0,
            okey: 0,
        }
    }

    /// Set the input key (for identifying incoming traffic).
    pub fn ikey(mut self, key: u32) -> Self {
        self.ikey = key;
        self
    }

    /// Set the output key (for marking outgoing traffic).
    pub fn okey(mut self, key: u32) -> Self {
        self.okey = key;
        self
    }
}

fn ip_octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

impl LinkConfig for VtiLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        if self.local.is_ipv6() { "vti6" } else { "vti" }
    }

    fn build(&self, flags: u16) -> Result<MessageBuilder> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("VTI interface name is empty".into()));
        }
        ifname::validate(&self.name)?;
        if self.local.is_ipv4() != self.remote.is_ipv4() {
            return Err(Error::InvalidArgument(
                "local and remote address families do not match".into(),
            ));
        }

        let mut builder = link_message(&self.name, flags);

        let linkinfo = builder.nest_start(IFLA_LINKINFO);
        builder.append_attr_str(IFLA_INFO_KIND, self.kind());

        let data = builder.nest_start(IFLA_INFO_DATA);
        builder.append_attr(vti::IFLA_VTI_LOCAL, &ip_octets(&self.local));
        builder.append_attr(vti::IFLA_VTI_REMOTE, &ip_octets(&self.remote));
        builder.append_attr_u32_be(vti::IFLA_VTI_IKEY, self.ikey);
        builder.append_attr_u32_be(vti::IFLA_VTI_OKEY, self.okey);
        builder.nest_end(data);

        builder.nest_end(linkinfo);
        Ok(builder)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Start an `RTM_NEWLINK` message with the interface name.
fn link_message(name: &str, flags: u16) -> MessageBuilder {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, flags);
    builder.append(&IfInfoMsg::new());
    builder.append_attr_str(IFLA_IFNAME, name);
    builder
}

/// Build the `RTM_DELLINK` request removing the named interface.
pub fn delete_link(name: &str) -> Result<MessageBuilder> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("interface name is empty".into()));
    }
    ifname::validate(name)?;

    let mut builder = MessageBuilder::new(NlMsgType::RTM_DELLINK, NETLINK_REQUEST_FLAGS);
    builder.append(&IfInfoMsg::new());
    builder.append_attr_str(IFLA_IFNAME, name);
    Ok(builder)
}
