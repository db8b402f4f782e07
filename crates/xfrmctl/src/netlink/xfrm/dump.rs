//! Listing of the SA and policy databases.
//!
//! # Example
//!
//! ```ignore
//! use xfrmctl::netlink::{Connection, Protocol};
//!
//! let conn = Connection::new(Protocol::Xfrm)?;
//!
//! for sa in conn.security_associations()? {
//!     println!("{:?} -> {:?} SPI={:08x}", sa.src_addr, sa.dst_addr, sa.spi);
//! }
//! for pol in conn.security_policies()? {
//!     println!("{:?} dir={:?} action={:?}", pol.selector, pol.direction, pol.action);
//! }
//! ```

use std::net::IpAddr;

use zerocopy::FromBytes;

use super::types::*;
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::connection::Connection;
use crate::netlink::Result;
use crate::netlink::message::{NLM_F_DUMP, NLM_F_REQUEST, nlmsg_align};
use crate::netlink::socket::NetlinkTransport;

/// IPsec protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IpsecProtocol {
    /// Encapsulating Security Payload.
    Esp,
    /// Authentication Header.
    Ah,
    /// IP Compression.
    Comp,
    /// Other protocol.
    Other(u8),
}

impl IpsecProtocol {
    fn from_u8(val: u8) -> Self {
        match val {
            IPPROTO_ESP => Self::Esp,
            IPPROTO_AH => Self::Ah,
            IPPROTO_COMP => Self::Comp,
            other => Self::Other(other),
        }
    }

    /// Get the protocol number.
    pub fn number(&self) -> u8 {
        match self {
            Self::Esp => IPPROTO_ESP,
            Self::Ah => IPPROTO_AH,
            Self::Comp => IPPROTO_COMP,
            Self::Other(n) => *n,
        }
    }
}

/// XFRM mode as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum XfrmMode {
    /// Transport mode.
    Transport,
    /// Tunnel mode.
    Tunnel,
    /// BEET mode.
    Beet,
    /// Other mode.
    Other(u8),
}

impl XfrmMode {
    fn from_u8(val: u8) -> Self {
        match val {
            XFRM_MODE_TRANSPORT => Self::Transport,
            XFRM_MODE_TUNNEL => Self::Tunnel,
            XFRM_MODE_BEET => Self::Beet,
            other => Self::Other(other),
        }
    }
}

/// Policy direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PolicyDirection {
    /// Incoming traffic.
    In,
    /// Outgoing traffic.
    Out,
    /// Forwarded traffic.
    Forward,
    /// Unknown direction.
    Unknown(u8),
}

impl PolicyDirection {
    fn from_u8(val: u8) -> Self {
        match val {
            XFRM_POLICY_IN => Self::In,
            XFRM_POLICY_OUT => Self::Out,
            XFRM_POLICY_FWD => Self::Forward,
            other => Self::Unknown(other),
        }
    }
}

/// Policy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PolicyAction {
    /// Allow traffic.
    Allow,
    /// Block traffic.
    Block,
    /// Unknown action.
    Unknown(u8),
}

impl PolicyAction {
    fn from_u8(val: u8) -> Self {
        match val {
            XFRM_POLICY_ALLOW => Self::Allow,
            XFRM_POLICY_BLOCK => Self::Block,
            other => Self::Unknown(other),
        }
    }
}

/// A traffic selector.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrafficSelector {
    /// Address family.
    pub family: u16,
    /// Source address.
    pub src_addr: Option<IpAddr>,
    /// Destination address.
    pub dst_addr: Option<IpAddr>,
    /// Source prefix length.
    pub src_prefix_len: u8,
    /// Destination prefix length.
    pub dst_prefix_len: u8,
    /// Source port.
    pub src_port: Option<u16>,
    /// Destination port.
    pub dst_port: Option<u16>,
    /// IP protocol.
    pub proto: u8,
}

impl TrafficSelector {
    fn from_selector(sel: &XfrmSelector) -> Self {
        Self {
            family: sel.family,
            src_addr: sel.saddr.to_ip(sel.family),
            dst_addr: sel.daddr.to_ip(sel.family),
            src_prefix_len: sel.prefixlen_s,
            dst_prefix_len: sel.prefixlen_d,
            src_port: (sel.sport != 0).then(|| u16::from_be(sel.sport)),
            dst_port: (sel.dport != 0).then(|| u16::from_be(sel.dport)),
            proto: sel.proto,
        }
    }
}

/// An algorithm attached to a listed SA. Key material is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct XfrmAlgorithm {
    /// Algorithm name.
    pub name: String,
    /// Key length in bits.
    pub key_len: u32,
    /// Truncation or ICV length in bits, 0 when the attribute has none.
    pub trunc_len: u32,
}

/// UDP encapsulation of a listed SA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EncapInfo {
    /// `UDP_ENCAP_*` type.
    pub encap_type: u16,
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
}

/// A Security Association (SA).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SecurityAssociation {
    /// Source address.
    pub src_addr: Option<IpAddr>,
    /// Destination address.
    pub dst_addr: Option<IpAddr>,
    /// Security Parameter Index.
    pub spi: u32,
    /// IPsec protocol.
    pub protocol: IpsecProtocol,
    /// Mode (transport/tunnel).
    pub mode: XfrmMode,
    /// Request ID.
    pub reqid: u32,
    /// Traffic selector.
    pub selector: TrafficSelector,
    /// Encryption algorithm.
    pub enc_alg: Option<XfrmAlgorithm>,
    /// Authentication algorithm (with or without truncation).
    pub auth_alg: Option<XfrmAlgorithm>,
    /// AEAD algorithm.
    pub aead_alg: Option<XfrmAlgorithm>,
    /// Compression algorithm.
    pub comp_alg: Option<XfrmAlgorithm>,
    /// Encapsulation template (UDP encap).
    pub encap: Option<EncapInfo>,
    /// Mark value and mask.
    pub mark: Option<(u32, u32)>,
    /// Output mark.
    pub output_mark: Option<u32>,
    /// Interface ID.
    pub if_id: Option<u32>,
    /// Bytes processed.
    pub bytes: u64,
    /// Packets processed.
    pub packets: u64,
    /// Replay window size.
    pub replay_window: u8,
    /// Flags.
    pub flags: u8,
}

/// A Security Policy (SP).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SecurityPolicy {
    /// Traffic selector.
    pub selector: TrafficSelector,
    /// Policy direction.
    pub direction: PolicyDirection,
    /// Policy action.
    pub action: PolicyAction,
    /// Priority.
    pub priority: u32,
    /// Policy index.
    pub index: u32,
    /// Flags.
    pub flags: u8,
    /// Request IDs of the attached templates.
    pub template_reqids: Vec<u32>,
    /// Mark value and mask.
    pub mark: Option<(u32, u32)>,
    /// Interface ID.
    pub if_id: Option<u32>,
}

impl<T: NetlinkTransport> Connection<T> {
    /// Get all Security Associations.
    pub fn security_associations(&self) -> Result<Vec<SecurityAssociation>> {
        let mut builder = MessageBuilder::new(XFRM_MSG_GETSA, NLM_F_REQUEST | NLM_F_DUMP);
        builder.append(&XfrmUsersaInfo::default());

        Ok(self
            .dump(builder)?
            .iter()
            .filter_map(|payload| parse_sa(payload))
            .collect())
    }

    /// Get all Security Policies.
    pub fn security_policies(&self) -> Result<Vec<SecurityPolicy>> {
        let mut builder = MessageBuilder::new(XFRM_MSG_GETPOLICY, NLM_F_REQUEST | NLM_F_DUMP);
        builder.append(&XfrmUserpolicyInfo::default());

        Ok(self
            .dump(builder)?
            .iter()
            .filter_map(|payload| parse_policy(payload))
            .collect())
    }
}

/// Parse a Security Association from a `XFRM_MSG_NEWSA` payload.
pub fn parse_sa(payload: &[u8]) -> Option<SecurityAssociation> {
    let (info, _) = XfrmUsersaInfo::read_from_prefix(payload).ok()?;

    let mut sa = SecurityAssociation {
        src_addr: info.saddr.to_ip(info.family),
        dst_addr: info.id.daddr.to_ip(info.family),
        spi: u32::from_be(info.id.spi),
        protocol: IpsecProtocol::from_u8(info.id.proto),
        mode: XfrmMode::from_u8(info.mode),
        reqid: info.reqid,
        selector: TrafficSelector::from_selector(&info.sel),
        enc_alg: None,
        auth_alg: None,
        aead_alg: None,
        comp_alg: None,
        encap: None,
        mark: None,
        output_mark: None,
        if_id: None,
        bytes: info.curlft.bytes,
        packets: info.curlft.packets,
        replay_window: info.replay_window,
        flags: info.flags,
    };

    let attrs = payload.get(nlmsg_align(size_of::<XfrmUsersaInfo>())..).unwrap_or(&[]);
    for (attr_type, data) in AttrIter::new(attrs) {
        match attr_type {
            XFRMA_ALG_CRYPT => sa.enc_alg = parse_algorithm(data),
            // the truncated form wins when both are present
            XFRMA_ALG_AUTH if sa.auth_alg.is_none() => sa.auth_alg = parse_algorithm(data),
            XFRMA_ALG_AUTH_TRUNC => sa.auth_alg = parse_algorithm_with_len(data),
            XFRMA_ALG_AEAD => sa.aead_alg = parse_algorithm_with_len(data),
            XFRMA_ALG_COMP => sa.comp_alg = parse_algorithm(data),
            XFRMA_ENCAP => {
                if let Ok((encap, _)) = XfrmEncapTmpl::read_from_prefix(data) {
                    sa.encap = Some(EncapInfo {
                        encap_type: encap.encap_type,
                        src_port: u16::from_be(encap.encap_sport),
                        dst_port: u16::from_be(encap.encap_dport),
                    });
                }
            }
            XFRMA_MARK => {
                if let Ok((mark, _)) = XfrmMark::read_from_prefix(data) {
                    sa.mark = Some((mark.v, mark.m));
                }
            }
            XFRMA_OUTPUT_MARK => sa.output_mark = get::u32_ne(data).ok(),
            XFRMA_IF_ID => sa.if_id = get::u32_ne(data).ok(),
            _ => {}
        }
    }

    Some(sa)
}

/// Parse a Security Policy from a `XFRM_MSG_NEWPOLICY` payload.
pub fn parse_policy(payload: &[u8]) -> Option<SecurityPolicy> {
    let (info, _) = XfrmUserpolicyInfo::read_from_prefix(payload).ok()?;

    let mut policy = SecurityPolicy {
        selector: TrafficSelector::from_selector(&info.sel),
        direction: PolicyDirection::from_u8(info.dir),
        action: PolicyAction::from_u8(info.action),
        priority: info.priority,
        index: info.index,
        flags: info.flags,
        template_reqids: Vec::new(),
        mark: None,
        if_id: None,
    };

    let attrs = payload
        .get(nlmsg_align(size_of::<XfrmUserpolicyInfo>())..)
        .unwrap_or(&[]);
    for (attr_type, data) in AttrIter::new(attrs) {
        match attr_type {
            XFRMA_TMPL => {
                policy.template_reqids.extend(
                    data.chunks_exact(size_of::<XfrmUserTmpl>())
                        .filter_map(|chunk| XfrmUserTmpl::read_from_bytes(chunk).ok())
                        .map(|tmpl| tmpl.reqid),
                );
            }
            XFRMA_MARK => {
                if let Ok((mark, _)) = XfrmMark::read_from_prefix(data) {
                    policy.mark = Some((mark.v, mark.m));
                }
            }
            XFRMA_IF_ID => policy.if_id = get::u32_ne(data).ok(),
            _ => {}
        }
    }

    Some(policy)
}

/// Parse `xfrm_algo`.
fn parse_algorithm(data: &[u8]) -> Option<XfrmAlgorithm> {
    let (algo, _) = XfrmAlgo::read_from_prefix(data).ok()?;
    Some(XfrmAlgorithm {
        name: parse_cstring(&algo.alg_name),
        key_len: algo.alg_key_len,
        trunc_len: 0,
    })
}

/// Parse `xfrm_algo_auth` or `xfrm_algo_aead`, which share a layout up to the key.
fn parse_algorithm_with_len(data: &[u8]) -> Option<XfrmAlgorithm> {
    let (algo, _) = XfrmAlgoAuth::read_from_prefix(data).ok()?;
    Some(XfrmAlgorithm {
        name: parse_cstring(&algo.alg_name),
        key_len: algo.alg_key_len,
        trunc_len: algo.alg_trunc_len,
    })
}

/// Parse a C string from a fixed-size buffer.
fn parse_cstring(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}
