//! Operation parameters and their resolved, wire-ready form.
//!
//! Callers describe an SA or policy with textual addresses through the
//! builder-style parameter types ([`SaParams`], [`SaId`], [`PolicyParams`]).
//! The controller resolves them into [`CommonInfo`], [`SaInfo`] and
//! [`SpInfo`], which hold network-order binary addresses and are serialized
//! into exactly one request before being dropped.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::netlink::{Error, Result};
use crate::netlink::xfrm::{
    AF_INET, AF_INET6, AF_UNSPEC, UDP_ENCAP_ESPINUDP, UDP_ENCAP_ESPINUDP_NON_IKE, XFRM_MODE_TRANSPORT,
    XFRM_MODE_TUNNEL, XFRM_POLICY_FWD, XFRM_POLICY_IN, XFRM_POLICY_OUT, XfrmAddress, XfrmMark,
};

/// Address family of an SA, policy selector or tunnel endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AddressFamily {
    /// No address given.
    #[default]
    Unspec,
    /// IPv4.
    Inet,
    /// IPv6.
    Inet6,
}

impl AddressFamily {
    /// Kernel `AF_*` value.
    pub fn as_raw(self) -> u16 {
        match self {
            Self::Unspec => AF_UNSPEC,
            Self::Inet => AF_INET,
            Self::Inet6 => AF_INET6,
        }
    }

    /// Map a kernel `AF_*` value, returning `None` for non-IP families.
    pub fn from_raw(family: i32) -> Option<Self> {
        match family {
            libc::AF_UNSPEC => Some(Self::Unspec),
            libc::AF_INET => Some(Self::Inet),
            libc::AF_INET6 => Some(Self::Inet6),
            _ => None,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspec => write!(f, "unspec"),
            Self::Inet => write!(f, "inet"),
            Self::Inet6 => write!(f, "inet6"),
        }
    }
}

/// Parse a textual address into its family and binary form.
///
/// An empty string means "any" and yields [`AddressFamily::Unspec`]. IPv6
/// notation is tried before IPv4.
pub fn parse_address(addr: &str) -> Result<(AddressFamily, XfrmAddress)> {
    if addr.is_empty() {
        return Ok((AddressFamily::Unspec, XfrmAddress::default()));
    }
    if let Ok(v6) = addr.parse::<Ipv6Addr>() {
        return Ok((AddressFamily::Inet6, XfrmAddress::from_v6(v6)));
    }
    if let Ok(v4) = addr.parse::<Ipv4Addr>() {
        return Ok((AddressFamily::Inet, XfrmAddress::from_v4(v4)));
    }
    Err(Error::InvalidArgument(format!("invalid address {:?}", addr)))
}

/// Transform mode of an SA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Protect an existing socket's packets.
    #[default]
    Transport,
    /// Encapsulate whole packets.
    Tunnel,
}

impl Mode {
    /// Kernel `XFRM_MODE_*` value.
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Transport => XFRM_MODE_TRANSPORT,
            Self::Tunnel => XFRM_MODE_TUNNEL,
        }
    }
}

impl From<Mode> for i32 {
    fn from(mode: Mode) -> Self {
        mode.as_raw() as i32
    }
}

impl TryFrom<i32> for Mode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            v if v == XFRM_MODE_TRANSPORT as i32 => Ok(Self::Transport),
            v if v == XFRM_MODE_TUNNEL as i32 => Ok(Self::Tunnel),
            _ => Err(Error::InvalidArgument(format!("invalid xfrm mode {}", value))),
        }
    }
}

/// Direction of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Inbound traffic.
    In,
    /// Outbound traffic.
    Out,
    /// Forwarded traffic.
    Fwd,
}

impl Direction {
    /// Kernel `XFRM_POLICY_*` direction value.
    pub fn as_raw(self) -> u8 {
        match self {
            Self::In => XFRM_POLICY_IN,
            Self::Out => XFRM_POLICY_OUT,
            Self::Fwd => XFRM_POLICY_FWD,
        }
    }
}

/// UDP encapsulation of ESP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum EncapType {
    /// Plain ESP.
    #[default]
    None,
    /// ESP in UDP with a non-IKE marker.
    EspInUdpNonIke,
    /// ESP in UDP (RFC 3948).
    EspInUdp,
}

impl EncapType {
    /// Kernel `UDP_ENCAP_*` value, 0 for none.
    pub fn as_raw(self) -> u16 {
        match self {
            Self::None => 0,
            Self::EspInUdpNonIke => UDP_ENCAP_ESPINUDP_NON_IKE,
            Self::EspInUdp => UDP_ENCAP_ESPINUDP,
        }
    }
}

impl From<EncapType> for i32 {
    fn from(encap: EncapType) -> Self {
        encap.as_raw() as i32
    }
}

impl TryFrom<i32> for EncapType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            v if v == UDP_ENCAP_ESPINUDP_NON_IKE as i32 => Ok(Self::EspInUdpNonIke),
            v if v == UDP_ENCAP_ESPINUDP as i32 => Ok(Self::EspInUdp),
            _ => Err(Error::InvalidArgument(format!("invalid encap type {}", value))),
        }
    }
}

/// An algorithm descriptor. An empty name means "no algorithm".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Algorithm {
    /// Kernel crypto API name, e.g. `cbc(aes)`.
    pub name: String,
    /// Raw key bytes.
    pub key: Vec<u8>,
    /// Truncation (auth) or ICV (AEAD) length in bits.
    pub trunc_len_bits: u32,
}

impl Algorithm {
    /// Create a new algorithm descriptor.
    pub fn new(name: impl Into<String>, key: impl Into<Vec<u8>>, trunc_len_bits: u32) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            trunc_len_bits,
        }
    }

    /// Whether an algorithm is set.
    pub fn is_present(&self) -> bool {
        !self.name.is_empty()
    }
}

// Keys stay out of logs.
impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.name)
            .field("key_len", &self.key.len())
            .field("trunc_len_bits", &self.trunc_len_bits)
            .finish()
    }
}

/// UDP encapsulation with its ports (host order).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encap {
    /// Encapsulation type.
    pub kind: EncapType,
    /// Local UDP port.
    pub src_port: u16,
    /// Remote UDP port.
    pub dst_port: u16,
}

/// Identity shared by SAs and policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonInfo {
    /// Source address, zero for "any".
    pub src_addr: XfrmAddress,
    /// Destination address.
    pub dst_addr: XfrmAddress,
    /// Address family of the destination.
    pub family: AddressFamily,
    /// Request id correlating SAs and policies.
    pub transform_id: u32,
    /// SPI in network byte order.
    pub spi: u32,
    /// Mark, used only when xfrm interfaces are unavailable.
    pub mark: XfrmMark,
    /// Interface id, used only when xfrm interfaces are available.
    pub xfrm_if_id: u32,
}

impl CommonInfo {
    /// Resolve textual addresses and pick the addressing scheme.
    ///
    /// The destination must be a valid address. The source may be empty,
    /// otherwise its family must match the destination's.
    pub fn resolve(
        src_addr: &str,
        dst_addr: &str,
        spi: u32,
        mark: XfrmMark,
        transform_id: u32,
        xfrm_if_id: u32,
        xfrm_if_supported: bool,
    ) -> Result<Self> {
        let (src_family, src) = parse_address(src_addr)?;
        let (dst_family, dst) = parse_address(dst_addr)?;

        if dst_family == AddressFamily::Unspec
            || (src_family != AddressFamily::Unspec && src_family != dst_family)
        {
            return Err(Error::InvalidArgument(format!(
                "invalid or mismatched address families: {} != {}",
                src_family, dst_family
            )));
        }

        let mut info = Self {
            src_addr: src,
            dst_addr: dst,
            family: dst_family,
            ..Default::default()
        };
        info.set_identity(spi, mark, transform_id, xfrm_if_id, xfrm_if_supported);
        Ok(info)
    }

    /// Set the SPI, request id and exactly one of mark or interface id.
    pub fn set_identity(
        &mut self,
        spi: u32,
        mark: XfrmMark,
        transform_id: u32,
        xfrm_if_id: u32,
        xfrm_if_supported: bool,
    ) {
        self.transform_id = transform_id;
        self.spi = spi.to_be();
        if xfrm_if_supported {
            self.xfrm_if_id = xfrm_if_id;
        } else {
            self.mark = mark;
        }
    }
}

/// A resolved Security Association.
#[derive(Debug, Clone, Default)]
pub struct SaInfo {
    /// Shared identity.
    pub common: CommonInfo,
    /// Authentication algorithm.
    pub auth: Algorithm,
    /// Encryption algorithm.
    pub crypt: Algorithm,
    /// Combined-mode algorithm.
    pub aead: Algorithm,
    /// Underlying network id for the output mark, tunnel mode only.
    pub net_id: u32,
    /// Transform mode.
    pub mode: Mode,
    /// UDP encapsulation.
    pub encap: Encap,
}

/// A resolved Security Policy.
#[derive(Debug, Clone, Default)]
pub struct SpInfo {
    /// SA the policy template points at.
    pub sa: SaInfo,
    /// Family of the policy selector, may differ from the template family.
    pub selector_family: AddressFamily,
}

/// Parameters of an SA add or update.
#[derive(Debug, Clone, Default)]
pub struct SaParams {
    transform_id: u32,
    mode: i32,
    src_addr: String,
    dst_addr: String,
    underlying_net_id: u32,
    spi: u32,
    mark: XfrmMark,
    auth: Algorithm,
    crypt: Algorithm,
    aead: Algorithm,
    encap_type: i32,
    encap_local_port: u16,
    encap_remote_port: u16,
    xfrm_if_id: u32,
}

impl SaParams {
    /// Create SA parameters. `mode` is a raw `XFRM_MODE_*` value or a [`Mode`].
    pub fn new(
        transform_id: u32,
        mode: impl Into<i32>,
        src_addr: impl Into<String>,
        dst_addr: impl Into<String>,
        spi: u32,
    ) -> Self {
        Self {
            transform_id,
            mode: mode.into(),
            src_addr: src_addr.into(),
            dst_addr: dst_addr.into(),
            spi,
            ..Default::default()
        }
    }

    /// Route encrypted packets onto this network (tunnel mode).
    pub fn underlying_network(mut self, net_id: u32) -> Self {
        self.underlying_net_id = net_id;
        self
    }

    /// Set the mark and mask.
    pub fn mark(mut self, value: u32, mask: u32) -> Self {
        self.mark = XfrmMark { v: value, m: mask };
        self
    }

    /// Set the authentication algorithm.
    pub fn auth(mut self, name: impl Into<String>, key: impl Into<Vec<u8>>, trunc_bits: u32) -> Self {
        self.auth = Algorithm::new(name, key, trunc_bits);
        self
    }

    /// Set the encryption algorithm.
    pub fn crypt(mut self, name: impl Into<String>, key: impl Into<Vec<u8>>, trunc_bits: u32) -> Self {
        self.crypt = Algorithm::new(name, key, trunc_bits);
        self
    }

    /// Set the AEAD algorithm.
    pub fn aead(mut self, name: impl Into<String>, key: impl Into<Vec<u8>>, icv_bits: u32) -> Self {
        self.aead = Algorithm::new(name, key, icv_bits);
        self
    }

    /// Set UDP encapsulation. `encap_type` is a raw `UDP_ENCAP_*` value or an [`EncapType`].
    pub fn encap(mut self, encap_type: impl Into<i32>, local_port: u16, remote_port: u16) -> Self {
        self.encap_type = encap_type.into();
        self.encap_local_port = local_port;
        self.encap_remote_port = remote_port;
        self
    }

    /// Set the xfrm interface id.
    pub fn xfrm_if_id(mut self, if_id: u32) -> Self {
        self.xfrm_if_id = if_id;
        self
    }

    /// Resolve into an [`SaInfo`], checking addresses, mode and encapsulation.
    pub fn resolve(&self, xfrm_if_supported: bool) -> Result<SaInfo> {
        let common = CommonInfo::resolve(
            &self.src_addr,
            &self.dst_addr,
            self.spi,
            self.mark,
            self.transform_id,
            self.xfrm_if_id,
            xfrm_if_supported,
        )?;
        let mode = Mode::try_from(self.mode)?;

        let kind = EncapType::try_from(self.encap_type)?;
        let encap = match kind {
            EncapType::None => Encap::default(),
            _ if common.family != AddressFamily::Inet => {
                return Err(Error::AddressFamilyNotSupported(
                    "UDP encapsulation requires IPv4".into(),
                ));
            }
            _ => Encap {
                kind,
                src_port: self.encap_local_port,
                dst_port: self.encap_remote_port,
            },
        };

        Ok(SaInfo {
            common,
            auth: self.auth.clone(),
            crypt: self.crypt.clone(),
            aead: self.aead.clone(),
            net_id: self.underlying_net_id,
            mode,
            encap,
        })
    }
}

/// Identifies an SA to delete.
#[derive(Debug, Clone, Default)]
pub struct SaId {
    transform_id: u32,
    src_addr: String,
    dst_addr: String,
    spi: u32,
    mark: XfrmMark,
    xfrm_if_id: u32,
}

impl SaId {
    /// Create an SA identifier.
    pub fn new(
        transform_id: u32,
        src_addr: impl Into<String>,
        dst_addr: impl Into<String>,
        spi: u32,
    ) -> Self {
        Self {
            transform_id,
            src_addr: src_addr.into(),
            dst_addr: dst_addr.into(),
            spi,
            ..Default::default()
        }
    }

    /// Set the mark and mask.
    pub fn mark(mut self, value: u32, mask: u32) -> Self {
        self.mark = XfrmMark { v: value, m: mask };
        self
    }

    /// Set the xfrm interface id.
    pub fn xfrm_if_id(mut self, if_id: u32) -> Self {
        self.xfrm_if_id = if_id;
        self
    }

    /// Resolve into a [`CommonInfo`].
    pub fn resolve(&self, xfrm_if_supported: bool) -> Result<CommonInfo> {
        CommonInfo::resolve(
            &self.src_addr,
            &self.dst_addr,
            self.spi,
            self.mark,
            self.transform_id,
            self.xfrm_if_id,
            xfrm_if_supported,
        )
    }
}

/// Parameters of a tunnel-mode policy add, update or delete.
///
/// Deletion only looks at the request id, selector family, direction, mark
/// and interface id; the template addresses and SPI are ignored.
#[derive(Debug, Clone)]
pub struct PolicyParams {
    transform_id: u32,
    selector_family: AddressFamily,
    direction: Direction,
    src_addr: String,
    dst_addr: String,
    spi: u32,
    mark: XfrmMark,
    xfrm_if_id: u32,
}

impl PolicyParams {
    /// Create policy parameters for the given selector family and direction.
    pub fn new(transform_id: u32, selector_family: AddressFamily, direction: Direction) -> Self {
        Self {
            transform_id,
            selector_family,
            direction,
            src_addr: String::new(),
            dst_addr: String::new(),
            spi: 0,
            mark: XfrmMark::default(),
            xfrm_if_id: 0,
        }
    }

    /// Set the template endpoints and SPI.
    pub fn template(
        mut self,
        src_addr: impl Into<String>,
        dst_addr: impl Into<String>,
        spi: u32,
    ) -> Self {
        self.src_addr = src_addr.into();
        self.dst_addr = dst_addr.into();
        self.spi = spi;
        self
    }

    /// Set the mark and mask.
    pub fn mark(mut self, value: u32, mask: u32) -> Self {
        self.mark = XfrmMark { v: value, m: mask };
        self
    }

    /// Set the xfrm interface id.
    pub fn xfrm_if_id(mut self, if_id: u32) -> Self {
        self.xfrm_if_id = if_id;
        self
    }

    /// Policy direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Resolve for an add or update, which needs valid template addresses.
    pub fn resolve(&self, xfrm_if_supported: bool) -> Result<SpInfo> {
        let common = CommonInfo::resolve(
            &self.src_addr,
            &self.dst_addr,
            self.spi,
            self.mark,
            self.transform_id,
            self.xfrm_if_id,
            xfrm_if_supported,
        )?;
        Ok(self.tunnel_policy(common))
    }

    /// Resolve for a delete, which carries no addresses.
    pub fn resolve_for_delete(&self, xfrm_if_supported: bool) -> SpInfo {
        let mut common = CommonInfo::default();
        common.set_identity(
            self.spi,
            self.mark,
            self.transform_id,
            self.xfrm_if_id,
            xfrm_if_supported,
        );
        self.tunnel_policy(common)
    }

    fn tunnel_policy(&self, common: CommonInfo) -> SpInfo {
        SpInfo {
            sa: SaInfo {
                common,
                mode: Mode::Tunnel,
                ..Default::default()
            },
            selector_family: self.selector_family,
        }
    }
}

/// Parameters of a tunnel interface add or update.
///
/// With xfrm interface support only the name and interface id are used;
/// legacy VTI interfaces need the endpoints and keys instead.
#[derive(Debug, Clone, Default)]
pub struct TunnelParams {
    name: String,
    local_addr: String,
    remote_addr: String,
    ikey: u32,
    okey: u32,
    if_id: u32,
}

impl TunnelParams {
    /// Create tunnel parameters for the named interface.
    pub fn new(name: impl Into<String>, if_id: u32) -> Self {
        Self {
            name: name.into(),
            if_id,
            ..Default::default()
        }
    }

    /// Set the outer tunnel endpoints (VTI only).
    pub fn endpoints(mut self, local_addr: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        self.local_addr = local_addr.into();
        self.remote_addr = remote_addr.into();
        self
    }

    /// Set the input and output keys (VTI only).
    pub fn keys(mut self, ikey: u32, okey: u32) -> Self {
        self.ikey = ikey;
        self.okey = okey;
        self
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interface id (xfrm interfaces only).
    pub fn if_id(&self) -> u32 {
        self.if_id
    }

    /// Input key.
    pub fn ikey(&self) -> u32 {
        self.ikey
    }

    /// Output key.
    pub fn okey(&self) -> u32 {
        self.okey
    }

    /// Parse the endpoints of a VTI interface.
    ///
    /// Both are required. An unparseable address is an address family error.
    pub fn vti_endpoints(&self) -> Result<(IpAddr, IpAddr)> {
        if self.name.is_empty() || self.local_addr.is_empty() || self.remote_addr.is_empty() {
            return Err(Error::InvalidArgument(
                "VTI requires a name and both endpoints".into(),
            ));
        }
        Ok((
            parse_endpoint(&self.local_addr)?,
            parse_endpoint(&self.remote_addr)?,
        ))
    }
}

fn parse_endpoint(addr: &str) -> Result<IpAddr> {
    addr.parse::<IpAddr>().map_err(|_| {
        Error::AddressFamilyNotSupported(format!("not an IPv4 or IPv6 address: {:?}", addr))
    })
}
