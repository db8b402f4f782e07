//! XFRM kernel ABI: constants and fixed-layout structs from `linux/xfrm.h`.
//!
//! Every struct is `repr(C)` with its padding spelled out, so the zerocopy
//! derives can prove there are no uninitialized bytes on the wire. The SA and
//! policy info structs end in a tail pad whose size depends on how the
//! target aligns `u64`: 32-bit x86 aligns it to 4 bytes, everything else the
//! kernel supports aligns it to 8.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// XFRM message types
pub const XFRM_MSG_BASE: u16 = 0x10;
pub const XFRM_MSG_NEWSA: u16 = 0x10;
pub const XFRM_MSG_DELSA: u16 = 0x11;
pub const XFRM_MSG_GETSA: u16 = 0x12;
pub const XFRM_MSG_NEWPOLICY: u16 = 0x13;
pub const XFRM_MSG_DELPOLICY: u16 = 0x14;
pub const XFRM_MSG_GETPOLICY: u16 = 0x15;
pub const XFRM_MSG_ALLOCSPI: u16 = 0x16;
pub const XFRM_MSG_ACQUIRE: u16 = 0x17;
pub const XFRM_MSG_EXPIRE: u16 = 0x18;
pub const XFRM_MSG_UPDPOLICY: u16 = 0x19;
pub const XFRM_MSG_UPDSA: u16 = 0x1a;
pub const XFRM_MSG_POLEXPIRE: u16 = 0x1b;
pub const XFRM_MSG_FLUSHSA: u16 = 0x1c;
pub const XFRM_MSG_FLUSHPOLICY: u16 = 0x1d;
pub const XFRM_MSG_NEWAE: u16 = 0x1e;
pub const XFRM_MSG_GETAE: u16 = 0x1f;
pub const XFRM_MSG_REPORT: u16 = 0x20;
pub const XFRM_MSG_MIGRATE: u16 = 0x21;
pub const XFRM_MSG_NEWSADINFO: u16 = 0x22;
pub const XFRM_MSG_GETSADINFO: u16 = 0x23;
pub const XFRM_MSG_NEWSPDINFO: u16 = 0x24;
pub const XFRM_MSG_GETSPDINFO: u16 = 0x25;
pub const XFRM_MSG_MAPPING: u16 = 0x26;
pub const XFRM_MSG_SETDEFAULT: u16 = 0x27;
pub const XFRM_MSG_GETDEFAULT: u16 = 0x28;
pub const XFRM_MSG_MAX: u16 = XFRM_MSG_GETDEFAULT;

// XFRM attribute types
pub const XFRMA_ALG_AUTH: u16 = 1;
pub const XFRMA_ALG_CRYPT: u16 = 2;
pub const XFRMA_ALG_COMP: u16 = 3;
pub const XFRMA_ENCAP: u16 = 4;
pub const XFRMA_TMPL: u16 = 5;
pub const XFRMA_ALG_AEAD: u16 = 18;
pub const XFRMA_ALG_AUTH_TRUNC: u16 = 20;
pub const XFRMA_MARK: u16 = 21;
pub const XFRMA_OUTPUT_MARK: u16 = 29;
pub const XFRMA_IF_ID: u16 = 31;

// XFRM modes
pub const XFRM_MODE_TRANSPORT: u8 = 0;
pub const XFRM_MODE_TUNNEL: u8 = 1;
pub const XFRM_MODE_BEET: u8 = 4;

// XFRM protocols
pub const IPPROTO_ESP: u8 = 50;
pub const IPPROTO_AH: u8 = 51;
pub const IPPROTO_COMP: u8 = 108;
/// Matches every IPsec protocol in a flush request.
pub const IPSEC_PROTO_ANY: u8 = 255;

// Policy directions
pub const XFRM_POLICY_IN: u8 = 0;
pub const XFRM_POLICY_OUT: u8 = 1;
pub const XFRM_POLICY_FWD: u8 = 2;

// Policy actions
pub const XFRM_POLICY_ALLOW: u8 = 0;
pub const XFRM_POLICY_BLOCK: u8 = 1;

/// Policy flag: allow locally generated traffic that matches no SA.
pub const XFRM_POLICY_LOCALOK: u8 = 1;
/// Template/policy share mode: one SA per socket.
pub const XFRM_SHARE_UNIQUE: u8 = 3;

/// SA flag allowing a tunnel-mode SA to carry both address families.
pub const XFRM_STATE_AF_UNSPEC: u8 = 32;

/// "Infinite" lifetime limit.
pub const XFRM_INF: u64 = u64::MAX;

/// Template algorithm masks accepting any negotiated algorithm.
pub const ALGO_MASK_AUTH_ALL: u32 = u32::MAX;
pub const ALGO_MASK_CRYPT_ALL: u32 = u32::MAX;

/// Width of the kernel's algorithm name field.
pub const XFRM_ALGO_NAME_LEN: usize = 64;

// UDP encapsulation
pub const UDP_ENCAP: libc::c_int = 100;
pub const UDP_ENCAP_ESPINUDP_NON_IKE: u16 = 1;
pub const UDP_ENCAP_ESPINUDP: u16 = 2;

// Per-socket policy options
pub const IP_XFRM_POLICY: libc::c_int = 17;
pub const IPV6_XFRM_POLICY: libc::c_int = 35;

pub const AF_UNSPEC: u16 = libc::AF_UNSPEC as u16;
pub const AF_INET: u16 = libc::AF_INET as u16;
pub const AF_INET6: u16 = libc::AF_INET6 as u16;

#[cfg(target_arch = "x86")]
const USERSA_TAIL_PAD: usize = 3;
#[cfg(not(target_arch = "x86"))]
const USERSA_TAIL_PAD: usize = 7;

#[cfg(target_arch = "x86")]
const USERPOLICY_TAIL_PAD: usize = 0;
#[cfg(not(target_arch = "x86"))]
const USERPOLICY_TAIL_PAD: usize = 4;

/// Human-readable name of an XFRM message type, for logs.
pub fn xfrm_msg_name(msg_type: u16) -> &'static str {
    match msg_type {
        XFRM_MSG_NEWSA => "XFRM_MSG_NEWSA",
        XFRM_MSG_DELSA => "XFRM_MSG_DELSA",
        XFRM_MSG_GETSA => "XFRM_MSG_GETSA",
        XFRM_MSG_NEWPOLICY => "XFRM_MSG_NEWPOLICY",
        XFRM_MSG_DELPOLICY => "XFRM_MSG_DELPOLICY",
        XFRM_MSG_GETPOLICY => "XFRM_MSG_GETPOLICY",
        XFRM_MSG_ALLOCSPI => "XFRM_MSG_ALLOCSPI",
        XFRM_MSG_ACQUIRE => "XFRM_MSG_ACQUIRE",
        XFRM_MSG_EXPIRE => "XFRM_MSG_EXPIRE",
        XFRM_MSG_UPDPOLICY => "XFRM_MSG_UPDPOLICY",
        XFRM_MSG_UPDSA => "XFRM_MSG_UPDSA",
        XFRM_MSG_POLEXPIRE => "XFRM_MSG_POLEXPIRE",
        XFRM_MSG_FLUSHSA => "XFRM_MSG_FLUSHSA",
        XFRM_MSG_FLUSHPOLICY => "XFRM_MSG_FLUSHPOLICY",
        XFRM_MSG_NEWAE => "XFRM_MSG_NEWAE",
        XFRM_MSG_GETAE => "XFRM_MSG_GETAE",
        XFRM_MSG_REPORT => "XFRM_MSG_REPORT",
        XFRM_MSG_MIGRATE => "XFRM_MSG_MIGRATE",
        XFRM_MSG_NEWSADINFO => "XFRM_MSG_NEWSADINFO",
        XFRM_MSG_GETSADINFO => "XFRM_MSG_GETSADINFO",
        XFRM_MSG_NEWSPDINFO => "XFRM_MSG_NEWSPDINFO",
        XFRM_MSG_GETSPDINFO => "XFRM_MSG_GETSPDINFO",
        XFRM_MSG_MAPPING => "XFRM_MSG_MAPPING",
        XFRM_MSG_SETDEFAULT => "XFRM_MSG_SETDEFAULT",
        XFRM_MSG_GETDEFAULT => "XFRM_MSG_GETDEFAULT",
        _ => "XFRM_MSG_UNKNOWN",
    }
}

/// XFRM address (16 bytes, can hold IPv4 or IPv6).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmAddress {
    /// Raw address bytes (4 bytes for IPv4, 16 for IPv6).
    pub bytes: [u8; 16],
}

impl XfrmAddress {
    /// Create from an IPv4 address.
    pub fn from_v4(addr: Ipv4Addr) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&addr.octets());
        Self { bytes }
    }

    /// Create from an IPv6 address.
    pub fn from_v6(addr: Ipv6Addr) -> Self {
        Self {
            bytes: addr.octets(),
        }
    }

    /// Create from either address family.
    pub fn from_ip(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::from_v4(v4),
            IpAddr::V6(v6) => Self::from_v6(v6),
        }
    }

    /// Convert to an IP address based on the address family.
    pub fn to_ip(&self, family: u16) -> Option<IpAddr> {
        match family {
            AF_INET => Some(IpAddr::V4(Ipv4Addr::new(
                self.bytes[0],
                self.bytes[1],
                self.bytes[2],
                self.bytes[3],
            ))),
            AF_INET6 => Some(IpAddr::V6(Ipv6Addr::from(self.bytes))),
            _ => None,
        }
    }
}

/// XFRM selector (traffic selector for policies/SAs).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmSelector {
    /// Destination address.
    pub daddr: XfrmAddress,
    /// Source address.
    pub saddr: XfrmAddress,
    /// Destination port (network byte order).
    pub dport: u16,
    /// Destination port mask.
    pub dport_mask: u16,
    /// Source port (network byte order).
    pub sport: u16,
    /// Source port mask.
    pub sport_mask: u16,
    /// Address family.
    pub family: u16,
    /// Destination prefix length.
    pub prefixlen_d: u8,
    /// Source prefix length.
    pub prefixlen_s: u8,
    /// IP protocol.
    pub proto: u8,
    pub _pad1: [u8; 3],
    /// Interface index.
    pub ifindex: i32,
    /// User ID.
    pub user: u32,
}

impl XfrmSelector {
    /// Selector matching any traffic of the given family.
    pub fn for_family(family: u16) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }
}

/// XFRM ID (identifies an SA by destination, SPI, and protocol).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmId {
    /// Destination address.
    pub daddr: XfrmAddress,
    /// Security Parameter Index (network byte order).
    pub spi: u32,
    /// IPsec protocol (ESP, AH, COMP).
    pub proto: u8,
    pub _pad: [u8; 3],
}

/// XFRM lifetime configuration.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmLifetimeCfg {
    /// Soft byte limit.
    pub soft_byte_limit: u64,
    /// Hard byte limit.
    pub hard_byte_limit: u64,
    /// Soft packet limit.
    pub soft_packet_limit: u64,
    /// Hard packet limit.
    pub hard_packet_limit: u64,
    /// Soft add expiry (seconds).
    pub soft_add_expires_seconds: u64,
    /// Hard add expiry (seconds).
    pub hard_add_expires_seconds: u64,
    /// Soft use expiry (seconds).
    pub soft_use_expires_seconds: u64,
    /// Hard use expiry (seconds).
    pub hard_use_expires_seconds: u64,
}

impl XfrmLifetimeCfg {
    /// No byte or packet limits and no expiry.
    pub fn unlimited() -> Self {
        Self {
            soft_byte_limit: XFRM_INF,
            hard_byte_limit: XFRM_INF,
            soft_packet_limit: XFRM_INF,
            hard_packet_limit: XFRM_INF,
            ..Default::default()
        }
    }
}

/// XFRM lifetime current values.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmLifetimeCur {
    /// Bytes processed.
    pub bytes: u64,
    /// Packets processed.
    pub packets: u64,
    /// Time added.
    pub add_time: u64,
    /// Time last used.
    pub use_time: u64,
}

/// XFRM statistics.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmStats {
    /// Replay window.
    pub replay_window: u32,
    /// Replay count.
    pub replay: u32,
    /// Integrity check failures.
    pub integrity_failed: u32,
}

/// XFRM usersa_info (main SA structure).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUsersaInfo {
    /// Traffic selector.
    pub sel: XfrmSelector,
    /// SA identifier.
    pub id: XfrmId,
    /// Source address.
    pub saddr: XfrmAddress,
    /// Lifetime configuration.
    pub lft: XfrmLifetimeCfg,
    /// Current lifetime values.
    pub curlft: XfrmLifetimeCur,
    /// Statistics.
    pub stats: XfrmStats,
    /// Sequence number.
    pub seq: u32,
    /// Request ID.
    pub reqid: u32,
    /// Address family.
    pub family: u16,
    /// Mode (transport/tunnel/beet).
    pub mode: u8,
    /// Replay window size.
    pub replay_window: u8,
    /// Flags.
    pub flags: u8,
    pub _pad: [u8; USERSA_TAIL_PAD],
}

/// XFRM userspi_info (ALLOCSPI request).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUserspiInfo {
    /// SA the SPI is allocated for.
    pub info: XfrmUsersaInfo,
    /// Lowest acceptable SPI (host order).
    pub min: u32,
    /// Highest acceptable SPI (host order).
    pub max: u32,
}

/// XFRM usersa_id (identifies an SA for deletion).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUsersaId {
    /// Destination address.
    pub daddr: XfrmAddress,
    /// Security Parameter Index (network byte order).
    pub spi: u32,
    /// Address family.
    pub family: u16,
    /// IPsec protocol.
    pub proto: u8,
    pub _pad: u8,
}

/// XFRM usersa_flush.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUsersaFlush {
    /// Protocol to flush, or [`IPSEC_PROTO_ANY`].
    pub proto: u8,
}

/// XFRM userpolicy_info (main policy structure).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUserpolicyInfo {
    /// Traffic selector.
    pub sel: XfrmSelector,
    /// Lifetime configuration.
    pub lft: XfrmLifetimeCfg,
    /// Current lifetime values.
    pub curlft: XfrmLifetimeCur,
    /// Priority.
    pub priority: u32,
    /// Policy index.
    pub index: u32,
    /// Direction (in/out/fwd).
    pub dir: u8,
    /// Action (allow/block).
    pub action: u8,
    /// Flags.
    pub flags: u8,
    /// Share mode.
    pub share: u8,
    pub _pad: [u8; USERPOLICY_TAIL_PAD],
}

/// XFRM userpolicy_id (identifies a policy for deletion).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUserpolicyId {
    /// Traffic selector.
    pub sel: XfrmSelector,
    /// Policy index (0 to match by selector).
    pub index: u32,
    /// Direction.
    pub dir: u8,
    pub _pad: [u8; 3],
}

/// XFRM user_tmpl (binds a policy to an SA).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmUserTmpl {
    /// SA identifier.
    pub id: XfrmId,
    /// Address family.
    pub family: u16,
    pub _pad1: [u8; 2],
    /// Source address.
    pub saddr: XfrmAddress,
    /// Request ID.
    pub reqid: u32,
    /// Mode.
    pub mode: u8,
    /// Share mode.
    pub share: u8,
    /// Whether a failed SA lookup is acceptable.
    pub optional: u8,
    pub _pad2: u8,
    /// Allowed authentication algorithms.
    pub aalgos: u32,
    /// Allowed encryption algorithms.
    pub ealgos: u32,
    /// Allowed compression algorithms.
    pub calgos: u32,
}

/// Per-socket transport-mode policy: a policy immediately followed by its template.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmSocketPolicy {
    /// Policy.
    pub info: XfrmUserpolicyInfo,
    /// Template.
    pub tmpl: XfrmUserTmpl,
}

/// XFRM mark.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmMark {
    /// Mark value.
    pub v: u32,
    /// Mark mask.
    pub m: u32,
}

/// XFRM encapsulation template.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmEncapTmpl {
    /// Encapsulation type.
    pub encap_type: u16,
    /// Source port (network byte order).
    pub encap_sport: u16,
    /// Destination port (network byte order).
    pub encap_dport: u16,
    pub _pad: u16,
    /// Original address.
    pub encap_oa: XfrmAddress,
}

/// XFRM algorithm header (`xfrm_algo`); the key follows it on the wire.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmAlgo {
    /// NUL-padded algorithm name.
    pub alg_name: [u8; XFRM_ALGO_NAME_LEN],
    /// Key length in bits.
    pub alg_key_len: u32,
}

/// XFRM authentication algorithm header with truncation (`xfrm_algo_auth`).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmAlgoAuth {
    /// NUL-padded algorithm name.
    pub alg_name: [u8; XFRM_ALGO_NAME_LEN],
    /// Key length in bits.
    pub alg_key_len: u32,
    /// Truncation length in bits.
    pub alg_trunc_len: u32,
}

/// XFRM AEAD algorithm header (`xfrm_algo_aead`).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XfrmAlgoAead {
    /// NUL-padded algorithm name.
    pub alg_name: [u8; XFRM_ALGO_NAME_LEN],
    /// Key length in bits.
    pub alg_key_len: u32,
    /// ICV length in bits.
    pub alg_icv_len: u32,
}

/// Copy an algorithm name into the kernel's fixed-width field.
///
/// The caller guarantees `name.len() < XFRM_ALGO_NAME_LEN`; longer names are
/// cut so the field always keeps its NUL terminator.
pub(crate) fn algo_name_field(name: &str) -> [u8; XFRM_ALGO_NAME_LEN] {
    let mut field = [0u8; XFRM_ALGO_NAME_LEN];
    let len = name.len().min(XFRM_ALGO_NAME_LEN - 1);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_xfrm_address_ipv4() {
        let addr = XfrmAddress::from_v4(Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(
            addr.to_ip(AF_INET),
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
        );
        assert_eq!(&addr.bytes[4..], &[0u8; 12]);
    }

    #[test]
    fn test_xfrm_address_ipv6() {
        let addr = XfrmAddress::from_ip(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(addr.to_ip(AF_INET6), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(addr.to_ip(AF_UNSPEC), None);
    }

    #[test]
    fn test_zerocopy_sizes() {
        assert_eq!(size_of::<XfrmAddress>(), 16);
        assert_eq!(size_of::<XfrmSelector>(), 56);
        assert_eq!(size_of::<XfrmId>(), 24);
        assert_eq!(size_of::<XfrmLifetimeCfg>(), 64);
        assert_eq!(size_of::<XfrmLifetimeCur>(), 32);
        assert_eq!(size_of::<XfrmStats>(), 12);
        assert_eq!(size_of::<XfrmUsersaId>(), 24);
        assert_eq!(size_of::<XfrmUserpolicyId>(), 64);
        assert_eq!(size_of::<XfrmUserTmpl>(), 64);
        assert_eq!(size_of::<XfrmUsersaFlush>(), 1);
        assert_eq!(size_of::<XfrmMark>(), 8);
        assert_eq!(size_of::<XfrmEncapTmpl>(), 24);
        assert_eq!(size_of::<XfrmAlgo>(), 68);
        assert_eq!(size_of::<XfrmAlgoAuth>(), 72);
        assert_eq!(size_of::<XfrmAlgoAead>(), 72);
    }

    #[cfg(not(target_arch = "x86"))]
    #[test]
    fn test_info_sizes_aligned_u64() {
        assert_eq!(size_of::<XfrmUsersaInfo>(), 224);
        assert_eq!(size_of::<XfrmUserspiInfo>(), 232);
        assert_eq!(size_of::<XfrmUserpolicyInfo>(), 168);
        assert_eq!(size_of::<XfrmSocketPolicy>(), 232);
    }

    #[cfg(target_arch = "x86")]
    #[test]
    fn test_info_sizes_packed_u64() {
        assert_eq!(size_of::<XfrmUsersaInfo>(), 220);
        assert_eq!(size_of::<XfrmUserspiInfo>(), 228);
        assert_eq!(size_of::<XfrmUserpolicyInfo>(), 164);
        assert_eq!(size_of::<XfrmSocketPolicy>(), 228);
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(offset_of!(XfrmSelector, family), 40);
        assert_eq!(offset_of!(XfrmSelector, ifindex), 48);
        assert_eq!(offset_of!(XfrmUsersaInfo, id), 56);
        assert_eq!(offset_of!(XfrmUsersaInfo, saddr), 80);
        assert_eq!(offset_of!(XfrmUsersaInfo, lft), 96);
        assert_eq!(offset_of!(XfrmUsersaInfo, seq), 204);
        assert_eq!(offset_of!(XfrmUsersaInfo, family), 212);
        assert_eq!(offset_of!(XfrmUsersaInfo, flags), 216);
        assert_eq!(offset_of!(XfrmUserpolicyInfo, priority), 152);
        assert_eq!(offset_of!(XfrmUserpolicyInfo, dir), 160);
        assert_eq!(offset_of!(XfrmUserTmpl, saddr), 28);
        assert_eq!(offset_of!(XfrmUserTmpl, reqid), 44);
        assert_eq!(offset_of!(XfrmUserTmpl, aalgos), 52);
        assert_eq!(offset_of!(XfrmEncapTmpl, encap_oa), 8);
    }

    #[test]
    fn test_lifetime_defaults() {
        let lft = XfrmLifetimeCfg::unlimited();
        assert_eq!(lft.soft_byte_limit, XFRM_INF);
        assert_eq!(lft.hard_packet_limit, XFRM_INF);
        assert_eq!(lft.hard_add_expires_seconds, 0);
    }

    #[test]
    fn test_algo_name_is_nul_terminated() {
        let field = algo_name_field("rfc4106(gcm(aes))");
        assert_eq!(&field[..17], b"rfc4106(gcm(aes))");
        assert!(field[17..].iter().all(|&b| b == 0));

        let long = "x".repeat(100);
        let field = algo_name_field(&long);
        assert_eq!(field[XFRM_ALGO_NAME_LEN - 1], 0);
    }

    #[test]
    fn test_msg_names() {
        assert_eq!(xfrm_msg_name(XFRM_MSG_UPDSA), "XFRM_MSG_UPDSA");
        assert_eq!(xfrm_msg_name(XFRM_MSG_MAX), "XFRM_MSG_GETDEFAULT");
        assert_eq!(xfrm_msg_name(2), "XFRM_MSG_UNKNOWN");
    }
}
