//! Routing mark carried by encrypted tunnel packets.
//!
//! Layout of the 32-bit word, low bits first:
//!
//! | bits  | field                |
//! |-------|----------------------|
//! | 0-15  | network id           |
//! | 16    | explicitly selected  |
//! | 17    | protected from VPN   |
//! | 18-19 | permission           |
//! | 20-31 | unused               |

const NET_ID_MASK: u32 = 0xffff;
const EXPLICITLY_SELECTED: u32 = 1 << 16;
const PROTECTED_FROM_VPN: u32 = 1 << 17;
const PERMISSION_SHIFT: u32 = 18;
const PERMISSION_MASK: u32 = 0x3 << PERMISSION_SHIFT;

/// Network permission level stored in a [`Fwmark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Permission {
    /// No special permission.
    None = 0,
    /// May use all networks, including restricted ones.
    System = 3,
}

/// A composite routing mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fwmark(u32);

impl Fwmark {
    /// Create from a raw mark value.
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Mark for tunnel packets leaving on `net_id`.
    ///
    /// The network is explicitly selected, exempt from VPN capture, and
    /// carries system permission so restricted networks can be used.
    pub fn for_underlying_network(net_id: u32) -> Self {
        Self::default()
            .with_net_id(net_id)
            .with_explicitly_selected(true)
            .with_protected_from_vpn(true)
            .with_permission(Permission::System)
    }

    /// Set the network id (low 16 bits are kept).
    pub fn with_net_id(self, net_id: u32) -> Self {
        Self((self.0 & !NET_ID_MASK) | (net_id & NET_ID_MASK))
    }

    /// Set the explicitly-selected flag.
    pub fn with_explicitly_selected(self, on: bool) -> Self {
        Self::set_bit(self, EXPLICITLY_SELECTED, on)
    }

    /// Set the protected-from-VPN flag.
    pub fn with_protected_from_vpn(self, on: bool) -> Self {
        Self::set_bit(self, PROTECTED_FROM_VPN, on)
    }

    /// Set the permission level.
    pub fn with_permission(self, permission: Permission) -> Self {
        Self((self.0 & !PERMISSION_MASK) | ((permission as u32) << PERMISSION_SHIFT))
    }

    fn set_bit(self, bit: u32, on: bool) -> Self {
        if on { Self(self.0 | bit) } else { Self(self.0 & !bit) }
    }

    /// Network id.
    pub fn net_id(&self) -> u32 {
        self.0 & NET_ID_MASK
    }

    /// Whether the network was explicitly selected.
    pub fn explicitly_selected(&self) -> bool {
        self.0 & EXPLICITLY_SELECTED != 0
    }

    /// Whether the packet bypasses VPNs.
    pub fn protected_from_vpn(&self) -> bool {
        self.0 & PROTECTED_FROM_VPN != 0
    }

    /// Raw permission bits.
    pub fn permission_bits(&self) -> u32 {
        (self.0 & PERMISSION_MASK) >> PERMISSION_SHIFT
    }

    /// Raw mark value.
    pub fn value(&self) -> u32 {
        self.0
    }
}
