//! Complete XFRM requests.
//!
//! | Operation               | Message               | Fixed struct           | Attributes                                    |
//! |-------------------------|-----------------------|------------------------|-----------------------------------------------|
//! | allocate SPI            | `ALLOCSPI`            | `xfrm_userspi_info`    | none                                          |
//! | add/update SA           | `UPDSA`               | `xfrm_usersa_info`     | crypt, auth, aead, mark, output mark, encap, if id |
//! | delete SA               | `DELSA`               | `xfrm_usersa_id`       | mark, if id                                   |
//! | add/update policy       | `NEWPOLICY`/`UPDPOLICY` | `xfrm_userpolicy_info` | template, mark, if id                       |
//! | delete policy           | `DELPOLICY`           | `xfrm_userpolicy_id`   | mark, if id                                   |
//! | flush SAs               | `FLUSHSA`             | `xfrm_usersa_flush`    | none                                          |
//! | flush policies          | `FLUSHPOLICY`         | none                   | none                                          |
//!
//! Transport-mode socket policies are not netlink messages; see
//! [`socket_policy`].

use super::attrs;
use super::types::*;
use crate::info::{CommonInfo, Direction, Mode, SaInfo, SpInfo};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::{Error, Result};
use crate::netlink::message::NETLINK_REQUEST_FLAGS;

/// Largest accepted key, in bytes.
pub const MAX_KEY_LENGTH: usize = 128;

/// Check the parts of an SA that the kernel would otherwise reject late or
/// silently misinterpret.
///
/// Order: AEAD exclusivity, key lengths, algorithm names, tunnel-only fields,
/// interface id without xfrm interface support.
pub fn validate_sa(sa: &SaInfo, xfrm_if_supported: bool) -> Result<()> {
    if sa.aead.is_present() && (sa.auth.is_present() || sa.crypt.is_present()) {
        return Err(Error::InvalidArgument(
            "AEAD is mutually exclusive with authentication and encryption".into(),
        ));
    }

    for algo in [&sa.aead, &sa.auth, &sa.crypt] {
        if algo.key.len() > MAX_KEY_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "key of {} bytes exceeds {} bytes",
                algo.key.len(),
                MAX_KEY_LENGTH
            )));
        }
    }

    for algo in [&sa.aead, &sa.auth, &sa.crypt] {
        if algo.name.len() >= XFRM_ALGO_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "algorithm name {:?} is too long",
                algo.name
            )));
        }
    }

    let common = &sa.common;
    if sa.mode != Mode::Tunnel
        && (common.xfrm_if_id != 0 || sa.net_id != 0 || common.mark.v != 0 || common.mark.m != 0)
    {
        return Err(Error::InvalidArgument(
            "interface id, mark and network id are only valid in tunnel mode".into(),
        ));
    }
    if sa.mode == Mode::Tunnel && !xfrm_if_supported && common.xfrm_if_id != 0 {
        return Err(Error::InvalidArgument(
            "interface id set for a VTI security association".into(),
        ));
    }

    Ok(())
}

fn selector(family: u16) -> XfrmSelector {
    // proto 0 matches every upper-layer protocol
    XfrmSelector::for_family(family)
}

/// The `xfrm_usersa_info` of an SA.
///
/// The selector is always `AF_UNSPEC`: in transport mode the kernel derives
/// it from the SA family, and in tunnel mode `XFRM_STATE_AF_UNSPEC` lets one
/// SA carry both families.
pub fn usersa_info(sa: &SaInfo, replay_window: u8) -> XfrmUsersaInfo {
    let common = &sa.common;
    XfrmUsersaInfo {
        sel: selector(AF_UNSPEC),
        id: XfrmId {
            daddr: common.dst_addr,
            spi: common.spi,
            proto: IPPROTO_ESP,
            ..Default::default()
        },
        saddr: common.src_addr,
        lft: XfrmLifetimeCfg::unlimited(),
        reqid: common.transform_id,
        family: common.family.as_raw(),
        mode: sa.mode.as_raw(),
        replay_window,
        flags: match sa.mode {
            Mode::Transport => 0,
            Mode::Tunnel => XFRM_STATE_AF_UNSPEC,
        },
        ..Default::default()
    }
}

/// `XFRM_MSG_ALLOCSPI` asking for one SPI in `min..=max` (host order).
pub fn allocate_spi(common: &CommonInfo, min: u32, max: u32, replay_window: u8) -> MessageBuilder {
    let sa = SaInfo {
        common: *common,
        ..Default::default()
    };
    let info = XfrmUserspiInfo {
        info: usersa_info(&sa, replay_window),
        min,
        max,
    };

    let mut builder = MessageBuilder::new(XFRM_MSG_ALLOCSPI, NETLINK_REQUEST_FLAGS);
    builder.append(&info);
    builder
}

/// `XFRM_MSG_UPDSA` creating or replacing an SA. Call [`validate_sa`] first.
pub fn update_sa(sa: &SaInfo, replay_window: u8) -> MessageBuilder {
    let mut builder = MessageBuilder::new(XFRM_MSG_UPDSA, NETLINK_REQUEST_FLAGS);
    builder.append(&usersa_info(sa, replay_window));

    attrs::append_crypt(&mut builder, &sa.crypt.name, &sa.crypt.key);
    attrs::append_auth_trunc(
        &mut builder,
        &sa.auth.name,
        &sa.auth.key,
        sa.auth.trunc_len_bits,
    );
    attrs::append_aead(
        &mut builder,
        &sa.aead.name,
        &sa.aead.key,
        sa.aead.trunc_len_bits,
    );
    attrs::append_mark(&mut builder, &sa.common.mark);
    attrs::append_output_mark(&mut builder, sa.net_id);
    attrs::append_encap(
        &mut builder,
        sa.encap.kind.as_raw(),
        sa.encap.src_port,
        sa.encap.dst_port,
    );
    attrs::append_if_id(&mut builder, sa.common.xfrm_if_id);

    builder
}

/// `XFRM_MSG_DELSA` for the SA identified by destination, SPI and ESP.
pub fn delete_sa(common: &CommonInfo) -> MessageBuilder {
    let id = XfrmUsersaId {
        daddr: common.dst_addr,
        spi: common.spi,
        family: common.family.as_raw(),
        proto: IPPROTO_ESP,
        ..Default::default()
    };

    let mut builder = MessageBuilder::new(XFRM_MSG_DELSA, NETLINK_REQUEST_FLAGS);
    builder.append(&id);
    attrs::append_mark(&mut builder, &common.mark);
    attrs::append_if_id(&mut builder, common.xfrm_if_id);
    builder
}

/// The `xfrm_userpolicy_info` of a policy.
pub fn userpolicy_info(sp: &SpInfo, direction: Direction) -> XfrmUserpolicyInfo {
    XfrmUserpolicyInfo {
        sel: selector(sp.selector_family.as_raw()),
        lft: XfrmLifetimeCfg::unlimited(),
        // a non-zero index must encode the direction, 0 lets the kernel pick
        index: 0,
        dir: direction.as_raw(),
        action: XFRM_POLICY_ALLOW,
        flags: XFRM_POLICY_LOCALOK,
        share: XFRM_SHARE_UNIQUE,
        ..Default::default()
    }
}

/// The template binding a policy to its SA.
///
/// Any negotiated algorithm is accepted; algorithms are pinned by the SA.
pub fn user_tmpl(sp: &SpInfo) -> XfrmUserTmpl {
    let common = &sp.sa.common;
    XfrmUserTmpl {
        id: XfrmId {
            daddr: common.dst_addr,
            spi: common.spi,
            proto: IPPROTO_ESP,
            ..Default::default()
        },
        family: common.family.as_raw(),
        saddr: common.src_addr,
        reqid: common.transform_id,
        mode: sp.sa.mode.as_raw(),
        share: XFRM_SHARE_UNIQUE,
        optional: 0,
        aalgos: ALGO_MASK_AUTH_ALL,
        ealgos: ALGO_MASK_CRYPT_ALL,
        calgos: 0,
        ..Default::default()
    }
}

/// `XFRM_MSG_NEWPOLICY` or `XFRM_MSG_UPDPOLICY` for a tunnel-mode policy.
pub fn update_policy(sp: &SpInfo, direction: Direction, msg_type: u16) -> MessageBuilder {
    let mut builder = MessageBuilder::new(msg_type, NETLINK_REQUEST_FLAGS);
    builder.append(&userpolicy_info(sp, direction));
    attrs::append_user_tmpl(&mut builder, &user_tmpl(sp));
    attrs::append_mark(&mut builder, &sp.sa.common.mark);
    attrs::append_if_id(&mut builder, sp.sa.common.xfrm_if_id);
    builder
}

/// `XFRM_MSG_DELPOLICY` matching by selector and direction.
pub fn delete_policy(sp: &SpInfo, direction: Direction) -> MessageBuilder {
    let id = XfrmUserpolicyId {
        sel: selector(sp.selector_family.as_raw()),
        dir: direction.as_raw(),
        ..Default::default()
    };

    let mut builder = MessageBuilder::new(XFRM_MSG_DELPOLICY, NETLINK_REQUEST_FLAGS);
    builder.append(&id);
    attrs::append_mark(&mut builder, &sp.sa.common.mark);
    attrs::append_if_id(&mut builder, sp.sa.common.xfrm_if_id);
    builder
}

/// `XFRM_MSG_FLUSHSA` for every IPsec protocol.
pub fn flush_sa() -> MessageBuilder {
    let mut builder = MessageBuilder::new(XFRM_MSG_FLUSHSA, NETLINK_REQUEST_FLAGS);
    builder.append(&XfrmUsersaFlush {
        proto: IPSEC_PROTO_ANY,
    });
    builder
}

/// `XFRM_MSG_FLUSHPOLICY` with an empty body.
pub fn flush_policy() -> MessageBuilder {
    MessageBuilder::new(XFRM_MSG_FLUSHPOLICY, NETLINK_REQUEST_FLAGS)
}

/// Policy plus template installed with `IP_XFRM_POLICY`/`IPV6_XFRM_POLICY`.
pub fn socket_policy(sp: &SpInfo, direction: Direction) -> XfrmSocketPolicy {
    XfrmSocketPolicy {
        info: userpolicy_info(sp, direction),
        tmpl: user_tmpl(sp),
    }
}
