//! `XFRMA_*` attribute encoders.
//!
//! Each encoder appends at most one attribute to a [`MessageBuilder`] and
//! returns its length without trailing padding. A return value of 0 means the
//! input was the "absent" sentinel (empty algorithm name, zero mark, zero
//! network id, no encapsulation, zero interface id) and nothing was written.

use zerocopy::IntoBytes;

use super::types::*;
use crate::fwmark::Fwmark;
use crate::netlink::builder::MessageBuilder;

fn key_bits(key: &[u8]) -> u32 {
    (key.len() * 8) as u32
}

/// Append an encryption algorithm (`XFRMA_ALG_CRYPT`).
pub fn append_crypt(builder: &mut MessageBuilder, name: &str, key: &[u8]) -> usize {
    if name.is_empty() {
        return 0;
    }
    let algo = XfrmAlgo {
        alg_name: algo_name_field(name),
        alg_key_len: key_bits(key),
    };
    builder.append_attr_parts(XFRMA_ALG_CRYPT, &[algo.as_bytes(), key])
}

/// Append a truncated authentication algorithm (`XFRMA_ALG_AUTH_TRUNC`).
pub fn append_auth_trunc(
    builder: &mut MessageBuilder,
    name: &str,
    key: &[u8],
    trunc_bits: u32,
) -> usize {
    if name.is_empty() {
        return 0;
    }
    let algo = XfrmAlgoAuth {
        alg_name: algo_name_field(name),
        alg_key_len: key_bits(key),
        alg_trunc_len: trunc_bits,
    };
    builder.append_attr_parts(XFRMA_ALG_AUTH_TRUNC, &[algo.as_bytes(), key])
}

/// Append an AEAD algorithm (`XFRMA_ALG_AEAD`).
pub fn append_aead(builder: &mut MessageBuilder, name: &str, key: &[u8], icv_bits: u32) -> usize {
    if name.is_empty() {
        return 0;
    }
    let algo = XfrmAlgoAead {
        alg_name: algo_name_field(name),
        alg_key_len: key_bits(key),
        alg_icv_len: icv_bits,
    };
    builder.append_attr_parts(XFRMA_ALG_AEAD, &[algo.as_bytes(), key])
}

/// Append a mark/mask pair (`XFRMA_MARK`).
pub fn append_mark(builder: &mut MessageBuilder, mark: &XfrmMark) -> usize {
    if mark.v == 0 && mark.m == 0 {
        return 0;
    }
    builder.append_attr(XFRMA_MARK, mark.as_bytes())
}

/// Append the output mark that routes encrypted packets onto `net_id`
/// (`XFRMA_OUTPUT_MARK`).
pub fn append_output_mark(builder: &mut MessageBuilder, net_id: u32) -> usize {
    if net_id == 0 {
        return 0;
    }
    builder.append_attr_u32(XFRMA_OUTPUT_MARK, Fwmark::for_underlying_network(net_id).value())
}

/// Append an XFRM interface id (`XFRMA_IF_ID`).
pub fn append_if_id(builder: &mut MessageBuilder, if_id: u32) -> usize {
    if if_id == 0 {
        return 0;
    }
    builder.append_attr_u32(XFRMA_IF_ID, if_id)
}

/// Append a UDP encapsulation template (`XFRMA_ENCAP`).
///
/// Ports are given in host order.
pub fn append_encap(
    builder: &mut MessageBuilder,
    encap_type: u16,
    src_port: u16,
    dst_port: u16,
) -> usize {
    if encap_type == 0 {
        return 0;
    }
    let tmpl = XfrmEncapTmpl {
        encap_type,
        encap_sport: src_port.to_be(),
        encap_dport: dst_port.to_be(),
        ..Default::default()
    };
    builder.append_attr(XFRMA_ENCAP, tmpl.as_bytes())
}

/// Append a policy template (`XFRMA_TMPL`).
pub fn append_user_tmpl(builder: &mut MessageBuilder, tmpl: &XfrmUserTmpl) -> usize {
    builder.append_attr(XFRMA_TMPL, tmpl.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{AttrIter, NLA_HDRLEN};
    use crate::netlink::message::{NLM_F_REQUEST, NLMSG_HDRLEN};
    use zerocopy::FromBytes;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(XFRM_MSG_UPDSA, NLM_F_REQUEST)
    }

    fn attrs(builder: &MessageBuilder) -> Vec<(u16, Vec<u8>)> {
        AttrIter::new(&builder.as_bytes()[NLMSG_HDRLEN..])
            .map(|(kind, payload)| (kind, payload.to_vec()))
            .collect()
    }

    #[test]
    fn test_absent_values_write_nothing() {
        let mut b = builder();
        assert_eq!(append_crypt(&mut b, "", &[1, 2, 3]), 0);
        assert_eq!(append_auth_trunc(&mut b, "", &[], 96), 0);
        assert_eq!(append_aead(&mut b, "", &[], 128), 0);
        assert_eq!(append_mark(&mut b, &XfrmMark::default()), 0);
        assert_eq!(append_output_mark(&mut b, 0), 0);
        assert_eq!(append_if_id(&mut b, 0), 0);
        assert_eq!(append_encap(&mut b, 0, 4500, 4500), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn test_crypt_layout() {
        let key = [0xaa; 16];
        let mut b = builder();
        let len = append_crypt(&mut b, "cbc(aes)", &key);
        assert_eq!(len, NLA_HDRLEN + 68 + 16);

        let attrs = attrs(&b);
        assert_eq!(attrs[0].0, XFRMA_ALG_CRYPT);
        let (algo, rest) = XfrmAlgo::read_from_prefix(&attrs[0].1).unwrap();
        assert_eq!(&algo.alg_name[..8], b"cbc(aes)");
        assert_eq!(algo.alg_key_len, 128);
        assert_eq!(rest, &key);
    }

    #[test]
    fn test_auth_trunc_is_padded() {
        // 72 + 20 is not a multiple of four on the wire once the header is added
        let key = [0x11; 20];
        let mut b = builder();
        let len = append_auth_trunc(&mut b, "hmac(sha1)", &key, 96);
        assert_eq!(len, NLA_HDRLEN + 72 + 20);
        assert_eq!(b.len() % 4, 0);

        let attrs = attrs(&b);
        assert_eq!(attrs[0].0, XFRMA_ALG_AUTH_TRUNC);
        let (algo, rest) = XfrmAlgoAuth::read_from_prefix(&attrs[0].1).unwrap();
        assert_eq!(algo.alg_key_len, 160);
        assert_eq!(algo.alg_trunc_len, 96);
        assert_eq!(rest, &key);
    }

    #[test]
    fn test_aead_layout() {
        let key = [0x22; 36];
        let mut b = builder();
        append_aead(&mut b, "rfc4106(gcm(aes))", &key, 128);

        let attrs = attrs(&b);
        assert_eq!(attrs[0].0, XFRMA_ALG_AEAD);
        let (algo, _) = XfrmAlgoAead::read_from_prefix(&attrs[0].1).unwrap();
        assert_eq!(algo.alg_key_len, 288);
        assert_eq!(algo.alg_icv_len, 128);
    }

    #[test]
    fn test_mark_with_only_mask() {
        let mut b = builder();
        let len = append_mark(&mut b, &XfrmMark { v: 0, m: 0xffff });
        assert_eq!(len, NLA_HDRLEN + 8);
        let attrs = attrs(&b);
        let mark = XfrmMark::read_from_bytes(&attrs[0].1).unwrap();
        assert_eq!(mark, XfrmMark { v: 0, m: 0xffff });
    }

    #[test]
    fn test_output_mark_flags() {
        let mut b = builder();
        assert_eq!(append_output_mark(&mut b, 100), NLA_HDRLEN + 4);
        let attrs = attrs(&b);
        assert_eq!(attrs[0].0, XFRMA_OUTPUT_MARK);
        let value = u32::from_ne_bytes(attrs[0].1[..4].try_into().unwrap());
        assert_eq!(value, 100 | (1 << 16) | (1 << 17) | (3 << 18));
    }

    #[test]
    fn test_encap_ports_are_big_endian() {
        let mut b = builder();
        let len = append_encap(&mut b, UDP_ENCAP_ESPINUDP, 4500, 1234);
        assert_eq!(len, NLA_HDRLEN + 24);
        let attrs = attrs(&b);
        let tmpl = XfrmEncapTmpl::read_from_bytes(&attrs[0].1).unwrap();
        assert_eq!(tmpl.encap_type, UDP_ENCAP_ESPINUDP);
        assert_eq!(u16::from_be(tmpl.encap_sport), 4500);
        assert_eq!(u16::from_be(tmpl.encap_dport), 1234);
        assert_eq!(&attrs[0].1[2..4], &4500u16.to_be_bytes());
    }

    #[test]
    fn test_if_id_and_template() {
        let mut b = builder();
        append_user_tmpl(&mut b, &XfrmUserTmpl::default());
        append_if_id(&mut b, 42);
        let attrs = attrs(&b);
        assert_eq!(attrs[0].0, XFRMA_TMPL);
        assert_eq!(attrs[0].1.len(), 64);
        assert_eq!(attrs[1], (XFRMA_IF_ID, 42u32.to_ne_bytes().to_vec()));
    }
}
