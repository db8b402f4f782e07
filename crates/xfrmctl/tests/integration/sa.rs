//! SA integration tests.
//!
//! Initialization, SPI allocation and SA lifecycle against a live kernel.

use xfrmctl::netlink::xfrm::{IpsecProtocol, XfrmMode};
use xfrmctl::{Mode, Result, SaId, SaParams};

use crate::common::TestNamespace;

const SRC: &str = "192.0.2.1";
const DST: &str = "192.0.2.2";

#[test]
fn test_init_removes_prefixed_interfaces() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("init")?;
    ns.add_dummy("ipsec9")?;
    ns.add_dummy("keep0")?;

    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    assert!(!ns.has_link("ipsec9"), "ipsec9 should be removed");
    assert!(ns.has_link("keep0"), "keep0 should survive");
    assert!(!ns.has_link("ipsec_test"), "probe interface should be gone");

    let mut report = String::new();
    xfrm.dump(&mut report).unwrap();
    assert!(report.starts_with("XfrmController\n"));

    Ok(())
}

#[test]
fn test_init_flushes_state() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("flush")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    xfrm.add_or_update_security_association(
        &SaParams::new(1, Mode::Transport, SRC, DST, 0x2000).crypt("cbc(aes)", vec![1; 16], 0),
    )?;
    assert_eq!(xfrm.security_associations()?.len(), 1);

    xfrm.init()?;
    assert!(xfrm.security_associations()?.is_empty());

    Ok(())
}

#[test]
fn test_allocate_spi_and_install() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("spi")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    let spi = xfrm.allocate_spi(5, SRC, DST, 0)?;
    assert!(spi >= xfrm.config().spi_min);

    // The allocation leaves a larval SA holding the SPI
    let sas = xfrm.security_associations()?;
    assert!(sas.iter().any(|sa| sa.spi == spi));

    xfrm.add_or_update_security_association(
        &SaParams::new(5, Mode::Transport, SRC, DST, spi)
            .crypt("cbc(aes)", vec![0x11; 16], 0)
            .auth("hmac(sha256)", vec![0x22; 32], 128),
    )?;

    let sas = xfrm.security_associations()?;
    let sa = sas.iter().find(|sa| sa.spi == spi).expect("SA installed");
    assert_eq!(sa.protocol, IpsecProtocol::Esp);
    assert_eq!(sa.mode, XfrmMode::Transport);
    assert_eq!(sa.reqid, 5);
    assert_eq!(sa.dst_addr, Some(DST.parse().unwrap()));
    assert_eq!(sa.enc_alg.as_ref().map(|a| a.name.as_str()), Some("cbc(aes)"));
    assert_eq!(sa.auth_alg.as_ref().map(|a| a.trunc_len), Some(128));

    xfrm.delete_security_association(&SaId::new(5, SRC, DST, spi))?;
    assert!(!xfrm.security_associations()?.iter().any(|sa| sa.spi == spi));

    Ok(())
}

#[test]
fn test_allocate_taken_spi() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("spitaken")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    assert_eq!(xfrm.allocate_spi(1, SRC, DST, 0x4242)?, 0x4242);

    let err = xfrm.allocate_spi(1, SRC, DST, 0x4242).unwrap_err();
    assert!(err.is_not_found(), "expected ENOENT, got {}", err);

    Ok(())
}

#[test]
fn test_tunnel_sa_output_mark() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("tunsa")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    let if_id = if xfrm.xfrm_interface_supported() { 3 } else { 0 };
    xfrm.add_or_update_security_association(
        &SaParams::new(3, Mode::Tunnel, "2001:db8::1", "2001:db8::2", 0x3000)
            .underlying_network(100)
            .aead("rfc4106(gcm(aes))", vec![0x33; 20], 128)
            .mark(0x3, 0xffff_ffff)
            .xfrm_if_id(if_id),
    )?;

    let sas = xfrm.security_associations()?;
    let sa = sas.iter().find(|sa| sa.spi == 0x3000).expect("SA installed");
    assert_eq!(sa.mode, XfrmMode::Tunnel);
    assert_eq!(sa.output_mark.map(|m| m & 0xffff), Some(100));
    if xfrm.xfrm_interface_supported() {
        assert_eq!(sa.if_id, Some(3));
        assert_eq!(sa.mark, None);
    } else {
        assert_eq!(sa.mark, Some((0x3, 0xffff_ffff)));
    }

    // Same identity replaces in place
    xfrm.add_or_update_security_association(
        &SaParams::new(3, Mode::Tunnel, "2001:db8::1", "2001:db8::2", 0x3000)
            .aead("rfc4106(gcm(aes))", vec![0x44; 20], 128)
            .mark(0x3, 0xffff_ffff)
            .xfrm_if_id(if_id),
    )?;
    assert_eq!(xfrm.security_associations()?.len(), 1);

    Ok(())
}

#[test]
fn test_delete_missing_sa() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("nosa")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    let err = xfrm
        .delete_security_association(&SaId::new(1, SRC, DST, 0x9999))
        .unwrap_err();
    assert!(err.kernel_errno().is_some());

    Ok(())
}
