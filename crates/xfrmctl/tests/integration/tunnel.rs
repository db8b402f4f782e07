//! Tunnel interface integration tests.
//!
//! XFRM interfaces need a kernel with `CONFIG_XFRM_INTERFACE`; VTI tests need
//! the `ip_vti` and `ip6_vti` modules.

use xfrmctl::{Result, TunnelParams};

use crate::common::TestNamespace;

#[test]
fn test_xfrm_interface_lifecycle() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("xfrmi")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    if !xfrm.xfrm_interface_supported() {
        eprintln!("Skipping test: XFRM interfaces not supported");
        return Ok(());
    }

    let params = TunnelParams::new("ipsec21", 21);
    xfrm.add_or_update_tunnel_interface(&params, false)?;
    assert!(ns.has_link("ipsec21"));

    let details = ns.exec("ip", &["-d", "link", "show", "ipsec21"])?;
    assert!(details.contains("xfrm"), "unexpected link: {}", details);
    assert!(details.contains("if_id 0x15"), "unexpected link: {}", details);

    // Creating it again fails, updating it does not
    let err = xfrm
        .add_or_update_tunnel_interface(&params, false)
        .unwrap_err();
    assert!(err.is_already_exists());
    xfrm.add_or_update_tunnel_interface(&params, true)?;

    xfrm.remove_tunnel_interface("ipsec21")?;
    assert!(!ns.has_link("ipsec21"));

    Ok(())
}

#[test]
fn test_vti_interfaces() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("vti")?;
    let xfrm = ns.vti_controller()?;

    let v4 = TunnelParams::new("ipsec31", 31)
        .endpoints("192.0.2.1", "192.0.2.2")
        .keys(31, 31);
    if let Err(e) = xfrm.add_or_update_tunnel_interface(&v4, false) {
        eprintln!("Skipping test: VTI unavailable: {}", e);
        return Ok(());
    }
    let details = ns.exec("ip", &["-d", "link", "show", "ipsec31"])?;
    assert!(details.contains("vti "), "unexpected link: {}", details);
    assert!(details.contains("remote 192.0.2.2"), "unexpected link: {}", details);

    let v6 = TunnelParams::new("ipsec32", 32)
        .endpoints("2001:db8::1", "2001:db8::2")
        .keys(32, 32);
    xfrm.add_or_update_tunnel_interface(&v6, false)?;
    let details = ns.exec("ip", &["-d", "link", "show", "ipsec32"])?;
    assert!(details.contains("vti6"), "unexpected link: {}", details);

    xfrm.remove_tunnel_interface("ipsec31")?;
    xfrm.remove_tunnel_interface("ipsec32")?;
    assert!(!ns.has_link("ipsec31"));
    assert!(!ns.has_link("ipsec32"));

    Ok(())
}

#[test]
fn test_remove_missing_interface() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("nolink")?;
    let xfrm = ns.controller()?;

    let err = xfrm.remove_tunnel_interface("ipsec99").unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}
