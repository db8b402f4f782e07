//! Policy integration tests.

use xfrmctl::netlink::xfrm::{PolicyAction, PolicyDirection};
use xfrmctl::{AddressFamily, Direction, PolicyParams, Result};

use crate::common::TestNamespace;

fn out_policy(if_id: u32) -> PolicyParams {
    PolicyParams::new(11, AddressFamily::Inet, Direction::Out)
        .template("198.51.100.1", "203.0.113.1", 0x5000)
        .mark(0x11, 0xffff_ffff)
        .xfrm_if_id(if_id)
}

#[test]
fn test_policy_lifecycle() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("policy")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;
    let if_id = if xfrm.xfrm_interface_supported() { 11 } else { 0 };

    xfrm.add_security_policy(&out_policy(if_id))?;

    let policies = xfrm.security_policies()?;
    assert_eq!(policies.len(), 1);
    let policy = &policies[0];
    assert_eq!(policy.direction, PolicyDirection::Out);
    assert_eq!(policy.action, PolicyAction::Allow);
    assert_eq!(policy.template_reqids, vec![11]);
    if xfrm.xfrm_interface_supported() {
        assert_eq!(policy.if_id, Some(11));
    } else {
        assert_eq!(policy.mark, Some((0x11, 0xffff_ffff)));
    }

    // A second add of the same selector is rejected, update replaces
    let err = xfrm.add_security_policy(&out_policy(if_id)).unwrap_err();
    assert!(err.is_already_exists());
    xfrm.update_security_policy(&out_policy(if_id))?;
    assert_eq!(xfrm.security_policies()?.len(), 1);

    // Deletion ignores the template
    xfrm.delete_security_policy(
        &PolicyParams::new(11, AddressFamily::Inet, Direction::Out)
            .mark(0x11, 0xffff_ffff)
            .xfrm_if_id(if_id),
    )?;
    assert!(xfrm.security_policies()?.is_empty());

    Ok(())
}

#[test]
fn test_mixed_family_policy() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("policy6")?;
    let mut xfrm = ns.controller()?;
    xfrm.init()?;

    // IPv6 inner traffic over an IPv4 tunnel
    let params = PolicyParams::new(12, AddressFamily::Inet6, Direction::In)
        .template("198.51.100.2", "203.0.113.2", 0x5001)
        .mark(0x12, 0xffff_ffff)
        .xfrm_if_id(if xfrm.xfrm_interface_supported() { 12 } else { 0 });
    xfrm.add_security_policy(&params)?;

    let policies = xfrm.security_policies()?;
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].selector.family, libc::AF_INET6 as u16);
    assert_eq!(policies[0].direction, PolicyDirection::In);

    xfrm.delete_security_policy(&params)?;
    Ok(())
}
