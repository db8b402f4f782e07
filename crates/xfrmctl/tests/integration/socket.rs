//! Socket-level integration tests: transport-mode policies and the
//! encapsulation socket owner transfer.

use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

use xfrmctl::netlink::xfrm::{UDP_ENCAP, UDP_ENCAP_ESPINUDP};
use xfrmctl::{Direction, Error, Result, Syscalls};

use crate::common::TestNamespace;

fn enable_encap(socket: &UdpSocket) -> Result<()> {
    let value = i32::from(UDP_ENCAP_ESPINUDP);
    // SAFETY: value outlives the call and the length matches its type.
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_UDP,
            UDP_ENCAP,
            (&value as *const i32).cast(),
            std::mem::size_of::<i32>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[test]
fn test_transport_transform_ipv4() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("transport")?;
    ns.exec("ip", &["link", "set", "lo", "up"])?;
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    let xfrm = ns.controller()?;
    let fd = socket.as_raw_fd();

    xfrm.apply_transport_mode_transform(fd, 1, Direction::Out, "127.0.0.1", "127.0.0.1", 0x100)?;
    xfrm.apply_transport_mode_transform(fd, 1, Direction::In, "127.0.0.1", "127.0.0.1", 0x101)?;

    let err = xfrm
        .apply_transport_mode_transform(fd, 1, Direction::Out, "::1", "::1", 0x102)
        .unwrap_err();
    assert!(err.is_invalid_argument());

    xfrm.remove_transport_mode_transform(fd)?;

    Ok(())
}

#[test]
fn test_transport_transform_dual_stack() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("transport6")?;
    ns.exec("ip", &["link", "set", "lo", "up"])?;
    let socket = UdpSocket::bind("[::1]:0")?;
    let xfrm = ns.controller()?;
    let fd = socket.as_raw_fd();

    xfrm.apply_transport_mode_transform(fd, 2, Direction::Out, "::1", "::1", 0x200)?;
    xfrm.apply_transport_mode_transform(fd, 2, Direction::Out, "127.0.0.1", "127.0.0.1", 0x201)?;
    xfrm.remove_transport_mode_transform(fd)?;

    Ok(())
}

#[test]
fn test_encap_socket_owner() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("encap")?;
    ns.exec("ip", &["link", "set", "lo", "up"])?;
    let xfrm = ns.controller()?;

    let socket = UdpSocket::bind("127.0.0.1:0")?;
    let fd = socket.as_raw_fd();

    // Plain UDP is refused
    let err = xfrm.set_encap_socket_owner(fd, 1000, 0).unwrap_err();
    assert!(err.is_invalid_argument());

    enable_encap(&socket)?;

    // Only the owner may hand it over
    let err = xfrm.set_encap_socket_owner(fd, 1000, 1234).unwrap_err();
    assert!(err.is_permission_denied());

    xfrm.set_encap_socket_owner(fd, 1000, 0)?;
    assert_eq!(xfrm.syscalls().fd_owner(fd)?.uid, 1000);

    Ok(())
}
