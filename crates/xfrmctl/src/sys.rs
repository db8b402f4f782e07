//! Operating system boundary.
//!
//! Everything the controller needs from the kernel besides the netlink
//! round trip itself goes through [`Syscalls`]: socket inspection, socket
//! options, file ownership and the interface list. [`KernelSyscalls`] is the
//! real implementation; tests supply a scripted one that records every
//! write and can assert that no I/O happened on a rejected call.

use std::io;
use std::mem::{self, MaybeUninit};
use std::os::unix::io::RawFd;

use crate::netlink::{NetlinkSocket, NetlinkTransport, Protocol, Result};
use crate::util::ifname;

/// Ownership and type of an open file descriptor, from `fstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdStat {
    /// Owning user id.
    pub uid: u32,
    /// Whether the descriptor refers to a socket.
    pub is_socket: bool,
}

/// Syscalls used by [`XfrmController`](crate::XfrmController).
pub trait Syscalls {
    /// Netlink socket type produced by [`open_netlink`](Self::open_netlink).
    type Socket: NetlinkTransport;

    /// Open and bind a fresh netlink socket.
    fn open_netlink(&self, protocol: Protocol) -> Result<Self::Socket>;

    /// Address family of a bound socket (`getsockname`).
    fn socket_family(&self, fd: RawFd) -> io::Result<i32>;

    /// Set a socket option. An empty `value` passes a null pointer and zero
    /// length, which clears options such as `IP_XFRM_POLICY`.
    fn set_socket_option(&self, fd: RawFd, level: i32, name: i32, value: &[u8])
    -> io::Result<()>;

    /// UDP encapsulation type of a UDP socket (`UDP_ENCAP`).
    fn udp_encap_type(&self, fd: RawFd) -> io::Result<i32>;

    /// Owner and type of a file descriptor (`fstat`).
    fn fd_owner(&self, fd: RawFd) -> io::Result<FdStat>;

    /// Change the owning user of a file descriptor, keeping its group.
    fn chown_fd(&self, fd: RawFd, uid: u32) -> io::Result<()>;

    /// Names of all network interfaces in the current namespace.
    fn interface_names(&self) -> Result<Vec<String>>;
}

/// [`Syscalls`] backed by the running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelSyscalls;

fn check(ret: libc::c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl Syscalls for KernelSyscalls {
    type Socket = NetlinkSocket;

    fn open_netlink(&self, protocol: Protocol) -> Result<NetlinkSocket> {
        NetlinkSocket::new(protocol)
    }

    fn socket_family(&self, fd: RawFd) -> io::Result<i32> {
        let mut storage = MaybeUninit::<libc::sockaddr_storage>::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

        // SAFETY: storage is large enough for any socket address and len
        // holds its size. getsockname writes at most len bytes.
        check(unsafe {
            libc::getsockname(fd, storage.as_mut_ptr().cast::<libc::sockaddr>(), &mut len)
        })?;

        // SAFETY: zero-initialized above; getsockname succeeded and filled
        // in at least the family field.
        let storage = unsafe { storage.assume_init() };
        Ok(i32::from(storage.ss_family))
    }

    fn set_socket_option(
        &self,
        fd: RawFd,
        level: i32,
        name: i32,
        value: &[u8],
    ) -> io::Result<()> {
        let (ptr, len) = if value.is_empty() {
            (std::ptr::null(), 0)
        } else {
            (value.as_ptr().cast::<libc::c_void>(), value.len())
        };

        // SAFETY: ptr is either null with a zero length or points to len
        // readable bytes borrowed from value for the duration of the call.
        check(unsafe { libc::setsockopt(fd, level, name, ptr, len as libc::socklen_t) })
    }

    fn udp_encap_type(&self, fd: RawFd) -> io::Result<i32> {
        let mut encap: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;

        // SAFETY: encap is a valid c_int and len holds its size.
        check(unsafe {
            libc::getsockopt(
                fd,
                libc::IPPROTO_UDP,
                crate::netlink::xfrm::UDP_ENCAP,
                (&mut encap as *mut libc::c_int).cast::<libc::c_void>(),
                &mut len,
            )
        })?;
        Ok(encap)
    }

    fn fd_owner(&self, fd: RawFd) -> io::Result<FdStat> {
        let mut stat = MaybeUninit::<libc::stat>::zeroed();

        // SAFETY: stat points to a writable libc::stat.
        check(unsafe { libc::fstat(fd, stat.as_mut_ptr()) })?;

        // SAFETY: fstat succeeded and filled in the structure.
        let stat = unsafe { stat.assume_init() };
        Ok(FdStat {
            uid: stat.st_uid,
            is_socket: stat.st_mode & libc::S_IFMT == libc::S_IFSOCK,
        })
    }

    fn chown_fd(&self, fd: RawFd, uid: u32) -> io::Result<()> {
        // SAFETY: fchown only reads its integer arguments. A gid of -1
        // leaves the group unchanged.
        check(unsafe { libc::fchown(fd, uid, libc::gid_t::MAX) })
    }

    fn interface_names(&self) -> Result<Vec<String>> {
        ifname::list_interfaces()
    }
}
