//! Low-level blocking netlink socket operations.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use super::error::{Error, Result};

/// Netlink protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Routing/device hook, used for tunnel interfaces.
    Route,
    /// IPsec transformation database (SAs and policies).
    Xfrm,
}

impl Protocol {
    fn as_isize(self) -> isize {
        match self {
            Protocol::Route => protocols::NETLINK_ROUTE,
            Protocol::Xfrm => protocols::NETLINK_XFRM,
        }
    }
}

/// One bound netlink socket, as seen by [`Connection`](super::Connection).
///
/// [`NetlinkSocket`] is the real implementation; tests substitute a scripted
/// one through [`Syscalls`](crate::sys::Syscalls).
pub trait NetlinkTransport {
    /// Get the next sequence number.
    fn next_seq(&self) -> u32;

    /// Get the local port ID.
    fn pid(&self) -> u32;

    /// Send one datagram, returning the number of bytes written.
    fn send(&self, msg: &[u8]) -> Result<usize>;

    /// Block until one datagram arrives, reading at most `capacity` bytes.
    fn recv_msg(&self, capacity: usize) -> Result<Vec<u8>>;
}

/// Blocking netlink socket.
pub struct NetlinkSocket {
    socket: Socket,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    protocol: Protocol,
}

impl NetlinkSocket {
    /// Create and bind a new netlink socket for the given protocol.
    pub fn new(protocol: Protocol) -> Result<Self> {
        let mut socket = Socket::new(protocol.as_isize()).map_err(Error::Socket)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(Error::Socket)?;
        socket.get_address(&mut addr).map_err(Error::Socket)?;
        let pid = addr.port_number();

        // Extended ACK only improves kernel error strings
        socket.set_ext_ack(true).ok();

        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
            pid,
            protocol,
        })
    }

    /// Get the protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl NetlinkTransport for NetlinkSocket {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn send(&self, msg: &[u8]) -> Result<usize> {
        Ok(self.socket.send(msg, 0)?)
    }

    fn recv_msg(&self, capacity: usize) -> Result<Vec<u8>> {
        // Don't resize, let recv fill the spare capacity
        let mut buf = BytesMut::with_capacity(capacity);
        let n = self.socket.recv(&mut buf, 0)?;
        buf.truncate(n);
        Ok(buf.to_vec())
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
