//! Netlink request/response handling.
//!
//! A [`Connection`] wraps exactly one socket. The controller opens a fresh
//! connection per call and never shares it between threads. Every response
//! must carry the sequence number of the request it answers.

use tracing::trace;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, NLMSG_HDRLEN, NlMsgError, NlMsgHdr, NlMsgType};
use super::socket::{NetlinkSocket, NetlinkTransport, Protocol};
use super::xfrm::{XFRM_MSG_BASE, XFRM_MSG_MAX};

/// Default receive buffer for a single response datagram.
pub const DEFAULT_RECV_BUFFER: usize = 8192;

/// Netlink connection over one socket.
pub struct Connection<T: NetlinkTransport = NetlinkSocket> {
    socket: T,
    recv_capacity: usize,
}

impl Connection<NetlinkSocket> {
    /// Open and bind a new socket for the given protocol.
    pub fn new(protocol: Protocol) -> Result<Self> {
        Ok(Self::from_socket(
            NetlinkSocket::new(protocol)?,
            DEFAULT_RECV_BUFFER,
        ))
    }
}

impl<T: NetlinkTransport> Connection<T> {
    /// Wrap an already bound socket.
    pub fn from_socket(socket: T, recv_capacity: usize) -> Self {
        Self {
            socket,
            recv_capacity,
        }
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &T {
        &self.socket
    }

    /// Send one framed request and validate the single response.
    ///
    /// The header length is written from the finished buffer, so it always
    /// equals the total number of bytes handed to the socket. A short write
    /// is an error. Returns the raw response datagram.
    pub fn send_message(&self, mut builder: MessageBuilder) -> Result<Vec<u8>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());
        let msg_type = builder.msg_type();

        let msg = builder.finish();
        let written = self.socket.send(&msg)?;
        if written != msg.len() {
            return Err(Error::ShortWrite {
                expected: msg.len(),
                actual: written,
            });
        }
        trace!(msg_type, seq, len = msg.len(), "netlink request sent");

        let response = self.socket.recv_msg(self.recv_capacity)?;
        validate_response(&response, seq)?;

        Ok(response)
    }

    /// Send a dump request and collect the payload of every reply message.
    pub fn dump(&self, mut builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        let written = self.socket.send(&msg)?;
        if written != msg.len() {
            return Err(Error::ShortWrite {
                expected: msg.len(),
                actual: written,
            });
        }

        let mut responses = Vec::new();

        loop {
            let data = self.socket.recv_msg(self.recv_capacity)?;
            if data.is_empty() {
                return Err(Error::MalformedResponse("empty dump datagram".into()));
            }

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq {
                    continue;
                }

                match header.nlmsg_type {
                    NlMsgType::DONE => return Ok(responses),
                    NlMsgType::OVERRUN => return Err(Error::KernelBufferOverrun),
                    NlMsgType::ERROR => {
                        let err = NlMsgError::from_bytes(payload)?;
                        if !err.is_ack() {
                            return Err(Error::from_errno(err.error));
                        }
                    }
                    NlMsgType::NOOP => {}
                    _ => responses.push(payload.to_vec()),
                }
            }
        }
    }
}

/// Validate a single response datagram for the request with sequence `seq`.
pub fn validate_response(data: &[u8], seq: u32) -> Result<()> {
    if data.len() < NLMSG_HDRLEN {
        return Err(Error::MalformedResponse(format!(
            "response of {} bytes is shorter than a netlink header",
            data.len()
        )));
    }

    let header = NlMsgHdr::from_bytes(data)?;
    if header.nlmsg_seq != seq {
        return Err(Error::SequenceMismatch {
            expected: seq,
            actual: header.nlmsg_seq,
        });
    }

    match header.nlmsg_type {
        NlMsgType::NOOP | NlMsgType::DONE => Ok(()),
        NlMsgType::OVERRUN => Err(Error::KernelBufferOverrun),
        NlMsgType::ERROR => {
            let end = (header.nlmsg_len as usize).clamp(NLMSG_HDRLEN, data.len());
            let err = NlMsgError::from_bytes(&data[NLMSG_HDRLEN..end]).map_err(|_| {
                Error::MalformedResponse("netlink error payload too short".into())
            })?;
            if err.is_ack() {
                Ok(())
            } else {
                Err(Error::from_errno(err.error))
            }
        }
        t if !(XFRM_MSG_BASE..=XFRM_MSG_MAX).contains(&t) => Err(Error::MalformedResponse(
            format!("unexpected message type {:#x}", t),
        )),
        _ => Ok(()),
    }
}
