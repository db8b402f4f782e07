//! Common test utilities.
//!
//! Provides `MockSyscalls`, a scripted stand-in for the kernel that records
//! every netlink request and socket operation, `TestNamespace` for live
//! tests in an isolated network namespace, and helper macros for
//! conditional test execution.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use xfrmctl::netlink::attr::AttrIter;
use xfrmctl::netlink::message::{NLM_F_DUMP, NLMSG_HDRLEN};
use xfrmctl::netlink::{NetlinkTransport, NlMsgHdr, NlMsgType, Protocol};
use xfrmctl::sys::{FdStat, KernelSyscalls, Syscalls};
use xfrmctl::{ControllerConfig, Error, Result, XfrmController};

// ============================================================================
// Scripted kernel
// ============================================================================

/// How the mock kernel answers one request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// `NLMSG_ERROR` with error 0.
    Ack,
    /// `NLMSG_ERROR` carrying `-errno`.
    Errno(i32),
    /// An acknowledgement for a different sequence number.
    WrongSeq,
}

/// One request seen by the mock kernel.
#[derive(Debug, Clone)]
pub struct Request {
    pub protocol: Protocol,
    /// Socket the request was sent on, counted from 0.
    pub socket: usize,
    pub bytes: Vec<u8>,
}

impl Request {
    pub fn header(&self) -> NlMsgHdr {
        *NlMsgHdr::from_bytes(&self.bytes).unwrap()
    }

    pub fn msg_type(&self) -> u16 {
        self.header().nlmsg_type
    }

    /// Payload after the netlink header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[NLMSG_HDRLEN..]
    }

    /// Attributes following a fixed struct of `fixed_len` bytes.
    pub fn attrs(&self, fixed_len: usize) -> Vec<(u16, Vec<u8>)> {
        let start = NLMSG_HDRLEN + ((fixed_len + 3) & !3);
        AttrIter::new(&self.bytes[start..])
            .map(|(kind, payload)| (kind, payload.to_vec()))
            .collect()
    }

    /// Payload of the first attribute of the given type.
    pub fn attr(&self, fixed_len: usize, kind: u16) -> Option<Vec<u8>> {
        self.attrs(fixed_len)
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, payload)| payload)
    }
}

/// Everything the mock has recorded, plus its script.
#[derive(Debug, Default)]
pub struct MockState {
    pub replies: VecDeque<Reply>,
    pub requests: Vec<Request>,
    pub sockets_opened: usize,
    pub sockopts: Vec<(RawFd, i32, i32, Vec<u8>)>,
    pub chowns: Vec<(RawFd, u32)>,
    pub families: HashMap<RawFd, i32>,
    pub owners: HashMap<RawFd, FdStat>,
    pub encaps: HashMap<RawFd, i32>,
    pub interfaces: Vec<String>,
}

impl MockState {
    /// Number of write syscalls of any kind.
    pub fn writes(&self) -> usize {
        self.requests.len() + self.sockopts.len() + self.chowns.len()
    }
}

/// Scripted [`Syscalls`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MockSyscalls {
    state: Arc<Mutex<MockState>>,
}

impl MockSyscalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queue replies; requests beyond the script are acknowledged.
    pub fn reply(&self, replies: impl IntoIterator<Item = Reply>) -> &Self {
        self.state().replies.extend(replies);
        self
    }

    pub fn with_socket(&self, fd: RawFd, family: i32) -> &Self {
        self.state().families.insert(fd, family);
        self
    }

    pub fn with_owner(&self, fd: RawFd, uid: u32, is_socket: bool) -> &Self {
        self.state().owners.insert(fd, FdStat { uid, is_socket });
        self
    }

    pub fn with_encap(&self, fd: RawFd, encap: i32) -> &Self {
        self.state().encaps.insert(fd, encap);
        self
    }

    pub fn with_interfaces(&self, names: &[&str]) -> &Self {
        self.state().interfaces = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    pub fn writes(&self) -> usize {
        self.state().writes()
    }
}

fn bad_fd() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

impl Syscalls for MockSyscalls {
    type Socket = MockSocket;

    fn open_netlink(&self, protocol: Protocol) -> Result<MockSocket> {
        let mut state = self.state();
        let id = state.sockets_opened;
        state.sockets_opened += 1;
        Ok(MockSocket {
            id,
            protocol,
            seq: AtomicU32::new(1),
            pending: Mutex::new(VecDeque::new()),
            state: Arc::clone(&self.state),
        })
    }

    fn socket_family(&self, fd: RawFd) -> io::Result<i32> {
        self.state().families.get(&fd).copied().ok_or_else(bad_fd)
    }

    fn set_socket_option(
        &self,
        fd: RawFd,
        level: i32,
        name: i32,
        value: &[u8],
    ) -> io::Result<()> {
        self.state()
            .sockopts
            .push((fd, level, name, value.to_vec()));
        Ok(())
    }

    fn udp_encap_type(&self, fd: RawFd) -> io::Result<i32> {
        Ok(self.state().encaps.get(&fd).copied().unwrap_or(0))
    }

    fn fd_owner(&self, fd: RawFd) -> io::Result<FdStat> {
        self.state().owners.get(&fd).copied().ok_or_else(bad_fd)
    }

    fn chown_fd(&self, fd: RawFd, uid: u32) -> io::Result<()> {
        self.state().chowns.push((fd, uid));
        Ok(())
    }

    fn interface_names(&self) -> Result<Vec<String>> {
        Ok(self.state().interfaces.clone())
    }
}

/// Socket half of [`MockSyscalls`].
#[derive(Debug)]
pub struct MockSocket {
    id: usize,
    protocol: Protocol,
    seq: AtomicU32,
    /// (sequence, is dump) of requests awaiting an answer.
    pending: Mutex<VecDeque<(u32, bool)>>,
    state: Arc<Mutex<MockState>>,
}

fn response(msg_type: u16, seq: u32, errno: Option<i32>) -> Vec<u8> {
    let len = if errno.is_some() {
        NLMSG_HDRLEN + 4 + NLMSG_HDRLEN
    } else {
        NLMSG_HDRLEN
    };
    let mut hdr = NlMsgHdr::new(msg_type, 0);
    hdr.nlmsg_len = len as u32;
    hdr.nlmsg_seq = seq;

    let mut data = hdr.as_bytes().to_vec();
    if let Some(errno) = errno {
        data.extend_from_slice(&(-errno).to_ne_bytes());
        data.extend_from_slice(NlMsgHdr::new(0, 0).as_bytes());
    }
    data
}

impl NetlinkTransport for MockSocket {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn pid(&self) -> u32 {
        4242
    }

    fn send(&self, msg: &[u8]) -> Result<usize> {
        let hdr = NlMsgHdr::from_bytes(msg)?;
        let is_dump = hdr.nlmsg_flags & NLM_F_DUMP == NLM_F_DUMP;
        self.pending
            .lock()
            .unwrap()
            .push_back((hdr.nlmsg_seq, is_dump));
        self.state.lock().unwrap().requests.push(Request {
            protocol: self.protocol,
            socket: self.id,
            bytes: msg.to_vec(),
        });
        Ok(msg.len())
    }

    fn recv_msg(&self, capacity: usize) -> Result<Vec<u8>> {
        let (seq, is_dump) = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::WouldBlock)))?;

        if is_dump {
            return Ok(response(NlMsgType::DONE, seq, None));
        }

        let reply = self
            .state
            .lock()
            .unwrap()
            .replies
            .pop_front()
            .unwrap_or(Reply::Ack);
        let mut data = match reply {
            Reply::Ack => response(NlMsgType::ERROR, seq, Some(0)),
            Reply::Errno(errno) => response(NlMsgType::ERROR, seq, Some(errno)),
            Reply::WrongSeq => response(NlMsgType::ERROR, seq + 100, Some(0)),
        };
        data.truncate(capacity);
        Ok(data)
    }
}

/// Controller over a fresh mock.
pub fn controller(xfrm_if_supported: bool) -> (XfrmController<MockSyscalls>, MockSyscalls) {
    let mock = MockSyscalls::new();
    let xfrm = XfrmController::with_xfrm_interface_support(
        mock.clone(),
        ControllerConfig::default(),
        xfrm_if_supported,
    )
    .unwrap();
    (xfrm, mock)
}

// ============================================================================
// Live kernel
// ============================================================================

/// Global counter for unique namespace names.
static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique namespace name for this test.
fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id();
    format!("xfrmctl-test-{}-{}-{}", prefix, pid, id)
}

fn command_error(e: io::Error) -> Error {
    Error::Io(io::Error::from(e.kind()))
}

/// A test network namespace with automatic cleanup.
///
/// While a `TestNamespace` is alive the current thread lives inside it, so
/// every socket the controller opens talks to the namespace's kernel state.
///
/// # Example
///
/// ```ignore
/// let ns = TestNamespace::new("sa")?;
/// let xfrm = ns.controller(true)?;
/// ```
pub struct TestNamespace {
    name: String,
    original: File,
}

impl TestNamespace {
    /// Create a namespace with a unique name and enter it on this thread.
    pub fn new(prefix: &str) -> Result<Self> {
        let name = unique_ns_name(prefix);

        let status = Command::new("ip")
            .args(["netns", "add", &name])
            .status()
            .map_err(command_error)?;

        if !status.success() {
            return Err(Error::InvalidMessage(format!(
                "failed to create namespace: {}",
                name
            )));
        }

        let original = File::open("/proc/thread-self/ns/net")?;
        let target = File::open(format!("/var/run/netns/{}", name))?;

        // SAFETY: target is an open namespace file; only this thread moves.
        let ret = unsafe { libc::setns(target.as_raw_fd(), libc::CLONE_NEWNET) };
        if ret < 0 {
            let _ = Command::new("ip").args(["netns", "del", &name]).status();
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(Self { name, original })
    }

    /// Get the namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Controller over the live kernel, listing interfaces of this namespace.
    pub fn controller(&self) -> Result<XfrmController<NamespaceSyscalls>> {
        XfrmController::with_syscalls(
            NamespaceSyscalls {
                ns: self.name.clone(),
            },
            ControllerConfig::default(),
        )
    }

    /// Controller that skips the probe and always uses VTI devices.
    pub fn vti_controller(&self) -> Result<XfrmController<NamespaceSyscalls>> {
        XfrmController::with_xfrm_interface_support(
            NamespaceSyscalls {
                ns: self.name.clone(),
            },
            ControllerConfig::default(),
            false,
        )
    }

    /// Run a command in the namespace and return its output.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<String> {
        exec_in(&self.name, cmd, args)
    }

    /// Add a dummy interface in this namespace using ip command.
    pub fn add_dummy(&self, name: &str) -> Result<()> {
        self.exec("ip", &["link", "add", name, "type", "dummy"])?;
        Ok(())
    }

    /// Whether the named interface exists.
    pub fn has_link(&self, name: &str) -> bool {
        self.exec("ip", &["link", "show", name]).is_ok()
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        // SAFETY: original was opened from this thread's namespace link.
        unsafe { libc::setns(self.original.as_raw_fd(), libc::CLONE_NEWNET) };
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

fn exec_in(ns: &str, cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new("ip")
        .args(["netns", "exec", ns, cmd])
        .args(args)
        .output()
        .map_err(command_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::InvalidMessage(format!(
            "command failed: {} {:?}: {}",
            cmd, args, stderr
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Kernel syscalls, except that interfaces are listed inside the namespace.
///
/// `/sys/class/net` follows the mount namespace, which `setns` on the
/// network namespace alone does not switch.
#[derive(Debug)]
pub struct NamespaceSyscalls {
    ns: String,
}

impl Syscalls for NamespaceSyscalls {
    type Socket = <KernelSyscalls as Syscalls>::Socket;

    fn open_netlink(&self, protocol: Protocol) -> Result<Self::Socket> {
        KernelSyscalls.open_netlink(protocol)
    }

    fn socket_family(&self, fd: RawFd) -> io::Result<i32> {
        KernelSyscalls.socket_family(fd)
    }

    fn set_socket_option(
        &self,
        fd: RawFd,
        level: i32,
        name: i32,
        value: &[u8],
    ) -> io::Result<()> {
        KernelSyscalls.set_socket_option(fd, level, name, value)
    }

    fn udp_encap_type(&self, fd: RawFd) -> io::Result<i32> {
        KernelSyscalls.udp_encap_type(fd)
    }

    fn fd_owner(&self, fd: RawFd) -> io::Result<FdStat> {
        KernelSyscalls.fd_owner(fd)
    }

    fn chown_fd(&self, fd: RawFd, uid: u32) -> io::Result<()> {
        KernelSyscalls.chown_fd(fd, uid)
    }

    fn interface_names(&self) -> Result<Vec<String>> {
        let out = exec_in(&self.ns, "ls", &["/sys/class/net"])?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
///
/// Use this at the beginning of integration tests that require root privileges.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

/// Skip the test if not running as root (for non-Result functions).
#[macro_export]
macro_rules! require_root_void {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return;
        }
    };
}
