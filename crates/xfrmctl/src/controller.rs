//! The XFRM control plane facade.
//!
//! [`XfrmController`] is the one surface callers use. Each operation
//! validates its arguments without touching the kernel, then opens a fresh
//! netlink socket, sends exactly one request (SPI allocation may send
//! several on the same socket) and waits for the answer.
//!
//! [`init`](XfrmController::init) must run once, before the controller is
//! shared. It takes `&mut self` because it decides whether tunnel
//! interfaces are XFRM interfaces (addressed by interface id) or legacy VTI
//! devices (addressed by mark). Every other operation takes `&self` and may
//! be called from several threads at once.
//!
//! # Example
//!
//! ```ignore
//! use xfrmctl::{ControllerConfig, Direction, Mode, SaParams, XfrmController};
//!
//! let mut xfrm = XfrmController::new(ControllerConfig::default())?;
//! xfrm.init()?;
//!
//! let spi = xfrm.allocate_spi(1, "192.0.2.1", "192.0.2.2", 0)?;
//! xfrm.add_or_update_security_association(
//!     &SaParams::new(1, Mode::Transport, "192.0.2.1", "192.0.2.2", spi)
//!         .aead("rfc4106(gcm(aes))", key, 128),
//! )?;
//! xfrm.apply_transport_mode_transform(sock.as_raw_fd(), 1, Direction::Out, "192.0.2.1", "192.0.2.2", spi)?;
//! ```

use std::fmt;
use std::os::unix::io::RawFd;

use tracing::{debug, info, warn};
use zerocopy::IntoBytes;

use crate::config::ControllerConfig;
use crate::info::{
    AddressFamily, CommonInfo, Direction, Mode, PolicyParams, SaId, SaInfo, SaParams, SpInfo,
    TunnelParams,
};
use crate::netlink::link::{
    LINK_CREATE_FLAGS, LINK_UPDATE_FLAGS, LinkConfig, VtiLink, XfrmInterfaceLink, delete_link,
};
use crate::netlink::xfrm::spi::{INVALID_SPI, RandomSpi};
use crate::netlink::xfrm::{
    IP_XFRM_POLICY, IPV6_XFRM_POLICY, SecurityAssociation, SecurityPolicy,
    UDP_ENCAP_ESPINUDP, UDP_ENCAP_ESPINUDP_NON_IKE, XFRM_MSG_NEWPOLICY, XFRM_MSG_UPDPOLICY,
    XfrmMark, request,
};
use crate::netlink::{Connection, Error, MessageBuilder, Protocol, Result};
use crate::sys::{KernelSyscalls, Syscalls};
use crate::util::ifname;

/// Kernel IPsec control plane.
#[derive(Debug)]
pub struct XfrmController<S: Syscalls = KernelSyscalls> {
    syscalls: S,
    config: ControllerConfig,
    xfrm_if_supported: bool,
}

impl XfrmController<KernelSyscalls> {
    /// Create a controller talking to the running kernel.
    ///
    /// Call [`init`](Self::init) before any other operation.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        Self::with_syscalls(KernelSyscalls, config)
    }
}

impl<S: Syscalls> XfrmController<S> {
    /// Create a controller over the given syscall implementation.
    pub fn with_syscalls(syscalls: S, config: ControllerConfig) -> Result<Self> {
        Self::with_xfrm_interface_support(syscalls, config, false)
    }

    /// Create a controller with a known XFRM interface capability, skipping
    /// the probe normally done by [`init`](Self::init).
    pub fn with_xfrm_interface_support(
        syscalls: S,
        config: ControllerConfig,
        supported: bool,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            syscalls,
            config,
            xfrm_if_supported: supported,
        })
    }

    /// Whether tunnel interfaces are XFRM interfaces rather than VTI.
    pub fn xfrm_interface_supported(&self) -> bool {
        self.xfrm_if_supported
    }

    /// The controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The syscall implementation.
    pub fn syscalls(&self) -> &S {
        &self.syscalls
    }

    fn connect(&self, protocol: Protocol) -> Result<Connection<S::Socket>> {
        let socket = self.syscalls.open_netlink(protocol)?;
        Ok(Connection::from_socket(socket, self.config.recv_buffer_size))
    }

    fn xfrm_request(&self, builder: MessageBuilder) -> Result<()> {
        self.connect(Protocol::Xfrm)?.send_message(builder)?;
        Ok(())
    }

    fn route_request(&self, builder: MessageBuilder) -> Result<()> {
        self.connect(Protocol::Route)?.send_message(builder)?;
        Ok(())
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Reset the kernel to a clean state.
    ///
    /// Removes every tunnel interface carrying the configured prefix, probes
    /// for XFRM interface support, then flushes all SAs and policies.
    pub fn init(&mut self) -> Result<()> {
        self.flush_interfaces()?;
        self.xfrm_if_supported = self.probe_xfrm_interface();

        let conn = self.connect(Protocol::Xfrm)?;
        conn.send_message(request::flush_sa())
            .map_err(|e| e.with_context("flushing SAs"))?;
        conn.send_message(request::flush_policy())
            .map_err(|e| e.with_context("flushing policies"))?;

        info!(
            xfrm_if_supported = self.xfrm_if_supported,
            "XFRM state initialized"
        );
        Ok(())
    }

    /// Probe for XFRM interface support without touching existing state.
    ///
    /// Lets a short-lived process pick the right addressing scheme for a
    /// kernel that another controller has already initialized.
    pub fn detect_xfrm_interface_support(&mut self) -> bool {
        self.xfrm_if_supported = self.probe_xfrm_interface();
        self.xfrm_if_supported
    }

    fn flush_interfaces(&self) -> Result<()> {
        let names = self.syscalls.interface_names()?;
        for name in ifname::with_prefix(&names, &self.config.interface_prefix) {
            debug!(name, "removing stale tunnel interface");
            self.remove_tunnel_interface(name)?;
        }
        Ok(())
    }

    /// Create and remove a disposable XFRM interface. Both must succeed.
    fn probe_xfrm_interface(&self) -> bool {
        let name = &self.config.probe_interface_name;
        let created = XfrmInterfaceLink::new(name.as_str(), self.config.probe_interface_id)
            .build(LINK_CREATE_FLAGS)
            .and_then(|msg| self.route_request(msg));
        let removed = self.remove_tunnel_interface(name);

        match (created, removed) {
            (Ok(()), Ok(())) => true,
            (created, removed) => {
                warn!(
                    create_error = ?created.err(),
                    remove_error = ?removed.err(),
                    "XFRM interfaces unavailable, falling back to VTI"
                );
                false
            }
        }
    }

    // ========================================================================
    // Security Associations
    // ========================================================================

    /// Reserve an SPI for an SA from `src_addr` to `dst_addr`.
    ///
    /// A non-zero `requested_spi` reserves exactly that value. Otherwise
    /// candidates from the configured range are tried in random order until
    /// the kernel accepts one. Returns the SPI in host byte order.
    pub fn allocate_spi(
        &self,
        transform_id: u32,
        src_addr: &str,
        dst_addr: &str,
        requested_spi: u32,
    ) -> Result<u32> {
        debug!(
            transform_id,
            src_addr,
            dst_addr,
            requested_spi = format_args!("{:#010x}", requested_spi),
            "allocating SPI"
        );

        let common = CommonInfo::resolve(
            src_addr,
            dst_addr,
            INVALID_SPI,
            XfrmMark::default(),
            transform_id,
            0,
            self.xfrm_if_supported,
        )?;

        let (min, max) = if requested_spi != INVALID_SPI {
            (requested_spi, requested_spi)
        } else {
            (self.config.spi_min, self.config.spi_max)
        };

        let conn = self.connect(Protocol::Xfrm)?;
        let mut last_error = None;

        for spi in RandomSpi::new(min, max) {
            let msg = request::allocate_spi(&common, spi, spi, self.config.replay_window);
            match conn.send_message(msg) {
                Ok(_) => {
                    debug!(spi = format_args!("{:#010x}", spi), "allocated SPI");
                    return Ok(spi);
                }
                // In use, try the next candidate
                Err(e) if e.kernel_errno() == Some(libc::ENOENT) => last_error = Some(e),
                Err(e) => {
                    warn!(error = %e, "SPI allocation failed");
                    return Err(e);
                }
            }
        }

        warn!(min, max, "no free SPI in range");
        Err(last_error.unwrap_or_else(|| Error::from_errno(-libc::ENOENT)))
    }

    /// Add an SA, or replace the SA with the same identity.
    pub fn add_or_update_security_association(&self, params: &SaParams) -> Result<()> {
        debug!(?params, "adding or updating SA");

        let sa = params.resolve(self.xfrm_if_supported)?;
        request::validate_sa(&sa, self.xfrm_if_supported)?;

        self.xfrm_request(request::update_sa(&sa, self.config.replay_window))
            .map_err(|e| {
                warn!(error = %e, "updating SA failed");
                e.with_context("updating SA")
            })
    }

    /// Delete an SA.
    pub fn delete_security_association(&self, id: &SaId) -> Result<()> {
        debug!(?id, "deleting SA");

        let common = id.resolve(self.xfrm_if_supported)?;
        self.xfrm_request(request::delete_sa(&common)).map_err(|e| {
            warn!(error = %e, "deleting SA failed");
            e.with_context("deleting SA")
        })
    }

    // ========================================================================
    // Transport mode
    // ========================================================================

    /// Attach a transport-mode policy directly to a socket.
    ///
    /// Dual-stack IPv6 sockets accept both families; an IPv4 socket only
    /// accepts an IPv4 transform.
    pub fn apply_transport_mode_transform(
        &self,
        socket_fd: RawFd,
        transform_id: u32,
        direction: Direction,
        src_addr: &str,
        dst_addr: &str,
        spi: u32,
    ) -> Result<()> {
        debug!(
            socket_fd,
            transform_id,
            ?direction,
            src_addr,
            dst_addr,
            spi = format_args!("{:#010x}", spi),
            "applying transport mode transform"
        );

        let socket_family = self.syscalls.socket_family(socket_fd)?;

        let common = CommonInfo::resolve(
            src_addr,
            dst_addr,
            spi,
            XfrmMark::default(),
            transform_id,
            0,
            self.xfrm_if_supported,
        )?;

        if socket_family == libc::AF_INET && common.family != AddressFamily::Inet {
            return Err(Error::InvalidArgument(format!(
                "IPv4 socket cannot use an {} transform",
                common.family
            )));
        }

        let sp = SpInfo {
            sa: SaInfo {
                common,
                mode: Mode::Transport,
                ..Default::default()
            },
            selector_family: common.family,
        };
        let policy = request::socket_policy(&sp, direction);

        let (level, name) = xfrm_policy_option(socket_family)?;
        self.syscalls
            .set_socket_option(socket_fd, level, name, policy.as_bytes())
            .map_err(|e| {
                warn!(socket_fd, error = %e, "setting socket policy failed");
                Error::Io(e)
            })
    }

    /// Remove every transport-mode policy from a socket.
    pub fn remove_transport_mode_transform(&self, socket_fd: RawFd) -> Result<()> {
        debug!(socket_fd, "removing transport mode transform");

        let socket_family = self.syscalls.socket_family(socket_fd)?;
        let (level, name) = xfrm_policy_option(socket_family)?;

        // An empty policy clears both directions
        self.syscalls
            .set_socket_option(socket_fd, level, name, &[])
            .map_err(|e| {
                warn!(socket_fd, error = %e, "clearing socket policy failed");
                Error::Io(e)
            })
    }

    // ========================================================================
    // Security Policies
    // ========================================================================

    /// Add a tunnel-mode policy.
    pub fn add_security_policy(&self, params: &PolicyParams) -> Result<()> {
        self.update_policy(params, XFRM_MSG_NEWPOLICY)
    }

    /// Replace a tunnel-mode policy.
    pub fn update_security_policy(&self, params: &PolicyParams) -> Result<()> {
        self.update_policy(params, XFRM_MSG_UPDPOLICY)
    }

    fn update_policy(&self, params: &PolicyParams, msg_type: u16) -> Result<()> {
        debug!(
            ?params,
            msg_type = request_name(msg_type),
            "updating policy"
        );

        let sp = params.resolve(self.xfrm_if_supported)?;
        self.xfrm_request(request::update_policy(&sp, params.direction(), msg_type))
            .map_err(|e| {
                warn!(error = %e, "policy update failed");
                e.with_context(request_name(msg_type))
            })
    }

    /// Delete a tunnel-mode policy. Template addresses and SPI are ignored.
    pub fn delete_security_policy(&self, params: &PolicyParams) -> Result<()> {
        debug!(?params, "deleting policy");

        let sp = params.resolve_for_delete(self.xfrm_if_supported);
        self.xfrm_request(request::delete_policy(&sp, params.direction()))
            .map_err(|e| {
                warn!(error = %e, "policy delete failed");
                e.with_context("deleting policy")
            })
    }

    // ========================================================================
    // Tunnel interfaces
    // ========================================================================

    /// Create a tunnel interface, or modify it when `is_update` is set.
    ///
    /// Creates an XFRM interface when supported, otherwise a VTI/VTI6 device
    /// from the endpoints and keys.
    pub fn add_or_update_tunnel_interface(
        &self,
        params: &TunnelParams,
        is_update: bool,
    ) -> Result<()> {
        debug!(
            ?params,
            is_update,
            xfrm_if = self.xfrm_if_supported,
            "adding or updating tunnel interface"
        );

        let flags = if is_update {
            LINK_UPDATE_FLAGS
        } else {
            LINK_CREATE_FLAGS
        };

        let msg = if self.xfrm_if_supported {
            XfrmInterfaceLink::new(params.name(), params.if_id()).build(flags)?
        } else {
            let (local, remote) = params.vti_endpoints()?;
            VtiLink::new(params.name(), local, remote)
                .ikey(params.ikey())
                .okey(params.okey())
                .build(flags)?
        };

        self.route_request(msg).map_err(|e| {
            warn!(name = params.name(), error = %e, "tunnel interface request failed");
            e.with_context(format!("configuring tunnel interface {}", params.name()))
        })
    }

    /// Delete a tunnel interface.
    pub fn remove_tunnel_interface(&self, name: &str) -> Result<()> {
        debug!(name, "removing tunnel interface");

        let msg = delete_link(name)?;
        self.route_request(msg)
            .map_err(|e| e.with_context(format!("deleting tunnel interface {}", name)))
    }

    // ========================================================================
    // Encapsulation socket ownership
    // ========================================================================

    /// Hand a UDP encapsulation socket owned by `caller_uid` over to `new_uid`.
    ///
    /// The descriptor must be a socket owned by the caller with ESP-in-UDP
    /// encapsulation enabled. Nothing is changed if any check fails.
    pub fn set_encap_socket_owner(
        &self,
        socket_fd: RawFd,
        new_uid: u32,
        caller_uid: u32,
    ) -> Result<()> {
        debug!(socket_fd, new_uid, caller_uid, "transferring encap socket");

        let stat = self.syscalls.fd_owner(socket_fd)?;
        if stat.uid != caller_uid {
            return Err(Error::PermissionDenied(format!(
                "socket is owned by uid {}, not the caller",
                stat.uid
            )));
        }
        if !stat.is_socket {
            return Err(Error::InvalidArgument(format!(
                "file descriptor {} is not a socket",
                socket_fd
            )));
        }

        let encap = self.syscalls.udp_encap_type(socket_fd)?;
        if encap != i32::from(UDP_ENCAP_ESPINUDP) && encap != i32::from(UDP_ENCAP_ESPINUDP_NON_IKE)
        {
            return Err(Error::InvalidArgument(format!(
                "socket has no ESP-in-UDP encapsulation (UDP_ENCAP {})",
                encap
            )));
        }

        self.syscalls.chown_fd(socket_fd, new_uid)?;
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// List every SA in the kernel database.
    pub fn security_associations(&self) -> Result<Vec<SecurityAssociation>> {
        self.connect(Protocol::Xfrm)?.security_associations()
    }

    /// List every policy in the kernel database.
    pub fn security_policies(&self) -> Result<Vec<SecurityPolicy>> {
        self.connect(Protocol::Xfrm)?.security_policies()
    }

    /// Write a short status report.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "XfrmController")?;
        writeln!(
            out,
            "  XFRM-I support: {}",
            u8::from(self.xfrm_if_supported)
        )
    }
}

/// Socket option level and name that hold a socket's XFRM policy.
fn xfrm_policy_option(socket_family: i32) -> Result<(i32, i32)> {
    match socket_family {
        libc::AF_INET => Ok((libc::SOL_IP, IP_XFRM_POLICY)),
        libc::AF_INET6 => Ok((libc::SOL_IPV6, IPV6_XFRM_POLICY)),
        other => Err(Error::AddressFamilyNotSupported(format!(
            "socket family {} cannot carry an XFRM policy",
            other
        ))),
    }
}

fn request_name(msg_type: u16) -> &'static str {
    crate::netlink::xfrm::xfrm_msg_name(msg_type)
}
