//! Error types for netlink and XFRM operations.
//!
//! Every error carries a numeric status code in errno space, available
//! through [`Error::errno`]. Callers should branch on that code rather than
//! on the rendered message.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations or other syscalls.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opening or binding the netlink socket failed.
    #[error("failed to open netlink socket: {0}")]
    Socket(#[source] io::Error),

    /// The socket accepted fewer bytes than the framed request.
    #[error("short netlink write: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Total request length.
        expected: usize,
        /// Bytes actually written.
        actual: usize,
    },

    /// The kernel response could not be interpreted.
    #[error("malformed netlink response: {0}")]
    MalformedResponse(String),

    /// The kernel reported NLMSG_OVERRUN.
    #[error("kernel netlink buffer overrun")]
    KernelBufferOverrun,

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Sequence number mismatch.
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Expected sequence number.
        expected: u32,
        /// Actual sequence number received.
        actual: u32,
    },

    /// A caller-supplied argument was rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The address family is not supported for the requested operation.
    #[error("address family not supported: {0}")]
    AddressFamilyNotSupported(String),

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
}

impl Error {
    /// Create a kernel error from a netlink error payload (negative errno).
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Create a kernel error with operation context.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::KernelWithContext {
            operation: operation.into(),
            errno: -errno,
            message,
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Numeric status code for this error, in errno space.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Io(e) | Self::Socket(e) => e.raw_os_error().unwrap_or(libc::EIO),
            Self::ShortWrite { .. } => libc::EIO,
            Self::MalformedResponse(_)
            | Self::SequenceMismatch { .. }
            | Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidAttribute(_) => libc::EBADMSG,
            Self::KernelBufferOverrun => libc::ENOBUFS,
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => *errno,
            Self::InvalidArgument(_) => libc::EINVAL,
            Self::AddressFamilyNotSupported(_) => libc::EAFNOSUPPORT,
            Self::PermissionDenied(_) => libc::EPERM,
        }
    }

    /// Get the errno value if this error was reported by the kernel.
    pub fn kernel_errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, ESRCH).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), libc::ENOENT | libc::ENODEV | libc::ESRCH)
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), libc::EPERM | libc::EACCES)
    }

    /// Check if this is a "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == libc::EEXIST
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        self.errno() == libc::EBUSY
    }

    /// Check if this is an invalid-argument error (EINVAL).
    pub fn is_invalid_argument(&self) -> bool {
        self.errno() == libc::EINVAL
    }
}
