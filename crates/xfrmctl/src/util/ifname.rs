//! Interface name utilities.

use std::ffi::OsString;
use std::io;
use std::path::Path;

use crate::netlink::{Error, Result};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Directory listing every network interface of the namespace.
pub const SYSFS_NET: &str = "/sys/class/net";

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("empty interface name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(Error::InvalidArgument(format!(
            "interface name too long (max {} chars): {}",
            IFNAMSIZ - 1,
            name
        )));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "interface name contains invalid characters: {:?}",
            name
        )));
    }

    // Check for whitespace
    if name.chars().any(|c| c.is_whitespace()) {
        return Err(Error::InvalidArgument(format!(
            "interface name contains whitespace: {:?}",
            name
        )));
    }

    Ok(())
}

/// Get all interface names below `dir`, sorted.
///
/// A directory entry that cannot be read fails the whole listing, so no
/// interface is silently left out.
pub fn list_interfaces_in(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)?;
    collect_names(entries.map(|entry| entry.map(|e| e.file_name())))
}

fn collect_names(entries: impl IntoIterator<Item = io::Result<OsString>>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in entries {
        names.push(entry?.to_string_lossy().to_string());
    }

    names.sort();
    Ok(names)
}

/// Get all interface names.
pub fn list_interfaces() -> Result<Vec<String>> {
    list_interfaces_in(SYSFS_NET)
}

/// Names from `names` that start with `prefix`.
pub fn with_prefix<'a>(names: &'a [String], prefix: &'a str) -> impl Iterator<Item = &'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(move |name| name.starts_with(prefix))
}
