//! Shared utilities for xfrmctl.

pub mod ifname;
