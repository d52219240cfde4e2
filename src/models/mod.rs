//! Data models

use std::collections::HashMap;

/// A device associated with the router, keyed by MAC address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub mac: String,
    pub ip: String,
    /// Display name, already percent-decoded
    pub hostname: String,
}

impl Device {
    pub fn new(mac: impl Into<String>, ip: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            ip: ip.into(),
            hostname: hostname.into(),
        }
    }
}

/// Devices reported online by the router at one poll, keyed by MAC
pub type Snapshot = HashMap<String, Device>;

/// Last-seen attributes for every MAC observed since startup
pub type KnownDevices = HashMap<String, Device>;
