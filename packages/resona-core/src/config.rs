//! Device configuration types.
//!
//! A [`DeviceConfig`] is immutable for the lifetime of a session. The host
//! owns persistence and replaces the configuration wholesale on
//! reconfiguration, which tears down and rebuilds the session.

use serde::{Deserialize, Serialize};

/// Default volume step (percent) for volume up/down commands.
pub const DEFAULT_VOLUME_STEP: f64 = 2.0;

/// Configuration of a single receiver, supplied by the host at setup time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable device identifier, assigned during setup.
    pub id: String,
    /// Friendly name shown to the user.
    pub name: String,
    /// Network address (IP or hostname) of the receiver.
    pub address: String,
    /// Keep the connection open even while the device is powered off.
    #[serde(default)]
    pub always_active: bool,
    /// Volume step in percent for up/down commands.
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    /// Wired MAC address, used to reconcile address changes after discovery.
    #[serde(default)]
    pub mac_address_wired: Option<String>,
    /// Wireless MAC address, used to reconcile address changes after discovery.
    #[serde(default)]
    pub mac_address_wifi: Option<String>,
}

fn default_volume_step() -> f64 {
    DEFAULT_VOLUME_STEP
}

impl DeviceConfig {
    /// Creates a configuration with default flags and volume step.
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            always_active: false,
            volume_step: DEFAULT_VOLUME_STEP,
            mac_address_wired: None,
            mac_address_wifi: None,
        }
    }
}
