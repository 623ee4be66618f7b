//! Data containers returned by the receiver transport.
//!
//! These are the facts the session caches between reconnects: device
//! identity, volume control, input list, sound modes and play info.

use serde::{Deserialize, Serialize};

/// Static interface information, assumed immutable for a device's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Manufacturer product line (e.g. a receiver family name).
    pub product_name: Option<String>,
    /// Device model name.
    pub model_name: Option<String>,
    /// Product category reported by the device.
    pub product_category: Option<String>,
    /// Control interface version.
    pub interface_version: Option<String>,
}

/// System information, source of the stable unique id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Serial number, preferred unique id.
    pub serial_number: Option<String>,
    /// Wired MAC address, first fallback.
    pub mac_address: Option<String>,
    /// Wireless MAC address, second fallback.
    pub wireless_mac_address: Option<String>,
    /// Firmware version.
    pub version: Option<String>,
}

/// A volume control reported by the device.
///
/// Devices may report several controls (one per output zone); the session
/// uses the first one. Multi-zone control is not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeControl {
    /// Output this control belongs to, empty for the main zone.
    pub output: Option<String>,
    /// Lowest raw volume value.
    pub min_volume: i32,
    /// Highest raw volume value.
    pub max_volume: i32,
    /// Current raw volume value.
    pub volume: i32,
    /// Current mute state.
    pub muted: bool,
}

/// An input source reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    /// Input URI, the key the device addresses inputs by.
    pub uri: String,
    /// Display title of the input.
    pub title: String,
    /// Whether this input is currently selected.
    pub active: bool,
}

/// Play info for one playback slot.
///
/// Devices report one slot per playback function; at most one of them is
/// the actually-playing slot (state present and not `STOPPED`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayInfo {
    /// Raw playback state string (`PLAYING`, `PAUSED`, `STOPPED`).
    pub state: Option<String>,
    /// URI of the content or input being played.
    pub uri: Option<String>,
    /// Track or program title.
    pub title: Option<String>,
    /// Artist, for music content.
    pub artist: Option<String>,
    /// Album name, for music content.
    pub album: Option<String>,
    /// Artwork URL for the current content.
    pub thumbnail_url: Option<String>,
}

/// A sound-mode setting with its candidate values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundModeSetting {
    /// Setting target identifier on the device.
    pub target: String,
    /// Currently selected value.
    pub current_value: Option<String>,
    /// Selectable values.
    pub candidates: Vec<SoundModeCandidate>,
}

/// One selectable sound-mode value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundModeCandidate {
    /// Display title of the mode.
    pub title: String,
    /// Opaque value sent back to the device on selection.
    pub value: String,
}
