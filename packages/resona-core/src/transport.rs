//! Receiver transport abstraction.
//!
//! The session drives a receiver exclusively through [`ReceiverTransport`],
//! which hides the wire protocol (discovery, request/response calls and the
//! push-notification channel). Every call fails with a uniform
//! [`TransportError`]; the session owns all retry policy.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::types::{
    InputSource, InterfaceInfo, PlayInfo, SoundModeSetting, SystemInfo, VolumeControl,
};

/// A volume or mute change pushed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeChange {
    /// New raw volume value.
    pub volume: i32,
    /// New mute state.
    pub muted: bool,
}

/// A content or input change pushed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// Play info for the slot that changed.
    pub play_info: PlayInfo,
    /// Whether the change identifies a newly active input (by URI).
    pub is_input: bool,
}

/// A power state change pushed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerChange {
    /// New power state.
    pub powered: bool,
}

/// Push notifications delivered on the transport's notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverNotification {
    /// Volume or mute changed.
    Volume(VolumeChange),
    /// Playback content or active input changed.
    Content(ContentChange),
    /// Power state changed.
    Power(PowerChange),
    /// The notification connection itself dropped.
    ConnectionDropped {
        /// Transport-level reason, for logging only.
        reason: String,
    },
}

/// Capability trait for one receiver's control connection.
///
/// Implementations wrap the device-control protocol client. All methods are
/// suspension points; the session never holds a state lock across them.
#[async_trait]
pub trait ReceiverTransport: Send + Sync {
    /// Cheap liveness probe (queries the device's supported methods).
    async fn probe_liveness(&self) -> TransportResult<()>;

    /// Fetches static interface information.
    async fn interface_info(&self) -> TransportResult<InterfaceInfo>;

    /// Fetches system information (serial number and MAC addresses).
    async fn system_info(&self) -> TransportResult<SystemInfo>;

    /// Fetches a sound setting and its candidate values by target name.
    async fn sound_mode_settings(&self, target: &str) -> TransportResult<Vec<SoundModeSetting>>;

    /// Fetches the device's volume controls.
    async fn volume_controls(&self) -> TransportResult<Vec<VolumeControl>>;

    /// Fetches the current power state.
    async fn power_status(&self) -> TransportResult<bool>;

    /// Fetches the input list in device order.
    async fn inputs(&self) -> TransportResult<Vec<InputSource>>;

    /// Fetches play info for all playback slots.
    async fn play_info(&self) -> TransportResult<Vec<PlayInfo>>;

    /// Powers the device on or off.
    async fn set_power(&self, on: bool) -> TransportResult<()>;

    /// Sets the raw volume on the device's primary volume control.
    async fn set_volume(&self, volume: i32) -> TransportResult<()>;

    /// Mutes or unmutes the primary volume control.
    async fn set_mute(&self, mute: bool) -> TransportResult<()>;

    /// Activates the input identified by `uri`.
    async fn activate_input(&self, uri: &str) -> TransportResult<()>;

    /// Sets a sound setting to one of its candidate values.
    async fn set_sound_mode(&self, target: &str, value: &str) -> TransportResult<()>;

    /// Opaque pass-through call for protocol-specific actions (playback
    /// transport controls, zone settings) keyed by method name.
    async fn raw_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> TransportResult<serde_json::Value>;

    /// Opens the push-notification channel and returns its receiver.
    ///
    /// A repeated call replaces the previous channel; the old receiver ends.
    async fn start_notifications(
        &self,
    ) -> TransportResult<mpsc::Receiver<ReceiverNotification>>;

    /// Stops the push-notification channel. Safe to call when not listening.
    async fn stop_notifications(&self);
}
