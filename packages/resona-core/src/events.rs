//! Session event fan-out to entity adapters.
//!
//! Each session owns a `tokio::sync::broadcast` channel; adapters subscribe
//! and receive [`SessionEvent`]s. `Update` carries either `None` ("refetch
//! everything" after a full reconnect) or the subset of attributes that
//! actually changed.

use serde::Serialize;

use crate::state::AttributeMap;

/// Capacity of a session's event channel.
///
/// Adapters that fall this far behind are lagged by the broadcast channel
/// and should refetch the full snapshot.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Events emitted by a device session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A connection attempt is in progress.
    Connecting {
        /// The session's stable device identifier.
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// The session established a connection and refreshed its cache.
    Connected {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// The session tore its connection down.
    Disconnected {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// A non-recoverable problem with the device.
    Error {
        #[serde(rename = "deviceId")]
        device_id: String,
        /// Human-readable description.
        message: String,
    },
    /// Device attributes changed.
    Update {
        #[serde(rename = "deviceId")]
        device_id: String,
        /// `None` means the full state was refreshed and subscribers should
        /// pull the snapshot; otherwise only the changed keys are present.
        attributes: Option<AttributeMap>,
    },
}

impl SessionEvent {
    /// Returns the device id the event belongs to.
    pub fn device_id(&self) -> &str {
        match self {
            Self::Connecting { device_id }
            | Self::Connected { device_id }
            | Self::Disconnected { device_id }
            | Self::Error { device_id, .. }
            | Self::Update { device_id, .. } => device_id,
        }
    }
}
