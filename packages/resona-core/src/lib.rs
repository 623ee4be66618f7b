//! Resona Core - receiver session engine.
//!
//! This crate bridges a home-theater receiver's proprietary control protocol
//! to a smart-remote platform's generic media-player abstraction. Its heart
//! is the [`DeviceSession`]: a connection lifecycle manager that keeps one
//! logical device session alive across an unreliable network, survives the
//! receiver powering fully off, buffers or retries commands issued while
//! disconnected, and fans push notifications out to subscribers - without
//! duplicate or lost state transitions and without blocking the caller.
//!
//! # Architecture
//!
//! - [`transport`]: the [`ReceiverTransport`] capability trait the session
//!   drives the device through; the wire protocol lives behind it
//! - [`session`]: the device session - connect/reconnect state machine,
//!   command retry/buffer policy, notification dispatch, power-off watchdog
//! - [`events`]: broadcast fan-out of [`SessionEvent`]s to entity adapters
//! - [`registry`]: id-to-session registry owned by the composition root
//! - [`state`]: player states, the derived-state rule and attribute keys
//! - [`config`], [`types`], [`error`]: configuration, device data
//!   containers and the error/status surface
//!
//! # Command surface
//!
//! Every command returns a [`CommandStatus`] and never raises. Commands
//! that are meaningful to issue once the device comes back (power, source
//! and sound-mode selection) are buffered while it is unreachable and
//! replayed in order on reconnect; everything else waits a bounded time
//! for the in-flight reconnect and then reports failure.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{DeviceConfig, DEFAULT_VOLUME_STEP};
pub use error::{CommandStatus, TransportError, TransportResult};
pub use events::SessionEvent;
pub use registry::DeviceRegistry;
pub use session::DeviceSession;
pub use state::{derive_state, map_playback_state, AttributeMap, MediaAttribute, PlayerState};
pub use transport::{
    ContentChange, PowerChange, ReceiverNotification, ReceiverTransport, VolumeChange,
};
pub use types::{
    InputSource, InterfaceInfo, PlayInfo, SoundModeCandidate, SoundModeSetting, SystemInfo,
    VolumeControl,
};
