//! Device session: connection lifecycle and command execution.
//!
//! A [`DeviceSession`] owns one receiver's logical connection across an
//! unreliable network: it caches device facts on connect, fans push
//! notifications out to subscribers, buffers or retries commands issued
//! while the device is unreachable, and frees the persistent connection
//! when the device stays powered off.
//!
//! Submodules:
//! - [`device`]: the session struct, connect/disconnect/reconnect machinery
//! - [`commands`]: the uniform retry/buffer policy around outward commands
//! - [`notifications`]: push-notification handlers (diff-only updates)
//! - [`watchdog`]: auto-disconnect after prolonged power-off
//! - [`buffer`]: the deferred command buffer

use std::time::Duration;

mod buffer;
mod commands;
mod device;
mod notifications;
mod watchdog;

#[cfg(test)]
pub(crate) mod fixtures;

pub use device::DeviceSession;

/// Timeout for liveness probes and initial transport calls.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a non-bufferable command waits for an in-flight reconnect
/// before giving up.
pub const COMMAND_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Fixed delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consecutive reconnect failures before the loop gives up.
pub const MAX_RECONNECT_FAILURES: u32 = 10;

/// Maximum age of a buffered command; older entries are dropped unexecuted.
pub const BUFFERED_COMMAND_TTL: Duration = Duration::from_secs(30);

/// Poll interval of the power-off watchdog.
pub const POWER_OFF_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Number of watchdog polls before the connection is torn down.
pub const POWER_OFF_CHECKS: u32 = 10;

/// Sound setting target controlling the surround program.
pub const SOUND_FIELD_TARGET: &str = "soundField";
