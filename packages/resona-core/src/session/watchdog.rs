//! Auto-disconnect watchdog for powered-off devices.
//!
//! A receiver that powers off drops nothing immediately - the control
//! connection stays up. To avoid holding it open forever, a power-off on a
//! device that is not configured always-active arms this watchdog: it polls
//! the cached state and, if the device never comes back on, tears the
//! session's connections down and frees the persistent connection.

use std::sync::Arc;

use crate::state::PlayerState;

use super::device::DeviceSession;
use super::{POWER_OFF_CHECKS, POWER_OFF_POLL_INTERVAL};

impl DeviceSession {
    /// Arms the watchdog unless one is already running.
    pub(crate) fn start_watchdog(self: &Arc<Self>) {
        let mut slot = self.watchdog_task.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        log::debug!(
            "[{}] device powered off, arming auto-disconnect watchdog",
            self.config.id
        );
        let session = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            session.run_watchdog().await;
        }));
    }

    /// Cancels a running watchdog. Safe to call when none is armed.
    pub(crate) fn cancel_watchdog(&self) {
        if let Some(handle) = self.watchdog_task.lock().take() {
            handle.abort();
        }
    }

    /// Polls until the device leaves the off/unknown states or the polling
    /// window runs out; in the latter case the device is treated as truly
    /// gone and the connections are closed.
    async fn run_watchdog(self: Arc<Self>) {
        for _ in 0..POWER_OFF_CHECKS {
            tokio::time::sleep(POWER_OFF_POLL_INTERVAL).await;
            let state = self.state.read().state;
            if !matches!(
                state,
                PlayerState::Off | PlayerState::Unknown | PlayerState::Unavailable
            ) {
                log::debug!(
                    "[{}] device is back ({:?}), keeping the connection",
                    self.config.id,
                    state
                );
                return;
            }
        }
        log::info!(
            "[{}] device stayed off for {}s, closing connections",
            self.config.id,
            POWER_OFF_CHECKS as u64 * POWER_OFF_POLL_INTERVAL.as_secs()
        );
        self.disconnect().await;
    }
}
