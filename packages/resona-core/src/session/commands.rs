//! Uniform retry/buffer policy around every outward command.
//!
//! Every public command goes through [`DeviceSession::execute`]: attempt
//! directly while available, otherwise make sure a reconnect loop is
//! running and either buffer the command (power/source/sound-mode) or wait
//! a bounded time for the reconnect and try once more (everything else).
//! No failure crosses the session boundary; callers get a status code.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::time::timeout;

use crate::error::{CommandStatus, TransportError};
use crate::state::{MediaAttribute, PlayerState};

use super::buffer::DeferredCommand;
use super::device::DeviceSession;
use super::{COMMAND_RETRY_WAIT, SOUND_FIELD_TARGET};

/// Failure of a single command attempt.
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    /// The transport call failed; retried per policy.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The command cannot succeed on this device (unknown source title,
    /// missing sound-mode configuration). Not retried.
    #[error("{0}")]
    Rejected(String),
}

impl DeviceSession {
    /// Applies the uniform command policy to one attempt closure.
    ///
    /// `deferred` marks the command as bufferable: when the device is
    /// unreachable it is enqueued and the caller gets `Ok` immediately.
    async fn execute<F, Fut>(
        self: &Arc<Self>,
        name: &str,
        deferred: Option<DeferredCommand>,
        op: F,
    ) -> CommandStatus
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), CommandError>>,
    {
        if self.is_available() {
            match op().await {
                Ok(()) => return CommandStatus::Ok,
                Err(CommandError::Rejected(reason)) => {
                    log::warn!("[{}] {} rejected: {}", self.config.id, name, reason);
                    return CommandStatus::BadRequest;
                }
                Err(CommandError::Transport(err)) => {
                    self.log_transport_failure(name, &err);
                    // fall through to the reconnect path
                }
            }
        }

        self.ensure_reconnect_loop();

        if let Some(command) = deferred {
            log::debug!(
                "[{}] buffering {} until the device is reachable",
                self.config.id,
                name
            );
            self.buffer.lock().push(command);
            return CommandStatus::Ok;
        }

        let mut availability = self.availability_rx();
        let wait = timeout(
            COMMAND_RETRY_WAIT,
            availability.wait_for(|available| *available),
        )
        .await;
        match wait {
            Ok(Ok(_)) => match op().await {
                Ok(()) => CommandStatus::Ok,
                Err(CommandError::Rejected(reason)) => {
                    log::warn!("[{}] {} rejected: {}", self.config.id, name, reason);
                    CommandStatus::BadRequest
                }
                Err(CommandError::Transport(err)) => {
                    self.log_transport_failure(name, &err);
                    CommandStatus::ServiceUnavailable
                }
            },
            _ => {
                log::debug!(
                    "[{}] {} timed out waiting for reconnection",
                    self.config.id,
                    name
                );
                CommandStatus::ServiceUnavailable
            }
        }
    }

    /// A powered-off device is expected to refuse commands; don't alarm the
    /// operator for those.
    fn log_transport_failure(&self, name: &str, err: &TransportError) {
        if self.state.read().state == PlayerState::Off {
            log::debug!(
                "[{}] {} failed while the device is off: {}",
                self.config.id,
                name,
                err
            );
        } else {
            log::error!("[{}] {} failed: {}", self.config.id, name, err);
        }
    }

    // ── public commands ─────────────────────────────────────────────────────

    /// Powers the device on. Bufferable.
    pub async fn power_on(self: &Arc<Self>) -> CommandStatus {
        self.execute("power_on", Some(DeferredCommand::PowerOn), || async move {
            self.transport.set_power(true).await?;
            Ok(())
        })
        .await
    }

    /// Powers the device off. Bufferable.
    pub async fn power_off(self: &Arc<Self>) -> CommandStatus {
        self.execute("power_off", Some(DeferredCommand::PowerOff), || async move {
            self.transport.set_power(false).await?;
            Ok(())
        })
        .await
    }

    /// Sets the volume as a percentage (0..=100) of the device's raw range.
    pub async fn set_volume(self: &Arc<Self>, level: f64) -> CommandStatus {
        if !(0.0..=100.0).contains(&level) {
            log::warn!(
                "[{}] set_volume rejected: {} out of range",
                self.config.id,
                level
            );
            return CommandStatus::BadRequest;
        }
        self.execute("set_volume", None, || async move {
            let raw = self.raw_volume_for_level(level);
            log::debug!("[{}] setting volume to raw {}", self.config.id, raw);
            self.transport.set_volume(raw).await?;
            // report the accepted level right away; the device confirms via
            // a volume notification
            let mut updated = crate::state::AttributeMap::new();
            updated.insert(MediaAttribute::Volume, json!(level));
            self.emit_update(updated);
            Ok(())
        })
        .await
    }

    /// Steps the volume up by the configured step.
    pub async fn volume_up(self: &Arc<Self>) -> CommandStatus {
        self.execute("volume_up", None, || async move {
            let raw = self.stepped_volume(1.0);
            self.transport.set_volume(raw).await?;
            Ok(())
        })
        .await
    }

    /// Steps the volume down by the configured step.
    pub async fn volume_down(self: &Arc<Self>) -> CommandStatus {
        self.execute("volume_down", None, || async move {
            let raw = self.stepped_volume(-1.0);
            self.transport.set_volume(raw).await?;
            Ok(())
        })
        .await
    }

    /// Mutes or unmutes the device.
    pub async fn set_mute(self: &Arc<Self>, muted: bool) -> CommandStatus {
        self.execute("set_mute", None, || async move {
            self.transport.set_mute(muted).await?;
            let mut updated = crate::state::AttributeMap::new();
            updated.insert(MediaAttribute::Muted, json!(muted));
            self.emit_update(updated);
            Ok(())
        })
        .await
    }

    /// Selects an input source by its display title. Bufferable.
    pub async fn select_source(self: &Arc<Self>, source: &str) -> CommandStatus {
        self.execute(
            "select_source",
            Some(DeferredCommand::SelectSource(source.to_string())),
            || async move { self.do_select_source(source).await },
        )
        .await
    }

    /// Selects a sound mode by its display title. Bufferable.
    pub async fn select_sound_mode(self: &Arc<Self>, mode: &str) -> CommandStatus {
        self.execute(
            "select_sound_mode",
            Some(DeferredCommand::SelectSoundMode(mode.to_string())),
            || async move { self.do_select_sound_mode(mode).await },
        )
        .await
    }

    /// Toggles play/pause on the current content.
    pub async fn play_pause(self: &Arc<Self>) -> CommandStatus {
        self.execute("play_pause", None, || async move {
            self.transport
                .raw_command("pausePlayingContent", json!({}))
                .await?;
            Ok(())
        })
        .await
    }

    /// Stops playback of the current content.
    pub async fn stop(self: &Arc<Self>) -> CommandStatus {
        self.execute("stop", None, || async move {
            self.transport
                .raw_command("stopPlayingContent", json!({}))
                .await?;
            Ok(())
        })
        .await
    }

    /// Skips to the next track.
    pub async fn next_track(self: &Arc<Self>) -> CommandStatus {
        self.execute("next_track", None, || async move {
            self.transport
                .raw_command("setPlayNextContent", json!({}))
                .await?;
            Ok(())
        })
        .await
    }

    /// Skips to the previous track.
    pub async fn previous_track(self: &Arc<Self>) -> CommandStatus {
        self.execute("previous_track", None, || async move {
            self.transport
                .raw_command("setPlayPreviousContent", json!({}))
                .await?;
            Ok(())
        })
        .await
    }

    /// Pass-through for protocol-specific actions (playback transport
    /// controls, zone settings) keyed by opaque method name.
    pub async fn send_raw_command(
        self: &Arc<Self>,
        method: &str,
        params: serde_json::Value,
    ) -> CommandStatus {
        self.execute(method, None, || {
            let params = params.clone();
            async move {
                self.transport.raw_command(method, params).await?;
                Ok(())
            }
        })
        .await
    }

    // ── command bodies ──────────────────────────────────────────────────────

    fn raw_volume_for_level(&self, level: f64) -> i32 {
        let st = self.state.read();
        (level * f64::from(st.volume_max - st.volume_min) / 100.0 + f64::from(st.volume_min))
            as i32
    }

    fn stepped_volume(&self, direction: f64) -> i32 {
        let st = self.state.read();
        let step = self.config.volume_step * f64::from(st.volume_max - st.volume_min) / 100.0;
        (st.volume + direction * step).clamp(f64::from(st.volume_min), f64::from(st.volume_max))
            as i32
    }

    /// Powers the device on, then activates the input titled `source`.
    ///
    /// The receiver only honors input switching while powered on.
    pub(crate) async fn do_select_source(&self, source: &str) -> Result<(), CommandError> {
        self.transport.set_power(true).await?;
        let uri = {
            let st = self.state.read();
            st.sources
                .iter()
                .find(|input| input.title == source)
                .map(|input| input.uri.clone())
        };
        let Some(uri) = uri else {
            return Err(CommandError::Rejected(format!(
                "unknown input source {source:?}"
            )));
        };
        log::debug!("[{}] activating input {}", self.config.id, uri);
        self.transport.activate_input(&uri).await?;
        Ok(())
    }

    /// Selects the sound-mode candidate titled `mode`.
    pub(crate) async fn do_select_sound_mode(&self, mode: &str) -> Result<(), CommandError> {
        let value = {
            let st = self.state.read();
            let Some(setting) = st.sound_mode.as_ref() else {
                return Err(CommandError::Rejected(
                    "device reports no sound-mode setting".into(),
                ));
            };
            setting
                .candidates
                .iter()
                .find(|candidate| candidate.title == mode)
                .map(|candidate| candidate.value.clone())
        };
        let Some(value) = value else {
            return Err(CommandError::Rejected(format!("unknown sound mode {mode:?}")));
        };
        self.transport.set_sound_mode(SOUND_FIELD_TARGET, &value).await?;
        Ok(())
    }

    /// Executes one buffered command directly against the transport.
    async fn run_deferred(&self, command: &DeferredCommand) -> Result<(), CommandError> {
        match command {
            DeferredCommand::PowerOn => self.transport.set_power(true).await?,
            DeferredCommand::PowerOff => self.transport.set_power(false).await?,
            DeferredCommand::SelectSource(source) => self.do_select_source(source).await?,
            DeferredCommand::SelectSoundMode(mode) => self.do_select_sound_mode(mode).await?,
        }
        Ok(())
    }

    /// Replays buffered commands in submission order, dropping expired
    /// entries. A misbehaving command must not abort the drain: failures
    /// are logged and swallowed.
    pub(crate) async fn drain_command_buffer(self: &Arc<Self>) {
        if self.buffer.lock().is_empty() {
            return;
        }
        log::debug!(
            "[{}] draining {} buffered command(s)",
            self.config.id,
            self.buffer.lock().len()
        );
        loop {
            let command = { self.buffer.lock().pop_fresh() };
            let Some(command) = command else { break };
            log::debug!(
                "[{}] replaying buffered command {:?}",
                self.config.id,
                command
            );
            if let Err(err) = self.run_deferred(&command).await {
                log::warn!(
                    "[{}] buffered command {:?} failed: {}",
                    self.config.id,
                    command,
                    err
                );
            }
        }
    }
}
