//! The device session: one receiver's connection lifecycle.
//!
//! A session keeps a single logical connection alive across the receiver
//! powering off, network drops and address churn. It owns three background
//! tasks (notification listener, reconnect loop, power-off watchdog), all
//! cancellable and at most one of each.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::DeviceConfig;
use crate::error::TransportError;
use crate::events::{SessionEvent, EVENT_CHANNEL_CAPACITY};
use crate::state::{derive_state, AttributeMap, MediaAttribute, PlayerState};
use crate::transport::{ReceiverNotification, ReceiverTransport};
use crate::types::{InputSource, InterfaceInfo, PlayInfo, SoundModeSetting, SystemInfo};

use super::buffer::CommandBuffer;
use super::{
    BUFFERED_COMMAND_TTL, CONNECT_TIMEOUT, MAX_RECONNECT_FAILURES, RECONNECT_DELAY,
    SOUND_FIELD_TARGET,
};

/// Cached device facts, valid while `available` is true.
///
/// Mutated only by the session's own tasks (connect, notification handlers);
/// external callers read through accessor methods.
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub(crate) interface_info: Option<InterfaceInfo>,
    pub(crate) system_info: Option<SystemInfo>,
    pub(crate) unique_id: Option<String>,
    pub(crate) volume_min: i32,
    pub(crate) volume_max: i32,
    pub(crate) volume: f64,
    pub(crate) muted: bool,
    pub(crate) powered: bool,
    pub(crate) playback_state: PlayerState,
    pub(crate) state: PlayerState,
    /// Inputs in device order; looked up by URI or title.
    pub(crate) sources: Vec<InputSource>,
    /// URI of the active input, if any.
    pub(crate) active_source: Option<String>,
    pub(crate) sound_mode: Option<SoundModeSetting>,
    pub(crate) play_info: Vec<PlayInfo>,
}

impl DeviceState {
    /// Recomputes the derived state; returns whether it changed.
    pub(crate) fn update_state(&mut self) -> bool {
        let old = self.state;
        self.state = derive_state(self.powered, self.playback_state);
        old != self.state
    }

    /// Volume as a percentage of the device's raw range.
    pub(crate) fn volume_level(&self) -> f64 {
        let range = self.volume_max - self.volume_min;
        if range == 0 {
            return 0.0;
        }
        100.0 * ((self.volume - f64::from(self.volume_min)) / f64::from(range)).abs()
    }

    /// Title of the active input, if one is selected and known.
    pub(crate) fn active_source_title(&self) -> Option<String> {
        let uri = self.active_source.as_deref()?;
        self.sources
            .iter()
            .find(|source| source.uri == uri)
            .map(|source| source.title.clone())
    }

    /// The actually-playing slot: state present and not `STOPPED`.
    pub(crate) fn current_play_info(&self) -> Option<&PlayInfo> {
        self.play_info
            .iter()
            .find(|info| info.state.as_deref().is_some_and(|s| s != "STOPPED"))
    }
}

/// Why a connect attempt failed.
pub(crate) enum ConnectError {
    /// Network or protocol failure; the reconnect loop will retry.
    Transport(TransportError),
    /// The device reported no volume control; retrying will not help.
    NoVolumeControl,
}

impl From<TransportError> for ConnectError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Stateful manager of one receiver's connection.
///
/// Created once per configured device; all methods are callable through the
/// returned [`Arc`]. Commands never block the caller beyond a bounded wait
/// and never raise: see the command methods for the status-code surface.
pub struct DeviceSession {
    pub(crate) config: DeviceConfig,
    pub(crate) transport: Arc<dyn ReceiverTransport>,
    events: broadcast::Sender<SessionEvent>,
    /// At most one connect body runs at a time; contention is a no-op.
    connect_lock: AsyncMutex<()>,
    /// At most one listener (re)activation runs at a time; contention is a no-op.
    activation_lock: AsyncMutex<()>,
    connecting: AtomicBool,
    reconnecting: AtomicBool,
    availability: watch::Sender<bool>,
    pub(crate) state: RwLock<DeviceState>,
    pub(crate) buffer: Mutex<CommandBuffer>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) watchdog_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    /// Creates a session for one configured receiver.
    pub fn new(config: DeviceConfig, transport: Arc<dyn ReceiverTransport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (availability, _) = watch::channel(false);
        log::debug!("session created for {} ({})", config.id, config.address);
        Arc::new(Self {
            config,
            transport,
            events,
            connect_lock: AsyncMutex::new(()),
            activation_lock: AsyncMutex::new(()),
            connecting: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            availability,
            state: RwLock::new(DeviceState::default()),
            buffer: Mutex::new(CommandBuffer::new(BUFFERED_COMMAND_TTL)),
            listener_task: Mutex::new(None),
            reconnect_task: Mutex::new(None),
            watchdog_task: Mutex::new(None),
        })
    }

    // ── identity ────────────────────────────────────────────────────────────

    /// Stable device identifier from the configuration.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Friendly name from the configuration.
    pub fn friendly_name(&self) -> &str {
        &self.config.name
    }

    /// Network address of the receiver.
    pub fn host(&self) -> &str {
        &self.config.address
    }

    /// Unique id derived at connect time: serial number, else wired MAC,
    /// else wireless MAC.
    pub fn unique_id(&self) -> Option<String> {
        self.state.read().unique_id.clone()
    }

    /// Model name from the cached interface info.
    pub fn model_name(&self) -> Option<String> {
        self.state.read().interface_info.as_ref()?.model_name.clone()
    }

    /// Manufacturer product line from the cached interface info.
    pub fn manufacturer(&self) -> Option<String> {
        self.state
            .read()
            .interface_info
            .as_ref()?
            .product_name
            .clone()
    }

    /// Serial number from the cached system info.
    pub fn serial_number(&self) -> Option<String> {
        self.state.read().system_info.as_ref()?.serial_number.clone()
    }

    // ── availability and events ─────────────────────────────────────────────

    /// Whether the last connect succeeded and the cache is trustworthy.
    pub fn is_available(&self) -> bool {
        *self.availability.borrow()
    }

    /// Whether a connect attempt is currently in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Whether the background reconnect loop is running.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_available(&self, value: bool) {
        self.availability.send_replace(value);
    }

    /// Watch receiver over the availability flag, for bounded waits on an
    /// in-flight reconnect.
    pub(crate) fn availability_rx(&self) -> watch::Receiver<bool> {
        self.availability.subscribe()
    }

    /// Returns a fresh receiver for this session's events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
        if self.events.send(event).is_err() {
            log::trace!("[{}] no event subscribers", self.config.id);
        }
    }

    /// Emits `Update(None)`: the cache was fully refreshed, subscribers
    /// should pull the snapshot.
    pub(crate) fn emit_update_full(&self) {
        self.emit(SessionEvent::Update {
            device_id: self.config.id.clone(),
            attributes: None,
        });
    }

    /// Emits an `Update` carrying only the changed attributes.
    pub(crate) fn emit_update(&self, attributes: AttributeMap) {
        self.emit(SessionEvent::Update {
            device_id: self.config.id.clone(),
            attributes: Some(attributes),
        });
    }

    /// Re-emits `Connected` for an already-available session, so that a
    /// freshly subscribed host learns the current state.
    pub fn announce_connected(&self) {
        self.emit(SessionEvent::Connected {
            device_id: self.config.id.clone(),
        });
    }

    // ── connect / disconnect ────────────────────────────────────────────────

    /// Connects to the receiver and refreshes the cached device facts.
    ///
    /// At most one connect body runs per session; a concurrent call returns
    /// immediately without side effects. On transport failure the session
    /// becomes unavailable and the reconnect loop is scheduled.
    pub async fn connect(self: &Arc<Self>) {
        let Ok(_guard) = self.connect_lock.try_lock() else {
            log::debug!("[{}] connect already in flight, skipping", self.config.id);
            return;
        };
        self.connecting.store(true, Ordering::SeqCst);
        let result = self.refresh_device_state().await;
        self.connecting.store(false, Ordering::SeqCst);
        drop(_guard);

        match result {
            Ok(()) => {
                self.set_available(true);
                self.emit(SessionEvent::Connected {
                    device_id: self.config.id.clone(),
                });
                self.emit_update_full();
                self.activate_notifications().await;
                log::info!("[{}] connected to {}", self.config.id, self.config.address);
            }
            Err(ConnectError::NoVolumeControl) => {
                log::error!(
                    "[{}] device reported no volume controls, cannot manage it",
                    self.config.id
                );
                self.set_available(false);
                self.emit(SessionEvent::Error {
                    device_id: self.config.id.clone(),
                    message: "device reported no volume controls".into(),
                });
            }
            Err(ConnectError::Transport(err)) => {
                log::warn!("[{}] connect failed: {}", self.config.id, err);
                self.set_available(false);
                self.ensure_reconnect_loop();
            }
        }
    }

    /// Fetches the full device state over the transport.
    ///
    /// Interface and system info are fetched once and cached for the
    /// session's lifetime (assumed immutable for a given device).
    async fn refresh_device_state(&self) -> Result<(), ConnectError> {
        self.transport.probe_liveness().await?;

        if self.state.read().interface_info.is_none() {
            let info = self.transport.interface_info().await?;
            self.state.write().interface_info = Some(info);
        }
        if self.state.read().system_info.is_none() {
            let info = self.transport.system_info().await?;
            let mut st = self.state.write();
            st.unique_id = info
                .serial_number
                .clone()
                .or_else(|| info.mac_address.clone())
                .or_else(|| info.wireless_mac_address.clone());
            st.system_info = Some(info);
        }

        let sound_modes = self.transport.sound_mode_settings(SOUND_FIELD_TARGET).await?;
        let volumes = self.transport.volume_controls().await?;
        if volumes.is_empty() {
            return Err(ConnectError::NoVolumeControl);
        }
        if volumes.len() > 1 {
            log::debug!(
                "[{}] device reported {} volume controls, using the first one",
                self.config.id,
                volumes.len()
            );
        }
        let powered = self.transport.power_status().await?;
        let inputs = self.transport.inputs().await?;
        let play_info = self.transport.play_info().await?;

        let mut st = self.state.write();
        st.sound_mode = sound_modes.into_iter().next();
        let control = &volumes[0];
        st.volume_min = control.min_volume;
        st.volume_max = control.max_volume;
        st.volume = f64::from(control.volume);
        st.muted = control.muted;
        st.powered = powered;
        st.active_source = inputs
            .iter()
            .find(|input| input.active)
            .map(|input| input.uri.clone());
        st.sources = inputs;
        st.play_info = play_info;
        st.update_state();
        log::debug!(
            "[{}] refreshed state: powered={}, {} inputs, active={:?}",
            self.config.id,
            powered,
            st.sources.len(),
            st.active_source
        );
        Ok(())
    }

    /// Tears the connection down.
    ///
    /// A no-op while a connect is in flight. Cancels the reconnect loop and
    /// the notification listener, stops the transport's listener, marks the
    /// device powered off and unavailable, and emits `Disconnected`.
    pub async fn disconnect(&self) {
        // never race an in-flight connect
        if self.connecting.load(Ordering::SeqCst) {
            log::debug!(
                "[{}] connect in flight, skipping disconnect",
                self.config.id
            );
            return;
        }
        log::debug!("[{}] disconnecting", self.config.id);
        self.cancel_reconnect_loop();
        if let Some(listener) = self.listener_task.lock().take() {
            listener.abort();
        }
        self.transport.stop_notifications().await;
        {
            let mut st = self.state.write();
            st.powered = false;
            st.update_state();
        }
        self.set_available(false);
        self.emit(SessionEvent::Disconnected {
            device_id: self.config.id.clone(),
        });
    }

    /// Disconnects, then connects again.
    pub async fn reconnect(self: &Arc<Self>) {
        self.disconnect().await;
        self.connect().await;
    }

    /// Destroys the session: cancels every background task and disconnects.
    ///
    /// Used when the device is removed from the configuration or the
    /// process shuts all sessions down.
    pub async fn shutdown(&self) {
        self.cancel_watchdog();
        self.disconnect().await;
    }

    // ── reconnect loop ──────────────────────────────────────────────────────

    /// Starts the reconnect loop unless one is already running.
    ///
    /// Presence is checked-and-set before spawning, so a loop triggered by a
    /// command and one triggered by a notification can never coexist.
    pub(crate) fn ensure_reconnect_loop(self: &Arc<Self>) {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        log::debug!("[{}] starting reconnect loop", self.config.id);
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            session.run_reconnect_loop().await;
            session.reconnecting.store(false, Ordering::SeqCst);
        });
        *self.reconnect_task.lock() = Some(handle);
    }

    fn cancel_reconnect_loop(&self) {
        if let Some(handle) = self.reconnect_task.lock().take() {
            handle.abort();
        }
        self.reconnecting.store(false, Ordering::SeqCst);
    }

    /// Probes the device until it answers, then reconnects and replays the
    /// command buffer. Gives up after [`MAX_RECONNECT_FAILURES`] consecutive
    /// failures, leaving the session unavailable until something external
    /// triggers a new connect.
    async fn run_reconnect_loop(self: &Arc<Self>) {
        let mut failures = 0u32;
        loop {
            self.emit(SessionEvent::Connecting {
                device_id: self.config.id.clone(),
            });
            let probe = timeout(CONNECT_TIMEOUT, self.transport.probe_liveness()).await;
            match probe {
                Ok(Ok(())) => {
                    // connect() reactivates the notification listener on success
                    self.connect().await;
                    if self.is_available() {
                        self.drain_command_buffer().await;
                        log::info!("[{}] connection reestablished", self.config.id);
                        return;
                    }
                    failures += 1;
                }
                Ok(Err(err)) => {
                    log::debug!("[{}] reconnect probe failed: {}", self.config.id, err);
                    failures += 1;
                }
                Err(_) => {
                    log::debug!("[{}] reconnect probe timed out", self.config.id);
                    failures += 1;
                }
            }
            if failures >= MAX_RECONNECT_FAILURES {
                log::warn!(
                    "[{}] giving up reconnection after {} consecutive failures",
                    self.config.id,
                    failures
                );
                return;
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    // ── notification listener ───────────────────────────────────────────────

    /// (Re)activates the push-notification listener.
    ///
    /// Idempotent: a concurrent activation is a silent no-op. Each
    /// activation replaces the previous listener task and reopens the
    /// transport's notification channel.
    pub(crate) async fn activate_notifications(self: &Arc<Self>) {
        let Ok(_guard) = self.activation_lock.try_lock() else {
            log::debug!(
                "[{}] notification activation already in progress",
                self.config.id
            );
            return;
        };
        if let Some(previous) = self.listener_task.lock().take() {
            previous.abort();
        }
        let rx = match self.transport.start_notifications().await {
            Ok(rx) => rx,
            Err(err) => {
                log::warn!(
                    "[{}] failed to open notification channel: {}",
                    self.config.id,
                    err
                );
                self.ensure_reconnect_loop();
                return;
            }
        };
        log::debug!("[{}] notification listener active", self.config.id);
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            session.listen(rx).await;
        });
        *self.listener_task.lock() = Some(handle);
    }

    /// Dispatches push notifications until the channel closes.
    async fn listen(self: Arc<Self>, mut rx: mpsc::Receiver<ReceiverNotification>) {
        while let Some(notification) = rx.recv().await {
            match notification {
                ReceiverNotification::Volume(change) => self.handle_volume_change(change),
                ReceiverNotification::Content(change) => self.handle_content_change(change),
                ReceiverNotification::Power(change) => self.handle_power_change(change),
                ReceiverNotification::ConnectionDropped { reason } => {
                    self.handle_connection_dropped(&reason);
                }
            }
        }
        log::debug!("[{}] notification stream ended", self.config.id);
    }

    // ── state accessors ─────────────────────────────────────────────────────

    /// Current state as reported to the host.
    pub fn state(&self) -> PlayerState {
        self.state.read().state
    }

    /// Volume as a percentage (0..100) of the device's raw range.
    pub fn volume_level(&self) -> f64 {
        self.state.read().volume_level()
    }

    /// Current mute state.
    pub fn is_muted(&self) -> bool {
        self.state.read().muted
    }

    /// Title of the active input, if known.
    pub fn source(&self) -> Option<String> {
        self.state.read().active_source_title()
    }

    /// Input titles in device order.
    pub fn source_list(&self) -> Vec<String> {
        self.state
            .read()
            .sources
            .iter()
            .map(|source| source.title.clone())
            .collect()
    }

    /// Currently selected sound mode, if the device reports one.
    pub fn sound_mode(&self) -> Option<String> {
        self.state.read().sound_mode.as_ref()?.current_value.clone()
    }

    /// Available sound-mode titles.
    pub fn sound_mode_list(&self) -> Vec<String> {
        self.state
            .read()
            .sound_mode
            .as_ref()
            .map(|setting| {
                setting
                    .candidates
                    .iter()
                    .map(|candidate| candidate.title.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Title of the playing content, empty when nothing plays.
    pub fn media_title(&self) -> String {
        let st = self.state.read();
        st.current_play_info()
            .and_then(|info| info.title.clone())
            .unwrap_or_default()
    }

    /// Artist of the playing content, empty when nothing plays.
    pub fn media_artist(&self) -> String {
        let st = self.state.read();
        st.current_play_info()
            .and_then(|info| info.artist.clone())
            .unwrap_or_default()
    }

    /// Album of the playing content, empty when nothing plays.
    pub fn media_album(&self) -> String {
        let st = self.state.read();
        st.current_play_info()
            .and_then(|info| info.album.clone())
            .unwrap_or_default()
    }

    /// Artwork URL of the playing content, empty when nothing plays.
    pub fn media_image_url(&self) -> String {
        let st = self.state.read();
        st.current_play_info()
            .and_then(|info| info.thumbnail_url.clone())
            .unwrap_or_default()
    }

    /// Full attribute snapshot for entity adapters.
    ///
    /// This is what subscribers pull after an `Update(None)` event.
    pub fn attributes(&self) -> AttributeMap {
        let st = self.state.read();
        let mut attrs = AttributeMap::new();
        attrs.insert(MediaAttribute::State, json!(st.state));
        attrs.insert(MediaAttribute::Volume, json!(st.volume_level()));
        attrs.insert(MediaAttribute::Muted, json!(st.muted));
        attrs.insert(
            MediaAttribute::Source,
            json!(st.active_source_title().unwrap_or_default()),
        );
        attrs.insert(
            MediaAttribute::SourceList,
            json!(st
                .sources
                .iter()
                .map(|source| source.title.clone())
                .collect::<Vec<_>>()),
        );
        attrs.insert(
            MediaAttribute::SoundMode,
            json!(st
                .sound_mode
                .as_ref()
                .and_then(|setting| setting.current_value.clone())
                .unwrap_or_default()),
        );
        attrs.insert(
            MediaAttribute::SoundModeList,
            json!(st
                .sound_mode
                .as_ref()
                .map(|setting| setting
                    .candidates
                    .iter()
                    .map(|candidate| candidate.title.clone())
                    .collect::<Vec<_>>())
                .unwrap_or_default()),
        );
        let playing = st.current_play_info();
        attrs.insert(
            MediaAttribute::MediaTitle,
            json!(playing.and_then(|info| info.title.clone()).unwrap_or_default()),
        );
        attrs.insert(
            MediaAttribute::MediaArtist,
            json!(playing.and_then(|info| info.artist.clone()).unwrap_or_default()),
        );
        attrs.insert(
            MediaAttribute::MediaAlbum,
            json!(playing.and_then(|info| info.album.clone()).unwrap_or_default()),
        );
        attrs.insert(
            MediaAttribute::MediaImageUrl,
            json!(playing
                .and_then(|info| info.thumbnail_url.clone())
                .unwrap_or_default()),
        );
        attrs
    }
}
