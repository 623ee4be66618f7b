//! Shared test fixtures: a scriptable mock transport and session builders.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;

use crate::config::DeviceConfig;
use crate::error::{TransportError, TransportResult};
use crate::events::SessionEvent;
use crate::transport::{ReceiverNotification, ReceiverTransport};
use crate::types::{
    InputSource, InterfaceInfo, PlayInfo, SoundModeCandidate, SoundModeSetting, SystemInfo,
    VolumeControl,
};

use super::device::DeviceSession;

/// Mock transport with per-call counters and scriptable reachability.
///
/// Mutating commands are appended to `calls` in invocation order, so tests
/// can assert both what was sent and in which order.
pub(crate) struct MockTransport {
    online: AtomicBool,
    powered: AtomicBool,
    probe_delay: Mutex<Duration>,
    probe_calls: AtomicUsize,
    stop_notification_calls: AtomicUsize,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) last_volume: Mutex<Option<i32>>,
    pub(crate) volumes: Mutex<Vec<VolumeControl>>,
    pub(crate) inputs: Mutex<Vec<InputSource>>,
    pub(crate) sound_modes: Mutex<Vec<SoundModeSetting>>,
    pub(crate) play_info: Mutex<Vec<PlayInfo>>,
    pub(crate) system_info: Mutex<SystemInfo>,
    notify_tx: Mutex<Option<mpsc::Sender<ReceiverNotification>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            powered: AtomicBool::new(true),
            probe_delay: Mutex::new(Duration::ZERO),
            probe_calls: AtomicUsize::new(0),
            stop_notification_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            last_volume: Mutex::new(None),
            volumes: Mutex::new(vec![VolumeControl {
                output: None,
                min_volume: 0,
                max_volume: 50,
                volume: 25,
                muted: false,
            }]),
            inputs: Mutex::new(vec![
                InputSource {
                    uri: "extInput:hdmi1".into(),
                    title: "HDMI 1".into(),
                    active: true,
                },
                InputSource {
                    uri: "extInput:hdmi2".into(),
                    title: "HDMI 2".into(),
                    active: false,
                },
            ]),
            sound_modes: Mutex::new(vec![SoundModeSetting {
                target: "soundField".into(),
                current_value: Some("stereo".into()),
                candidates: vec![
                    SoundModeCandidate {
                        title: "Stereo".into(),
                        value: "stereo".into(),
                    },
                    SoundModeCandidate {
                        title: "Surround".into(),
                        value: "surround".into(),
                    },
                ],
            }]),
            play_info: Mutex::new(Vec::new()),
            system_info: Mutex::new(SystemInfo {
                serial_number: Some("serial-123".into()),
                mac_address: Some("00:11:22:33:44:55".into()),
                wireless_mac_address: Some("66:77:88:99:aa:bb".into()),
                version: Some("1.0".into()),
            }),
            notify_tx: Mutex::new(None),
        })
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = delay;
    }

    pub(crate) fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_notification_calls(&self) -> usize {
        self.stop_notification_calls.load(Ordering::SeqCst)
    }

    /// Pushes a notification through the open channel.
    pub(crate) async fn push(&self, notification: ReceiverNotification) {
        let tx = self
            .notify_tx
            .lock()
            .clone()
            .expect("notification channel not open");
        tx.send(notification).await.expect("listener gone");
    }

    fn check_online(&self) -> TransportResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::new("device unreachable"))
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ReceiverTransport for MockTransport {
    async fn probe_liveness(&self) -> TransportResult<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.probe_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_online()
    }

    async fn interface_info(&self) -> TransportResult<InterfaceInfo> {
        self.check_online()?;
        Ok(InterfaceInfo {
            product_name: Some("Resona AV".into()),
            model_name: Some("AVR-X100".into()),
            product_category: Some("receiver".into()),
            interface_version: Some("1.0".into()),
        })
    }

    async fn system_info(&self) -> TransportResult<SystemInfo> {
        self.check_online()?;
        Ok(self.system_info.lock().clone())
    }

    async fn sound_mode_settings(&self, _target: &str) -> TransportResult<Vec<SoundModeSetting>> {
        self.check_online()?;
        Ok(self.sound_modes.lock().clone())
    }

    async fn volume_controls(&self) -> TransportResult<Vec<VolumeControl>> {
        self.check_online()?;
        Ok(self.volumes.lock().clone())
    }

    async fn power_status(&self) -> TransportResult<bool> {
        self.check_online()?;
        Ok(self.powered.load(Ordering::SeqCst))
    }

    async fn inputs(&self) -> TransportResult<Vec<InputSource>> {
        self.check_online()?;
        Ok(self.inputs.lock().clone())
    }

    async fn play_info(&self) -> TransportResult<Vec<PlayInfo>> {
        self.check_online()?;
        Ok(self.play_info.lock().clone())
    }

    async fn set_power(&self, on: bool) -> TransportResult<()> {
        self.record(format!("set_power:{on}"));
        self.check_online()?;
        self.powered.store(on, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: i32) -> TransportResult<()> {
        self.record(format!("set_volume:{volume}"));
        self.check_online()?;
        *self.last_volume.lock() = Some(volume);
        Ok(())
    }

    async fn set_mute(&self, mute: bool) -> TransportResult<()> {
        self.record(format!("set_mute:{mute}"));
        self.check_online()?;
        Ok(())
    }

    async fn activate_input(&self, uri: &str) -> TransportResult<()> {
        self.record(format!("activate_input:{uri}"));
        self.check_online()?;
        for input in self.inputs.lock().iter_mut() {
            input.active = input.uri == uri;
        }
        Ok(())
    }

    async fn set_sound_mode(&self, target: &str, value: &str) -> TransportResult<()> {
        self.record(format!("set_sound_mode:{target}={value}"));
        self.check_online()?;
        Ok(())
    }

    async fn raw_command(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> TransportResult<serde_json::Value> {
        self.record(format!("raw:{method}"));
        self.check_online()?;
        Ok(serde_json::Value::Null)
    }

    async fn start_notifications(
        &self,
    ) -> TransportResult<mpsc::Receiver<ReceiverNotification>> {
        self.check_online()?;
        let (tx, rx) = mpsc::channel(16);
        *self.notify_tx.lock() = Some(tx);
        Ok(rx)
    }

    async fn stop_notifications(&self) {
        self.stop_notification_calls.fetch_add(1, Ordering::SeqCst);
        *self.notify_tx.lock() = None;
    }
}

pub(crate) fn online_transport() -> Arc<MockTransport> {
    MockTransport::new()
}

pub(crate) fn test_config() -> DeviceConfig {
    DeviceConfig::new("avr-1", "Living Room", "192.168.1.20")
}

pub(crate) fn new_session(transport: &Arc<MockTransport>) -> Arc<DeviceSession> {
    new_session_with(test_config(), transport)
}

pub(crate) fn new_session_with(
    config: DeviceConfig,
    transport: &Arc<MockTransport>,
) -> Arc<DeviceSession> {
    DeviceSession::new(config, Arc::clone(transport) as Arc<dyn ReceiverTransport>)
}

pub(crate) fn drain_events(events: &mut Receiver<SessionEvent>) {
    while events.try_recv().is_ok() {}
}
