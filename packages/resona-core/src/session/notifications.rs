//! Push-notification handlers.
//!
//! Each handler compares the incoming value against the cache and emits an
//! `Update` carrying only the keys that actually changed. Repeated identical
//! notifications therefore produce no observable output - the session's
//! idempotence guarantee towards entity adapters.

use std::sync::Arc;

use serde_json::json;

use crate::state::{map_playback_state, AttributeMap, MediaAttribute, PlayerState};
use crate::transport::{ContentChange, PowerChange, VolumeChange};

use super::device::DeviceSession;

impl DeviceSession {
    /// Volume or mute changed on the device.
    pub(crate) fn handle_volume_change(&self, change: VolumeChange) {
        log::debug!("[{}] volume notification: {:?}", self.config.id, change);
        let mut updated = AttributeMap::new();
        {
            let mut st = self.state.write();
            if (st.volume - f64::from(change.volume)).abs() > f64::EPSILON {
                st.volume = f64::from(change.volume);
                updated.insert(MediaAttribute::Volume, json!(st.volume_level()));
            }
            if st.muted != change.muted {
                st.muted = change.muted;
                updated.insert(MediaAttribute::Muted, json!(change.muted));
            }
        }
        if !updated.is_empty() {
            self.emit_update(updated);
        }
    }

    /// Playback content or active input changed.
    pub(crate) fn handle_content_change(&self, change: ContentChange) {
        log::debug!("[{}] content notification: {:?}", self.config.id, change);
        let mut updated = AttributeMap::new();
        {
            let mut st = self.state.write();
            if let Some(raw) = change.play_info.state.as_deref() {
                if let Some(mapped) = map_playback_state(raw) {
                    st.playback_state = mapped;
                    if st.update_state() {
                        updated.insert(MediaAttribute::State, json!(st.state));
                    }
                }
            }
            if change.is_input {
                if let Some(uri) = change.play_info.uri.clone() {
                    let known = st.sources.iter().any(|source| source.uri == uri);
                    if known && st.active_source.as_deref() != Some(uri.as_str()) {
                        st.active_source = Some(uri);
                        updated.insert(
                            MediaAttribute::Source,
                            json!(st.active_source_title().unwrap_or_default()),
                        );
                    }
                }
            }
            st.play_info = vec![change.play_info];
        }
        if !updated.is_empty() {
            self.emit_update(updated);
        }
    }

    /// Power state changed. A power-off on a device that is not configured
    /// always-active arms the auto-disconnect watchdog; a power-on cancels it.
    pub(crate) fn handle_power_change(self: &Arc<Self>, change: PowerChange) {
        log::debug!("[{}] power notification: {:?}", self.config.id, change);
        let (changed, now_off) = {
            let mut st = self.state.write();
            st.powered = change.powered;
            let changed = st.update_state();
            (changed, st.state == PlayerState::Off)
        };
        if changed {
            let mut updated = AttributeMap::new();
            updated.insert(MediaAttribute::State, json!(self.state.read().state));
            self.emit_update(updated);
        }
        if now_off {
            if !self.config.always_active {
                self.start_watchdog();
            }
        } else {
            self.cancel_watchdog();
        }
    }

    /// The notification connection itself dropped: mark the session
    /// unavailable and let the reconnect loop bring it back.
    pub(crate) fn handle_connection_dropped(self: &Arc<Self>, reason: &str) {
        log::warn!(
            "[{}] notification connection dropped ({}), scheduling reconnect",
            self.config.id,
            reason
        );
        {
            let mut st = self.state.write();
            st.state = PlayerState::Unknown;
        }
        self.set_available(false);
        self.emit_update_full();
        self.ensure_reconnect_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{drain_events, new_session, online_transport};
    use super::*;
    use crate::events::SessionEvent;
    use crate::transport::ReceiverNotification;
    use crate::types::PlayInfo;
    use std::time::Duration;
    use tokio::sync::broadcast::Receiver;
    use tokio::time::sleep;

    fn next_update(events: &mut Receiver<SessionEvent>) -> Option<AttributeMap> {
        match events.try_recv() {
            Ok(SessionEvent::Update { attributes, .. }) => attributes,
            Ok(other) => panic!("expected Update, got {other:?}"),
            Err(_) => panic!("expected a pending Update event"),
        }
    }

    fn assert_no_event(events: &mut Receiver<SessionEvent>) {
        assert!(events.try_recv().is_err(), "expected no further events");
    }

    #[tokio::test(start_paused = true)]
    async fn identical_volume_notifications_emit_once() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        session.handle_volume_change(VolumeChange {
            volume: 30,
            muted: false,
        });
        let attrs = next_update(&mut events).unwrap();
        assert_eq!(attrs[&MediaAttribute::Volume], serde_json::json!(60.0));
        assert!(!attrs.contains_key(&MediaAttribute::Muted));

        session.handle_volume_change(VolumeChange {
            volume: 30,
            muted: false,
        });
        assert_no_event(&mut events);
    }

    #[tokio::test(start_paused = true)]
    async fn mute_change_emits_only_the_mute_key() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        session.handle_volume_change(VolumeChange {
            volume: 25,
            muted: true,
        });
        let attrs = next_update(&mut events).unwrap();
        assert_eq!(attrs[&MediaAttribute::Muted], serde_json::json!(true));
        assert!(!attrs.contains_key(&MediaAttribute::Volume));
        assert!(session.is_muted());
    }

    #[tokio::test(start_paused = true)]
    async fn content_change_updates_state_and_source() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        let change = ContentChange {
            play_info: PlayInfo {
                state: Some("PLAYING".into()),
                uri: Some("extInput:hdmi2".into()),
                title: Some("Movie Night".into()),
                ..PlayInfo::default()
            },
            is_input: true,
        };
        session.handle_content_change(change.clone());

        let attrs = next_update(&mut events).unwrap();
        assert_eq!(attrs[&MediaAttribute::State], serde_json::json!("PLAYING"));
        assert_eq!(attrs[&MediaAttribute::Source], serde_json::json!("HDMI 2"));
        assert_eq!(session.source(), Some("HDMI 2".to_string()));
        assert_eq!(session.media_title(), "Movie Night");

        // the same notification again is a no-op
        session.handle_content_change(change);
        assert_no_event(&mut events);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_input_uri_is_ignored() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        session.handle_content_change(ContentChange {
            play_info: PlayInfo {
                uri: Some("extInput:video99".into()),
                ..PlayInfo::default()
            },
            is_input: true,
        });

        assert_no_event(&mut events);
        assert_eq!(session.source(), Some("HDMI 1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_playback_state_leaves_state_untouched() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        session.handle_content_change(ContentChange {
            play_info: PlayInfo {
                state: Some("TRANSITIONING".into()),
                ..PlayInfo::default()
            },
            is_input: false,
        });

        assert_no_event(&mut events);
        assert_eq!(session.state(), PlayerState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_power_notifications_emit_once() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        session.handle_power_change(PowerChange { powered: false });
        let attrs = next_update(&mut events).unwrap();
        assert_eq!(attrs[&MediaAttribute::State], serde_json::json!("OFF"));

        session.handle_power_change(PowerChange { powered: false });
        assert_no_event(&mut events);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_connection_marks_unavailable_and_reconnects() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();

        transport.set_online(false);
        session.handle_connection_dropped("socket closed");

        assert!(!session.is_available());
        assert!(session.is_reconnecting());
        match events.try_recv().unwrap() {
            SessionEvent::Update { attributes, .. } => assert!(attributes.is_none()),
            other => panic!("expected Update(None), got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_flow_through_the_listener_task() {
        let transport = online_transport();
        let session = new_session(&transport);
        session.connect().await;
        let mut events = session.subscribe();
        drain_events(&mut events);

        transport
            .push(ReceiverNotification::Volume(VolumeChange {
                volume: 40,
                muted: false,
            }))
            .await;
        sleep(Duration::from_millis(10)).await;

        let attrs = next_update(&mut events).unwrap();
        assert_eq!(attrs[&MediaAttribute::Volume], serde_json::json!(80.0));
    }
}
