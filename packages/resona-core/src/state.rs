//! Player state model and the attribute map exposed to entity adapters.

use std::collections::BTreeMap;

use serde::Serialize;

/// State of a receiver as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    /// Nothing is known yet (before the first successful connect).
    #[default]
    Unknown,
    /// The device is configured but unreachable.
    Unavailable,
    /// The device is powered off.
    Off,
    /// The device is on but not playing.
    On,
    /// Actively playing content.
    Playing,
    /// Playback paused.
    Paused,
    /// Playback stopped.
    Stopped,
}

/// Maps a raw playback state string from the device to a [`PlayerState`].
///
/// Unrecognized strings map to `None` and leave the cached state untouched.
pub fn map_playback_state(raw: &str) -> Option<PlayerState> {
    match raw {
        "STOPPED" => Some(PlayerState::Stopped),
        "PLAYING" => Some(PlayerState::Playing),
        "PAUSED" => Some(PlayerState::Paused),
        _ => None,
    }
}

/// Computes the state reported to the host from the powered flag and the
/// last known playback state.
///
/// Off wins over everything; a known playback state wins over plain On;
/// an unknown playback state on a powered device reads as On.
pub fn derive_state(powered: bool, playback: PlayerState) -> PlayerState {
    if !powered {
        PlayerState::Off
    } else if playback != PlayerState::Unknown {
        playback
    } else {
        PlayerState::On
    }
}

/// Attribute keys of the media-player entity exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAttribute {
    State,
    Volume,
    Muted,
    Source,
    SourceList,
    SoundMode,
    SoundModeList,
    MediaTitle,
    MediaArtist,
    MediaAlbum,
    MediaImageUrl,
}

/// Partial or full attribute snapshot, keyed by [`MediaAttribute`].
pub type AttributeMap = BTreeMap<MediaAttribute, serde_json::Value>;
