//! The unified "now playing" view.

use serde::{Deserialize, Serialize};
use spotify_api::PlaybackState;

/// Where a snapshot came from, and therefore where commands go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    Remote,
}

/// Repeat collapsed to the two states the player distinguishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    On,
}

impl RepeatMode {
    /// `off` stays off; `track` and `context` both count as on.
    pub fn from_api(repeat_state: &str) -> Self {
        if repeat_state == "off" || repeat_state.is_empty() {
            RepeatMode::Off
        } else {
            RepeatMode::On
        }
    }
}

/// A point-in-time view of playback. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track_id: String,
    pub track_name: String,
    #[serde(default)]
    pub track_uri: String,
    pub artists: Vec<String>,
    pub album_art: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
    pub source: SourceKind,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub shuffle: bool,
    /// Device currently playing, as reported by the remote API.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub volume: Option<u8>,
    #[serde(default)]
    pub disallow_next: bool,
    #[serde(default)]
    pub disallow_previous: bool,
}

impl PlaybackSnapshot {
    /// Normalize a remote playback state. `None` when no track is loaded.
    pub fn from_remote(state: &PlaybackState) -> Option<Self> {
        let track = state.item.as_ref()?;
        let device = state.device.as_ref();

        Some(Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            track_uri: track.uri.clone(),
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            album_art: track.album.cover_url().map(str::to_string),
            position_ms: state.progress_ms.unwrap_or(0),
            duration_ms: track.duration_ms,
            paused: !state.is_playing,
            source: SourceKind::Remote,
            repeat: RepeatMode::from_api(&state.repeat_state),
            shuffle: state.shuffle_state,
            device_id: device.and_then(|d| d.id.clone()),
            volume: device.and_then(|d| d.volume_percent),
            disallow_next: state.actions.disallows.skipping_next,
            disallow_previous: state.actions.disallows.skipping_prev,
        })
    }

    /// The same snapshot attributed to `source`.
    pub fn with_source(self, source: SourceKind) -> Self {
        Self { source, ..self }
    }

    pub fn is_local(&self) -> bool {
        self.source == SourceKind::Local
    }

    /// Position as a percentage of the track, 0 when the duration is unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms.min(self.duration_ms) as f64 / self.duration_ms as f64) * 100.0
    }

    pub fn can_skip_next(&self) -> bool {
        match self.source {
            SourceKind::Local => !self.track_id.is_empty() || !self.track_uri.is_empty(),
            SourceKind::Remote => !self.disallow_next,
        }
    }

    pub fn can_skip_previous(&self) -> bool {
        match self.source {
            SourceKind::Local => !self.track_id.is_empty() || !self.track_uri.is_empty(),
            SourceKind::Remote => !self.disallow_previous,
        }
    }
}

/// The local playback device as last reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    pub device_id: Option<String>,
    pub ready: bool,
}

impl Device {
    /// The device id, when the device is ready to take commands.
    pub fn ready_id(&self) -> Option<&str> {
        if self.ready {
            self.device_id.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(track_id: &str, source: SourceKind) -> PlaybackSnapshot {
    PlaybackSnapshot {
        track_id: track_id.to_string(),
        track_name: format!("Track {}", track_id),
        track_uri: format!("spotify:track:{}", track_id),
        artists: vec!["Artist".to_string()],
        album_art: None,
        position_ms: 30_000,
        duration_ms: 120_000,
        paused: false,
        source,
        repeat: RepeatMode::Off,
        shuffle: false,
        device_id: None,
        volume: None,
        disallow_next: false,
        disallow_previous: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote_state(value: serde_json::Value) -> PlaybackState {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_remote_normalizes() {
        let state = remote_state(json!({
            "device": {"id": "dev-1", "is_active": true, "name": "Phone", "type": "Smartphone", "volume_percent": 70},
            "repeat_state": "track",
            "shuffle_state": true,
            "progress_ms": 60000,
            "is_playing": false,
            "item": {
                "id": "t1",
                "name": "Song",
                "uri": "spotify:track:t1",
                "duration_ms": 240000,
                "artists": [{"name": "One"}, {"name": "Two"}],
                "album": {"name": "Album", "images": [{"url": "cover", "width": 300, "height": 300}]}
            },
            "actions": {"disallows": {"skipping_next": true}}
        }));

        let snapshot = PlaybackSnapshot::from_remote(&state).unwrap();
        assert!(snapshot.paused);
        assert_eq!(snapshot.repeat, RepeatMode::On);
        assert!(snapshot.shuffle);
        assert_eq!(snapshot.artists, vec!["One", "Two"]);
        assert_eq!(snapshot.album_art.as_deref(), Some("cover"));
        assert_eq!(snapshot.device_id.as_deref(), Some("dev-1"));
        assert_eq!(snapshot.volume, Some(70));
        assert_eq!(snapshot.source, SourceKind::Remote);
        assert!(!snapshot.can_skip_next());
        assert!(snapshot.can_skip_previous());
        assert_eq!(snapshot.progress_percent(), 25.0);
    }

    #[test]
    fn test_from_remote_without_item() {
        let state = remote_state(json!({"is_playing": false, "repeat_state": "off"}));
        assert!(PlaybackSnapshot::from_remote(&state).is_none());
    }

    #[test]
    fn test_repeat_collapses() {
        assert_eq!(RepeatMode::from_api("off"), RepeatMode::Off);
        assert_eq!(RepeatMode::from_api("context"), RepeatMode::On);
        assert_eq!(RepeatMode::from_api("track"), RepeatMode::On);
    }

    #[test]
    fn test_progress_with_unknown_duration() {
        let snapshot = PlaybackSnapshot {
            duration_ms: 0,
            ..sample("t1", SourceKind::Local)
        };
        assert_eq!(snapshot.progress_percent(), 0.0);
    }

    #[test]
    fn test_local_snapshot_can_always_skip() {
        let snapshot = PlaybackSnapshot {
            disallow_next: true,
            ..sample("t1", SourceKind::Local)
        };
        assert!(snapshot.can_skip_next());
    }

    #[test]
    fn test_device_ready_id() {
        let mut device = Device {
            device_id: Some("local-1".to_string()),
            ready: false,
        };
        assert_eq!(device.ready_id(), None);
        device.ready = true;
        assert_eq!(device.ready_id(), Some("local-1"));
    }
}
