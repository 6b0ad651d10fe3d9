//! Volume model shared by local and remote routing.

use serde::{Deserialize, Serialize};

pub const VOLUME_STEP: u8 = 10;
pub const MAX_VOLUME: u8 = 100;
/// Restored on un-mute when no earlier level was recorded.
pub const DEFAULT_VOLUME: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeControl {
    volume: u8,
    muted: bool,
    pre_mute: Option<u8>,
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

impl VolumeControl {
    pub fn new(volume: u8) -> Self {
        Self {
            volume: volume.min(MAX_VOLUME),
            muted: false,
            pre_mute: None,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn increase(&mut self) -> u8 {
        self.set(self.volume.saturating_add(VOLUME_STEP))
    }

    pub fn decrease(&mut self) -> u8 {
        self.set(self.volume.saturating_sub(VOLUME_STEP))
    }

    /// Any explicit level ends a mute.
    pub fn set(&mut self, volume: u8) -> u8 {
        self.volume = volume.min(MAX_VOLUME);
        self.muted = false;
        self.pre_mute = None;
        self.volume
    }

    /// Mutes an audible level; a silent one is brought back to the last
    /// audible level, or [`DEFAULT_VOLUME`] when there is none.
    pub fn toggle_mute(&mut self) -> u8 {
        if self.volume > 0 {
            self.pre_mute = Some(self.volume);
            self.volume = 0;
            self.muted = true;
        } else {
            self.volume = self
                .pre_mute
                .take()
                .filter(|volume| *volume > 0)
                .unwrap_or(DEFAULT_VOLUME);
            self.muted = false;
        }
        self.volume
    }

    /// Adopt a level reported by the device, unless muted locally.
    pub fn sync(&mut self, reported: u8) {
        if !self.muted {
            self.volume = reported.min(MAX_VOLUME);
        }
    }
}
