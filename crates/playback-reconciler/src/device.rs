//! The local playback device contract and its readiness probe.

use crate::snapshot::PlaybackSnapshot;
use crate::ReconcileResult;
use async_trait::async_trait;
use std::time::Duration;
use toune_config::Config;
use tracing::{debug, info, warn};

/// A playback endpoint this process controls directly.
#[async_trait]
pub trait LocalPlayer: Send + Sync {
    /// Try to attach to the device; `false` while it is not reachable yet.
    async fn connect(&self) -> ReconcileResult<bool>;

    /// What the device is playing, or `None` when it has nothing loaded.
    async fn current_state(&self) -> ReconcileResult<Option<PlaybackSnapshot>>;

    async fn toggle_play(&self) -> ReconcileResult<()>;

    async fn resume(&self) -> ReconcileResult<()>;

    async fn next_track(&self) -> ReconcileResult<()>;

    async fn previous_track(&self) -> ReconcileResult<()>;

    async fn seek(&self, position_ms: u64) -> ReconcileResult<()>;

    async fn set_volume(&self, percent: u8) -> ReconcileResult<()>;
}

/// Events pushed by the local device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    Ready { device_id: String },
    NotReady,
    StateChanged(Option<PlaybackSnapshot>),
}

/// How a readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Connected,
    GaveUp,
}

/// Bounded readiness wait: a fixed number of connect attempts at a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProbe {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for DeviceProbe {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

impl DeviceProbe {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.device_probe_attempts, config.device_probe_interval())
    }

    pub async fn run(&self, local: &dyn LocalPlayer) -> ProbeOutcome {
        for attempt in 1..=self.attempts {
            match local.connect().await {
                Ok(true) => {
                    info!(attempt, "Local playback device connected");
                    return ProbeOutcome::Connected;
                }
                Ok(false) => debug!(attempt, "Local playback device not reachable yet"),
                Err(e) => debug!(attempt, error = %e, "Local playback device probe failed"),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        warn!(
            attempts = self.attempts,
            "Giving up on local playback device; polling remote only"
        );
        ProbeOutcome::GaveUp
    }
}
