//! Remote playback control through the Web API.

use crate::snapshot::PlaybackSnapshot;
use async_trait::async_trait;
use spotify_api::{ApiResult, SpotifyClient};

/// Polled playback state and stateless control commands.
#[async_trait]
pub trait RemotePlayer: Send + Sync {
    /// `None` when nothing is playing anywhere reachable.
    async fn current_playback(&self) -> ApiResult<Option<PlaybackSnapshot>>;

    async fn play(&self, device_id: Option<&str>) -> ApiResult<()>;

    async fn pause(&self) -> ApiResult<()>;

    async fn next(&self) -> ApiResult<()>;

    async fn previous(&self) -> ApiResult<()>;

    async fn seek(&self, position_ms: u64) -> ApiResult<()>;

    async fn set_volume(&self, percent: u8) -> ApiResult<()>;

    async fn transfer(&self, device_id: &str, play: bool) -> ApiResult<()>;
}

#[async_trait]
impl RemotePlayer for SpotifyClient {
    async fn current_playback(&self) -> ApiResult<Option<PlaybackSnapshot>> {
        let state = self.playback_state().await?;
        Ok(state.as_ref().and_then(PlaybackSnapshot::from_remote))
    }

    async fn play(&self, device_id: Option<&str>) -> ApiResult<()> {
        SpotifyClient::play(self, device_id, None).await
    }

    async fn pause(&self) -> ApiResult<()> {
        SpotifyClient::pause(self).await
    }

    async fn next(&self) -> ApiResult<()> {
        SpotifyClient::next(self).await
    }

    async fn previous(&self) -> ApiResult<()> {
        SpotifyClient::previous(self).await
    }

    async fn seek(&self, position_ms: u64) -> ApiResult<()> {
        SpotifyClient::seek(self, position_ms).await
    }

    async fn set_volume(&self, percent: u8) -> ApiResult<()> {
        SpotifyClient::set_volume(self, percent).await
    }

    async fn transfer(&self, device_id: &str, play: bool) -> ApiResult<()> {
        self.transfer_playback(device_id, play).await
    }
}
