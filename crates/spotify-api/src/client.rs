//! Authenticated client for the Spotify Web API.

use crate::models::{PlaybackState, Queue, SearchResponse, Track, TrackPage, UserProfile};
use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use spotify_auth::AuthSession;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can run a track search, so pagination can be exercised
/// without HTTP.
#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> ApiResult<TrackPage>;
}

/// Resource API client. Every request carries a bearer token from the
/// [`AuthSession`]; a 401 is retried once after refreshing.
pub struct SpotifyClient {
    auth: Arc<AuthSession>,
    http: reqwest::Client,
    base_url: String,
}

impl SpotifyClient {
    /// Client for the API base URL configured on `auth`.
    pub fn new(auth: Arc<AuthSession>) -> Self {
        let base_url = auth.config().api_base_url.clone();
        Self::with_base_url(auth, &base_url)
    }

    pub fn with_base_url(auth: Arc<AuthSession>, base_url: &str) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    /// `GET /me`.
    pub async fn current_user(&self) -> ApiResult<UserProfile> {
        let response = self.send(Method::GET, "/me", &[], None).await?;
        decode(response).await
    }

    /// `GET /me/player`; `None` when nothing is playing anywhere.
    pub async fn playback_state(&self) -> ApiResult<Option<PlaybackState>> {
        let response = self.send(Method::GET, "/me/player", &[], None).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Start or resume playback, optionally on a given device and with given tracks.
    pub async fn play(&self, device_id: Option<&str>, uris: Option<&[String]>) -> ApiResult<()> {
        let query = device_query(device_id);
        let body = uris.map(|uris| json!({ "uris": uris }));
        self.player(Method::PUT, "/me/player/play", &query, body.as_ref())
            .await
    }

    pub async fn pause(&self) -> ApiResult<()> {
        self.player(Method::PUT, "/me/player/pause", &[], None).await
    }

    pub async fn next(&self) -> ApiResult<()> {
        self.player(Method::POST, "/me/player/next", &[], None).await
    }

    pub async fn previous(&self) -> ApiResult<()> {
        self.player(Method::POST, "/me/player/previous", &[], None)
            .await
    }

    pub async fn seek(&self, position_ms: u64) -> ApiResult<()> {
        let query = [("position_ms", position_ms.to_string())];
        self.player(Method::PUT, "/me/player/seek", &query, None)
            .await
    }

    /// `percent` is clamped to 0..=100.
    pub async fn set_volume(&self, percent: u8) -> ApiResult<()> {
        let query = [("volume_percent", percent.min(100).to_string())];
        self.player(Method::PUT, "/me/player/volume", &query, None)
            .await
    }

    /// Make `device_id` the active device.
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> ApiResult<()> {
        let body = json!({ "device_ids": [device_id], "play": play });
        self.player(Method::PUT, "/me/player", &[], Some(&body)).await
    }

    /// Append a track to the active device's queue.
    pub async fn add_to_queue(&self, uri: &str, device_id: Option<&str>) -> ApiResult<()> {
        let mut query = vec![("uri", uri.to_string())];
        query.extend(device_query(device_id));
        self.player(Method::POST, "/me/player/queue", &query, None)
            .await
    }

    /// `GET /me/player/queue`.
    pub async fn queue(&self) -> ApiResult<Queue> {
        let response = self
            .send(Method::GET, "/me/player/queue", &[], None)
            .await
            .map_err(no_device_on_404)?;
        decode(response).await
    }

    /// `GET /tracks/{id}`.
    pub async fn track(&self, id: &str) -> ApiResult<Track> {
        let response = self
            .send(Method::GET, &format!("/tracks/{}", id), &[], None)
            .await?;
        decode(response).await
    }

    async fn player(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ApiResult<()> {
        self.send(method, path, query, body)
            .await
            .map_err(no_device_on_404)?;
        Ok(())
    }

    /// Send with a bearer token; on 401, invalidate it and retry exactly once.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ApiResult<Response> {
        let token = self.auth.get_valid_token().await?;
        let response = self.request(&method, path, query, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check(response).await;
        }

        warn!(path = %path, "Access token rejected, refreshing and retrying once");
        self.auth.invalidate_access_token(&token);
        let token = self.auth.get_valid_token().await?;
        let response = self.request(&method, path, query, body, &token).await?;
        check(response).await
    }

    async fn request(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> ApiResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "API request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .query(query);
        request = match body {
            Some(body) => request.json(body),
            None if *method != Method::GET => request.header(reqwest::header::CONTENT_LENGTH, 0),
            None => request,
        };

        Ok(request.send().await?)
    }
}

#[async_trait]
impl TrackSearch for SpotifyClient {
    /// `GET /search` for tracks, in the user's market.
    async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> ApiResult<TrackPage> {
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("market", "from_token".to_string()),
        ];
        let response = self.send(Method::GET, "/search", &params, None).await?;
        let results: SearchResponse = decode(response).await?;
        Ok(results.tracks.into())
    }
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, String)> {
    device_id
        .map(|id| vec![("device_id", id.to_string())])
        .unwrap_or_default()
}

async fn check(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "API request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn no_device_on_404(err: ApiError) -> ApiError {
    match err {
        ApiError::Status { status: 404, .. } => ApiError::NoActiveDevice,
        other => other,
    }
}
