//! Spotify Web API client for Toune.
//!
//! This crate provides:
//! - **SpotifyClient**: bearer-authenticated calls with one retry on 401
//! - **SearchPager**: de-duplicating pagination over track search
//! - Wire models and display helpers

mod client;
mod error;
mod format;
pub mod models;
mod pager;

pub use client::{SpotifyClient, TrackSearch};
pub use error::{ApiError, ApiResult};
pub use format::{artists_string, format_duration};
pub use models::{
    Actions, Album, Artist, Device, Disallows, Image, Paging, PlaybackState, Queue, Track,
    TrackPage, UserProfile,
};
pub use pager::SearchPager;
