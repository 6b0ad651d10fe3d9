//! Incremental track search.

use crate::client::TrackSearch;
use crate::models::Track;
use crate::ApiResult;
use std::collections::HashSet;
use tracing::debug;

/// Accumulates search pages for one query, without duplicate tracks.
#[derive(Debug, Default)]
pub struct SearchPager {
    query: String,
    page_size: u32,
    tracks: Vec<Track>,
    seen: HashSet<String>,
    next_offset: u32,
    total: u32,
    exhausted: bool,
}

impl SearchPager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.clamp(1, 50),
            ..Self::default()
        }
    }

    /// Start over with a new query.
    pub fn reset(&mut self, query: &str) {
        self.query = query.trim().to_string();
        self.tracks.clear();
        self.seen.clear();
        self.next_offset = 0;
        self.total = 0;
        self.exhausted = self.query.is_empty();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Total matches reported by the server.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted && !self.query.is_empty()
    }

    /// Fetch the next page; returns how many new tracks were added.
    pub async fn load_more<S: TrackSearch + ?Sized>(&mut self, search: &S) -> ApiResult<usize> {
        if self.exhausted || self.query.is_empty() {
            return Ok(0);
        }

        let page = search
            .search_tracks(&self.query, self.page_size, self.next_offset)
            .await?;

        self.total = page.total;
        self.next_offset = page.offset + page.items.len() as u32;
        self.exhausted = !page.has_more || page.items.is_empty();

        let before = self.tracks.len();
        for track in page.items {
            let key = if track.id.is_empty() {
                track.uri.clone()
            } else {
                track.id.clone()
            };
            if self.seen.insert(key) {
                self.tracks.push(track);
            }
        }

        let added = self.tracks.len() - before;
        debug!(query = %self.query, added, total = self.total, "Search page loaded");
        Ok(added)
    }
}
