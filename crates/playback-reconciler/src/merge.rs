//! Per-tick source selection.

use crate::snapshot::{PlaybackSnapshot, SourceKind};

/// What one tick learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickInput {
    /// The local device returned a state.
    Local(PlaybackSnapshot),
    /// The remote endpoint returned a populated state.
    Remote(PlaybackSnapshot),
    /// Nothing usable: no content, no track, or a transport error.
    Stale,
}

/// Next snapshot from the previous one and this tick's input.
///
/// A stale tick keeps the previous snapshot so the view never blanks out.
pub fn merge(previous: Option<PlaybackSnapshot>, input: TickInput) -> Option<PlaybackSnapshot> {
    match input {
        TickInput::Local(snapshot) => Some(snapshot.with_source(SourceKind::Local)),
        TickInput::Remote(snapshot) => Some(snapshot.with_source(SourceKind::Remote)),
        TickInput::Stale => previous,
    }
}
