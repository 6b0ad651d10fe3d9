//! Playback state reconciliation.
//!
//! Merges what a local playback device reports with what the remote Web API
//! reports into a single [`PlaybackSnapshot`], and routes transport commands
//! to whichever side currently owns playback.

mod device;
mod error;
mod merge;
mod reconciler;
mod remote;
mod snapshot;
mod volume;

pub use device::{DeviceProbe, LocalEvent, LocalPlayer, ProbeOutcome};
pub use error::{ReconcileError, ReconcileResult};
pub use merge::{merge, TickInput};
pub use reconciler::{PlaybackStateReconciler, PlayerCommand, ReconcilerHandle};
pub use remote::RemotePlayer;
pub use snapshot::{Device, PlaybackSnapshot, RepeatMode, SourceKind};
pub use volume::{VolumeControl, DEFAULT_VOLUME, MAX_VOLUME, VOLUME_STEP};
