//! One "now playing" view from a local device and the remote API.
//!
//! Each tick prefers the local device's state, falls back to polling the
//! remote API, and keeps the previous snapshot when neither has anything
//! usable. Ticks, pushed device events and player commands all run on one
//! task, so a slow poll can never overwrite a newer snapshot.

use crate::device::{DeviceProbe, LocalEvent, LocalPlayer, ProbeOutcome};
use crate::merge::{merge, TickInput};
use crate::remote::RemotePlayer;
use crate::snapshot::{Device, PlaybackSnapshot};
use crate::volume::VolumeControl;
use crate::{ReconcileError, ReconcileResult};
use spotify_auth::AuthState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Transport actions, routed to whichever side owns playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    TogglePlay,
    Next,
    Previous,
    Seek(u64),
    VolumeUp,
    VolumeDown,
    SetVolume(u8),
    ToggleMute,
}

type CommandRequest = (PlayerCommand, oneshot::Sender<ReconcileResult<()>>);

pub struct PlaybackStateReconciler {
    remote: Arc<dyn RemotePlayer>,
    local: Option<Arc<dyn LocalPlayer>>,
    events: Option<mpsc::Receiver<LocalEvent>>,
    auth: Option<watch::Receiver<AuthState>>,
    probe: Option<DeviceProbe>,
    device: Device,
    snapshot: Option<PlaybackSnapshot>,
    volume: VolumeControl,
}

impl PlaybackStateReconciler {
    /// A reconciler with no local device; everything goes to the remote API.
    pub fn new(remote: Arc<dyn RemotePlayer>) -> Self {
        Self {
            remote,
            local: None,
            events: None,
            auth: None,
            probe: None,
            device: Device::default(),
            snapshot: None,
            volume: VolumeControl::default(),
        }
    }

    /// Attach a local device and the stream of events it pushes.
    pub fn with_local(
        mut self,
        local: Arc<dyn LocalPlayer>,
        events: mpsc::Receiver<LocalEvent>,
    ) -> Self {
        self.local = Some(local);
        self.events = Some(events);
        self
    }

    /// Wait for the local device with `probe` once the loop starts.
    pub fn with_probe(mut self, probe: DeviceProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Stop the loop and drop the snapshot when the user signs out.
    pub fn watch_auth(mut self, auth: watch::Receiver<AuthState>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn volume(&self) -> VolumeControl {
        self.volume
    }

    /// Run one reconciliation step. Never fails; errors keep the previous snapshot.
    pub async fn tick(&mut self) -> Option<&PlaybackSnapshot> {
        let input = self.poll().await;
        self.apply(input);
        self.snapshot.as_ref()
    }

    async fn poll(&self) -> TickInput {
        if let (Some(local), true) = (&self.local, self.device.ready) {
            match local.current_state().await {
                Ok(Some(snapshot)) => return TickInput::Local(snapshot),
                Ok(None) => debug!("Local device idle, polling remote"),
                Err(e) => debug!(error = %e, "Local device silent, polling remote"),
            }
        }

        match self.remote.current_playback().await {
            Ok(Some(snapshot)) => TickInput::Remote(snapshot),
            Ok(None) => TickInput::Stale,
            Err(e) => {
                debug!(error = %e, "Remote playback poll failed, keeping last snapshot");
                TickInput::Stale
            }
        }
    }

    fn apply(&mut self, input: TickInput) {
        if let TickInput::Remote(snapshot) = &input {
            if let Some(reported) = snapshot.volume {
                self.volume.sync(reported);
            }
        }
        self.snapshot = merge(self.snapshot.take(), input);
    }

    /// Apply an event pushed by the local device.
    pub fn handle_event(&mut self, event: LocalEvent) {
        match event {
            LocalEvent::Ready { device_id } => {
                info!(device_id = %device_id, "Local playback device ready");
                self.device = Device {
                    device_id: Some(device_id),
                    ready: true,
                };
            }
            LocalEvent::NotReady => {
                info!("Local playback device went offline");
                self.device.ready = false;
            }
            LocalEvent::StateChanged(Some(snapshot)) => self.apply(TickInput::Local(snapshot)),
            LocalEvent::StateChanged(None) => {}
        }
    }

    /// Run a transport action against the side that owns playback.
    pub async fn execute(&mut self, command: PlayerCommand) -> ReconcileResult<()> {
        debug!(?command, "Player command");
        match command {
            PlayerCommand::TogglePlay => self.toggle_play().await,
            PlayerCommand::Next => match self.local_route() {
                Some(local) => local.next_track().await,
                None => Ok(self.remote.next().await?),
            },
            PlayerCommand::Previous => match self.local_route() {
                Some(local) => local.previous_track().await,
                None => Ok(self.remote.previous().await?),
            },
            PlayerCommand::Seek(position_ms) => match self.local_route() {
                Some(local) => local.seek(position_ms).await,
                None => Ok(self.remote.seek(position_ms).await?),
            },
            PlayerCommand::VolumeUp => {
                let volume = self.volume.increase();
                self.send_volume(volume).await
            }
            PlayerCommand::VolumeDown => {
                let volume = self.volume.decrease();
                self.send_volume(volume).await
            }
            PlayerCommand::SetVolume(level) => {
                let volume = self.volume.set(level);
                self.send_volume(volume).await
            }
            PlayerCommand::ToggleMute => {
                let volume = self.volume.toggle_mute();
                self.send_volume(volume).await
            }
        }
    }

    /// The local device, when the latest snapshot came from it.
    fn local_route(&self) -> Option<&dyn LocalPlayer> {
        let local = self.local.as_deref()?;
        match &self.snapshot {
            Some(snapshot) if snapshot.is_local() && self.device.ready => Some(local),
            _ => None,
        }
    }

    async fn toggle_play(&self) -> ReconcileResult<()> {
        if let Some(local) = self.local_route() {
            return local.toggle_play().await;
        }

        let paused = self.snapshot.as_ref().map_or(true, |s| s.paused);
        if !paused {
            return Ok(self.remote.pause().await?);
        }

        match (self.local.as_deref(), self.device.ready_id()) {
            (Some(local), Some(device_id)) => self.hand_off(local, device_id).await,
            _ => Ok(self.remote.play(None).await?),
        }
    }

    /// Resume on the local device, making it the active device first.
    async fn hand_off(&self, local: &dyn LocalPlayer, device_id: &str) -> ReconcileResult<()> {
        let active = self
            .snapshot
            .as_ref()
            .and_then(|s| s.device_id.as_deref());
        if active != Some(device_id) {
            info!(device_id = %device_id, "Transferring playback to local device");
            self.remote.transfer(device_id, false).await?;
        }
        local.resume().await
    }

    async fn send_volume(&self, volume: u8) -> ReconcileResult<()> {
        match self.local_route() {
            Some(local) => local.set_volume(volume).await,
            None => Ok(self.remote.set_volume(volume).await?),
        }
    }

    /// Move the reconciler onto its own task, ticking every `period`.
    pub fn spawn(self, period: Duration) -> ReconcilerHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(period, snapshot_tx, command_rx, shutdown_rx));

        ReconcilerHandle {
            snapshots: snapshot_rx,
            commands: command_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        period: Duration,
        snapshot_tx: watch::Sender<Option<PlaybackSnapshot>>,
        mut commands: mpsc::Receiver<CommandRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut events = self.events.take();
        let mut auth = self.auth.take();

        let probe_job = match (self.probe, self.local.clone()) {
            (Some(probe), Some(local)) => Some((probe, local)),
            _ => None,
        };
        let mut probing = probe_job.is_some();
        let mut probe = Box::pin(async move {
            match probe_job {
                Some((probe, local)) => probe.run(local.as_ref()).await,
                None => std::future::pending().await,
            }
        });

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_ms = period.as_millis() as u64, "Playback reconciler started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                state = next_auth_state(&mut auth) => match state {
                    Some(AuthState::Anonymous) => {
                        info!("Signed out, stopping playback reconciler");
                        self.snapshot = None;
                        snapshot_tx.send_replace(None);
                        break;
                    }
                    Some(_) => {}
                    None => auth = None,
                },
                outcome = &mut probe, if probing => {
                    probing = false;
                    if outcome == ProbeOutcome::GaveUp && !self.device.ready {
                        debug!("Routing to the remote API until the local device reports ready");
                    }
                }
                event = next_event(&mut events) => match event {
                    Some(event) => {
                        self.handle_event(event);
                        publish(&snapshot_tx, &self.snapshot);
                    }
                    None => events = None,
                },
                Some((command, reply)) = commands.recv() => {
                    let result = self.execute(command).await;
                    if let Err(e) = &result {
                        warn!(?command, error = %e, "Player command failed");
                    }
                    let _ = reply.send(result);
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    publish(&snapshot_tx, &self.snapshot);
                }
            }
        }

        info!("Playback reconciler stopped");
    }
}

fn publish(tx: &watch::Sender<Option<PlaybackSnapshot>>, snapshot: &Option<PlaybackSnapshot>) {
    tx.send_if_modified(|current| {
        if current != snapshot {
            *current = snapshot.clone();
            true
        } else {
            false
        }
    });
}

/// Next auth state; `None` once the sender is gone. Pending forever without a receiver.
async fn next_auth_state(auth: &mut Option<watch::Receiver<AuthState>>) -> Option<AuthState> {
    match auth {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<LocalEvent>>) -> Option<LocalEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Control side of a spawned reconciler.
pub struct ReconcilerHandle {
    snapshots: watch::Receiver<Option<PlaybackSnapshot>>,
    commands: mpsc::Sender<CommandRequest>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// A receiver that wakes on every snapshot change.
    pub fn snapshots(&self) -> watch::Receiver<Option<PlaybackSnapshot>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Option<PlaybackSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Run a command on the reconciler task and wait for its result.
    pub async fn command(&self, command: PlayerCommand) -> ReconcileResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send((command, reply_tx))
            .await
            .map_err(|_| ReconcileError::Stopped)?;
        reply_rx.await.map_err(|_| ReconcileError::Stopped)?
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Playback reconciler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{sample, SourceKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use spotify_api::{ApiError, ApiResult};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct FakeLocal {
        states: Mutex<VecDeque<ReconcileResult<Option<PlaybackSnapshot>>>>,
        log: Log,
        connects: AtomicU32,
        /// Attempt on which `connect` first succeeds; 0 never does.
        ready_on: u32,
    }

    #[async_trait]
    impl LocalPlayer for FakeLocal {
        async fn connect(&self) -> ReconcileResult<bool> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(self.ready_on != 0 && attempt >= self.ready_on)
        }

        async fn current_state(&self) -> ReconcileResult<Option<PlaybackSnapshot>> {
            self.log.lock().push("local:state".to_string());
            self.states.lock().pop_front().unwrap_or(Ok(None))
        }

        async fn toggle_play(&self) -> ReconcileResult<()> {
            self.log.lock().push("local:toggle".to_string());
            Ok(())
        }

        async fn resume(&self) -> ReconcileResult<()> {
            self.log.lock().push("local:resume".to_string());
            Ok(())
        }

        async fn next_track(&self) -> ReconcileResult<()> {
            self.log.lock().push("local:next".to_string());
            Ok(())
        }

        async fn previous_track(&self) -> ReconcileResult<()> {
            self.log.lock().push("local:previous".to_string());
            Ok(())
        }

        async fn seek(&self, position_ms: u64) -> ReconcileResult<()> {
            self.log.lock().push(format!("local:seek:{}", position_ms));
            Ok(())
        }

        async fn set_volume(&self, percent: u8) -> ReconcileResult<()> {
            self.log.lock().push(format!("local:volume:{}", percent));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        states: Mutex<VecDeque<ApiResult<Option<PlaybackSnapshot>>>>,
        /// Answer once `states` runs dry.
        fallback: Option<PlaybackSnapshot>,
        polls: AtomicUsize,
        log: Log,
    }

    #[async_trait]
    impl RemotePlayer for FakeRemote {
        async fn current_playback(&self) -> ApiResult<Option<PlaybackSnapshot>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.states
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        async fn play(&self, device_id: Option<&str>) -> ApiResult<()> {
            self.log.lock().push(format!("remote:play:{:?}", device_id));
            Ok(())
        }

        async fn pause(&self) -> ApiResult<()> {
            self.log.lock().push("remote:pause".to_string());
            Ok(())
        }

        async fn next(&self) -> ApiResult<()> {
            self.log.lock().push("remote:next".to_string());
            Ok(())
        }

        async fn previous(&self) -> ApiResult<()> {
            self.log.lock().push("remote:previous".to_string());
            Ok(())
        }

        async fn seek(&self, position_ms: u64) -> ApiResult<()> {
            self.log.lock().push(format!("remote:seek:{}", position_ms));
            Ok(())
        }

        async fn set_volume(&self, percent: u8) -> ApiResult<()> {
            self.log.lock().push(format!("remote:volume:{}", percent));
            Ok(())
        }

        async fn transfer(&self, device_id: &str, play: bool) -> ApiResult<()> {
            self.log
                .lock()
                .push(format!("remote:transfer:{}:{}", device_id, play));
            Ok(())
        }
    }

    fn paused_remote(track_id: &str, device_id: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            paused: true,
            device_id: Some(device_id.to_string()),
            ..sample(track_id, SourceKind::Remote)
        }
    }

    fn with_ready_local(
        remote: Arc<FakeRemote>,
        local: Arc<FakeLocal>,
    ) -> (PlaybackStateReconciler, mpsc::Sender<LocalEvent>) {
        let (events_tx, events_rx) = mpsc::channel(8);
        let mut reconciler = PlaybackStateReconciler::new(remote).with_local(local, events_rx);
        reconciler.handle_event(LocalEvent::Ready {
            device_id: "local-1".to_string(),
        });
        (reconciler, events_tx)
    }

    fn log_of(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    #[tokio::test]
    async fn test_silent_local_and_empty_remote_keep_last_snapshot() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            states: Mutex::new(VecDeque::from(vec![
                Ok(Some(sample("t1", SourceKind::Local))),
                Ok(Some(sample("t2", SourceKind::Local))),
                Err(ReconcileError::DeviceUnavailable("no response".to_string())),
            ])),
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            states: Mutex::new(VecDeque::from(vec![Ok(None)])),
            log,
            ..FakeRemote::default()
        });
        let (mut reconciler, _events) = with_ready_local(remote.clone(), local);

        reconciler.tick().await;
        let after_second = reconciler.tick().await.cloned();
        let after_third = reconciler.tick().await.cloned();

        assert_eq!(after_second.as_ref().unwrap().track_id, "t2");
        assert_eq!(after_third, after_second);
        assert_eq!(after_third.unwrap().source, SourceKind::Local);
        assert_eq!(remote.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_used_without_local_device() {
        let remote = Arc::new(FakeRemote {
            states: Mutex::new(VecDeque::from(vec![Ok(Some(sample(
                "t1",
                SourceKind::Local,
            )))])),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);

        let snapshot = reconciler.tick().await.cloned().unwrap();
        assert_eq!(snapshot.source, SourceKind::Remote);
        assert_eq!(snapshot.track_id, "t1");
    }

    #[tokio::test]
    async fn test_remote_error_keeps_previous() {
        let remote = Arc::new(FakeRemote {
            states: Mutex::new(VecDeque::from(vec![
                Ok(Some(sample("t1", SourceKind::Remote))),
                Err(ApiError::Transport("timed out".to_string())),
            ])),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);

        let first = reconciler.tick().await.cloned();
        let second = reconciler.tick().await.cloned();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_local_not_queried_before_ready() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            states: Mutex::new(VecDeque::from(vec![Ok(Some(sample("t1", SourceKind::Local)))])),
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            fallback: Some(sample("r1", SourceKind::Remote)),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let (_events_tx, events_rx) = mpsc::channel(8);
        let mut reconciler = PlaybackStateReconciler::new(remote).with_local(local, events_rx);

        let snapshot = reconciler.tick().await.cloned().unwrap();
        assert_eq!(snapshot.track_id, "r1");
        assert!(log_of(&log).is_empty());
    }

    #[tokio::test]
    async fn test_commands_follow_local_source() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            states: Mutex::new(VecDeque::from(vec![Ok(Some(sample("t1", SourceKind::Local)))])),
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            log: log.clone(),
            ..FakeRemote::default()
        });
        let (mut reconciler, _events) = with_ready_local(remote, local);
        reconciler.tick().await;

        reconciler.execute(PlayerCommand::Next).await.unwrap();
        reconciler.execute(PlayerCommand::Seek(5_000)).await.unwrap();
        reconciler.execute(PlayerCommand::TogglePlay).await.unwrap();

        assert_eq!(
            log_of(&log),
            vec!["local:state", "local:next", "local:seek:5000", "local:toggle"]
        );
    }

    #[tokio::test]
    async fn test_commands_follow_remote_source() {
        let log = Log::default();
        let remote = Arc::new(FakeRemote {
            fallback: Some(sample("t1", SourceKind::Remote)),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);
        reconciler.tick().await;

        reconciler.execute(PlayerCommand::TogglePlay).await.unwrap();
        reconciler.execute(PlayerCommand::Previous).await.unwrap();

        assert_eq!(log_of(&log), vec!["remote:pause", "remote:previous"]);
    }

    #[tokio::test]
    async fn test_resume_hands_off_to_ready_local_device() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            fallback: Some(paused_remote("t1", "phone")),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let (mut reconciler, _events) = with_ready_local(remote, local);
        reconciler.tick().await;
        log.lock().clear();

        reconciler.execute(PlayerCommand::TogglePlay).await.unwrap();

        assert_eq!(
            log_of(&log),
            vec!["remote:transfer:local-1:false", "local:resume"]
        );
    }

    #[tokio::test]
    async fn test_resume_on_already_active_local_device_skips_transfer() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            fallback: Some(paused_remote("t1", "local-1")),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let (mut reconciler, _events) = with_ready_local(remote, local);
        reconciler.tick().await;
        log.lock().clear();

        reconciler.execute(PlayerCommand::TogglePlay).await.unwrap();

        assert_eq!(log_of(&log), vec!["local:resume"]);
    }

    #[tokio::test]
    async fn test_resume_without_local_device_plays_remote() {
        let log = Log::default();
        let remote = Arc::new(FakeRemote {
            fallback: Some(paused_remote("t1", "phone")),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);
        reconciler.tick().await;

        reconciler.execute(PlayerCommand::TogglePlay).await.unwrap();

        assert_eq!(log_of(&log), vec!["remote:play:None"]);
    }

    #[tokio::test]
    async fn test_volume_starts_from_reported_level() {
        let log = Log::default();
        let remote = Arc::new(FakeRemote {
            fallback: Some(PlaybackSnapshot {
                volume: Some(95),
                ..sample("t1", SourceKind::Remote)
            }),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);
        reconciler.tick().await;

        reconciler.execute(PlayerCommand::VolumeUp).await.unwrap();
        reconciler.execute(PlayerCommand::ToggleMute).await.unwrap();
        reconciler.execute(PlayerCommand::ToggleMute).await.unwrap();

        assert_eq!(
            log_of(&log),
            vec!["remote:volume:100", "remote:volume:0", "remote:volume:100"]
        );
    }

    #[tokio::test]
    async fn test_toggle_mute_from_reported_silence_restores_default() {
        let log = Log::default();
        let remote = Arc::new(FakeRemote {
            fallback: Some(PlaybackSnapshot {
                volume: Some(0),
                ..sample("t1", SourceKind::Remote)
            }),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let mut reconciler = PlaybackStateReconciler::new(remote);
        reconciler.tick().await;

        reconciler.execute(PlayerCommand::ToggleMute).await.unwrap();

        assert_eq!(log_of(&log), vec!["remote:volume:50"]);
        assert!(!reconciler.volume().is_muted());
    }

    #[tokio::test]
    async fn test_local_routing_follows_device_readiness() {
        let log = Log::default();
        let local = Arc::new(FakeLocal {
            states: Mutex::new(VecDeque::from(vec![
                Ok(Some(sample("t1", SourceKind::Local))),
                Ok(Some(sample("t2", SourceKind::Local))),
            ])),
            log: log.clone(),
            ..FakeLocal::default()
        });
        let remote = Arc::new(FakeRemote {
            fallback: Some(sample("r1", SourceKind::Remote)),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let (mut reconciler, _events) = with_ready_local(remote, local);
        assert_eq!(reconciler.tick().await.unwrap().track_id, "t1");

        reconciler.handle_event(LocalEvent::NotReady);
        log.lock().clear();
        assert_eq!(reconciler.tick().await.unwrap().track_id, "r1");
        reconciler.execute(PlayerCommand::Next).await.unwrap();
        assert_eq!(log_of(&log), vec!["remote:next"]);

        reconciler.handle_event(LocalEvent::Ready {
            device_id: "local-1".to_string(),
        });
        log.lock().clear();
        assert_eq!(reconciler.tick().await.unwrap().track_id, "t2");
        reconciler.execute(PlayerCommand::Next).await.unwrap();
        assert_eq!(log_of(&log), vec!["local:state", "local:next"]);
    }

    #[tokio::test]
    async fn test_pushed_state_applies_immediately() {
        let remote = Arc::new(FakeRemote::default());
        let local = Arc::new(FakeLocal::default());
        let (mut reconciler, _events) = with_ready_local(remote, local);

        reconciler.handle_event(LocalEvent::StateChanged(Some(sample("t9", SourceKind::Remote))));
        let snapshot = reconciler.snapshot().unwrap();
        assert_eq!(snapshot.track_id, "t9");
        assert_eq!(snapshot.source, SourceKind::Local);

        reconciler.handle_event(LocalEvent::NotReady);
        assert!(!reconciler.device().ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_gives_up_after_bounded_attempts() {
        let local = FakeLocal::default();
        let outcome = DeviceProbe::new(3, Duration::from_millis(500))
            .run(&local)
            .await;

        assert_eq!(outcome, ProbeOutcome::GaveUp);
        assert_eq!(local.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_connects() {
        let local = FakeLocal {
            ready_on: 2,
            ..FakeLocal::default()
        };
        let outcome = DeviceProbe::default().run(&local).await;

        assert_eq!(outcome, ProbeOutcome::Connected);
        assert_eq!(local.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_publishes_and_runs_commands() {
        let log = Log::default();
        let remote = Arc::new(FakeRemote {
            fallback: Some(sample("t1", SourceKind::Remote)),
            log: log.clone(),
            ..FakeRemote::default()
        });
        let handle = PlaybackStateReconciler::new(remote).spawn(Duration::from_secs(1));

        let mut snapshots = handle.snapshots();
        snapshots.changed().await.unwrap();
        assert_eq!(handle.latest().unwrap().track_id, "t1");

        handle.command(PlayerCommand::Next).await.unwrap();
        assert_eq!(log_of(&log), vec!["remote:next"]);

        assert!(handle.is_running());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_stops_on_sign_out() {
        let remote = Arc::new(FakeRemote {
            fallback: Some(sample("t1", SourceKind::Remote)),
            ..FakeRemote::default()
        });
        let (auth_tx, auth_rx) = watch::channel(AuthState::Authenticated);
        let handle = PlaybackStateReconciler::new(remote)
            .watch_auth(auth_rx)
            .spawn(Duration::from_secs(1));

        let mut snapshots = handle.snapshots();
        snapshots.changed().await.unwrap();
        assert!(handle.latest().is_some());

        auth_tx.send(AuthState::Anonymous).unwrap();
        snapshots.changed().await.unwrap();
        assert!(handle.latest().is_none());

        let err = handle.command(PlayerCommand::Next).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_probes_then_applies_events() {
        let remote = Arc::new(FakeRemote::default());
        let local = Arc::new(FakeLocal::default());
        let (events_tx, events_rx) = mpsc::channel(8);
        let handle = PlaybackStateReconciler::new(remote)
            .with_local(local.clone(), events_rx)
            .with_probe(DeviceProbe::new(2, Duration::from_millis(500)))
            .spawn(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(local.connects.load(Ordering::SeqCst), 2);

        events_tx
            .send(LocalEvent::StateChanged(Some(sample("t5", SourceKind::Local))))
            .await
            .unwrap();
        let mut snapshots = handle.snapshots();
        snapshots.changed().await.unwrap();
        assert_eq!(handle.latest().unwrap().track_id, "t5");

        handle.shutdown().await;
    }
}
