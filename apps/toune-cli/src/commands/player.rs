//! Playback commands.
//!
//! The CLI has no playback device of its own, so the reconciler always runs
//! with only the remote source and every command goes to the Web API.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use playback_reconciler::{PlaybackSnapshot, PlaybackStateReconciler, PlayerCommand};
use spotify_api::{format_duration, SpotifyClient};
use std::sync::Arc;
use tracing::debug;

/// Show what is playing; with `watch`, keep printing changes until Ctrl-C.
pub async fn now(ctx: &Context, watch: bool) -> Result<()> {
    let client = Arc::new(ctx.client()?);

    if !watch {
        let mut reconciler = PlaybackStateReconciler::new(client);
        let snapshot = reconciler.tick().await.cloned();
        return print_snapshot(snapshot.as_ref(), ctx.format);
    }

    let auth = client.auth().subscribe();
    let handle = PlaybackStateReconciler::new(client)
        .watch_auth(auth)
        .spawn(ctx.config.poll_interval());
    let mut snapshots = handle.snapshots();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping watch");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(snapshot.as_ref(), ctx.format)?;
                if !handle.is_running() {
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Run one transport command against the current playback.
pub async fn player_command(ctx: &Context, command: PlayerCommand) -> Result<()> {
    let client = Arc::new(ctx.client()?);
    let mut reconciler = PlaybackStateReconciler::new(client);

    // Routing and the volume baseline both come from the latest snapshot.
    reconciler.tick().await;
    reconciler.execute(command).await?;

    let message = match command {
        PlayerCommand::TogglePlay => match reconciler.snapshot() {
            Some(snapshot) if !snapshot.paused => "Paused".to_string(),
            _ => "Playing".to_string(),
        },
        PlayerCommand::Next => "Skipped to next track".to_string(),
        PlayerCommand::Previous => "Back to previous track".to_string(),
        PlayerCommand::Seek(position_ms) => format!("Seeked to {}", format_duration(position_ms)),
        PlayerCommand::VolumeUp
        | PlayerCommand::VolumeDown
        | PlayerCommand::SetVolume(_)
        | PlayerCommand::ToggleMute => {
            let volume = reconciler.volume();
            if volume.is_muted() {
                "Muted".to_string()
            } else {
                format!("Volume {}%", volume.volume())
            }
        }
    };
    output::print_success(&message, ctx.format);
    Ok(())
}

/// Start playing a track URI on the active device.
pub async fn play(ctx: &Context, uri: &str) -> Result<()> {
    let client: SpotifyClient = ctx.client()?;
    client.play(None, Some(&[uri.to_string()])).await?;
    output::print_success(&format!("Playing {}", uri), ctx.format);
    Ok(())
}

fn print_snapshot(snapshot: Option<&PlaybackSnapshot>, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return output::print_json(&snapshot);
    }

    let Some(snapshot) = snapshot else {
        println!("Nothing playing");
        return Ok(());
    };

    output::print_heading(&snapshot.track_name);
    output::print_row("Artist", &snapshot.artists.join(", "));
    output::print_row(
        "Status",
        if snapshot.paused { "paused" } else { "playing" },
    );
    output::print_row(
        "Progress",
        &format!(
            "{} {} / {}",
            output::progress_bar(snapshot.progress_percent() / 100.0, 20),
            format_duration(snapshot.position_ms),
            format_duration(snapshot.duration_ms)
        ),
    );
    if let Some(volume) = snapshot.volume {
        output::print_row("Volume", &format!("{}%", volume));
    }
    output::print_row(
        "Shuffle",
        if snapshot.shuffle { "on" } else { "off" },
    );
    output::print_row("Repeat", &format!("{:?}", snapshot.repeat).to_lowercase());
    output::print_row("URI", &snapshot.track_uri);
    Ok(())
}
