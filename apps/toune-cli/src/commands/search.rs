//! Catalog commands: search, queue and track lookup.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use spotify_api::{artists_string, format_duration, SearchPager, Track};

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    total: u32,
    has_more: bool,
    tracks: &'a [Track],
}

/// Search tracks, loading up to `pages` pages.
pub async fn search(ctx: &Context, query: &str, limit: Option<u32>, pages: u32) -> Result<()> {
    let client = ctx.client()?;
    let mut pager = SearchPager::new(limit.unwrap_or(ctx.config.search_page_size));
    pager.reset(query);

    for _ in 0..pages.max(1) {
        if !pager.has_more() {
            break;
        }
        pager.load_more(&client).await?;
    }

    match ctx.format {
        OutputFormat::Text => {
            if pager.tracks().is_empty() {
                println!("No tracks found for \"{}\"", query.trim());
                return Ok(());
            }
            output::print_heading(&format!(
                "{} of {} results for \"{}\"",
                pager.tracks().len(),
                pager.total(),
                pager.query()
            ));
            print_tracks(pager.tracks());
            if pager.has_more() {
                println!("\nMore results available (use --pages to load more)");
            }
        }
        OutputFormat::Json => output::print_json(&SearchOutput {
            query: pager.query(),
            total: pager.total(),
            has_more: pager.has_more(),
            tracks: pager.tracks(),
        })?,
    }
    Ok(())
}

pub async fn queue_show(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let queue = client.queue().await?;

    match ctx.format {
        OutputFormat::Text => {
            match &queue.currently_playing {
                Some(track) => println!("Now: {} - {}", track.name, artists_string(&track.artists)),
                None => println!("Now: nothing"),
            }
            if queue.queue.is_empty() {
                println!("Queue is empty");
            } else {
                output::print_heading("Up next");
                print_tracks(&queue.queue);
            }
        }
        OutputFormat::Json => output::print_json(&queue)?,
    }
    Ok(())
}

pub async fn queue_add(ctx: &Context, uri: &str) -> Result<()> {
    let client = ctx.client()?;
    client.add_to_queue(uri, None).await?;
    output::print_success(&format!("Queued {}", uri), ctx.format);
    Ok(())
}

pub async fn track(ctx: &Context, id: &str) -> Result<()> {
    let client = ctx.client()?;
    let track = client.track(id).await?;

    match ctx.format {
        OutputFormat::Text => {
            output::print_heading(&track.name);
            output::print_row("Artist", &artists_string(&track.artists));
            output::print_row("Album", &track.album.name);
            output::print_row("Length", &format_duration(track.duration_ms));
            if let Some(cover) = track.album.cover_url() {
                output::print_row("Cover", cover);
            }
            output::print_row("URI", &track.uri);
        }
        OutputFormat::Json => output::print_json(&track)?,
    }
    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    for (index, track) in tracks.iter().enumerate() {
        println!(
            "{:>3}. {} - {} [{}]{}",
            index + 1,
            track.name,
            artists_string(&track.artists),
            format_duration(track.duration_ms),
            if track.explicit { " E" } else { "" }
        );
        println!("     {}", track.uri);
    }
}
