//! Toune CLI - Spotify sign-in and playback control from the terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Context;
use playback_reconciler::PlayerCommand;
use std::path::PathBuf;

/// Toune CLI - Sign in to Spotify and control playback.
#[derive(Parser)]
#[command(name = "toune")]
#[command(about = "Spotify sign-in and playback control")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config, session and logs (default: ~/.toune)
    #[arg(long, env = "TOUNE_HOME", global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Spotify in the browser
    Login {
        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Finish a sign-in from a pasted redirect URL
    Callback {
        /// The full URL the browser was redirected to
        url: String,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Check authentication status
    Status,

    /// Show the signed-in Spotify profile
    Whoami,

    /// Show what is playing
    Now {
        /// Keep watching and print every change
        #[arg(short, long)]
        watch: bool,
    },

    /// Play or pause
    Toggle,

    /// Skip to the next track
    Next,

    /// Go back to the previous track
    Prev,

    /// Seek within the current track
    Seek {
        /// Position in milliseconds
        position_ms: u64,
    },

    /// Change the volume
    Volume {
        #[command(subcommand)]
        command: VolumeCommands,
    },

    /// Search the catalog for tracks
    Search {
        /// Search query
        query: String,
        /// Results per page (1-50)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Number of pages to load
        #[arg(short, long, default_value = "1")]
        pages: u32,
    },

    /// Show the play queue, or add to it
    Queue {
        #[command(subcommand)]
        command: Option<QueueCommands>,
    },

    /// Show details for a track
    Track {
        /// Track ID
        id: String,
    },

    /// Play a track URI on the active device
    Play {
        /// Track URI (spotify:track:...)
        uri: String,
    },

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum VolumeCommands {
    /// Raise the volume one step
    Up,
    /// Lower the volume one step
    Down,
    /// Mute, or restore the level from before muting
    Mute,
    /// Set an exact level
    Set {
        /// Level from 0 to 100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Add a track URI to the queue
    Add {
        /// Track URI (spotify:track:...)
        uri: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Store the Spotify application client ID
    SetClientId {
        /// Client ID from the Spotify developer dashboard
        client_id: String,
    },
}

async fn run(cli: Cli, ctx: Context) -> anyhow::Result<()> {
    match cli.command {
        Commands::Login { no_browser } => commands::login(&ctx, no_browser).await,
        Commands::Callback { url } => commands::callback(&ctx, &url).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Status => commands::status(&ctx).await,
        Commands::Whoami => commands::whoami(&ctx).await,
        Commands::Now { watch } => commands::now(&ctx, watch).await,
        Commands::Toggle => commands::player_command(&ctx, PlayerCommand::TogglePlay).await,
        Commands::Next => commands::player_command(&ctx, PlayerCommand::Next).await,
        Commands::Prev => commands::player_command(&ctx, PlayerCommand::Previous).await,
        Commands::Seek { position_ms } => {
            commands::player_command(&ctx, PlayerCommand::Seek(position_ms)).await
        }
        Commands::Volume { command } => {
            let command = match command {
                VolumeCommands::Up => PlayerCommand::VolumeUp,
                VolumeCommands::Down => PlayerCommand::VolumeDown,
                VolumeCommands::Mute => PlayerCommand::ToggleMute,
                VolumeCommands::Set { level } => PlayerCommand::SetVolume(level),
            };
            commands::player_command(&ctx, command).await
        }
        Commands::Search {
            query,
            limit,
            pages,
        } => commands::search(&ctx, &query, limit, pages).await,
        Commands::Queue { command } => match command {
            None => commands::queue_show(&ctx).await,
            Some(QueueCommands::Add { uri }) => commands::queue_add(&ctx, &uri).await,
        },
        Commands::Track { id } => commands::track(&ctx, &id).await,
        Commands::Play { uri } => commands::play(&ctx, &uri).await,
        Commands::Config { command } => match command {
            None | Some(ConfigCommands::Show) => commands::config_show(&ctx).await,
            Some(ConfigCommands::SetClientId { client_id }) => {
                commands::config_set_client_id(&ctx, &client_id).await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let ctx = match Context::load(cli.base_dir.clone(), format) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    toune_config::init_logging(&ctx.paths, "cli", &level, false);

    if let Err(e) = run(cli, ctx).await {
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
}
