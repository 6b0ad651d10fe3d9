//! CLI command implementations.

mod auth;
mod config;
mod player;
mod search;

pub use auth::{callback, login, logout, status, whoami};
pub use config::{config_set_client_id, config_show};
pub use player::{now, play, player_command};
pub use search::{queue_add, queue_show, search, track};

use crate::output::OutputFormat;
use anyhow::{Context as _, Result};
use spotify_api::SpotifyClient;
use spotify_auth::AuthSession;
use std::path::PathBuf;
use std::sync::Arc;
use token_storage::{FileStorage, TokenStore};
use toune_config::{Config, Paths};

/// Everything a command needs: where files live, the loaded config and the output format.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    pub fn load(base_dir: Option<PathBuf>, format: OutputFormat) -> Result<Self> {
        let paths = match base_dir {
            Some(dir) => Paths::with_base_dir(dir),
            None => Paths::new().context("Failed to resolve the Toune home directory")?,
        };
        let config = Config::load(&paths).context("Failed to load config")?;
        Ok(Self {
            paths,
            config,
            format,
        })
    }

    /// An auth session backed by the session file, with any stored tokens restored.
    pub fn session(&self) -> Result<Arc<AuthSession>> {
        self.config.validate()?;
        self.paths.ensure_dirs()?;

        let store = TokenStore::new(Box::new(FileStorage::new(self.paths.session_file())));
        let session = Arc::new(AuthSession::from_config(self.config.clone(), store));
        session.restore();
        Ok(session)
    }

    /// A signed-in API client, or an error telling the user to log in.
    pub fn client(&self) -> Result<SpotifyClient> {
        let session = self.session()?;
        if !session.is_authenticated() {
            anyhow::bail!("Not logged in. Run 'toune login' first");
        }
        Ok(SpotifyClient::new(session))
    }
}
