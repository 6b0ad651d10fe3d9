//! Config commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use toune_config::Config;

pub async fn config_show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    match ctx.format {
        OutputFormat::Text => {
            output::print_heading(&ctx.paths.config_file().display().to_string());
            let client_id = if config.client_id.is_empty() {
                "(not set)"
            } else {
                config.client_id.as_str()
            };
            output::print_row("Client ID", client_id);
            output::print_row("Redirect", &config.redirect_uri);
            output::print_row("Scopes", &config.scopes);
            output::print_row("Poll", &format!("{} ms", config.poll_interval_ms));
            output::print_row("Page size", &config.search_page_size.to_string());
            output::print_row("Log level", &config.log_level);
        }
        OutputFormat::Json => output::print_json(config)?,
    }
    Ok(())
}

pub async fn config_set_client_id(ctx: &Context, client_id: &str) -> Result<()> {
    let client_id = client_id.trim();
    if client_id.is_empty() {
        anyhow::bail!("Client ID cannot be empty");
    }

    // Start from the file, not the loaded config, so env overrides are not persisted.
    let path = ctx.paths.config_file();
    let mut config = if path.exists() {
        Config::load_from_file(&path)?
    } else {
        Config::default()
    };
    config.client_id = client_id.to_string();
    config.save(&ctx.paths)?;

    output::print_success("Client ID saved", ctx.format);
    Ok(())
}
