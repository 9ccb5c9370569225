pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};
use rosterwatch_domain::config::Config;

/// rosterwatch — controller roster audit gateway.
#[derive(Debug, Parser)]
#[command(name = "rosterwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Run a single scheduler tick and exit (for external cron invocation).
    Tick,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load configuration from the path named by `ROSTERWATCH_CONFIG` (or
/// `config.toml` by default). Shared by `serve`, `doctor`, `tick`, and
/// the `config` subcommands so the loading logic lives in one place.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("ROSTERWATCH_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    let config = Config {
        github: config.github.with_env_overrides(),
        feed: config.feed.with_env_overrides(),
        server: config.server.with_env_overrides(),
        ..config
    };

    Ok((config, config_path))
}
