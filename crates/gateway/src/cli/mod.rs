pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};

/// Wayfarer — a conversational flight-search backend.
#[derive(Debug, Parser)]
#[command(name = "wayfarer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Interactive chat REPL against the local runtime.
    Chat {
        /// User id for the REPL session.
        #[arg(long, default_value = "cli:chat")]
        user: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `WAYFARER_CONFIG` (or
/// `wayfarer.toml` by default). Returns the parsed config and the path
/// that was used.
///
/// Shared by `serve`, `chat`, and the `config` subcommands so the logic
/// lives in one place.
pub fn load_config() -> anyhow::Result<(wf_domain::config::Config, String)> {
    let config_path =
        std::env::var("WAYFARER_CONFIG").unwrap_or_else(|_| "wayfarer.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        wf_domain::config::Config::default()
    };

    Ok((config, config_path))
}
