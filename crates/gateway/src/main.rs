use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wf_domain::config::Config;
use wf_gateway::cli::{self, Cli, Command, ConfigCommand};
use wf_gateway::{api, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, config_path) = cli::load_config()?;
            init_tracing();
            run_server(Arc::new(config), config_path).await
        }
        Some(Command::Chat { user }) => {
            init_cli_tracing();
            let (config, _) = cli::load_config()?;
            cli::chat::chat(Arc::new(config), user).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("wayfarer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured tracing for the server (`RUST_LOG` overrides the default).
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wf_gateway=debug"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Compact stderr-only tracing for CLI commands, so diagnostic output
/// does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>, config_path: String) -> anyhow::Result<()> {
    tracing::info!(config = %config_path, "Wayfarer starting");

    let state = bootstrap::build_app_state(config.clone()).await?;

    // Backpressure protection for the transport-facing handler.
    let max_concurrent = std::env::var("WAYFARER_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    let app = api::router(state)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
