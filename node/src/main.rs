use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use node::state::generate_key;
use node::{NodeState, http, tcp};
use shared::config::load_node_config;
use shared::tls::acceptor_from_config;

#[derive(Parser, Debug)]
#[command(version, about = "Storage node serving file bytes to the proxy")]
struct Cli {
    /// Path to node.toml
    #[arg(short, long, default_value = "node.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the TCP and HTTP file endpoints (default)
    Serve,
    /// Write a new shared secret to the config file and print it.
    /// A running node picks it up on SIGHUP.
    RotateKey {
        /// Use this key instead of a random one
        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = load_node_config(&cli.config)
        .with_context(|| format!("Failed to load config at `{}`", cli.config.display()))?;
    let state = NodeState::new(config, &cli.config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::RotateKey { key } => {
            let key = key.unwrap_or_else(generate_key);
            state
                .rotate_key(key.clone())
                .context("Failed to rotate key")?;
            println!("{}", key);
            Ok(())
        }
    }
}

async fn serve(state: NodeState) -> Result<()> {
    let config = state.config();
    info!("Starting node {}", config.id);

    state
        .store
        .ensure_root()
        .await
        .context("Failed to prepare data directory")?;

    let tls = acceptor_from_config(&config.app.tls)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_addr = config.app.http_addr();
    let http_listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", http_addr))?;
    let http_task = tokio::spawn(http::serve(
        http_listener,
        tls.clone(),
        state.clone(),
        stopped(shutdown_rx.clone()),
    ));

    let tcp_task = match config.app.tcp_addr() {
        Some(addr) => {
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            Some(tokio::spawn(tcp::serve(
                listener,
                tls,
                state.clone(),
                stopped(shutdown_rx.clone()),
            )))
        }
        None => {
            info!("TCP endpoint disabled");
            None
        }
    };

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(state.clone()));

    shutdown_signal().await;
    info!("Shutdown requested, no longer accepting connections");
    let _ = shutdown_tx.send(true);

    http_task.await.context("HTTP listener task panicked")??;
    if let Some(task) = tcp_task {
        task.await.context("TCP listener task panicked")??;
    }

    info!("Node stopped");
    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(unix)]
async fn reload_on_hangup(state: NodeState) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading {}", state.config_path().display());
        if let Err(e) = state.reload() {
            error!("Reload failed, keeping current configuration: {}", e);
        }
    }
}
