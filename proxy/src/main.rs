use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use proxy::auth::UserTokenKeys;
use proxy::router::NodeClient;
use proxy::router::filename::content_type_for;
use proxy::{AppState, Catalog, SqliteCatalog, http};
use shared::SharedSecret;
use shared::config::load_proxy_config;
use shared::tls::{acceptor_from_config, insecure_connector};
use shared::types::{NewFile, NodeInfo, ProxyConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Proxy that authenticates clients and streams files from storage nodes")]
struct Cli {
    /// Path to proxy.toml
    #[arg(short, long, default_value = "proxy.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Register a storage node in the catalog, or update an existing one
    AddNode {
        /// Keep an existing node id; a new one is generated otherwise
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        address: String,
        #[arg(long)]
        http_port: u16,
        /// Omit for nodes that only serve HTTP
        #[arg(long)]
        tcp_port: Option<u16>,
        #[arg(long, default_value_t = false)]
        tls: bool,
    },
    /// Send a local file to a node over TCP and record it in the catalog
    Upload {
        /// Target node id
        #[arg(long)]
        node: Uuid,
        /// Email of the owning account
        #[arg(long)]
        owner: String,
        /// Display name; defaults to the file name
        #[arg(long)]
        name: Option<String>,
        /// Defaults to a guess from the extension
        #[arg(long)]
        content_type: Option<String>,
        path: PathBuf,
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

    let config = load_proxy_config(&cli.config)
        .with_context(|| format!("Failed to load config at `{}`", cli.config.display()))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, cli.config).await,
        Command::AddNode {
            id,
            address,
            http_port,
            tcp_port,
            tls,
        } => {
            let catalog = open_catalog(&config).await?;
            let node = NodeInfo {
                id: id.unwrap_or_else(Uuid::new_v4),
                address,
                http_port,
                tcp_port,
                tls,
            };
            catalog
                .register_node(&node)
                .await
                .context("Failed to register node")?;
            println!("{}", node.id);
            Ok(())
        }
        Command::Upload {
            node,
            owner,
            name,
            content_type,
            path,
        } => upload(&config, node, &owner, name, content_type, &path).await,
    }
}

async fn open_catalog(config: &ProxyConfig) -> Result<SqliteCatalog> {
    SqliteCatalog::connect(&config.catalog.database_url)
        .await
        .with_context(|| format!("Failed to open catalog `{}`", config.catalog.database_url))
}

async fn serve(config: ProxyConfig, config_path: PathBuf) -> Result<()> {
    let catalog = open_catalog(&config).await?;
    let user_keys = UserTokenKeys::load(&config.auth.ed_private_key, &config.auth.ed_public_key)
        .await
        .context("Failed to load user token keys")?;
    let state = AppState::new(&config, user_keys, Arc::new(catalog))?;

    let tls = acceptor_from_config(&config.tls)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let server = tokio::spawn(http::serve(
        listener,
        tls,
        state.clone(),
        stopped(shutdown_rx),
    ));

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(state, config_path));
    #[cfg(not(unix))]
    let _ = (state, config_path);

    shutdown_signal().await;
    info!("Shutdown requested, no longer accepting connections");
    let _ = shutdown_tx.send(true);

    server.await.context("HTTP listener task panicked")??;
    info!("Proxy stopped");
    Ok(())
}

async fn upload(
    config: &ProxyConfig,
    node_id: Uuid,
    owner: &str,
    name: Option<String>,
    content_type: Option<String>,
    path: &Path,
) -> Result<()> {
    let catalog = open_catalog(config).await?;

    let owner = catalog
        .get_credential_by_email(owner)
        .await?
        .filter(|c| !c.deleted)
        .with_context(|| format!("No active account for `{}`", owner))?;
    let node = catalog
        .get_node(node_id)
        .await
        .with_context(|| format!("Unknown node {}", node_id))?;

    let key = config
        .resolved_key()
        .context("No node shared secret configured (key or APP_KEY)")?;
    let client = NodeClient::new(SharedSecret::new(key), insecure_connector()?);

    let checksum = file_checksum(path).await?;
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open `{}`", path.display()))?;

    let file_id = Uuid::new_v4();
    client
        .upload_tcp(&node, file_id, &mut file)
        .await
        .context("Upload failed")?;

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_id.to_string())
    });
    catalog
        .register_file(&NewFile {
            id: file_id,
            owner_id: owner.id,
            node_id: node.id,
            name,
            content_type: content_type.unwrap_or_else(|| content_type_for(path).to_string()),
            checksum,
        })
        .await
        .context("Failed to record file in catalog")?;

    println!("{}", file_id);
    Ok(())
}

/// Hex SHA-256 of a local file.
async fn file_checksum(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open `{}`", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
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
async fn reload_on_hangup(state: AppState, path: PathBuf) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading {}", path.display());
        if let Err(e) = state.reload(&path) {
            error!("Reload failed, keeping current node secret: {}", e);
        }
    }
}
