//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use undertow_core::engine::memory::InMemorySwarmEngine;
use undertow_core::{SwarmEngine, UndertowConfig};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the range server
    Serve {
        /// Port to bind on 127.0.0.1
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Directory holding downloaded torrent payloads
        #[arg(long)]
        download_dir: Option<PathBuf>,
        /// Fixed stream token (a fresh one is generated when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Add a torrent by magnet link and print its info hash
    Add {
        /// Magnet link
        magnet: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            port,
            download_dir,
            token,
        } => serve(port, download_dir, token).await,
        Commands::Add { magnet } => add_torrent(magnet).await,
    }
}

/// Start the loopback range server with an in-memory engine.
async fn serve(port: u16, download_dir: Option<PathBuf>, token: Option<String>) -> anyhow::Result<()> {
    let mut config = UndertowConfig::default();
    config.server.port = port;
    config.server.stream_token = token;
    if let Some(dir) = download_dir {
        config.library.download_dir = dir;
    }

    let engine: Arc<dyn SwarmEngine> = Arc::new(InMemorySwarmEngine::new());
    undertow_web::run_server(config, engine).await?;

    Ok(())
}

/// Add a torrent by magnet link
async fn add_torrent(magnet: String) -> anyhow::Result<()> {
    let engine = InMemorySwarmEngine::new();

    println!("Adding magnet link: {magnet}");
    let info_hash = engine.add_magnet(&magnet).await?;
    println!("Successfully added torrent: {info_hash}");

    Ok(())
}
