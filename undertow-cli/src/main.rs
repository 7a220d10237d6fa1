//! Undertow CLI - Command-line interface
//!
//! Provides command-line access to the Undertow streaming server.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "undertow")]
#[command(about = "A BitTorrent streaming range server")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    commands::handle_command(cli.command).await?;

    Ok(())
}
