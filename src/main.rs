//! ClipSync - clipboard synchronization between a host and a guest
//!
//! This is the main entry point for the ClipSync application.

use clap::Parser;
use clip_sync::{
    cli::Cli,
    clipboard::ArboardClipboard,
    logging::{init_logging, LogLevel},
    session::run_session,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    info!("Starting ClipSync v{}", env!("CARGO_PKG_VERSION"));

    let manager = cli.config_manager();
    let config = match cli.load_config(manager.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("clip-sync: {e}");
            std::process::exit(1);
        }
    };

    let role = cli.role();
    info!(
        "Running as {} on {}:{}",
        role, config.network.address, config.network.port
    );

    match run_session(&config, role, ArboardClipboard::new).await {
        Ok(reason) => info!("Session ended: {}", reason),
        Err(e) => {
            error!("Session failed: {}", e);
            eprintln!("clip-sync: {e}");
            std::process::exit(1);
        }
    }
}
