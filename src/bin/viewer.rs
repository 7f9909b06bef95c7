//! Corewatch
//!
//! Terminal dashboard for live per-core CPU telemetry. Streams samples from
//! the telemetry server over WebSocket and lets the operator freeze the
//! display into a snapshot, which is sent to the text-generation endpoint
//! for analysis.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use corewatch::app::App;
use corewatch::config::Config;

#[derive(Parser, Debug)]
#[command(name = "corewatch")]
#[command(about = "Terminal dashboard for per-core CPU telemetry", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Telemetry server URL (overrides config file)
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,
}

/// Logs go to a file: the TUI owns the terminal, so nothing may write to
/// stdout or stderr while it runs. Falls back to errors-only on stderr if
/// the file cannot be opened.
fn init_logging() {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("corewatch");
    std::fs::create_dir_all(&log_dir).ok();

    let builder = tracing_subscriber::fmt().with_target(false);

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("viewer.log"))
    {
        Ok(file) => builder.with_writer(file).init(),
        Err(_) => builder.with_max_level(tracing::Level::ERROR).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Override with CLI args if provided
    let config = Config {
        server_url: args.url.unwrap_or(config.server_url),
        ..config
    };

    // Create and run the app
    let mut app = App::new(config);
    app.run().await?;

    Ok(())
}
