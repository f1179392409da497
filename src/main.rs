//! Entry point for the live departures server.
//!
//! Loads configuration from the environment, sets up logging, and serves the
//! WebSocket API against the live TfL Unified API.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use live_departures::config::Config;
use live_departures::datasource::{TflApi, TransitDataSource};
use live_departures::fetch::BasicClient;
use live_departures::registry::SessionRegistry;
use live_departures::server::{self, AppState};

#[derive(Parser)]
#[command(name = "live_departures")]
#[command(about = "Pushes live transit departures to WebSocket clients", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the PORT environment variable)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/live_departures.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("live_departures.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let port = cli.port.unwrap_or(config.port);

    let source: Arc<dyn TransitDataSource> = Arc::new(TflApi::new(
        BasicClient::new(),
        config.tfl_base_url.clone(),
        config.tfl_app_id.clone(),
        config.tfl_app_key.clone(),
    ));
    let state = Arc::new(AppState::new(
        Arc::new(SessionRegistry::new()),
        source,
        config.arrivals_poll_interval,
    ));

    let handle = server::start(state, port).await?;
    handle.task.await?;
    Ok(())
}
