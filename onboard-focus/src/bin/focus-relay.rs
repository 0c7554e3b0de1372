//! Standalone relay supervisor.
//!
//! Polls the engine's `active_stream` endpoint and keeps one ffmpeg relay
//! pointed at the focused stream, or at generated silence when nothing is
//! in focus.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use onboard_focus::config::RelayConfig;
use onboard_focus::logging;
use onboard_focus::relay::{FfmpegLauncher, HttpFocusSource, RelaySupervisor};
use onboard_focus::utils::shutdown::cancel_on_shutdown_signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const LOG_FILE_PREFIX: &str = "focus-relay.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env_or_default();
    let _log_guard = logging::init_logging(config.log_dir.as_deref(), LOG_FILE_PREFIX)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        focus_api = %config.focus_api_url,
        destination = %config.ffmpeg.destination_url,
        "Starting focus-relay"
    );

    let cancel_token = CancellationToken::new();
    cancel_on_shutdown_signal(cancel_token.clone());
    if let Some(log_dir) = &config.log_dir {
        logging::start_retention_cleanup(log_dir, LOG_FILE_PREFIX, cancel_token.clone());
    }

    let source = HttpFocusSource::new(config.focus_api_url.clone(), config.focus_timeout)?;
    let launcher = FfmpegLauncher::new(config.ffmpeg.clone())
        .with_terminate_timeout(config.terminate_timeout);
    match launcher.detect_version().await {
        Some(version) => info!(version = %version, "Using ffmpeg"),
        None => warn!(path = %launcher.config().binary_path, "ffmpeg not found or not runnable"),
    }

    let supervisor = RelaySupervisor::new(
        Arc::new(source),
        Arc::new(launcher),
        config.supervisor.clone(),
    );
    supervisor.run(cancel_token).await;

    info!("focus-relay stopped");
    Ok(())
}
