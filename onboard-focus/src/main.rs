use std::sync::Arc;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use onboard_focus::api::{ApiServer, AppState};
use onboard_focus::config::EngineConfig;
use onboard_focus::discovery::MediaMtxClient;
use onboard_focus::engine::{FocusEngine, FocusNotifier};
use onboard_focus::logging;
use onboard_focus::notification::NotificationService;
use onboard_focus::owners::{OwnerDirectory, StaticOwnerDirectory};
use onboard_focus::relay::{FfmpegLauncher, RelaySupervisor};
use onboard_focus::utils::shutdown::cancel_on_shutdown_signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const LOG_FILE_PREFIX: &str = "onboard-focus.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env_or_default();
    let _log_guard = logging::init_logging(config.log_dir.as_deref(), LOG_FILE_PREFIX)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting onboard-focus");

    let cancel_token = CancellationToken::new();
    cancel_on_shutdown_signal(cancel_token.clone());
    if let Some(log_dir) = &config.log_dir {
        logging::start_retention_cleanup(log_dir, LOG_FILE_PREFIX, cancel_token.clone());
    }

    let owners: Arc<dyn OwnerDirectory> = match &config.owners_file {
        Some(path) => Arc::new(
            StaticOwnerDirectory::from_file(path)
                .await
                .context("loading stream owners")?,
        ),
        None => {
            warn!("OWNERS_FILE not set, notifications and stream key lookups will find no owners");
            Arc::new(StaticOwnerDirectory::new())
        }
    };

    let discovery = Arc::new(MediaMtxClient::new(config.discovery.clone())?);
    if config.register_paths {
        match owners.keys().await {
            Ok(keys) => {
                discovery.register_paths(&keys).await;
            }
            Err(e) => warn!("Failed to list stream keys for registration: {}", e),
        }
    }

    let notifications = NotificationService::from_configs(config.channels.clone());
    info!(channels = notifications.channel_count(), "Notification channels configured");
    let notifier =
        FocusNotifier::new(owners.clone(), notifications).with_timeout(config.notify_timeout);

    let engine = FocusEngine::start(
        config.engine.clone(),
        discovery,
        notifier,
        StdRng::seed_from_u64(rand::random()),
        cancel_token.clone(),
    );

    let relay_task = if config.relay_in_process {
        let launcher = FfmpegLauncher::new(config.relay.ffmpeg.clone())
            .with_terminate_timeout(config.relay.terminate_timeout);
        match launcher.detect_version().await {
            Some(version) => info!(version = %version, "Using ffmpeg"),
            None => warn!(path = %launcher.config().binary_path, "ffmpeg not found or not runnable"),
        }

        let supervisor = RelaySupervisor::new(
            Arc::new(engine.handle()),
            Arc::new(launcher),
            config.relay.supervisor.clone(),
        );
        Some(tokio::spawn(supervisor.run(cancel_token.clone())))
    } else {
        None
    };

    let server = ApiServer::new(
        config.api.clone(),
        AppState::new(engine.handle(), owners),
        cancel_token.clone(),
    );
    let served = server.run().await;

    // The server only returns early on a bind or serve error.
    cancel_token.cancel();
    if let Some(relay_task) = relay_task
        && let Err(e) = relay_task.await
    {
        warn!("Relay supervisor ended abnormally: {}", e);
    }
    engine.shutdown().await;

    served.context("API server failed")?;
    info!("onboard-focus stopped");
    Ok(())
}
