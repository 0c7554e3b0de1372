//! Logging setup.
//!
//! Console output always; a daily-rolling file when a log directory is
//! configured, with old files removed after [`LOG_RETENTION_DAYS`].
//! Timestamps use the local timezone.

use std::path::Path;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str =
    "onboard_focus=info,focus_relay=info,process_utils=info,tower_http=info";

/// Log retention period in days.
pub const LOG_RETENTION_DAYS: i64 = 7;

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. When `log_dir` is given,
/// logs are also written to `<log_dir>/<file_prefix>.YYYY-MM-DD`; keep the
/// returned guard alive for the lifetime of the process.
pub fn init_logging(log_dir: Option<&Path>, file_prefix: &str) -> crate::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(guard)
}

/// Spawn a daily task deleting rolled log files older than
/// [`LOG_RETENTION_DAYS`].
pub fn start_retention_cleanup(
    log_dir: &Path,
    file_prefix: &str,
    cancellation_token: CancellationToken,
) {
    let log_dir = log_dir.to_path_buf();
    let file_prefix = file_prefix.to_string();

    tokio::spawn(async move {
        let cleanup_interval = Duration::from_secs(24 * 60 * 60);

        loop {
            if let Err(e) = cleanup_old_logs(&log_dir, &file_prefix, LOG_RETENTION_DAYS).await {
                warn!(error = %e, "Failed to cleanup old logs");
            }

            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("Log retention cleanup task shutting down");
                    break;
                }
                _ = tokio::time::sleep(cleanup_interval) => {}
            }
        }
    });
}

/// Delete `<file_prefix>.YYYY-MM-DD` files older than `retention_days`.
///
/// Returns the number of files removed.
pub async fn cleanup_old_logs(
    log_dir: &Path,
    file_prefix: &str,
    retention_days: i64,
) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();
    let prefix = format!("{}.", file_prefix);

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(prefix.as_str()))
        else {
            continue;
        };

        let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());

        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(DEFAULT_LOG_FILTER));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::event_enabled!(target: "onboard_focus", tracing::Level::INFO));
            assert!(tracing::event_enabled!(target: "focus_relay", tracing::Level::INFO));
            assert!(tracing::event_enabled!(target: "process_utils", tracing::Level::WARN));
            assert!(tracing::event_enabled!(target: "tower_http", tracing::Level::INFO));
            assert!(!tracing::event_enabled!(target: "onboard_focus", tracing::Level::DEBUG));
        });
    }

    #[tokio::test]
    async fn test_cleanup_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        let keep = dir.path().join(format!("onboard-focus.log.{}", today));
        let stale = dir.path().join("onboard-focus.log.2001-01-01");
        let other = dir.path().join("unrelated.log.2001-01-01");
        for path in [&keep, &stale, &other] {
            std::fs::write(path, "x").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), "onboard-focus.log", 7)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(keep.exists());
        assert!(!stale.exists());
        assert!(other.exists());
    }
}
