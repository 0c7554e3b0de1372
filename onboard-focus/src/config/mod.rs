//! Environment configuration for both binaries.
//!
//! Every setting has a default. Values that fail to parse are logged and
//! the default is kept, so a typo never stops the process from starting.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::discovery::MediaMtxConfig;
use crate::engine::FocusEngineConfig;
use crate::notification::ChannelConfig;
use crate::notification::channels::{SlackConfig, WebhookAuth, WebhookConfig};
use crate::relay::{FfmpegRelayConfig, RelaySupervisorConfig};

/// Default focus endpoint polled by the standalone relay.
pub const DEFAULT_FOCUS_API_URL: &str = "http://backend:8000/api/v1/active_stream";
/// Default MediaMTX host when neither `MEDIAMTX_API_URL` nor `MEDIAMTX_IP` is set.
pub const DEFAULT_MEDIAMTX_HOST: &str = "mediamtx";
/// MediaMTX control API port.
pub const MEDIAMTX_API_PORT: u16 = 9997;

const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FOCUS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_TERMINATE_TIMEOUT_SECS: u64 = 5;

/// Configuration of the `onboard-focus` binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api: ApiServerConfig,
    pub discovery: MediaMtxConfig,
    /// Register every owner key as a MediaMTX path at startup.
    pub register_paths: bool,
    pub engine: FocusEngineConfig,
    pub owners_file: Option<PathBuf>,
    pub channels: Vec<ChannelConfig>,
    pub notify_timeout: Duration,
    /// Run the relay supervisor inside the engine process.
    pub relay_in_process: bool,
    pub relay: RelayConfig,
    pub log_dir: Option<PathBuf>,
}

/// Configuration of the relay supervisor.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub focus_api_url: String,
    pub focus_timeout: Duration,
    pub ffmpeg: FfmpegRelayConfig,
    pub supervisor: RelaySupervisorConfig,
    pub terminate_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let default_mediamtx = format!(
            "http://{}:{}",
            env.string("MEDIAMTX_IP")
                .unwrap_or_else(|| DEFAULT_MEDIAMTX_HOST.to_string()),
            MEDIAMTX_API_PORT
        );
        let discovery = MediaMtxConfig {
            api_url: env.url("MEDIAMTX_API_URL", &default_mediamtx),
            request_timeout: env.positive_secs(
                "DISCOVERY_TIMEOUT_SECS",
                MediaMtxConfig::default().request_timeout,
            ),
        };

        let engine_defaults = FocusEngineConfig::default();
        let engine = FocusEngineConfig {
            sync_interval: env.positive_secs("FOCUS_SYNC_INTERVAL_SECS", engine_defaults.sync_interval),
            rotate_interval: env
                .positive_secs("FOCUS_ROTATE_INTERVAL_SECS", engine_defaults.rotate_interval),
            ..engine_defaults
        };

        let notify_timeout = env.positive_secs(
            "NOTIFY_TIMEOUT_SECS",
            Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        );

        Self {
            api: ApiServerConfig::from_lookup(&lookup),
            discovery,
            register_paths: env.parse_or("MEDIAMTX_REGISTER_PATHS", true),
            engine,
            owners_file: env.string("OWNERS_FILE").map(PathBuf::from),
            channels: channel_configs(&env, notify_timeout),
            notify_timeout,
            relay_in_process: env.parse_or("RELAY_IN_PROCESS", false),
            relay: RelayConfig::from_lookup(&lookup),
            log_dir: env.string("LOG_DIR").map(PathBuf::from),
        }
    }
}

impl RelayConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let ffmpeg_defaults = FfmpegRelayConfig::default();
        let supervisor_defaults = RelaySupervisorConfig::default();

        let ffmpeg = FfmpegRelayConfig {
            binary_path: env
                .string("FFMPEG_PATH")
                .unwrap_or(ffmpeg_defaults.binary_path.clone()),
            source_base_url: env.url("RELAY_SOURCE_BASE_URL", &ffmpeg_defaults.source_base_url),
            destination_url: env.url("RELAY_DESTINATION_URL", &ffmpeg_defaults.destination_url),
            audio_codec: env
                .string("RELAY_AUDIO_CODEC")
                .unwrap_or(ffmpeg_defaults.audio_codec.clone()),
            video_codec: env.string("RELAY_VIDEO_CODEC").or(ffmpeg_defaults.video_codec.clone()),
            ..ffmpeg_defaults
        };

        let supervisor = RelaySupervisorConfig {
            poll_interval: env
                .positive_secs("RELAY_POLL_INTERVAL_SECS", supervisor_defaults.poll_interval),
            settle_delay: env.secs("RELAY_SETTLE_DELAY_SECS", supervisor_defaults.settle_delay),
            ..supervisor_defaults
        };

        Self {
            focus_api_url: env.url("FOCUS_API_URL", DEFAULT_FOCUS_API_URL),
            focus_timeout: env.positive_secs(
                "FOCUS_TIMEOUT_SECS",
                Duration::from_secs(DEFAULT_FOCUS_TIMEOUT_SECS),
            ),
            ffmpeg,
            supervisor,
            terminate_timeout: env.positive_secs(
                "RELAY_TERMINATE_TIMEOUT_SECS",
                Duration::from_secs(DEFAULT_TERMINATE_TIMEOUT_SECS),
            ),
            log_dir: env.string("LOG_DIR").map(PathBuf::from),
        }
    }
}

fn channel_configs(env: &Env<'_>, timeout: Duration) -> Vec<ChannelConfig> {
    let mut channels = Vec::new();

    match (env.string("SLACK_TOKEN"), env.string("SLACK_CHANNEL_ID")) {
        (Some(token), Some(channel_id)) => {
            let mut slack = SlackConfig {
                enabled: true,
                token,
                channel_id,
                timeout_secs: timeout.as_secs(),
                ..Default::default()
            };
            slack.api_base_url = env.url("SLACK_API_URL", &slack.api_base_url);
            channels.push(ChannelConfig::Slack(slack));
        }
        (None, None) => {}
        _ => warn!("Slack notifications need both SLACK_TOKEN and SLACK_CHANNEL_ID, disabled"),
    }

    if let Some(url) = env.string("NOTIFY_WEBHOOK_URL") {
        if url::Url::parse(&url).is_ok() {
            channels.push(ChannelConfig::Webhook(WebhookConfig {
                enabled: true,
                url,
                auth: env
                    .string("NOTIFY_WEBHOOK_TOKEN")
                    .map(|token| WebhookAuth::Bearer { token }),
                timeout_secs: timeout.as_secs(),
                ..Default::default()
            }));
        } else {
            warn!(url = %url, "Invalid NOTIFY_WEBHOOK_URL, webhook notifications disabled");
        }
    }

    channels
}

/// Typed accessors over a key lookup.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Trimmed, non-empty value of `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
    {
        match self.string(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = %raw, "Invalid value, using default");
                default
            }),
            None => default,
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parse_or(key, default.as_secs()))
    }

    /// Like [`Env::secs`] but rejects zero.
    fn positive_secs(&self, key: &str, default: Duration) -> Duration {
        let value = self.secs(key, default);
        if value.is_zero() {
            warn!(key, "Value must be at least 1 second, using default");
            default
        } else {
            value
        }
    }

    fn url(&self, key: &str, default: &str) -> String {
        match self.string(key) {
            Some(raw) if url::Url::parse(&raw).is_ok() => raw,
            Some(raw) => {
                warn!(key, value = %raw, "Invalid URL, using default");
                default.to_string()
            }
            None => default.to_string(),
        }
    }
}
