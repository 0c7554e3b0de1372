//! ffmpeg invocation for the relay.

use std::fmt;

use crate::utils::http_client::join_url;

/// What a relay process is republishing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelayTarget {
    /// Generated silence, used while nothing is in focus.
    Placeholder,
    /// The named source path.
    Source(String),
}

impl RelayTarget {
    /// Map a focus name to a target; an empty name means no focus.
    pub fn from_focus(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            Self::Placeholder
        } else {
            Self::Source(name.to_string())
        }
    }
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => write!(f, "placeholder"),
            Self::Source(name) => write!(f, "source:{}", name),
        }
    }
}

/// Relay configuration: endpoints and fixed encoding options.
#[derive(Debug, Clone)]
pub struct FfmpegRelayConfig {
    /// Path to the ffmpeg binary.
    pub binary_path: String,
    /// Base URL sources are pulled from; the focus name is appended.
    pub source_base_url: String,
    /// Fixed destination every relay publishes to.
    pub destination_url: String,
    /// Audio codec for source relays (`copy` keeps the original track).
    pub audio_codec: String,
    /// Video codec for source relays; ffmpeg picks one when unset.
    pub video_codec: Option<String>,
    /// lavfi graph generating the placeholder audio.
    pub placeholder_source: String,
    /// Audio codec for the placeholder.
    pub placeholder_audio_codec: String,
    /// Audio bitrate for the placeholder.
    pub placeholder_audio_bitrate: String,
    /// Output container format.
    pub output_format: String,
    /// Extra arguments placed first, ahead of the input.
    pub input_args: Vec<String>,
    /// Extra arguments placed before the destination.
    pub output_args: Vec<String>,
}

impl Default for FfmpegRelayConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            source_base_url: "rtmp://mediamtx:1935".to_string(),
            destination_url: "rtmp://host.containers.internal:1936/active-input".to_string(),
            audio_codec: "copy".to_string(),
            video_codec: None,
            placeholder_source: "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
            placeholder_audio_codec: "aac".to_string(),
            placeholder_audio_bitrate: "128k".to_string(),
            output_format: "flv".to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

impl FfmpegRelayConfig {
    /// Pull URL for a source path.
    pub fn source_url(&self, name: &str) -> String {
        join_url(&self.source_base_url, name)
    }

    /// Build ffmpeg arguments for `target`.
    pub fn build_args(&self, target: &RelayTarget) -> Vec<String> {
        let mut args = self.input_args.clone();
        args.extend([
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
        ]);

        // Read input at native rate so the output is paced like a live feed.
        args.push("-re".to_string());

        match target {
            RelayTarget::Source(name) => {
                args.extend(["-i".to_string(), self.source_url(name)]);
                if let Some(ref codec) = self.video_codec {
                    args.extend(["-c:v".to_string(), codec.clone()]);
                }
                args.extend(["-c:a".to_string(), self.audio_codec.clone()]);
            }
            RelayTarget::Placeholder => {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-i".to_string(),
                    self.placeholder_source.clone(),
                    "-c:a".to_string(),
                    self.placeholder_audio_codec.clone(),
                    "-b:a".to_string(),
                    self.placeholder_audio_bitrate.clone(),
                ]);
            }
        }

        args.extend(self.output_args.iter().cloned());
        args.extend(["-f".to_string(), self.output_format.clone()]);
        args.push(self.destination_url.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], value: &str) -> usize {
        args.iter()
            .position(|a| a == value)
            .unwrap_or_else(|| panic!("{value} missing from {args:?}"))
    }

    #[test]
    fn test_target_from_focus() {
        assert_eq!(RelayTarget::from_focus(""), RelayTarget::Placeholder);
        assert_eq!(RelayTarget::from_focus("  \n"), RelayTarget::Placeholder);
        assert_eq!(
            RelayTarget::from_focus("abc\n"),
            RelayTarget::Source("abc".to_string())
        );
        assert_eq!(RelayTarget::Source("x".into()).to_string(), "source:x");
    }

    #[test]
    fn test_source_args() {
        let config = FfmpegRelayConfig::default();
        let args = config.build_args(&RelayTarget::Source("abc".to_string()));

        let input = position(&args, "-i");
        assert_eq!(args[input + 1], "rtmp://mediamtx:1935/abc");
        assert!(position(&args, "-re") < input);
        assert_eq!(args[position(&args, "-c:a") + 1], "copy");
        assert!(!args.contains(&"-c:v".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "rtmp://host.containers.internal:1936/active-input"
        );
        assert!(!args.iter().any(|a| a == "lavfi"));
    }

    #[test]
    fn test_source_args_with_video_codec() {
        let config = FfmpegRelayConfig {
            video_codec: Some("libx264".to_string()),
            source_base_url: "rtmp://media:1935/".to_string(),
            ..Default::default()
        };
        let args = config.build_args(&RelayTarget::Source("k".to_string()));

        assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
        assert_eq!(args[position(&args, "-i") + 1], "rtmp://media:1935/k");
    }

    #[test]
    fn test_placeholder_args() {
        let config = FfmpegRelayConfig::default();
        let args = config.build_args(&RelayTarget::Placeholder);

        let input = position(&args, "-i");
        assert_eq!(args[input - 1], "lavfi");
        assert!(args[input + 1].starts_with("anullsrc"));
        assert_eq!(args[position(&args, "-c:a") + 1], "aac");
        assert_eq!(args[args.len() - 2], "flv");
        assert_eq!(args.last().unwrap(), &config.destination_url);
    }

    #[test]
    fn test_extra_args_are_placed() {
        let config = FfmpegRelayConfig {
            input_args: vec!["-rw_timeout".to_string(), "5000000".to_string()],
            output_args: vec!["-flvflags".to_string(), "no_duration_filesize".to_string()],
            ..Default::default()
        };
        let args = config.build_args(&RelayTarget::Placeholder);

        assert!(position(&args, "-rw_timeout") < position(&args, "-i"));
        assert!(position(&args, "-flvflags") > position(&args, "-i"));
        assert_eq!(args.last().unwrap(), &config.destination_url);
    }
}
