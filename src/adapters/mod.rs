/// Call adapters for the remote services a testimonial video needs
///
/// An adapter hands the retry engine a zero-argument operation that builds its
/// request from scratch on every invocation, since a retry resends the whole
/// request. [`HttpAdapter`] does this for reqwest by taking a request-builder
/// closure instead of a prepared request.
pub mod http;


pub use http::HttpAdapter;

use crate::error::{ErrorKind, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Remote capability a call is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SpeechSynthesis,
    VoiceCloning,
    VoiceCatalog,
    PortraitEnhancement,
    BackgroundRemoval,
    VideoSynthesis,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::SpeechSynthesis,
        Capability::VoiceCloning,
        Capability::VoiceCatalog,
        Capability::PortraitEnhancement,
        Capability::BackgroundRemoval,
        Capability::VideoSynthesis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Capability::SpeechSynthesis => "speech_synthesis",
            Capability::VoiceCloning => "voice_cloning",
            Capability::VoiceCatalog => "voice_catalog",
            Capability::PortraitEnhancement => "portrait_enhancement",
            Capability::BackgroundRemoval => "background_removal",
            Capability::VideoSynthesis => "video_synthesis",
        }
    }

    /// Built-in retry profile, used unless settings override it
    pub fn retry_config(&self) -> RetryConfig {
        // Voice calls also retry their own failure kind, not the whole default set
        let voice = |specific| [ErrorKind::NetworkError, ErrorKind::ApiError, specific];
        let second = Duration::from_millis(1000);

        match self {
            Capability::SpeechSynthesis => {
                RetryConfig::preset(3, second, voice(ErrorKind::VoiceGenerationFailed))
            }
            Capability::VoiceCloning => {
                RetryConfig::preset(3, second, voice(ErrorKind::VoiceCloneFailed))
            }
            Capability::VoiceCatalog => {
                RetryConfig::preset(3, second, voice(ErrorKind::VoiceFetchFailed))
            }
            Capability::PortraitEnhancement | Capability::VideoSynthesis => RetryConfig::default(),
            // Background removal is the slowest endpoint; fewer, longer waits
            Capability::BackgroundRemoval => RetryConfig::preset(
                2,
                Duration::from_millis(1500),
                crate::error::default_retryable_kinds(),
            ),
        }
    }

    /// Kind given to a non-success response that names nothing more specific
    pub fn failure_kind(&self) -> ErrorKind {
        match self {
            Capability::SpeechSynthesis | Capability::VoiceCloning | Capability::VoiceCatalog => {
                ErrorKind::ApiError
            }
            Capability::PortraitEnhancement | Capability::BackgroundRemoval => {
                ErrorKind::ImageProcessingFailed
            }
            Capability::VideoSynthesis => ErrorKind::VideoGenerationFailed,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Capability::ALL
            .into_iter()
            .find(|capability| capability.name() == normalized)
            .ok_or_else(|| format!("unknown capability '{}'", s))
    }
}
