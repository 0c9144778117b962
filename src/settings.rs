/// Layered runtime settings
///
/// Built-in defaults, then an optional TOML file, then `TALKING_HEAD_*`
/// environment variables (`__` separates nested keys, e.g.
/// `TALKING_HEAD_RETRY__VIDEO_SYNTHESIS__MAX_ATTEMPTS=5`).
use crate::adapters::Capability;
use crate::error::RetryConfig;
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TALKING_HEAD";

/// Name of the settings file looked up in the working directory
pub const LOCAL_FILE_NAME: &str = "talking-head.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Settings file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to serialize default settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub retry: RetryProfiles,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub http: HttpSettings,
}

/// One retry policy per remote capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryProfiles {
    pub speech_synthesis: RetryConfig,
    pub voice_cloning: RetryConfig,
    pub voice_catalog: RetryConfig,
    pub portrait_enhancement: RetryConfig,
    pub background_removal: RetryConfig,
    pub video_synthesis: RetryConfig,
}

impl RetryProfiles {
    pub fn for_capability(&self, capability: Capability) -> &RetryConfig {
        match capability {
            Capability::SpeechSynthesis => &self.speech_synthesis,
            Capability::VoiceCloning => &self.voice_cloning,
            Capability::VoiceCatalog => &self.voice_catalog,
            Capability::PortraitEnhancement => &self.portrait_enhancement,
            Capability::BackgroundRemoval => &self.background_removal,
            Capability::VideoSynthesis => &self.video_synthesis,
        }
    }

    pub fn set(&mut self, capability: Capability, config: RetryConfig) {
        let slot = match capability {
            Capability::SpeechSynthesis => &mut self.speech_synthesis,
            Capability::VoiceCloning => &mut self.voice_cloning,
            Capability::VoiceCatalog => &mut self.voice_catalog,
            Capability::PortraitEnhancement => &mut self.portrait_enhancement,
            Capability::BackgroundRemoval => &mut self.background_removal,
            Capability::VideoSynthesis => &mut self.video_synthesis,
        };
        *slot = config;
    }
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            speech_synthesis: Capability::SpeechSynthesis.retry_config(),
            voice_cloning: Capability::VoiceCloning.retry_config(),
            voice_catalog: Capability::VoiceCatalog.retry_config(),
            portrait_enhancement: Capability::PortraitEnhancement.retry_config(),
            background_removal: Capability::BackgroundRemoval.retry_config(),
            video_synthesis: Capability::VideoSynthesis.retry_config(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-attempt request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Settings loader with layered merging
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    path: Option<PathBuf>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge this file over the defaults; it must exist
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load(&self) -> Result<Settings> {
        let defaults = serde_json::to_string(&Settings::default())?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        if let Some(ref path) = self.path {
            if !path.exists() {
                return Err(SettingsError::FileNotFound(path.clone()));
            }
            tracing::debug!(path = %path.display(), "Loading settings file");
            builder = builder.add_source(File::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Retry profiles validate while deserializing
        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// `./talking-head.toml`, then the platform config directory
    pub fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        ProjectDirs::from("com", "talking-head", "talking-head")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Load from the first file found by [`SettingsLoader::find_config_file`]
    pub fn load_default() -> Result<Settings> {
        match Self::find_config_file() {
            Some(path) => Self::new().with_file(path).load(),
            None => Self::new().load(),
        }
    }
}
