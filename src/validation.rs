/// Input validation producing structured errors
///
/// Checks that run before any remote call is made: API keys, upload
/// constraints, and the typed voice/video settings records. Every check returns
/// a [`StructuredError`] with a non-retryable kind, so failures here reach the
/// presenter without ever entering the retry loop.
use crate::error::{ErrorKind, StructuredError};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Fail with `invalid-api-key` when a service key is missing or blank
pub fn validate_api_key<'a>(key: Option<&'a str>, service: &str) -> Result<&'a str, StructuredError> {
    match key.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(StructuredError::new(
            format!(
                "{} API key is missing. Please check your environment variables.",
                service
            ),
            ErrorKind::InvalidApiKey,
        )),
    }
}

/// Fail with `file-too-large` when `size` exceeds `max_size` bytes
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), StructuredError> {
    check_size(size, max_size, ErrorKind::FileTooLarge)
}

/// Fail with `invalid-file-type` when `mime` is not one of `allowed`
pub fn validate_file_type(mime: &str, allowed: &[&str]) -> Result<(), StructuredError> {
    check_type(mime, allowed, ErrorKind::InvalidFileType)
}

fn check_size(size: u64, max_size: u64, kind: ErrorKind) -> Result<(), StructuredError> {
    if size > max_size {
        return Err(StructuredError::new(
            format!("File size exceeds {}MB limit", format_mib(max_size)),
            kind,
        ));
    }
    Ok(())
}

fn check_type(mime: &str, allowed: &[&str], kind: ErrorKind) -> Result<(), StructuredError> {
    let mime = mime.trim();
    if !allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(mime)) {
        return Err(StructuredError::new(
            format!("Invalid file type. Allowed types: {}", allowed.join(", ")),
            kind,
        ));
    }
    Ok(())
}

fn format_mib(bytes: u64) -> String {
    let mib = bytes as f64 / MIB as f64;
    if mib.fract() == 0.0 {
        format!("{}", mib as u64)
    } else {
        format!("{:.1}", mib)
    }
}

/// Metadata of a file the user wants to upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub name: String,
    pub mime: String,
    pub size: u64,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size,
        }
    }
}

/// Size/type limits of one upload slot, with the kinds reported on violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadConstraints {
    pub max_bytes: u64,
    pub allowed_types: &'static [&'static str],
    pub too_large: ErrorKind,
    pub wrong_type: ErrorKind,
}

impl UploadConstraints {
    /// Portrait photo fed to enhancement and video synthesis
    pub const PORTRAIT_IMAGE: UploadConstraints = UploadConstraints {
        max_bytes: 10 * MIB,
        allowed_types: &["image/png", "image/jpeg", "image/webp"],
        too_large: ErrorKind::ImageTooLarge,
        wrong_type: ErrorKind::InvalidImageFormat,
    };

    /// Audio sample used for voice cloning
    pub const VOICE_SAMPLE: UploadConstraints = UploadConstraints {
        max_bytes: 15 * MIB,
        allowed_types: &[
            "audio/mpeg",
            "audio/wav",
            "audio/x-wav",
            "audio/mp4",
            "audio/x-m4a",
            "audio/ogg",
            "audio/webm",
        ],
        too_large: ErrorKind::FileTooLarge,
        wrong_type: ErrorKind::InvalidFileType,
    };

    /// Type is checked before size
    pub fn check(&self, upload: &Upload) -> Result<(), StructuredError> {
        check_type(&upload.mime, self.allowed_types, self.wrong_type)?;
        check_size(upload.size, self.max_bytes, self.too_large)
    }
}

/// Most samples a single voice clone accepts
pub const MAX_VOICE_SAMPLES: usize = 25;

/// Validate the sample set of a voice clone request
pub fn validate_voice_samples(samples: &[Upload]) -> Result<(), StructuredError> {
    if samples.is_empty() {
        return Err(StructuredError::new(
            "At least one audio sample is required to clone a voice",
            ErrorKind::FileUploadFailed,
        ));
    }
    if samples.len() > MAX_VOICE_SAMPLES {
        return Err(StructuredError::new(
            format!(
                "Too many audio samples: {} given, at most {} allowed",
                samples.len(),
                MAX_VOICE_SAMPLES
            ),
            ErrorKind::FileUploadFailed,
        ));
    }
    samples
        .iter()
        .try_for_each(|sample| UploadConstraints::VOICE_SAMPLE.check(sample))
}

fn check_range(
    name: &str,
    value: f64,
    min: f64,
    max: f64,
    kind: ErrorKind,
) -> Result<(), StructuredError> {
    if !value.is_finite() {
        return Err(StructuredError::new(
            format!("{} must be a finite number", name),
            kind,
        ));
    }
    if value < min {
        return Err(StructuredError::new(
            format!("{} must be at least {}", name, min),
            kind,
        ));
    }
    if value > max {
        return Err(StructuredError::new(
            format!("{} must be at most {}", name, max),
            kind,
        ));
    }
    Ok(())
}

/// Speech synthesis settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VoiceSettingsRecord")]
pub struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
    style: f64,
    speaking_rate: f64,
    use_highest_quality: bool,
}

/// Unvalidated wire shape of [`VoiceSettings`]
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoiceSettingsRecord {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub speaking_rate: f64,
    pub use_highest_quality: bool,
}

impl TryFrom<VoiceSettingsRecord> for VoiceSettings {
    type Error = StructuredError;

    fn try_from(r: VoiceSettingsRecord) -> Result<Self, Self::Error> {
        VoiceSettings::new(
            r.stability,
            r.similarity_boost,
            r.style,
            r.speaking_rate,
            r.use_highest_quality,
        )
    }
}

impl VoiceSettings {
    /// Ranges: stability, similarity_boost and style in `0..=1`,
    /// speaking_rate in `0.5..=2`
    pub fn new(
        stability: f64,
        similarity_boost: f64,
        style: f64,
        speaking_rate: f64,
        use_highest_quality: bool,
    ) -> Result<Self, StructuredError> {
        let kind = ErrorKind::InvalidVoiceSettings;
        check_range("stability", stability, 0.0, 1.0, kind)?;
        check_range("similarity_boost", similarity_boost, 0.0, 1.0, kind)?;
        check_range("style", style, 0.0, 1.0, kind)?;
        check_range("speaking_rate", speaking_rate, 0.5, 2.0, kind)?;

        Ok(Self {
            stability,
            similarity_boost,
            style,
            speaking_rate,
            use_highest_quality,
        })
    }

    pub fn stability(&self) -> f64 {
        self.stability
    }

    pub fn similarity_boost(&self) -> f64 {
        self.similarity_boost
    }

    pub fn style(&self) -> f64 {
        self.style
    }

    pub fn speaking_rate(&self) -> f64 {
        self.speaking_rate
    }

    pub fn use_highest_quality(&self) -> bool {
        self.use_highest_quality
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.5,
            speaking_rate: 1.0,
            use_highest_quality: true,
        }
    }
}

/// Output quality of a synthesized video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    #[default]
    High,
    Medium,
    Low,
}

/// Talking-head video synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VideoSettingsRecord")]
pub struct VideoSettings {
    enhancer: bool,
    expression_scale: f64,
    pose_style: u8,
    lip_sync_accuracy: f64,
    motion_smoothing: f64,
    quality: VideoQuality,
    fps: u32,
}

/// Unvalidated wire shape of [`VideoSettings`]
#[derive(Debug, Clone, Deserialize)]
pub struct VideoSettingsRecord {
    pub enhancer: bool,
    pub expression_scale: f64,
    pub pose_style: u8,
    pub lip_sync_accuracy: f64,
    pub motion_smoothing: f64,
    #[serde(default)]
    pub quality: VideoQuality,
    pub fps: u32,
}

impl TryFrom<VideoSettingsRecord> for VideoSettings {
    type Error = StructuredError;

    fn try_from(r: VideoSettingsRecord) -> Result<Self, Self::Error> {
        VideoSettings::builder()
            .enhancer(r.enhancer)
            .expression_scale(r.expression_scale)
            .pose_style(r.pose_style)
            .lip_sync_accuracy(r.lip_sync_accuracy)
            .motion_smoothing(r.motion_smoothing)
            .quality(r.quality)
            .fps(r.fps)
            .build()
    }
}

impl VideoSettings {
    pub const MAX_POSE_STYLE: u8 = 2;
    pub const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

    pub fn builder() -> VideoSettingsBuilder {
        VideoSettingsBuilder {
            settings: VideoSettings::default(),
        }
    }

    fn validate(&self) -> Result<(), StructuredError> {
        let kind = ErrorKind::InvalidVideoSettings;
        check_range("expression_scale", self.expression_scale, 0.0, 2.0, kind)?;
        check_range("lip_sync_accuracy", self.lip_sync_accuracy, 0.0, 1.0, kind)?;
        check_range("motion_smoothing", self.motion_smoothing, 0.0, 1.0, kind)?;

        if self.pose_style > Self::MAX_POSE_STYLE {
            return Err(StructuredError::new(
                format!("pose_style must be at most {}", Self::MAX_POSE_STYLE),
                kind,
            ));
        }
        if !Self::FPS_RANGE.contains(&self.fps) {
            return Err(StructuredError::new(
                format!(
                    "fps must be between {} and {}",
                    Self::FPS_RANGE.start(),
                    Self::FPS_RANGE.end()
                ),
                kind,
            ));
        }
        Ok(())
    }

    pub fn enhancer(&self) -> bool {
        self.enhancer
    }

    pub fn expression_scale(&self) -> f64 {
        self.expression_scale
    }

    pub fn pose_style(&self) -> u8 {
        self.pose_style
    }

    pub fn lip_sync_accuracy(&self) -> f64 {
        self.lip_sync_accuracy
    }

    pub fn motion_smoothing(&self) -> f64 {
        self.motion_smoothing
    }

    pub fn quality(&self) -> VideoQuality {
        self.quality
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            enhancer: true,
            expression_scale: 1.0,
            pose_style: 0,
            lip_sync_accuracy: 0.8,
            motion_smoothing: 0.5,
            quality: VideoQuality::High,
            fps: 25,
        }
    }
}

/// Builder for [`VideoSettings`]; `build` is the only way out and validates
#[derive(Debug, Clone)]
pub struct VideoSettingsBuilder {
    settings: VideoSettings,
}

impl VideoSettingsBuilder {
    pub fn enhancer(mut self, enhancer: bool) -> Self {
        self.settings.enhancer = enhancer;
        self
    }

    pub fn expression_scale(mut self, value: f64) -> Self {
        self.settings.expression_scale = value;
        self
    }

    pub fn pose_style(mut self, value: u8) -> Self {
        self.settings.pose_style = value;
        self
    }

    pub fn lip_sync_accuracy(mut self, value: f64) -> Self {
        self.settings.lip_sync_accuracy = value;
        self
    }

    pub fn motion_smoothing(mut self, value: f64) -> Self {
        self.settings.motion_smoothing = value;
        self
    }

    pub fn quality(mut self, quality: VideoQuality) -> Self {
        self.settings.quality = quality;
        self
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.settings.fps = fps;
        self
    }

    pub fn build(self) -> Result<VideoSettings, StructuredError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
