/// Error taxonomy for outbound service calls
///
/// Every failure an adapter observes is normalized into a [`StructuredError`]
/// carrying exactly one [`ErrorKind`] from a closed set. The retry engine only
/// ever reasons about kinds, and presenters only ever render structured errors,
/// so no caller has to inspect transport or HTTP details itself.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Shared, thread-safe underlying cause of a structured error
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Closed set of failure categories, grouped by domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ErrorKind {
    // Voice
    VoiceFetchFailed,
    VoiceGenerationFailed,
    VoiceCloneFailed,
    InvalidVoiceSettings,

    // Image
    ImageProcessingFailed,
    InvalidImageFormat,
    ImageTooLarge,
    FaceDetectionFailed,

    // Video
    VideoGenerationFailed,
    InvalidVideoSettings,

    // Remote API
    ApiError,
    NetworkError,
    RateLimitExceeded,

    // Authentication / authorization
    AuthError,
    InvalidApiKey,

    // Files
    FileUploadFailed,
    InvalidFileType,
    FileTooLarge,
}

/// Domain an [`ErrorKind`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindDomain {
    Voice,
    Image,
    Video,
    Api,
    Auth,
    File,
}

impl ErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [ErrorKind; 18] = [
        ErrorKind::VoiceFetchFailed,
        ErrorKind::VoiceGenerationFailed,
        ErrorKind::VoiceCloneFailed,
        ErrorKind::InvalidVoiceSettings,
        ErrorKind::ImageProcessingFailed,
        ErrorKind::InvalidImageFormat,
        ErrorKind::ImageTooLarge,
        ErrorKind::FaceDetectionFailed,
        ErrorKind::VideoGenerationFailed,
        ErrorKind::InvalidVideoSettings,
        ErrorKind::ApiError,
        ErrorKind::NetworkError,
        ErrorKind::RateLimitExceeded,
        ErrorKind::AuthError,
        ErrorKind::InvalidApiKey,
        ErrorKind::FileUploadFailed,
        ErrorKind::InvalidFileType,
        ErrorKind::FileTooLarge,
    ];

    /// Kebab-case identifier (`"rate-limit-exceeded"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::VoiceFetchFailed => "voice-fetch-failed",
            ErrorKind::VoiceGenerationFailed => "voice-generation-failed",
            ErrorKind::VoiceCloneFailed => "voice-clone-failed",
            ErrorKind::InvalidVoiceSettings => "invalid-voice-settings",
            ErrorKind::ImageProcessingFailed => "image-processing-failed",
            ErrorKind::InvalidImageFormat => "invalid-image-format",
            ErrorKind::ImageTooLarge => "image-too-large",
            ErrorKind::FaceDetectionFailed => "face-detection-failed",
            ErrorKind::VideoGenerationFailed => "video-generation-failed",
            ErrorKind::InvalidVideoSettings => "invalid-video-settings",
            ErrorKind::ApiError => "api-error",
            ErrorKind::NetworkError => "network-error",
            ErrorKind::RateLimitExceeded => "rate-limit-exceeded",
            ErrorKind::AuthError => "auth-error",
            ErrorKind::InvalidApiKey => "invalid-api-key",
            ErrorKind::FileUploadFailed => "file-upload-failed",
            ErrorKind::InvalidFileType => "invalid-file-type",
            ErrorKind::FileTooLarge => "file-too-large",
        }
    }

    /// Upper snake-case wire code (`"RATE_LIMIT_EXCEEDED"`)
    pub fn code(&self) -> String {
        self.as_str().replace('-', "_").to_ascii_uppercase()
    }

    /// Human-readable title shown by presenters
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::VoiceFetchFailed => "Failed to fetch voices",
            ErrorKind::VoiceGenerationFailed => "Voice generation failed",
            ErrorKind::VoiceCloneFailed => "Voice cloning failed",
            ErrorKind::InvalidVoiceSettings => "Invalid voice settings",
            ErrorKind::ImageProcessingFailed => "Image processing failed",
            ErrorKind::InvalidImageFormat => "Invalid image format",
            ErrorKind::ImageTooLarge => "Image too large",
            ErrorKind::FaceDetectionFailed => "Face detection failed",
            ErrorKind::VideoGenerationFailed => "Video generation failed",
            ErrorKind::InvalidVideoSettings => "Invalid video settings",
            ErrorKind::ApiError => "API Error",
            ErrorKind::NetworkError => "Network Error",
            ErrorKind::RateLimitExceeded => "Rate limit exceeded",
            ErrorKind::AuthError => "Authentication Error",
            ErrorKind::InvalidApiKey => "Invalid API Key",
            ErrorKind::FileUploadFailed => "File upload failed",
            ErrorKind::InvalidFileType => "Invalid file type",
            ErrorKind::FileTooLarge => "File too large",
        }
    }

    pub fn domain(&self) -> KindDomain {
        match self {
            ErrorKind::VoiceFetchFailed
            | ErrorKind::VoiceGenerationFailed
            | ErrorKind::VoiceCloneFailed
            | ErrorKind::InvalidVoiceSettings => KindDomain::Voice,

            ErrorKind::ImageProcessingFailed
            | ErrorKind::InvalidImageFormat
            | ErrorKind::ImageTooLarge
            | ErrorKind::FaceDetectionFailed => KindDomain::Image,

            ErrorKind::VideoGenerationFailed | ErrorKind::InvalidVideoSettings => {
                KindDomain::Video
            }

            ErrorKind::ApiError | ErrorKind::NetworkError | ErrorKind::RateLimitExceeded => {
                KindDomain::Api
            }

            ErrorKind::AuthError | ErrorKind::InvalidApiKey => KindDomain::Auth,

            ErrorKind::FileUploadFailed | ErrorKind::InvalidFileType | ErrorKind::FileTooLarge => {
                KindDomain::File
            }
        }
    }

    /// Whether this kind is in the default retryable set
    ///
    /// Transport and remote-processing failures may succeed on a later try;
    /// validation, authorization, format and size failures never do.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError
                | ErrorKind::ApiError
                | ErrorKind::VoiceGenerationFailed
                | ErrorKind::VideoGenerationFailed
                | ErrorKind::ImageProcessingFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string names no member of [`ErrorKind`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error kind: '{0}'")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    /// Accepts `rate-limit-exceeded`, `RATE_LIMIT_EXCEEDED` and `rate_limit_exceeded`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-").to_ascii_lowercase();
        ErrorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = UnknownErrorKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Visual weight of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Typed failure value every outbound error is normalized into
///
/// Fields are private: once constructed, a structured error is never mutated.
/// The retry engine replaces it attempt to attempt instead.
#[derive(Debug, Clone)]
pub struct StructuredError {
    message: String,
    kind: ErrorKind,
    severity: Severity,
    cause: Option<Cause>,
    observed_at: DateTime<Utc>,
}

impl StructuredError {
    /// Construct an error with the default `error` severity
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self::with_severity(message, kind, Severity::default())
    }

    pub fn with_severity(message: impl Into<String>, kind: ErrorKind, severity: Severity) -> Self {
        Self {
            message: message.into(),
            kind,
            severity,
            cause: None,
            observed_at: Utc::now(),
        }
    }

    /// Attach the underlying error that triggered this one
    pub fn with_cause<E>(self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.with_shared_cause(Arc::new(cause))
    }

    pub(crate) fn with_shared_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// When the failure was first observed
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Title for presenters, resolved through the closed kind table
    pub fn title(&self) -> &'static str {
        self.kind.title()
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for StructuredError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

// Identity ignores the cause and the observation instant.
impl PartialEq for StructuredError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.severity == other.severity && self.message == other.message
    }
}

/// An arbitrary failure, before classification
#[derive(Debug)]
pub enum Failure {
    /// Already classified at the point it was observed
    Structured(StructuredError),

    /// The remote host could not be reached at all
    Transport(Box<dyn StdError + Send + Sync + 'static>),

    /// The remote service answered with a non-success status
    Status {
        status: u16,
        body: String,
        /// Kind used when neither the body nor the status identify one
        fallback: Option<ErrorKind>,
    },

    Io(std::io::Error),

    Http(reqwest::Error),

    Other(anyhow::Error),
}

impl Failure {
    pub fn transport<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Failure::Transport(Box::new(error))
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Failure::Status {
            status,
            body: body.into(),
            fallback: None,
        }
    }

    pub fn status_with_fallback(status: u16, body: impl Into<String>, fallback: ErrorKind) -> Self {
        Failure::Status {
            status,
            body: body.into(),
            fallback: Some(fallback),
        }
    }
}

impl From<StructuredError> for Failure {
    fn from(error: StructuredError) -> Self {
        Failure::Structured(error)
    }
}

impl From<std::io::Error> for Failure {
    fn from(error: std::io::Error) -> Self {
        Failure::Io(error)
    }
}

impl From<reqwest::Error> for Failure {
    fn from(error: reqwest::Error) -> Self {
        Failure::Http(error)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Failure::Other(error)
    }
}

const NETWORK_MESSAGE: &str =
    "Unable to reach the service. Please check your internet connection and try again.";

/// Error classifier - normalizes arbitrary failures into structured errors
///
/// The network/api boundary is whether a response was obtained: anything that
/// failed before a status line is `network-error`; anything the remote service
/// answered is `api-error` unless the body or the status names a more specific
/// kind.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// HTTP status → kind overrides, consulted after the response body
    status_kinds: Vec<(u16, ErrorKind)>,
}

impl ErrorClassifier {
    /// Create a classifier with the default status table
    pub fn new() -> Self {
        Self {
            status_kinds: vec![
                (401, ErrorKind::AuthError),
                (403, ErrorKind::AuthError),
                (413, ErrorKind::FileTooLarge),
                (415, ErrorKind::InvalidFileType),
                (429, ErrorKind::RateLimitExceeded),
            ],
        }
    }

    /// Map an HTTP status to a specific kind, replacing any existing mapping
    pub fn with_status_kind(mut self, status: u16, kind: ErrorKind) -> Self {
        self.status_kinds.retain(|(s, _)| *s != status);
        self.status_kinds.push((status, kind));
        self
    }

    pub fn status_kind(&self, status: u16) -> Option<ErrorKind> {
        self.status_kinds
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, kind)| *kind)
    }

    /// Classify any failure; never fails
    pub fn classify(&self, failure: impl Into<Failure>) -> StructuredError {
        match failure.into() {
            Failure::Structured(error) => error,

            Failure::Transport(error) => {
                StructuredError::new(NETWORK_MESSAGE, ErrorKind::NetworkError)
                    .with_shared_cause(Arc::from(error))
            }

            Failure::Status {
                status,
                body,
                fallback,
            } => self.classify_status(status, &body, fallback),

            Failure::Io(error) => {
                let kind = classify_io_kind(error.kind());
                let message = match kind {
                    ErrorKind::NetworkError => NETWORK_MESSAGE.to_string(),
                    _ => error.to_string(),
                };
                StructuredError::new(message, kind).with_cause(error)
            }

            Failure::Http(error) => self.classify_reqwest(error),

            Failure::Other(error) => self.classify_opaque(error),
        }
    }

    fn classify_status(&self, status: u16, body: &str, fallback: Option<ErrorKind>) -> StructuredError {
        let kind = kind_from_body(body)
            .or_else(|| self.status_kind(status))
            .or(fallback)
            .unwrap_or(ErrorKind::ApiError);

        let message = message_from_body(body).unwrap_or_else(|| {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("Unexpected response");
            format!("{} (HTTP {})", reason, status)
        });

        StructuredError::new(message, kind)
    }

    fn classify_reqwest(&self, error: reqwest::Error) -> StructuredError {
        if let Some(status) = error.status() {
            let classified = self.classify_status(status.as_u16(), "", None);
            return StructuredError::new(classified.message().to_string(), classified.kind())
                .with_cause(error);
        }

        // Nothing came back from the host.
        if error.is_connect() || error.is_timeout() || error.is_request() {
            return StructuredError::new(NETWORK_MESSAGE, ErrorKind::NetworkError).with_cause(error);
        }

        if let Some(io_kind) = io_kind_in_chain(&error) {
            if classify_io_kind(io_kind) == ErrorKind::NetworkError {
                return StructuredError::new(NETWORK_MESSAGE, ErrorKind::NetworkError)
                    .with_cause(error);
            }
        }

        let message = if error.is_decode() {
            "The service returned a response that could not be read".to_string()
        } else {
            error.to_string()
        };
        StructuredError::new(message, ErrorKind::ApiError).with_cause(error)
    }

    fn classify_opaque(&self, error: anyhow::Error) -> StructuredError {
        let error = match error.downcast::<StructuredError>() {
            Ok(structured) => return structured,
            Err(error) => error,
        };
        let error = match error.downcast::<reqwest::Error>() {
            Ok(http) => return self.classify_reqwest(http),
            Err(error) => error,
        };
        let error = match error.downcast::<std::io::Error>() {
            Ok(io) => return self.classify(Failure::Io(io)),
            Err(error) => error,
        };

        // Look through wrapped context for something we recognise
        let nested_kind = error.chain().find_map(|cause| {
            if let Some(structured) = cause.downcast_ref::<StructuredError>() {
                Some(structured.kind())
            } else {
                cause
                    .downcast_ref::<std::io::Error>()
                    .map(|io| classify_io_kind(io.kind()))
            }
        });

        let kind = nested_kind.unwrap_or(ErrorKind::ApiError);
        let message = match kind {
            ErrorKind::NetworkError => NETWORK_MESSAGE.to_string(),
            _ => error.to_string(),
        };
        let cause: Box<dyn StdError + Send + Sync + 'static> = error.into();
        StructuredError::new(message, kind).with_shared_cause(Arc::from(cause))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the default classifier
pub fn classify(failure: impl Into<Failure>) -> StructuredError {
    ErrorClassifier::new().classify(failure)
}

/// I/O errors that mean the host was never reached (or dropped us) are network errors
fn classify_io_kind(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as Io;

    match kind {
        Io::ConnectionRefused
        | Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::NotConnected
        | Io::AddrNotAvailable
        | Io::AddrInUse
        | Io::BrokenPipe
        | Io::TimedOut
        | Io::UnexpectedEof => ErrorKind::NetworkError,
        _ => ErrorKind::ApiError,
    }
}

fn io_kind_in_chain(error: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = error.source();
    while let Some(cause) = current {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = cause.source();
    }
    None
}

const KIND_POINTERS: [&str; 4] = ["/code", "/error/code", "/detail/status", "/detail/code"];
const MESSAGE_POINTERS: [&str; 5] = [
    "/detail/message",
    "/message",
    "/error/message",
    "/error",
    "/detail",
];

/// A kind named explicitly by the response payload, if any
///
/// A response was received, so network-error is never taken from a body.
fn kind_from_body(body: &str) -> Option<ErrorKind> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    KIND_POINTERS
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .filter_map(|field| field.as_str())
        .filter_map(|code| code.parse().ok())
        .find(|kind| *kind != ErrorKind::NetworkError)
}

fn message_from_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => MESSAGE_POINTERS
            .iter()
            .filter_map(|pointer| value.pointer(pointer))
            .filter_map(|field| field.as_str())
            .find(|text| !text.trim().is_empty())
            .map(str::to_string),
        Err(_) => Some(body.chars().take(200).collect()),
    }
}
