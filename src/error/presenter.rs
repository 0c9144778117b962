/// User-facing presentation of failures
///
/// Every adapter funnels its terminal failures through [`ErrorHandler::handle`],
/// which classifies them and forwards a [`Notice`] to a [`Presenter`]. Failures
/// are never presented ad hoc.
use super::classification::{ErrorClassifier, ErrorKind, Failure, Severity, StructuredError};
use super::retry::RetryError;
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

/// Title used when a raw code names no known kind
pub const GENERIC_TITLE: &str = "Error";

/// Title of the notice shown for a cancelled call
pub const CANCELLED_TITLE: &str = "Cancelled";

/// Resolve a raw kind code (kebab or upper snake case) to its title
pub fn title_for_code(code: &str) -> &'static str {
    code.parse::<ErrorKind>()
        .map(|kind| kind.title())
        .unwrap_or(GENERIC_TITLE)
}

/// How loudly a notice should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Destructive,
    Default,
}

/// What a presenter shows for one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn from_error(error: &StructuredError) -> Self {
        Self {
            title: error.title().to_string(),
            message: error.message().to_string(),
            severity: error.severity(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            title: CANCELLED_TITLE.to_string(),
            message: "The operation was cancelled before it could finish.".to_string(),
            severity: Severity::Info,
        }
    }

    /// Only `error` severity is rendered destructively
    pub fn variant(&self) -> Variant {
        match self.severity {
            Severity::Error => Variant::Destructive,
            Severity::Warning | Severity::Info => Variant::Default,
        }
    }
}

/// Sink for user-facing notices; must never fail
#[cfg_attr(test, mockall::automock)]
pub trait Presenter: Send + Sync {
    fn present(&self, notice: &Notice);
}

impl<P: Presenter + ?Sized> Presenter for Arc<P> {
    fn present(&self, notice: &Notice) {
        (**self).present(notice)
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&self, notice: &Notice) {
        (**self).present(notice)
    }
}

/// Emits notices as tracing events, level following severity
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn present(&self, notice: &Notice) {
        match notice.severity {
            Severity::Error => {
                tracing::error!(title = %notice.title, message = %notice.message, "User notice")
            }
            Severity::Warning => {
                tracing::warn!(title = %notice.title, message = %notice.message, "User notice")
            }
            Severity::Info => {
                tracing::info!(title = %notice.title, message = %notice.message, "User notice")
            }
        }
    }
}

/// Writes notices to stderr, coloured by severity
#[derive(Debug, Clone, Copy)]
pub struct ConsolePresenter {
    color: bool,
}

impl ConsolePresenter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn render(&self, notice: &Notice) -> String {
        let marker = match notice.severity {
            Severity::Error => "✖",
            Severity::Warning => "⚠",
            Severity::Info => "ℹ",
        };
        let heading = format!("{} {}", marker, notice.title);

        if !self.color {
            return format!("{}: {}", heading, notice.message);
        }

        let heading = match notice.severity {
            Severity::Error => heading.red().bold(),
            Severity::Warning => heading.yellow().bold(),
            Severity::Info => heading.blue().bold(),
        };
        format!("{}: {}", heading, notice.message)
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Presenter for ConsolePresenter {
    fn present(&self, notice: &Notice) {
        eprintln!("{}", self.render(notice));
    }
}

/// Single entry point from adapters to the presentation layer
#[derive(Debug, Clone)]
pub struct ErrorHandler<P> {
    classifier: ErrorClassifier,
    presenter: P,
}

impl<P: Presenter> ErrorHandler<P> {
    pub fn new(presenter: P) -> Self {
        Self::with_classifier(ErrorClassifier::new(), presenter)
    }

    pub fn with_classifier(classifier: ErrorClassifier, presenter: P) -> Self {
        Self {
            classifier,
            presenter,
        }
    }

    /// Classify any failure and present it
    pub fn handle(&self, failure: impl Into<Failure>) {
        let error = self.classifier.classify(failure);
        match error.severity() {
            Severity::Error => {
                tracing::error!(kind = %error.kind(), error = %error, "Call failed")
            }
            Severity::Warning => {
                tracing::warn!(kind = %error.kind(), error = %error, "Call failed")
            }
            Severity::Info => {
                tracing::info!(kind = %error.kind(), error = %error, "Call failed")
            }
        }
        self.presenter.present(&Notice::from_error(&error));
    }

    /// Present the final outcome of a retried call
    ///
    /// Cancellation is not a service failure and gets its own info notice.
    pub fn handle_retry(&self, error: RetryError) {
        if error.is_cancelled() {
            tracing::info!(
                attempts = error.attempts(),
                last_kind = ?error.kind(),
                "Call cancelled"
            );
            self.presenter.present(&Notice::cancelled());
            return;
        }

        if let Some(structured) = error.into_error() {
            self.handle(structured);
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}
