/// Resilient-call core: error taxonomy, retry engine and presentation
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────┐
/// │   Call adapter (operation)   │
/// └──────────────┬───────────────┘
///                ↓
/// ┌──────────────────────────────┐      ┌──────────────────┐
/// │ Retry engine (budget/backoff)│ ───→ │  Classification  │
/// └──────────────┬───────────────┘      │  (closed kinds)  │
///                ↓                      └──────────────────┘
///      Ok(value) | RetryError
///                ↓
/// ┌──────────────────────────────┐
/// │  Error handler → Presenter   │
/// └──────────────────────────────┘
/// ```
///
/// # Usage Example
///
/// ```rust,no_run
/// use talking_head_resilience::error::{execute, ErrorKind, RetryConfig, StructuredError};
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RetryConfig::builder()
///     .max_attempts(3)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1))
///     .retryable_kinds([ErrorKind::ApiError])
///     .build()?;
///
/// let audio = execute(&config, || async {
///     // build and send a fresh request here
///     Ok::<_, StructuredError>(vec![0u8; 16])
/// })
/// .await?;
/// # let _ = audio;
/// # Ok(())
/// # }
/// ```

pub mod classification;
pub mod presenter;
pub mod retry;

pub use classification::{
    classify, Cause, ErrorClassifier, ErrorKind, Failure, KindDomain, Severity, StructuredError,
    UnknownErrorKind,
};
pub use presenter::{
    title_for_code, ConsolePresenter, ErrorHandler, Notice, Presenter, TracingPresenter, Variant,
};
pub use retry::{
    default_retryable_kinds, execute, execute_cancellable, retryable, Backoff, RetryConfig,
    RetryConfigBuilder, RetryConfigError, RetryConfigRecord, RetryEngine, RetryError,
    RetryStatus, Retrying,
};
