/// Retry engine with deterministic exponential backoff
///
/// Runs a caller-supplied async operation under an attempt budget. Each failure
/// is classified; kinds outside the call's retryable set propagate on first
/// occurrence, retryable kinds are retried after a delay that grows by the
/// backoff factor up to a hard ceiling. Only the last attempt's error is ever
/// surfaced.
use super::classification::{ErrorClassifier, ErrorKind, Failure, StructuredError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Rejected retry configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("max_delay ({max:?}) must not be below initial_delay ({initial:?})")]
    CeilingBelowInitial { initial: Duration, max: Duration },

    #[error("backoff_factor must be a finite number greater than 1, got {0}")]
    InvalidBackoffFactor(f64),

    #[error("delays must be finite, non-negative milliseconds, got {0}")]
    InvalidDelay(f64),
}

/// Retry budget and backoff policy for one call
///
/// Immutable once built; construct through [`RetryConfig::builder`],
/// [`RetryConfig::new`] or validated deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryConfigRecord", into = "RetryConfigRecord")]
pub struct RetryConfig {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter_factor: f64,
    retryable_kinds: BTreeSet<ErrorKind>,
}

impl RetryConfig {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        retryable_kinds: impl IntoIterator<Item = ErrorKind>,
    ) -> Result<Self, RetryConfigError> {
        let config = Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_factor,
            jitter_factor: 0.0,
            retryable_kinds: retryable_kinds.into_iter().collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Single attempt, never waits
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Built-in profile on top of the defaults; callers pass known-good values
    pub(crate) fn preset(
        max_attempts: u32,
        initial_delay: Duration,
        retryable_kinds: impl IntoIterator<Item = ErrorKind>,
    ) -> Self {
        let config = Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            retryable_kinds: retryable_kinds.into_iter().collect(),
            ..Self::default()
        };
        debug_assert!(config.validate().is_ok());
        config
    }

    fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }
        if self.max_delay < self.initial_delay {
            return Err(RetryConfigError::CeilingBelowInitial {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return Err(RetryConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        Ok(())
    }

    /// Randomize each wait by ±`jitter_factor` of the computed delay
    ///
    /// Zero (the default) keeps backoff fully deterministic. Jittered waits
    /// never exceed `max_delay`.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = sanitize_jitter(jitter_factor);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    pub fn retryable_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable_kinds
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Delay following `current`: `min(current * backoff_factor, max_delay)`
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_nanos() as f64 * self.backoff_factor;
        let ceiling = self.max_delay;

        if !scaled.is_finite() || scaled >= ceiling.as_nanos() as f64 {
            ceiling
        } else {
            Duration::from_nanos(scaled.round() as u64).min(ceiling)
        }
    }

    /// Infinite schedule of inter-attempt waits, before jitter
    pub fn delays(&self) -> Backoff {
        Backoff {
            config: self.clone(),
            current: self.initial_delay,
        }
    }

    /// Waits actually scheduled between the attempts of a fully failing call
    pub fn schedule(&self) -> Vec<Duration> {
        self.delays()
            .take(self.max_attempts.saturating_sub(1) as usize)
            .collect()
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 || delay.is_zero() {
            return delay;
        }

        let nanos = delay.as_nanos() as f64;
        let range = nanos * self.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * range;
        let nanos = (nanos + jitter).max(0.0).round();

        Duration::from_nanos(nanos as u64).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    /// 3 attempts, 1s initial delay doubling up to 10s, default retryable kinds
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
            jitter_factor: 0.0,
            retryable_kinds: default_retryable_kinds().into_iter().collect(),
        }
    }
}

fn sanitize_jitter(jitter_factor: f64) -> f64 {
    if jitter_factor.is_nan() {
        0.0
    } else {
        jitter_factor.clamp(0.0, 1.0)
    }
}

/// Kinds retried when a caller does not say otherwise
pub fn default_retryable_kinds() -> Vec<ErrorKind> {
    ErrorKind::ALL
        .into_iter()
        .filter(ErrorKind::is_retryable_by_default)
        .collect()
}

/// Serialized shape of [`RetryConfig`], delays in (possibly fractional) milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfigRecord {
    pub max_attempts: u32,
    pub initial_delay_ms: f64,
    pub max_delay_ms: f64,
    pub backoff_factor: f64,
    #[serde(default)]
    pub jitter_factor: f64,
    #[serde(default = "default_retryable_kinds")]
    pub retryable_kinds: Vec<ErrorKind>,
}

impl TryFrom<RetryConfigRecord> for RetryConfig {
    type Error = RetryConfigError;

    fn try_from(record: RetryConfigRecord) -> Result<Self, Self::Error> {
        Ok(RetryConfig::new(
            record.max_attempts,
            duration_from_ms(record.initial_delay_ms)?,
            duration_from_ms(record.max_delay_ms)?,
            record.backoff_factor,
            record.retryable_kinds,
        )?
        .with_jitter(record.jitter_factor))
    }
}

impl From<RetryConfig> for RetryConfigRecord {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay_ms: ms_from_duration(config.initial_delay),
            max_delay_ms: ms_from_duration(config.max_delay),
            backoff_factor: config.backoff_factor,
            jitter_factor: config.jitter_factor,
            retryable_kinds: config.retryable_kinds.into_iter().collect(),
        }
    }
}

fn duration_from_ms(ms: f64) -> Result<Duration, RetryConfigError> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(RetryConfigError::InvalidDelay(ms));
    }
    Ok(Duration::from_nanos((ms * 1e6).round() as u64))
}

fn ms_from_duration(delay: Duration) -> f64 {
    delay.as_nanos() as f64 / 1e6
}

/// Builder for [`RetryConfig`], starting from the defaults
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    pub fn jitter(mut self, jitter_factor: f64) -> Self {
        self.config.jitter_factor = sanitize_jitter(jitter_factor);
        self
    }

    /// Replace the retryable set
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Add one kind to the retryable set
    pub fn retry_on(mut self, kind: ErrorKind) -> Self {
        self.config.retryable_kinds.insert(kind);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Iterator over the un-jittered inter-attempt delays of a config
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    current: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.current = self.config.next_delay(delay);
        Some(delay)
    }
}

/// Final failure of an `execute` call
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    /// The failure's kind is not retryable under this call's config
    #[error("{error}")]
    Rejected {
        #[source]
        error: StructuredError,
        attempts: u32,
    },

    /// Every permitted attempt failed with a retryable kind
    #[error("{error} (gave up after {attempts} attempts)")]
    Exhausted {
        #[source]
        error: StructuredError,
        attempts: u32,
    },

    /// Cancellation was observed before an attempt or while waiting
    #[error("operation cancelled after {attempts} attempt(s)")]
    Cancelled {
        attempts: u32,
        #[source]
        last_error: Option<StructuredError>,
    },
}

impl RetryError {
    /// The last attempt's classified error, if any attempt ran
    pub fn error(&self) -> Option<&StructuredError> {
        match self {
            RetryError::Rejected { error, .. } | RetryError::Exhausted { error, .. } => Some(error),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    pub fn into_error(self) -> Option<StructuredError> {
        match self {
            RetryError::Rejected { error, .. } | RetryError::Exhausted { error, .. } => Some(error),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.error().map(StructuredError::kind)
    }

    /// Number of attempts that actually ran
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Rejected { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

/// Progress report emitted before each inter-attempt wait
#[derive(Debug, Clone)]
pub struct RetryStatus {
    /// Attempt that just failed (1-indexed)
    pub attempt: u32,

    /// Wait before the next attempt
    pub delay: Duration,

    /// Attempts still permitted after this wait
    pub remaining: u32,

    /// Classified failure of `attempt`
    pub error: StructuredError,
}

/// Per-call state; lives only for the duration of one `execute`
#[derive(Debug)]
struct AttemptState {
    attempt: u32,
    current_delay: Duration,
    last_error: Option<StructuredError>,
}

impl AttemptState {
    fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 1,
            current_delay: config.initial_delay,
            last_error: None,
        }
    }

    fn advance(&mut self, config: &RetryConfig) {
        self.current_delay = config.next_delay(self.current_delay);
        self.attempt += 1;
    }

    fn cancelled(&mut self, attempts: u32) -> RetryError {
        RetryError::Cancelled {
            attempts,
            last_error: self.last_error.take(),
        }
    }
}

/// Executes operations under a [`RetryConfig`]
///
/// Holds no per-call state; one engine can serve any number of concurrent
/// calls, which stay fully independent of each other.
#[derive(Debug, Clone, Default)]
pub struct RetryEngine {
    classifier: ErrorClassifier,
}

impl RetryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Run `operation` until it succeeds, fails with a non-retryable kind, or
    /// the attempt budget is spent
    pub async fn execute<F, Fut, T, E>(
        &self,
        config: &RetryConfig,
        operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.execute_with_status(config, None, |_| {}, operation)
            .await
    }

    /// As [`RetryEngine::execute`], resolving with [`RetryError::Cancelled`]
    /// as soon as `cancel` fires between attempts
    pub async fn execute_cancellable<F, Fut, T, E>(
        &self,
        config: &RetryConfig,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.execute_with_status(config, Some(cancel), |_| {}, operation)
            .await
    }

    /// Full-featured variant: optional cancellation plus a status callback
    /// invoked before every wait
    pub async fn execute_with_status<F, Fut, T, E, S>(
        &self,
        config: &RetryConfig,
        cancel: Option<&CancellationToken>,
        mut on_retry: S,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
        S: FnMut(&RetryStatus),
    {
        let call_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "retry",
            %call_id,
            max_attempts = config.max_attempts()
        );

        async move {
            let mut state = AttemptState::new(config);

            loop {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    tracing::info!(attempt = state.attempt, "Cancelled before attempt");
                    return Err(state.cancelled(state.attempt - 1));
                }

                let failure = match operation().await {
                    Ok(value) => {
                        if state.attempt > 1 {
                            tracing::info!(attempt = state.attempt, "Operation succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(failure) => failure,
                };

                let error = self.classifier.classify(failure);
                tracing::warn!(
                    attempt = state.attempt,
                    kind = %error.kind(),
                    error = %error,
                    "Attempt failed"
                );

                if !config.is_retryable(error.kind()) {
                    tracing::debug!(kind = %error.kind(), "Kind is not retryable, failing fast");
                    return Err(RetryError::Rejected {
                        error,
                        attempts: state.attempt,
                    });
                }

                if state.attempt >= config.max_attempts() {
                    tracing::error!(
                        attempts = state.attempt,
                        kind = %error.kind(),
                        "Retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        error,
                        attempts: state.attempt,
                    });
                }

                let delay = config.jittered(state.current_delay);
                let remaining = config.max_attempts() - state.attempt;
                tracing::info!(
                    attempt = state.attempt,
                    delay_ms = delay.as_millis() as u64,
                    remaining,
                    "Retrying after delay"
                );

                on_retry(&RetryStatus {
                    attempt: state.attempt,
                    delay,
                    remaining,
                    error: error.clone(),
                });
                state.last_error = Some(error);

                if !wait_or_cancel(cancel, delay).await {
                    tracing::info!(attempt = state.attempt, "Cancelled while waiting to retry");
                    return Err(state.cancelled(state.attempt));
                }

                state.advance(config);
            }
        }
        .instrument(span)
        .await
    }
}

/// Sleep for `delay`; false if `cancel` fired first
async fn wait_or_cancel(cancel: Option<&CancellationToken>, delay: Duration) -> bool {
    if delay.is_zero() {
        return true;
    }

    match cancel {
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = token.cancelled() => false,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// Execute with the default classifier
pub async fn execute<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Failure>,
{
    RetryEngine::new().execute(config, operation).await
}

/// Execute with the default classifier and a cancellation token
pub async fn execute_cancellable<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Failure>,
{
    RetryEngine::new()
        .execute_cancellable(config, cancel, operation)
        .await
}

/// Async function bound to a retry policy; see [`retryable`]
#[derive(Debug, Clone)]
pub struct Retrying<F> {
    engine: RetryEngine,
    config: RetryConfig,
    function: F,
}

impl<F> Retrying<F> {
    /// Call the wrapped function with `args`, retrying under the bound policy
    ///
    /// Arguments are cloned for every attempt so each one starts from scratch.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, RetryError>
    where
        A: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.engine
            .execute(&self.config, || (self.function)(args.clone()))
            .await
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Wrap an argument-taking async function so every call retries under `config`
pub fn retryable<F>(config: RetryConfig, function: F) -> Retrying<F> {
    Retrying {
        engine: RetryEngine::new(),
        config,
        function,
    }
}
