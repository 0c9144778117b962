#![allow(dead_code)]

// Shared fixtures for the integration tests: scripted operations whose
// failures are decided up front, and small retry config constructors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use talking_head_resilience::error::{ErrorKind, RetryConfig, StructuredError};

/// Operation that fails with a fixed sequence of kinds, then succeeds
///
/// The success value is the 1-indexed attempt that produced it.
#[derive(Debug, Default)]
pub struct ScriptedOperation {
    calls: AtomicU32,
    failures: Vec<ErrorKind>,
}

impl ScriptedOperation {
    pub fn failing_then_ok(failures: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: failures.into_iter().collect(),
        }
    }

    /// Never succeeds within any reasonable budget
    pub fn always_failing(kind: ErrorKind) -> Self {
        Self::failing_then_ok(std::iter::repeat(kind).take(1_000))
    }

    pub async fn attempt(&self) -> Result<u32, StructuredError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures.get(attempt as usize - 1) {
            Some(kind) => Err(StructuredError::new(
                format!("attempt {} failed", attempt),
                *kind,
            )),
            None => Ok(attempt),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Config with a doubling backoff and the given retryable kinds
pub fn config(
    max_attempts: u32,
    initial_ms: u64,
    max_ms: u64,
    kinds: impl IntoIterator<Item = ErrorKind>,
) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(initial_ms))
        .max_delay(Duration::from_millis(max_ms))
        .backoff_factor(2.0)
        .retryable_kinds(kinds)
        .build()
        .expect("test config is valid")
}

/// Route library logs to the test harness output; safe to call repeatedly
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("talking_head_resilience=debug")
        .with_test_writer()
        .try_init();
}
