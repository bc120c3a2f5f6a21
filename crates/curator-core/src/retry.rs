//! Bounded retry for ledger broadcasts
//!
//! Attempts are spaced by a fixed delay, there is no backoff. Only
//! [`CuratorError::Platform`] errors earn another attempt (see
//! [`CuratorError::is_retryable`]). That includes anything the node rejects,
//! such as a missing authority. Errors detected locally, like a key that
//! cannot be loaded or a malformed amount, fail on the spot.

use crate::error::{CuratorError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry budget
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Pause between two attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Runs an async operation until it succeeds or the budget is spent
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op`, retrying transient failures
    ///
    /// On exhaustion the last error is returned wrapped in
    /// [`CuratorError::RetryExhausted`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let final_attempt = attempt >= max_attempts || !err.is_retryable();
                    if final_attempt {
                        error!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Operation failed permanently"
                        );
                        return Err(CuratorError::RetryExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Attempt failed, retrying in {:?}",
                        self.config.delay
                    );
                    tokio::time::sleep(self.config.delay).await;
                }
            }
        }
    }
}
