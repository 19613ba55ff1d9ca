//! Exponential-backoff retry around the single-object copy.
//!
//! By default an object is never given up on: the loop keeps retrying until
//! the copy succeeds or the process is killed. A retry cap can be configured,
//! in which case the object is reported back as abandoned instead.

use crate::{
    errors::TransferError,
    models::{job::MigrationJob, object::ObjectRecord},
    services::{progress::ProgressCounter, transfer::copy_object},
};
use std::{future::Future, time::Duration};
use tracing::{error, warn};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Total attempts before an object is abandoned; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
        }
    }
}

/// Delays for consecutive failures: doubling, capped, never decreasing.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// How a retried transfer ended.
#[derive(Debug)]
pub enum TransferOutcome {
    Copied { attempts: u32 },
    Abandoned { attempts: u32, last_error: TransferError },
}

impl TransferOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, TransferOutcome::Copied { .. })
    }
}

/// Runs copies under a [`RetryPolicy`] and counts each object that lands.
#[derive(Clone)]
pub struct RetryingExecutor {
    policy: RetryPolicy,
    counter: ProgressCounter,
}

impl RetryingExecutor {
    pub fn new(policy: RetryPolicy, counter: ProgressCounter) -> Self {
        Self { policy, counter }
    }

    /// Copy `record`, retrying on any failure.
    pub async fn run(&self, job: &MigrationJob, record: &ObjectRecord) -> TransferOutcome {
        self.run_with(&record.name, || copy_object(job, record)).await
    }

    /// Drive `operation` until it succeeds (or the attempt cap is hit).
    ///
    /// Every failure is logged with the key and the delay before the next
    /// attempt. The sleep suspends only this future. The progress counter is
    /// bumped exactly once, on success.
    pub async fn run_with<F, Fut>(&self, key: &str, mut operation: F) -> TransferOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), TransferError>>,
    {
        let mut backoff = self.policy.backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match operation().await {
                Ok(()) => {
                    self.counter.increment();
                    return TransferOutcome::Copied { attempts };
                }
                Err(err) => err,
            };

            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                error!(key, attempts, error = %err, "giving up on object");
                return TransferOutcome::Abandoned {
                    attempts,
                    last_error: err,
                };
            }

            let delay = backoff.next().unwrap_or(self.policy.max_delay);
            warn!(
                key,
                attempt = attempts,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "transfer failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
