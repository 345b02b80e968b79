//! Bounded-concurrency retrieval with per-task retries.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use super::policy::{RetryClass, RetryPolicy, RetryState, Retryable};

/// Default number of concurrent retrieval tasks.
///
/// Kept small so a run stays inside the hosting API's rate budget.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Why a retrieval task produced no value.
#[derive(Error, Debug)]
pub enum RetrievalError<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        source: E,
    },

    /// A non-retryable error ended the task.
    #[error("aborted after {attempts} attempt(s): {source}")]
    Aborted {
        /// Attempts made.
        attempts: u32,
        /// The error that ended the task.
        source: E,
    },

    /// The run was cancelled while the task waited to retry.
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts made.
        attempts: u32,
    },

    /// The task panicked.
    #[error("task panicked")]
    Panicked,
}

impl<E> RetrievalError<E> {
    /// Attempts made before the task ended.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
            Self::Panicked => 0,
        }
    }
}

/// Runs `op` under `policy` until it succeeds, fails permanently, runs out
/// of attempts, or `cancel` fires during a backoff wait.
///
/// Returns the result together with the number of attempts made.
pub async fn retry<R, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> (Result<R, RetrievalError<E>>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Retryable + Display,
{
    let mut state = RetryState::default();
    loop {
        let attempts = state.attempt + 1;
        let err = match op().await {
            Ok(value) => return (Ok(value), attempts),
            Err(err) => err,
        };

        let class = err.retry_class();
        if class == RetryClass::Permanent {
            tracing::error!(task = %label, attempts, "Task failed permanently: {err}");
            return (
                Err(RetrievalError::Aborted {
                    attempts,
                    source: err,
                }),
                attempts,
            );
        }
        if !policy.allows_retry(class, state.attempt) {
            tracing::error!(task = %label, attempts, %class, "Retry budget exhausted: {err}");
            return (
                Err(RetrievalError::Exhausted {
                    attempts,
                    source: err,
                }),
                attempts,
            );
        }

        let delay = policy.delay_for(state.attempt);
        tracing::warn!(
            task = %label,
            attempt = attempts,
            %class,
            delay_ms = delay.as_millis() as u64,
            "Backing off before retrying: {err}"
        );
        state.last_error = Some(err.to_string());
        state.next_delay = Some(delay);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(
                    task = %label,
                    last_error = state.last_error.as_deref().unwrap_or_default(),
                    "Cancelled during backoff"
                );
                return (Err(RetrievalError::Cancelled { attempts }), attempts);
            }
            () = tokio::time::sleep(delay) => {}
        }
        state.attempt += 1;
    }
}

/// Result of one task.
#[derive(Debug)]
pub struct TaskOutcome<T, R, E> {
    /// The input the task ran on.
    pub item: T,
    /// Value or failure.
    pub result: Result<R, RetrievalError<E>>,
    /// Attempts made.
    pub attempts: u32,
}

/// Everything a [`RetrievalCoordinator::fetch_all`] run produced.
#[derive(Debug)]
pub struct RetrievalSummary<T, R, E> {
    /// Outcomes in completion order, not submission order.
    pub outcomes: Vec<TaskOutcome<T, R, E>>,
    /// Items never started because the run was cancelled.
    pub unsubmitted: Vec<T>,
    /// Whether cancellation was requested during the run.
    pub cancelled: bool,
}

impl<T, R, E> RetrievalSummary<T, R, E> {
    /// Successful values, in completion order.
    pub fn successes(&self) -> impl Iterator<Item = (&T, &R)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (&o.item, r)))
    }

    /// Failed tasks, in completion order.
    pub fn failures(&self) -> impl Iterator<Item = (&T, &RetrievalError<E>)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.item, e)))
    }
}

/// Runs one task per item on a bounded pool.
///
/// Workers hand finished outcomes to a single collector over a channel, so
/// the result list has exactly one writer. A failed task never affects the
/// others. Cancelling the token stops submission; running tasks finish
/// their current attempt and are abandoned at their next backoff wait.
#[derive(Debug, Clone)]
pub struct RetrievalCoordinator {
    pool_size: usize,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Default for RetrievalCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE, RetryPolicy::exponential())
    }
}

impl RetrievalCoordinator {
    /// Creates a coordinator. A pool size of zero is treated as one.
    pub fn new(pool_size: usize, policy: RetryPolicy) -> Self {
        Self {
            pool_size: pool_size.max(1),
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this coordinator's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of concurrent tasks.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Retry policy applied to each task.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `task` once per item, with retries, and collects every outcome.
    pub async fn fetch_all<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        task: F,
    ) -> RetrievalSummary<T, R, E>
    where
        T: Clone + Display + Send + 'static,
        R: Send + 'static,
        E: Retryable + Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let total = items.len();
        let pool = Arc::new(Semaphore::new(self.pool_size));
        let task = Arc::new(task);
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskOutcome<T, R, E>>();
        let cancel = self.cancel.clone();
        let policy = self.policy.clone();

        tracing::debug!(total, pool_size = self.pool_size, "Starting retrieval run");

        let submit = async move {
            let mut unsubmitted = Vec::new();
            let mut pending = items.into_iter();
            while let Some(item) = pending.next() {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = pool.clone().acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    unsubmitted.push(item);
                    unsubmitted.extend(pending);
                    break;
                };

                let tx = tx.clone();
                let task = task.clone();
                let policy = policy.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let label = item.to_string();
                    let input = item.clone();
                    let run = retry(&policy, &cancel, &label, move || task(input.clone()));
                    let (result, attempts) = AssertUnwindSafe(run)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            tracing::error!(task = %label, "Retrieval task panicked");
                            (Err(RetrievalError::Panicked), 0)
                        });
                    drop(permit);
                    // The collector outlives every sender, so this cannot fail.
                    let _ = tx.send(TaskOutcome {
                        item,
                        result,
                        attempts,
                    });
                });
            }
            unsubmitted
        };

        let collect = async move {
            let mut outcomes = Vec::with_capacity(total);
            while let Some(outcome) = rx.recv().await {
                outcomes.push(outcome);
            }
            outcomes
        };

        let (unsubmitted, outcomes) = tokio::join!(submit, collect);
        let cancelled = self.cancel.is_cancelled();

        tracing::debug!(
            completed = outcomes.len(),
            unsubmitted = unsubmitted.len(),
            cancelled,
            "Retrieval run finished"
        );

        RetrievalSummary {
            outcomes,
            unsubmitted,
            cancelled,
        }
    }
}
