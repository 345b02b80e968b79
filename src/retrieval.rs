//! Concurrent retrieval with per-task retry and cooperative cancellation.

pub mod coordinator;
pub mod policy;

pub use coordinator::{
    retry, RetrievalCoordinator, RetrievalError, RetrievalSummary, TaskOutcome, DEFAULT_POOL_SIZE,
};
pub use policy::{Backoff, RetryClass, RetryPolicy, RetryState, Retryable};
