//! cmw-runtime
//!
//! The poll loop around the reconciliation engine.
//!
//! Contract:
//! - One poll at a time; the engine runs synchronously between awaits.
//! - A failed acquisition is retried with capped exponential backoff inside
//!   the cycle. Repeated failed cycles trip a circuit breaker.
//! - The loop never exits on a cycle failure, only on shutdown.

mod breaker;
mod poller;
mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use poller::{log_report, PollOutcome, PollSettings, Poller};
pub use retry::{fetch_with_retry, RetryPolicy};
