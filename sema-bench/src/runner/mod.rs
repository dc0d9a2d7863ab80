//! Benchmark execution: retry policy and the sample run loop

pub mod executor;
pub mod retry;

pub use executor::run_samples;
pub use retry::{RetryPolicy, Retryable};
