//! Per-task retry and backoff classification used by agent dispatch.

pub mod retry;

pub use retry::{classify_error, retry_with_backoff, ErrorClass, RetryConfig};
