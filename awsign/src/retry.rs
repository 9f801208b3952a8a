//! Retry strategies with convenience constructors.

pub use awsign_retry::*;

use crate::{Context, Result};

/// Build the strategy selected by `AWS_RETRY_MODE` and `AWS_MAX_ATTEMPTS`,
/// with the default retry conditions.
pub fn default_strategy(ctx: &Context) -> Result<RetryStrategy> {
    RetryConfig::from_env(ctx)?.strategy()
}
