// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::backoff::BackoffStrategy;
use crate::condition::{
    OrRetryCondition, RetryCondition, RetryOnErrorKindCondition, RetryOnStatusCodeCondition,
    RetryPolicyContext,
};
use crate::error::{FailureReason, TokenAcquisitionFailed};
use crate::failure::{AttemptFailure, ErrorKind};
use crate::rate_limiter::{ClientRateLimiter, INITIAL_REQUEST_COST, RETRY_COST};
use crate::token::{RetryState, RetryToken};
use crate::token_bucket::{
    TokenBucket, TokenBucketStore, DEFAULT_TOKEN_BUCKET_CAPACITY, DEFAULT_TOKEN_BUCKET_SCOPES,
};
use awsign_core::time::{as_epoch_seconds, now};
use awsign_core::{Error, LruCache, Result};
use http::StatusCode;
use log::debug;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type ThrottlingFn = dyn Fn(&AttemptFailure<'_>) -> bool + Send + Sync;

/// Preset families of retry behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RetryMode {
    /// Token bucket gated retries with jittered exponential backoff.
    #[default]
    Standard,
    /// Behavior of older SDKs: throttled retries are free.
    Legacy,
    /// Standard plus a client side send rate limiter.
    Adaptive,
}

impl RetryMode {
    /// Name used in `AWS_RETRY_MODE`.
    pub fn name(&self) -> &'static str {
        match self {
            RetryMode::Standard => "standard",
            RetryMode::Legacy => "legacy",
            RetryMode::Adaptive => "adaptive",
        }
    }
}

impl FromStr for RetryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(RetryMode::Standard),
            "legacy" => Ok(RetryMode::Legacy),
            "adaptive" => Ok(RetryMode::Adaptive),
            v => Err(Error::config_invalid(format!("unknown retry mode: {v}"))),
        }
    }
}

impl Display for RetryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decides, attempt after attempt, whether an operation may be retried and
/// how long to wait first.
///
/// The strategy never sleeps and never runs the operation. A caller drives
/// it through these transitions:
///
/// 1. [`acquire_initial_token`](Self::acquire_initial_token) before the
///    first attempt.
/// 2. [`refresh_retry_token`](Self::refresh_retry_token) after a failed
///    attempt; this returns the delay to wait.
/// 3. [`begin_attempt`](Self::begin_attempt) once the delay elapsed, right
///    before sending again. Retry capacity is only taken here, so an
///    operation cancelled during its backoff costs nothing.
/// 4. [`record_success`](Self::record_success) after a successful attempt.
///
/// [`retry`](crate::retry) runs this loop over an async operation.
pub struct RetryStrategy {
    mode: RetryMode,
    max_attempts: u32,
    condition: OrRetryCondition,
    backoff: BackoffStrategy,
    throttling_backoff: BackoffStrategy,
    retry_cost: u32,
    throttling_retry_cost: u32,
    circuit_breaker_enabled: bool,
    treat_as_throttling: Arc<ThrottlingFn>,
    buckets: TokenBucketStore,
    rate_limiters: Option<LruCache<String, Arc<ClientRateLimiter>>>,
}

impl Debug for RetryStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryStrategy")
            .field("mode", &self.mode)
            .field("max_attempts", &self.max_attempts)
            .field("condition", &self.condition)
            .field("backoff", &self.backoff)
            .field("throttling_backoff", &self.throttling_backoff)
            .field("retry_cost", &self.retry_cost)
            .field("throttling_retry_cost", &self.throttling_retry_cost)
            .field("circuit_breaker_enabled", &self.circuit_breaker_enabled)
            .field("buckets", &self.buckets)
            .finish_non_exhaustive()
    }
}

impl RetryStrategy {
    /// Standard mode with the default retry conditions.
    pub fn standard() -> Self {
        Self::with_defaults(RetryMode::Standard)
    }

    /// Legacy mode with the default retry conditions.
    pub fn legacy() -> Self {
        Self::with_defaults(RetryMode::Legacy)
    }

    /// Adaptive mode with the default retry conditions.
    pub fn adaptive() -> Self {
        Self::with_defaults(RetryMode::Adaptive)
    }

    fn with_defaults(mode: RetryMode) -> Self {
        RetryStrategyBuilder::new(mode)
            .retry_on_defaults()
            .build_unchecked()
    }

    /// Start from the presets of `mode`, without any retry condition.
    pub fn builder(mode: RetryMode) -> RetryStrategyBuilder {
        RetryStrategyBuilder::new(mode)
    }

    /// The preset this strategy was built from.
    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// Attempts allowed per operation, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The retry token bucket of `scope`.
    pub fn token_bucket(&self, scope: &str) -> Arc<TokenBucket> {
        self.buckets.token_bucket_for_scope(scope)
    }

    fn rate_limiter(&self, scope: &str) -> Option<Arc<ClientRateLimiter>> {
        let limiters = self.rate_limiters.as_ref()?;
        Some(limiters.get_or_insert_with(scope.to_string(), |_| {
            Arc::new(ClientRateLimiter::new(epoch_seconds()))
        }))
    }

    /// Start the retry session of an operation.
    ///
    /// The first attempt is always allowed and costs nothing. In adaptive
    /// mode the returned delay paces the send rate; otherwise it is zero.
    pub fn acquire_initial_token(&self, scope: &str) -> (RetryToken, Duration) {
        let bucket = self.token_bucket(scope);
        let delay = self
            .rate_limiter(scope)
            .map(|limiter| limiter.acquire(epoch_seconds(), INITIAL_REQUEST_COST))
            .unwrap_or_default();

        debug!(
            "Request attempt 1 token acquired (backoff: {}ms, cost: 0, capacity: {}/{})",
            delay.as_millis(),
            bucket.current_capacity(),
            bucket.max_capacity()
        );
        (RetryToken::new(scope, bucket.current_capacity()), delay)
    }

    /// Decide whether the failed attempt of `token` is retried.
    ///
    /// The checks run in order: the failure must be retryable, the attempt
    /// limit must not be reached, and the bucket must hold enough capacity
    /// for the retry cost. The cost is only reserved on the returned token;
    /// [`begin_attempt`](Self::begin_attempt) takes it.
    ///
    /// The returned delay is the larger of the backoff and the delay the
    /// service suggested, plus the rate limiter delay in adaptive mode.
    pub fn refresh_retry_token(
        &self,
        mut token: RetryToken,
        failure: &AttemptFailure<'_>,
    ) -> std::result::Result<(RetryToken, Duration), TokenAcquisitionFailed> {
        let bucket = self.token_bucket(&token.scope);

        let retryable = {
            let mut ctx = RetryPolicyContext::new(token.attempt, &mut token.attributes)
                .with_failure(*failure);
            self.condition.should_retry(&mut ctx)
        };
        if !retryable {
            debug!(
                "Request attempt {} encountered non-retryable failure",
                token.attempt
            );
            return Err(self.exhaust(token, &bucket, FailureReason::NonRetryable));
        }

        if token.attempt >= self.max_attempts {
            debug!(
                "Request will not be retried. Retries have been exhausted (cost: 0, capacity: {}/{})",
                bucket.current_capacity(),
                bucket.max_capacity()
            );
            return Err(self.exhaust(token, &bucket, FailureReason::MaxAttemptsExceeded));
        }

        let throttling = (self.treat_as_throttling)(failure);
        let cost = self.retry_cost_for(throttling);
        let available = bucket.current_capacity();
        if available < cost {
            debug!(
                "Request will not be retried to protect the caller and downstream service. \
                 The cost of retrying ({cost}) exceeds the available retry capacity ({available}/{}).",
                bucket.max_capacity()
            );
            return Err(self.exhaust(token, &bucket, FailureReason::RetryCapacityExceeded));
        }

        let limiter = self.rate_limiter(&token.scope);
        if throttling {
            if let Some(limiter) = &limiter {
                limiter.update(epoch_seconds(), true);
            }
        }

        let backoff = if throttling {
            self.throttling_backoff.compute_delay(token.attempt)
        } else {
            self.backoff.compute_delay(token.attempt)
        };
        let mut delay = failure.retry_after().unwrap_or_default().max(backoff);
        if let Some(limiter) = &limiter {
            delay += limiter.acquire(epoch_seconds(), RETRY_COST);
        }

        token.attempt += 1;
        token.reserved_cost = cost;
        token.capacity_remaining = available;
        token.state = RetryState::Retrying;

        debug!(
            "Request attempt {} token acquired (backoff: {}ms, cost: {cost}, capacity: {}/{})",
            token.attempt,
            delay.as_millis(),
            available - cost,
            bucket.max_capacity()
        );
        Ok((token, delay))
    }

    /// Begin the attempt a retrying token was refreshed for.
    ///
    /// Takes the reserved cost from the bucket; fails with
    /// [`FailureReason::RetryCapacityExceeded`] when concurrent operations
    /// drained the bucket during the backoff. Tokens that are not retrying
    /// are returned unchanged.
    pub fn begin_attempt(
        &self,
        mut token: RetryToken,
    ) -> std::result::Result<RetryToken, TokenAcquisitionFailed> {
        if token.state != RetryState::Retrying {
            return Ok(token);
        }

        let bucket = self.token_bucket(&token.scope);
        let resp = bucket.try_acquire(token.reserved_cost);
        if resp.failed {
            debug!(
                "Request will not be retried to protect the caller and downstream service. \
                 The cost of retrying ({}) exceeds the available retry capacity ({}/{}).",
                resp.requested, resp.remaining, resp.max
            );
            return Err(self.exhaust(token, &bucket, FailureReason::RetryCapacityExceeded));
        }

        token.acquired_cost = resp.acquired;
        token.reserved_cost = 0;
        token.capacity_remaining = resp.remaining;
        token.state = RetryState::Attempting;
        Ok(token)
    }

    /// Close the retry session after a successful attempt.
    ///
    /// Gives back the cost of the last retry, or one token when the
    /// operation needed none, never filling the bucket past its capacity.
    pub fn record_success(&self, mut token: RetryToken) -> RetryToken {
        {
            let mut ctx = RetryPolicyContext::new(token.attempt, &mut token.attributes);
            self.condition.request_succeeded(&mut ctx);
        }
        if let Some(limiter) = self.rate_limiter(&token.scope) {
            limiter.update(epoch_seconds(), false);
        }

        let bucket = self.token_bucket(&token.scope);
        let release = bucket.release(token.acquired_cost.max(1));
        debug!(
            "Request attempt {} succeeded (cost: -{}, capacity: {}/{})",
            token.attempt, release.released, release.current, release.max
        );

        token.acquired_cost = 0;
        token.reserved_cost = 0;
        token.capacity_remaining = release.current;
        token.state = RetryState::Succeeded;
        token
    }

    fn retry_cost_for(&self, throttling: bool) -> u32 {
        match (self.circuit_breaker_enabled, throttling) {
            (false, _) => 0,
            (true, true) => self.throttling_retry_cost,
            (true, false) => self.retry_cost,
        }
    }

    fn exhaust(
        &self,
        mut token: RetryToken,
        bucket: &TokenBucket,
        reason: FailureReason,
    ) -> TokenAcquisitionFailed {
        {
            let mut ctx = RetryPolicyContext::new(token.attempt, &mut token.attributes);
            self.condition.request_will_not_be_retried(&mut ctx);
        }
        token.reserved_cost = 0;
        token.capacity_remaining = bucket.current_capacity();
        token.state = RetryState::Exhausted;
        TokenAcquisitionFailed::new(reason, token)
    }
}

fn epoch_seconds() -> f64 {
    as_epoch_seconds(now())
}

fn is_throttling(failure: &AttemptFailure<'_>) -> bool {
    failure.is_throttling()
}

/// Builder for [`RetryStrategy`].
pub struct RetryStrategyBuilder {
    mode: RetryMode,
    max_attempts: u32,
    conditions: Vec<Box<dyn RetryCondition>>,
    backoff: BackoffStrategy,
    throttling_backoff: BackoffStrategy,
    retry_cost: u32,
    throttling_retry_cost: u32,
    circuit_breaker_enabled: bool,
    treat_as_throttling: Arc<ThrottlingFn>,
    token_bucket_capacity: u32,
    token_bucket_scopes: usize,
}

impl Debug for RetryStrategyBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryStrategyBuilder")
            .field("mode", &self.mode)
            .field("max_attempts", &self.max_attempts)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

impl RetryStrategyBuilder {
    /// Presets of `mode`.
    pub fn new(mode: RetryMode) -> Self {
        let (backoff, throttling_backoff, throttling_retry_cost) = match mode {
            RetryMode::Standard | RetryMode::Adaptive => (
                BackoffStrategy::FullJitter {
                    base: Duration::from_millis(100),
                    max: Duration::from_secs(20),
                },
                BackoffStrategy::FullJitter {
                    base: Duration::from_secs(1),
                    max: Duration::from_secs(20),
                },
                5,
            ),
            RetryMode::Legacy => (
                BackoffStrategy::EqualJitter {
                    base: Duration::from_millis(100),
                    max: Duration::from_secs(20),
                },
                BackoffStrategy::EqualJitter {
                    base: Duration::from_millis(500),
                    max: Duration::from_secs(20),
                },
                0,
            ),
        };

        Self {
            mode,
            max_attempts: 3,
            conditions: Vec::new(),
            backoff,
            throttling_backoff,
            retry_cost: 5,
            throttling_retry_cost,
            circuit_breaker_enabled: true,
            treat_as_throttling: Arc::new(is_throttling),
            token_bucket_capacity: DEFAULT_TOKEN_BUCKET_CAPACITY,
            token_bucket_scopes: DEFAULT_TOKEN_BUCKET_SCOPES,
        }
    }

    /// Attempts allowed per operation, the first one included. Must be at least 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Retry failures accepted by `condition`, in addition to the conditions
    /// already added.
    pub fn retry_on(mut self, condition: impl RetryCondition) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Retry transient, throttling and server failures, and responses with
    /// status 429, 500, 502, 503 or 504.
    pub fn retry_on_defaults(self) -> Self {
        self.retry_on(RetryOnErrorKindCondition::new([
            ErrorKind::TransientError,
            ErrorKind::ThrottlingError,
            ErrorKind::ServerError,
        ]))
        .retry_on(RetryOnStatusCodeCondition::new([
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ]))
    }

    /// Backoff after non throttling failures.
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Backoff after throttling failures.
    pub fn throttling_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.throttling_backoff = backoff;
        self
    }

    /// Tokens a retry after a non throttling failure costs.
    pub fn retry_cost(mut self, cost: u32) -> Self {
        self.retry_cost = cost;
        self
    }

    /// Tokens a retry after a throttling failure costs.
    pub fn throttling_retry_cost(mut self, cost: u32) -> Self {
        self.throttling_retry_cost = cost;
        self
    }

    /// When disabled, retries are free and only the attempt limit applies.
    pub fn circuit_breaker_enabled(mut self, enabled: bool) -> Self {
        self.circuit_breaker_enabled = enabled;
        self
    }

    /// Decide which failures count as throttling.
    pub fn treat_as_throttling(
        mut self,
        predicate: impl Fn(&AttemptFailure<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.treat_as_throttling = Arc::new(predicate);
        self
    }

    /// Capacity of the token bucket of every scope.
    pub fn token_bucket_capacity(mut self, capacity: u32) -> Self {
        self.token_bucket_capacity = capacity;
        self
    }

    /// Number of scopes whose buckets are kept.
    pub fn token_bucket_scopes(mut self, scopes: usize) -> Self {
        self.token_bucket_scopes = scopes;
        self
    }

    /// Build the strategy.
    pub fn build(self) -> Result<RetryStrategy> {
        if self.max_attempts == 0 {
            return Err(Error::config_invalid("max attempts must be at least 1"));
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> RetryStrategy {
        let rate_limiters = match self.mode {
            RetryMode::Adaptive => Some(LruCache::new(self.token_bucket_scopes)),
            RetryMode::Standard | RetryMode::Legacy => None,
        };

        RetryStrategy {
            mode: self.mode,
            max_attempts: self.max_attempts,
            condition: OrRetryCondition::new(self.conditions),
            backoff: self.backoff,
            throttling_backoff: self.throttling_backoff,
            retry_cost: self.retry_cost,
            throttling_retry_cost: self.throttling_retry_cost,
            circuit_breaker_enabled: self.circuit_breaker_enabled,
            treat_as_throttling: self.treat_as_throttling,
            buckets: TokenBucketStore::with_max_scopes(
                self.token_bucket_capacity,
                self.token_bucket_scopes,
            ),
            rate_limiters,
        }
    }
}
