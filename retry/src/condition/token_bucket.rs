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

use super::{RetryCondition, RetryPolicyContext};
use crate::failure::AttemptFailure;
use crate::token_bucket::TokenBucket;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type CostFn = dyn Fn(&AttemptFailure<'_>) -> u32 + Send + Sync;

/// Tokens taken from the bucket for the latest retry of an operation.
///
/// Stored in the context attributes by [`TokenBucketRetryCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredCapacity(pub u32);

/// Gate retries on a shared [`TokenBucket`].
///
/// Each retry costs tokens computed from the failure. When the bucket
/// cannot pay the cost the failure is not retried and nothing is taken. A
/// successful operation gives back what its last retry cost, or a single
/// token when it needed no retry, so capacity slowly recovers.
pub struct TokenBucketRetryCondition {
    bucket: Arc<TokenBucket>,
    cost: Arc<CostFn>,
}

impl TokenBucketRetryCondition {
    /// Charge the cost computed by `cost` for every retry.
    pub fn new(
        bucket: Arc<TokenBucket>,
        cost: impl Fn(&AttemptFailure<'_>) -> u32 + Send + Sync + 'static,
    ) -> Self {
        Self {
            bucket,
            cost: Arc::new(cost),
        }
    }

    /// Charge `cost` tokens for every retry.
    pub fn fixed(bucket: Arc<TokenBucket>, cost: u32) -> Self {
        Self::new(bucket, move |_| cost)
    }

    /// The bucket retries are paid from.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }
}

impl Debug for TokenBucketRetryCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketRetryCondition")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl RetryCondition for TokenBucketRetryCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        let Some(failure) = ctx.failure() else {
            return false;
        };
        let cost = (self.cost)(failure);

        let resp = self.bucket.try_acquire(cost);
        if resp.failed {
            debug!(
                "retry capacity exhausted (cost: {}, capacity: {}/{})",
                resp.requested, resp.remaining, resp.max
            );
            return false;
        }

        ctx.attributes_mut()
            .insert(AcquiredCapacity(resp.acquired));
        true
    }

    fn request_succeeded(&self, ctx: &mut RetryPolicyContext<'_>) {
        let acquired = ctx
            .attributes_mut()
            .remove::<AcquiredCapacity>()
            .map(|c| c.0)
            .unwrap_or(0);
        self.bucket.release(acquired.max(1));
    }
}
