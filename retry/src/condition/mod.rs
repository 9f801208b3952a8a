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

//! Conditions deciding whether a failed attempt is retried.

use crate::failure::AttemptFailure;
use http::Extensions;
use std::fmt::Debug;

mod combinator;
pub use combinator::{AndRetryCondition, MaxNumberOfRetriesCondition, OrRetryCondition};

mod error;
pub use error::{
    ErrorMatcher, RetryOnErrorCondition, RetryOnErrorKindCondition, RetryOnStatusCodeCondition,
};

mod token_bucket;
pub use token_bucket::{AcquiredCapacity, TokenBucketRetryCondition};

/// State handed to a [`RetryCondition`] for one decision.
///
/// `attributes` belongs to the logical operation and survives across its
/// attempts, so a condition can record something in `should_retry` and find
/// it again in `request_succeeded`.
#[derive(Debug)]
pub struct RetryPolicyContext<'a> {
    failure: Option<AttemptFailure<'a>>,
    attempt: u32,
    attributes: &'a mut Extensions,
}

impl<'a> RetryPolicyContext<'a> {
    /// Context for `attempt` (1-based) of an operation.
    pub fn new(attempt: u32, attributes: &'a mut Extensions) -> Self {
        Self {
            failure: None,
            attempt,
            attributes,
        }
    }

    /// Attach the failure of the attempt.
    pub fn with_failure(mut self, failure: AttemptFailure<'a>) -> Self {
        self.failure = Some(failure);
        self
    }

    /// The failure being judged. `None` when reporting a success.
    pub fn failure(&self) -> Option<&AttemptFailure<'a>> {
        self.failure.as_ref()
    }

    /// 1-based number of the attempt this context is about.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Per operation attributes.
    pub fn attributes(&self) -> &Extensions {
        self.attributes
    }

    /// Mutable per operation attributes.
    pub fn attributes_mut(&mut self) -> &mut Extensions {
        self.attributes
    }
}

/// Decide whether a failed attempt should be retried.
///
/// Implementations are built once and shared by every operation, so all
/// per operation state goes into the context attributes.
pub trait RetryCondition: Debug + Send + Sync + 'static {
    /// Whether the failure in `ctx` is worth another attempt.
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool;

    /// Called once the operation is given up.
    fn request_will_not_be_retried(&self, _ctx: &mut RetryPolicyContext<'_>) {}

    /// Called once the operation succeeded.
    fn request_succeeded(&self, _ctx: &mut RetryPolicyContext<'_>) {}
}

impl<T: RetryCondition + ?Sized> RetryCondition for Box<T> {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        (**self).should_retry(ctx)
    }

    fn request_will_not_be_retried(&self, ctx: &mut RetryPolicyContext<'_>) {
        (**self).request_will_not_be_retried(ctx)
    }

    fn request_succeeded(&self, ctx: &mut RetryPolicyContext<'_>) {
        (**self).request_succeeded(ctx)
    }
}
