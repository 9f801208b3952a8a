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

/// Retry when any of the conditions says so.
///
/// Conditions are asked in order and the first `true` wins, so a token
/// consuming condition placed last is only consulted when nothing before it
/// matched. Lifecycle callbacks reach every condition.
#[derive(Debug, Default)]
pub struct OrRetryCondition {
    conditions: Vec<Box<dyn RetryCondition>>,
}

impl OrRetryCondition {
    /// Combine `conditions`.
    pub fn new(conditions: Vec<Box<dyn RetryCondition>>) -> Self {
        Self { conditions }
    }

    /// Add another condition.
    pub fn or(mut self, condition: impl RetryCondition) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }
}

impl RetryCondition for OrRetryCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        self.conditions.iter().any(|c| c.should_retry(ctx))
    }

    fn request_will_not_be_retried(&self, ctx: &mut RetryPolicyContext<'_>) {
        for c in &self.conditions {
            c.request_will_not_be_retried(ctx);
        }
    }

    fn request_succeeded(&self, ctx: &mut RetryPolicyContext<'_>) {
        for c in &self.conditions {
            c.request_succeeded(ctx);
        }
    }
}

/// Retry only when all of the conditions agree.
///
/// An empty `AndRetryCondition` retries everything.
#[derive(Debug, Default)]
pub struct AndRetryCondition {
    conditions: Vec<Box<dyn RetryCondition>>,
}

impl AndRetryCondition {
    /// Combine `conditions`.
    pub fn new(conditions: Vec<Box<dyn RetryCondition>>) -> Self {
        Self { conditions }
    }

    /// Add another condition.
    pub fn and(mut self, condition: impl RetryCondition) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }
}

impl RetryCondition for AndRetryCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        self.conditions.iter().all(|c| c.should_retry(ctx))
    }

    fn request_will_not_be_retried(&self, ctx: &mut RetryPolicyContext<'_>) {
        for c in &self.conditions {
            c.request_will_not_be_retried(ctx);
        }
    }

    fn request_succeeded(&self, ctx: &mut RetryPolicyContext<'_>) {
        for c in &self.conditions {
            c.request_succeeded(ctx);
        }
    }
}

/// Allow at most `max_retries` retries of an operation.
#[derive(Debug, Clone, Copy)]
pub struct MaxNumberOfRetriesCondition {
    max_retries: u32,
}

impl MaxNumberOfRetriesCondition {
    /// Allow `max_retries` retries, that is `max_retries + 1` attempts.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

impl RetryCondition for MaxNumberOfRetriesCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        // Attempt N failing means N - 1 retries happened already.
        ctx.attempt() <= self.max_retries
    }
}
