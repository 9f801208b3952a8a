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

use http::Extensions;
use std::fmt::{Display, Formatter};

/// Where an operation is in its retry lifecycle.
///
/// An operation without a token is in its initial state;
/// [`RetryStrategy::acquire_initial_token`](crate::RetryStrategy::acquire_initial_token)
/// moves it straight to `Attempting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryState {
    /// An attempt is in flight.
    Attempting,
    /// The last attempt failed and another one is allowed after the backoff.
    Retrying,
    /// An attempt succeeded. Terminal.
    Succeeded,
    /// No further attempt is allowed. Terminal.
    Exhausted,
}

impl RetryState {
    /// Whether no transition leaves this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Exhausted)
    }
}

impl Display for RetryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RetryState::Attempting => "attempting",
            RetryState::Retrying => "retrying",
            RetryState::Succeeded => "succeeded",
            RetryState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// The retry session of one logical operation.
///
/// Tokens are moved through the strategy by value: every transition
/// consumes the old token and hands back the next one.
#[derive(Debug, Clone)]
pub struct RetryToken {
    pub(crate) scope: String,
    pub(crate) attempt: u32,
    pub(crate) state: RetryState,
    /// Cost the next attempt will take from the bucket when it begins.
    pub(crate) reserved_cost: u32,
    /// Cost taken from the bucket for the current attempt.
    pub(crate) acquired_cost: u32,
    pub(crate) capacity_remaining: u32,
    pub(crate) attributes: Extensions,
}

impl RetryToken {
    pub(crate) fn new(scope: &str, capacity_remaining: u32) -> Self {
        Self {
            scope: scope.to_string(),
            attempt: 1,
            state: RetryState::Attempting,
            reserved_cost: 0,
            acquired_cost: 0,
            capacity_remaining,
            attributes: Extensions::new(),
        }
    }

    /// Scope whose token bucket pays for retries.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 1-based number of the current or next attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Lifecycle state.
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Cost waiting to be taken when the next attempt begins.
    pub fn capacity_reserved(&self) -> u32 {
        self.reserved_cost
    }

    /// Cost taken for the current attempt.
    pub fn capacity_acquired(&self) -> u32 {
        self.acquired_cost
    }

    /// Bucket capacity seen at the last transition.
    pub fn capacity_remaining(&self) -> u32 {
        self.capacity_remaining
    }

    /// Attributes shared by the retry conditions of this operation.
    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    /// Mutable attributes shared by the retry conditions of this operation.
    pub fn attributes_mut(&mut self) -> &mut Extensions {
        &mut self.attributes
    }
}
