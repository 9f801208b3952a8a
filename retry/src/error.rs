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

use crate::token::RetryToken;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why the strategy refused another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// No retry condition accepted the failure.
    NonRetryable,
    /// The operation used all its attempts.
    MaxAttemptsExceeded,
    /// The token bucket of the scope cannot pay for a retry.
    RetryCapacityExceeded,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::NonRetryable => "failure is not retryable",
            FailureReason::MaxAttemptsExceeded => "max attempts exceeded",
            FailureReason::RetryCapacityExceeded => "retry capacity exceeded",
        };
        f.write_str(s)
    }
}

/// The strategy refused another attempt.
///
/// This only reports the decision. The caller still owns the error of the
/// last attempt and is expected to return that one.
#[derive(Error, Debug)]
#[error("request attempt {} will not be retried: {reason}", .token.attempt())]
pub struct TokenAcquisitionFailed {
    reason: FailureReason,
    token: Box<RetryToken>,
}

impl TokenAcquisitionFailed {
    pub(crate) fn new(reason: FailureReason, token: RetryToken) -> Self {
        Self {
            reason,
            token: Box::new(token),
        }
    }

    /// Why the attempt was refused.
    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    /// The exhausted token.
    pub fn token(&self) -> &RetryToken {
        &self.token
    }

    /// Take the exhausted token.
    pub fn into_token(self) -> RetryToken {
        *self.token
    }
}
