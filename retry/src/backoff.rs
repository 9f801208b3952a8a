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

use rand::Rng;
use std::time::Duration;

/// The exponent stops growing after this many retries.
const MAX_EXPONENT: u32 = 30;

/// How long to wait before the next attempt.
///
/// `attempt` is the 1-based number of the attempt that just failed, so the
/// first retry of an exponential backoff waits `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Retry immediately.
    NoBackoff,
    /// Always wait the same delay.
    FixedDelay(Duration),
    /// `min(max, base * 2^(attempt - 1))`.
    ExponentialDelay {
        /// Delay after the first attempt.
        base: Duration,
        /// Upper bound of any delay.
        max: Duration,
    },
    /// A uniformly random delay in `[0, exponential]`.
    FullJitter {
        /// Delay bound after the first attempt.
        base: Duration,
        /// Upper bound of any delay.
        max: Duration,
    },
    /// Half the exponential delay plus a random share of the other half.
    EqualJitter {
        /// Delay bound after the first attempt.
        base: Duration,
        /// Upper bound of any delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Compute the delay to wait after `attempt` failed.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffStrategy::NoBackoff => Duration::ZERO,
            BackoffStrategy::FixedDelay(delay) => delay,
            BackoffStrategy::ExponentialDelay { base, max } => exponential(base, max, attempt),
            BackoffStrategy::FullJitter { base, max } => {
                random_up_to(exponential(base, max, attempt))
            }
            BackoffStrategy::EqualJitter { base, max } => {
                let half = exponential(base, max, attempt) / 2;
                half + random_up_to(half)
            }
        }
    }
}

fn exponential(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    base.saturating_mul(1 << exponent).min(max)
}

fn random_up_to(bound: Duration) -> Duration {
    let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}
