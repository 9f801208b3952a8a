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

use super::{init_logger, Fatal, Transient};
use awsign_retry::condition::{ErrorMatcher, RetryOnErrorCondition};
use awsign_retry::{
    AttemptFailure, BackoffStrategy, FailureReason, RetryMode, RetryState, RetryStrategy,
    RetryToken,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

const CAPACITY: u32 = 100;
const COST: u32 = 5;

struct Case {
    name: &'static str,
    max_attempts: u32,
    capacity: u32,
    cost: u32,
    circuit_breaker: bool,
    /// `true` fails with a retryable error, `false` with a fatal one.
    failures: &'static [bool],
    expect_success: bool,
    expect_capacity: u32,
    expect_state: RetryState,
    expect_reason: Option<FailureReason>,
}

fn case(name: &'static str, failures: &'static [bool]) -> Case {
    Case {
        name,
        max_attempts: 3,
        capacity: CAPACITY,
        cost: COST,
        circuit_breaker: true,
        failures,
        expect_success: true,
        expect_capacity: CAPACITY,
        expect_state: RetryState::Succeeded,
        expect_reason: None,
    }
}

fn fails(mut c: Case, capacity: u32, reason: FailureReason) -> Case {
    c.expect_success = false;
    c.expect_capacity = capacity;
    c.expect_state = RetryState::Exhausted;
    c.expect_reason = Some(reason);
    c
}

fn cases() -> Vec<Case> {
    vec![
        case("succeeds without failures", &[]),
        // The cost of the retry is taken, then given back.
        case("succeeds after one failure", &[true]),
        // Two costs taken, the last one given back.
        Case {
            expect_capacity: CAPACITY - COST,
            ..case("succeeds after two failures", &[true, true])
        },
        fails(
            case("fails after three failures", &[true, true, true]),
            CAPACITY - 2 * COST,
            FailureReason::MaxAttemptsExceeded,
        ),
        fails(
            case("stops at the attempt limit", &[true, true, true, true]),
            CAPACITY - 2 * COST,
            FailureReason::MaxAttemptsExceeded,
        ),
        fails(
            case("fatal first failure", &[false]),
            CAPACITY,
            FailureReason::NonRetryable,
        ),
        fails(
            case("fatal second failure", &[true, false]),
            CAPACITY - COST,
            FailureReason::NonRetryable,
        ),
        fails(
            Case {
                max_attempts: 5,
                capacity: 10,
                ..case("exhausts the token bucket", &[true, true, true])
            },
            0,
            FailureReason::RetryCapacityExceeded,
        ),
        Case {
            cost: 0,
            ..case("free retries leave the bucket full", &[true, true])
        },
        Case {
            circuit_breaker: false,
            ..case("disabled circuit breaker", &[true, true])
        },
    ]
}

fn build(mode: RetryMode, c: &Case) -> RetryStrategy {
    RetryStrategy::builder(mode)
        .retry_on(RetryOnErrorCondition::direct([
            ErrorMatcher::is::<Transient>(),
        ]))
        .max_attempts(c.max_attempts)
        .token_bucket_capacity(c.capacity)
        .retry_cost(c.cost)
        .circuit_breaker_enabled(c.circuit_breaker)
        .backoff(BackoffStrategy::NoBackoff)
        .build()
        .expect("strategy must build")
}

/// Drive the strategy through `failures`, then a success if it allows one.
fn run(strategy: &RetryStrategy, failures: &[bool]) -> (bool, RetryToken, Option<FailureReason>) {
    let (mut token, _) = strategy.acquire_initial_token("none");

    for (idx, retryable) in failures.iter().enumerate() {
        let transient = Transient(idx as u32 + 1);
        let failure = if *retryable {
            AttemptFailure::new(&transient)
        } else {
            AttemptFailure::new(&Fatal)
        };

        let next = match strategy.refresh_retry_token(token, &failure) {
            Ok((next, _)) => strategy.begin_attempt(next),
            Err(failed) => Err(failed),
        };
        token = match next {
            Ok(token) => token,
            Err(failed) => {
                let reason = failed.reason();
                return (false, failed.into_token(), Some(reason));
            }
        };
    }

    (true, strategy.record_success(token), None)
}

#[test_case(RetryMode::Standard; "standard")]
#[test_case(RetryMode::Legacy; "legacy")]
#[test_case(RetryMode::Adaptive; "adaptive")]
fn test_lifecycle(mode: RetryMode) {
    init_logger();

    for c in cases() {
        let strategy = build(mode, &c);
        let (succeeded, token, reason) = run(&strategy, c.failures);

        assert_eq!(succeeded, c.expect_success, "{}", c.name);
        assert_eq!(token.capacity_remaining(), c.expect_capacity, "{}", c.name);
        assert_eq!(
            strategy.token_bucket("none").current_capacity(),
            c.expect_capacity,
            "{}",
            c.name
        );
        assert_eq!(token.state(), c.expect_state, "{}", c.name);
        assert_eq!(reason, c.expect_reason, "{}", c.name);
    }
}
