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

use crate::failure::AttemptFailure;
use crate::strategy::RetryStrategy;
use log::{debug, warn};
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

/// Errors that can describe themselves to a [`RetryStrategy`].
///
/// The default implementation classifies nothing, so only error matching
/// conditions can accept it. Override it to report an [`ErrorKind`](crate::ErrorKind),
/// a status code or a suggested delay.
pub trait RetryableError: StdError + Sized + 'static {
    /// Describe this error as a failed attempt.
    fn attempt_failure(&self) -> AttemptFailure<'_> {
        AttemptFailure::new(self)
    }
}

/// Run `op` until it succeeds or `strategy` refuses another attempt.
///
/// Backoff delays are slept with tokio, outside any lock. On exhaustion the
/// error of the last attempt is returned as is. Dropping the returned
/// future during a backoff leaves the token bucket of `scope` untouched.
pub async fn retry<T, E, F, Fut>(strategy: &RetryStrategy, scope: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let (mut token, delay) = strategy.acquire_initial_token(scope);
    sleep(delay).await;

    loop {
        let err = match op().await {
            Ok(v) => {
                strategy.record_success(token);
                return Ok(v);
            }
            Err(err) => err,
        };

        let attempt = token.attempt();
        // The failure borrows `err` and must not live across an await.
        let refreshed = {
            let failure = err.attempt_failure();
            strategy.refresh_retry_token(token, &failure)
        };
        let (next, delay) = match refreshed {
            Ok(v) => v,
            Err(failed) => {
                debug!("{failed}");
                return Err(err);
            }
        };
        warn!(
            "request attempt {attempt} failed, retrying in {}ms: {err}",
            delay.as_millis()
        );

        sleep(delay).await;
        token = match strategy.begin_attempt(next) {
            Ok(token) => token,
            Err(failed) => {
                debug!("{failed}");
                return Err(err);
            }
        };
    }
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
