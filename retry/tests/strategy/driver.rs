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
use anyhow::Result;
use awsign_retry::{retry, BackoffStrategy, RetryMode, RetryStrategy};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn strategy(max_attempts: u32, backoff: BackoffStrategy) -> Result<RetryStrategy> {
    Ok(RetryStrategy::builder(RetryMode::Standard)
        .retry_on_defaults()
        .max_attempts(max_attempts)
        .backoff(backoff)
        .build()?)
}

#[tokio::test]
async fn test_exhaustion_returns_last_error() -> Result<()> {
    init_logger();

    let strategy = strategy(4, BackoffStrategy::NoBackoff)?;
    let calls = AtomicU32::new(0);

    let res = retry(&strategy, "s3", || async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err::<(), _>(Transient(n))
    })
    .await;

    assert_eq!(res, Err(Transient(4)));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // Three retries paid, nothing given back.
    assert_eq!(strategy.token_bucket("s3").current_capacity(), 500 - 3 * 5);
    Ok(())
}

#[tokio::test]
async fn test_success_after_failures() -> Result<()> {
    init_logger();

    let strategy = strategy(3, BackoffStrategy::NoBackoff)?;
    let calls = AtomicU32::new(0);

    let res = retry(&strategy, "s3", || async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 {
            Err(Transient(n))
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(res, Ok(3));
    assert_eq!(strategy.token_bucket("s3").current_capacity(), 500 - 5);
    Ok(())
}

#[tokio::test]
async fn test_non_retryable_is_returned_at_once() -> Result<()> {
    init_logger();

    let strategy = strategy(3, BackoffStrategy::NoBackoff)?;
    let calls = AtomicU32::new(0);

    let res = retry(&strategy, "s3", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(Fatal)
    })
    .await;

    assert_eq!(res, Err(Fatal));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(strategy.token_bucket("s3").current_capacity(), 500);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_slept() -> Result<()> {
    let strategy = strategy(2, BackoffStrategy::FixedDelay(Duration::from_secs(3)))?;
    let start = tokio::time::Instant::now();

    let res = retry(&strategy, "s3", || async { Err::<(), _>(Transient(1)) }).await;

    assert!(res.is_err());
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_backoff_leaves_bucket_untouched() -> Result<()> {
    init_logger();

    let strategy = strategy(3, BackoffStrategy::FixedDelay(Duration::from_secs(10)))?;
    let calls = AtomicU32::new(0);

    let res = tokio::time::timeout(
        Duration::from_secs(1),
        retry(&strategy, "s3", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(Transient(n))
        }),
    )
    .await;

    assert!(res.is_err(), "retry must still be backing off");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(strategy.token_bucket("s3").current_capacity(), 500);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_share_bucket() -> Result<()> {
    init_logger();

    let strategy = Arc::new(
        RetryStrategy::builder(RetryMode::Standard)
            .retry_on_defaults()
            .backoff(BackoffStrategy::NoBackoff)
            .token_bucket_capacity(50)
            .build()?,
    );
    let calls = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let strategy = strategy.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                retry(&strategy, "shared", || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Err::<(), _>(Transient(n))
                    }
                })
                .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await?.is_err());
    }

    // Capacity pays for exactly ten retries on top of the twenty first attempts.
    assert_eq!(strategy.token_bucket("shared").current_capacity(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 30);
    Ok(())
}
