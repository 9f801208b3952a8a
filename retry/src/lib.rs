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

//! Retry orchestration for AWS style clients.
//!
//! A [`RetryStrategy`] decides whether a failed attempt is retried, gates
//! retries on a per scope [`TokenBucket`] and computes the backoff delay. It
//! never sleeps: callers, or the [`retry`] driver, wait between attempts.
//!
//! ## Example
//!
//! ```no_run
//! use awsign_retry::{retry, AttemptFailure, ErrorKind, RetryStrategy, RetryableError};
//! use std::fmt;
//!
//! #[derive(Debug)]
//! struct Unavailable;
//!
//! impl fmt::Display for Unavailable {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str("service unavailable")
//!     }
//! }
//!
//! impl std::error::Error for Unavailable {}
//!
//! impl RetryableError for Unavailable {
//!     fn attempt_failure(&self) -> AttemptFailure<'_> {
//!         AttemptFailure::new(self).with_kind(ErrorKind::ServerError)
//!     }
//! }
//!
//! # async fn example() -> Result<(), Unavailable> {
//! let strategy = RetryStrategy::standard();
//! let body = retry(&strategy, "dynamodb.us-east-1", || async {
//!     Ok::<_, Unavailable>("ok")
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod backoff;
pub use backoff::BackoffStrategy;

pub mod condition;
pub use condition::{RetryCondition, RetryPolicyContext};

mod config;
pub use config::{RetryConfig, AWS_MAX_ATTEMPTS, AWS_RETRY_MODE};

mod error;
pub use error::{FailureReason, TokenAcquisitionFailed};

mod executor;
pub use executor::{retry, RetryableError};

mod failure;
pub use failure::{AttemptFailure, ErrorKind};

pub mod rate_limiter;
pub use rate_limiter::ClientRateLimiter;

mod strategy;
pub use strategy::{RetryMode, RetryStrategy, RetryStrategyBuilder};

mod token;
pub use token::{RetryState, RetryToken};

mod token_bucket;
pub use token_bucket::{
    AcquireResponse, ReleaseResponse, TokenBucket, TokenBucketStore,
    DEFAULT_TOKEN_BUCKET_CAPACITY, DEFAULT_TOKEN_BUCKET_SCOPES,
};
