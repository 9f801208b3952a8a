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

use http::StatusCode;
use std::error::Error as StdError;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Coarse classification of a failed attempt, supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection resets, timeouts and other network level failures.
    TransientError,
    /// The service asked the client to slow down.
    ThrottlingError,
    /// The service failed to handle a well formed request.
    ServerError,
    /// The request itself was wrong. Retrying will not help.
    ClientError,
}

/// What went wrong in one attempt.
///
/// The failure borrows the caller's error: the retry engine inspects it but
/// never takes ownership, so the caller can still return it after the
/// strategy gives up.
#[derive(Clone, Copy)]
pub struct AttemptFailure<'a> {
    error: &'a (dyn StdError + 'static),
    kind: Option<ErrorKind>,
    retry_after: Option<Duration>,
    status: Option<StatusCode>,
}

impl<'a> AttemptFailure<'a> {
    /// Wrap an error without any classification.
    pub fn new(error: &'a (dyn StdError + 'static)) -> Self {
        Self {
            error,
            kind: None,
            retry_after: None,
            status: None,
        }
    }

    /// Classify the failure.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Delay suggested by the service, usually from `Retry-After`.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// HTTP status of the response that failed, if any.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// The error of this attempt.
    pub fn error(&self) -> &'a (dyn StdError + 'static) {
        self.error
    }

    /// The classification, if the caller supplied one.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// The delay suggested by the service.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The HTTP status of the failed response.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether the failure signals throttling: classified as such or a `429`.
    pub fn is_throttling(&self) -> bool {
        self.kind == Some(ErrorKind::ThrottlingError)
            || self.status == Some(StatusCode::TOO_MANY_REQUESTS)
    }
}

impl Debug for AttemptFailure<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptFailure")
            .field("error", &self.error.to_string())
            .field("kind", &self.kind)
            .field("retry_after", &self.retry_after)
            .field("status", &self.status)
            .finish()
    }
}
