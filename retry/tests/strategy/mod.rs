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

mod driver;
mod lifecycle;

use awsign_retry::{AttemptFailure, ErrorKind, RetryableError};
use std::fmt::{Display, Formatter};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Retryable in every test strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transient(pub u32);

impl Display for Transient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "transient failure #{}", self.0)
    }
}

impl std::error::Error for Transient {}

impl RetryableError for Transient {
    fn attempt_failure(&self) -> AttemptFailure<'_> {
        AttemptFailure::new(self).with_kind(ErrorKind::TransientError)
    }
}

/// Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal;

impl Display for Fatal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("fatal failure")
    }
}

impl std::error::Error for Fatal {}

impl RetryableError for Fatal {}
