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

use crate::strategy::{RetryMode, RetryStrategy};
use awsign_core::{Context, Error, Result};

/// Env name of the attempt limit.
pub const AWS_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";
/// Env name of the retry mode.
pub const AWS_RETRY_MODE: &str = "AWS_RETRY_MODE";

/// Config for retry strategies.
#[derive(Debug, Clone, Default)]
pub struct RetryConfig {
    /// Attempts per operation, from `AWS_MAX_ATTEMPTS`.
    pub max_attempts: Option<u32>,
    /// Preset, from `AWS_RETRY_MODE`.
    pub mode: Option<RetryMode>,
}

impl RetryConfig {
    /// Load config from environment variables.
    ///
    /// Unset or blank variables are left out; values that do not parse are
    /// rejected.
    pub fn from_env(ctx: &Context) -> Result<Self> {
        let max_attempts = match ctx.env_var(AWS_MAX_ATTEMPTS) {
            Some(v) if !v.trim().is_empty() => Some(parse_max_attempts(&v)?),
            _ => None,
        };
        let mode = match ctx.env_var(AWS_RETRY_MODE) {
            Some(v) if !v.trim().is_empty() => Some(v.parse()?),
            _ => None,
        };
        Ok(Self { max_attempts, mode })
    }

    /// Build a strategy with the default retry conditions.
    pub fn strategy(&self) -> Result<RetryStrategy> {
        let mut builder = RetryStrategy::builder(self.mode.unwrap_or_default()).retry_on_defaults();
        if let Some(max_attempts) = self.max_attempts {
            builder = builder.max_attempts(max_attempts);
        }
        builder.build()
    }
}

fn parse_max_attempts(v: &str) -> Result<u32> {
    let n: u32 = v.trim().parse().map_err(|e| {
        Error::config_invalid(format!("{AWS_MAX_ATTEMPTS} must be a positive integer: {v}"))
            .with_source(e)
    })?;
    if n == 0 {
        return Err(Error::config_invalid(format!(
            "{AWS_MAX_ATTEMPTS} must be at least 1"
        )));
    }
    Ok(n)
}
