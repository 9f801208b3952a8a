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

//! Client side send rate limiting for the adaptive retry mode.
//!
//! The limiter stays disabled until the first throttling response. From
//! then on requests pay tokens from a bucket that refills at a fill rate
//! tuned with CUBIC: the rate drops to `BETA` times the measured send rate
//! on throttling, then grows back along a cubic curve while requests keep
//! succeeding.
//!
//! This bucket is independent from the retry admission
//! [`TokenBucket`](crate::TokenBucket): it paces every request, while the
//! other one only bounds retries.

use log::debug;
use parking_lot::Mutex;
use std::time::Duration;

/// Floor of the fill rate, in tokens per second.
const MIN_FILL_RATE: f64 = 0.5;
const MIN_CAPACITY: f64 = 1.0;
/// Weight of the newest sample in the measured send rate.
const SMOOTH: f64 = 0.8;
/// How much to scale back after a throttling response.
const BETA: f64 = 0.7;
/// How aggressively the rate grows back after a throttling response.
const SCALE_CONSTANT: f64 = 0.4;

/// Cost of a first attempt.
pub const INITIAL_REQUEST_COST: f64 = 1.0;
/// Cost of a retry.
pub const RETRY_COST: f64 = 5.0;

/// Adaptive send rate limiter.
#[derive(Debug)]
pub struct ClientRateLimiter {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    fill_rate: f64,
    max_capacity: f64,
    current_capacity: f64,
    last_timestamp: Option<f64>,
    enabled: bool,
    /// Smoothed rate at which requests are sent.
    measured_tx_rate: f64,
    /// Start of the current half second measuring window.
    last_tx_rate_bucket: f64,
    request_count: u64,
    /// Send rate when the client was last throttled.
    last_max_rate: f64,
    time_of_last_throttle: f64,
}

impl ClientRateLimiter {
    /// Create a disabled limiter; `now` is in seconds since the unix epoch.
    pub fn new(now: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fill_rate: MIN_FILL_RATE,
                max_capacity: f64::MAX,
                current_capacity: 0.0,
                last_timestamp: None,
                enabled: false,
                measured_tx_rate: MIN_FILL_RATE,
                last_tx_rate_bucket: now.floor(),
                request_count: 0,
                last_max_rate: 0.0,
                time_of_last_throttle: now,
            }),
        }
    }

    /// Take `cost` tokens, returning how long the request must wait first.
    ///
    /// The tokens are taken even when a delay is returned: the caller is
    /// expected to wait and then send.
    pub fn acquire(&self, now: f64, cost: f64) -> Duration {
        self.inner.lock().acquire(now, cost)
    }

    /// Feed the outcome of a request into the rate estimate.
    pub fn update(&self, now: f64, is_throttling: bool) {
        self.inner.lock().update(now, is_throttling)
    }

    /// Whether a throttling response has been seen yet.
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Current fill rate, in tokens per second.
    pub fn fill_rate(&self) -> f64 {
        self.inner.lock().fill_rate
    }
}

impl Inner {
    fn refill(&mut self, now: f64) {
        if let Some(last) = self.last_timestamp {
            let fill_amount = (now - last) * self.fill_rate;
            self.current_capacity = f64::min(self.max_capacity, self.current_capacity + fill_amount);
        }
        self.last_timestamp = Some(now);
    }

    fn acquire(&mut self, now: f64, cost: f64) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }

        self.refill(now);
        let delay = if cost > self.current_capacity {
            let secs = (cost - self.current_capacity) / self.fill_rate;
            debug!(
                "client rate limiter delays request by {secs:.3}s (capacity: {:.2}, fill rate: {:.2})",
                self.current_capacity, self.fill_rate
            );
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        self.current_capacity -= cost;
        delay
    }

    fn update_measured_rate(&mut self, now: f64) {
        let next_bucket = (now * 2.0).floor() / 2.0;
        self.request_count += 1;

        if next_bucket > self.last_tx_rate_bucket {
            let current_rate = self.request_count as f64 / (next_bucket - self.last_tx_rate_bucket);
            self.measured_tx_rate = current_rate * SMOOTH + self.measured_tx_rate * (1.0 - SMOOTH);
            self.request_count = 0;
            self.last_tx_rate_bucket = next_bucket;
        }
    }

    fn time_window(&self) -> f64 {
        ((self.last_max_rate * (1.0 - BETA)) / SCALE_CONSTANT).cbrt()
    }

    fn cubic_success(&self, now: f64) -> f64 {
        let dt = now - self.time_of_last_throttle - self.time_window();
        SCALE_CONSTANT * dt.powi(3) + self.last_max_rate
    }

    fn update(&mut self, now: f64, is_throttling: bool) {
        self.update_measured_rate(now);

        let calculated_rate = if is_throttling {
            let rate_to_use = if self.enabled {
                f64::min(self.measured_tx_rate, self.fill_rate)
            } else {
                self.measured_tx_rate
            };
            self.last_max_rate = rate_to_use;
            self.time_of_last_throttle = now;
            if !self.enabled {
                debug!("client rate limiting has been enabled");
                self.enabled = true;
            }
            cubic_throttle(rate_to_use)
        } else {
            self.cubic_success(now)
        };

        let new_rate = f64::min(calculated_rate, 2.0 * self.measured_tx_rate);

        // Refill at the old rate before switching.
        self.refill(now);
        self.fill_rate = f64::max(new_rate, MIN_FILL_RATE);
        self.max_capacity = f64::max(new_rate, MIN_CAPACITY);
        self.current_capacity = f64::min(self.current_capacity, self.max_capacity);
    }
}

fn cubic_throttle(rate: f64) -> f64 {
    rate * BETA
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn limiter_after_throttle(last_max_rate: f64, time_of_last_throttle: f64) -> Inner {
        let limiter = ClientRateLimiter::new(0.0);
        let mut inner = limiter.inner.into_inner();
        inner.last_max_rate = last_max_rate;
        inner.time_of_last_throttle = time_of_last_throttle;
        inner
    }

    #[test]
    fn test_beta_decrease() {
        assert_close(cubic_throttle(10.0), 7.0);
        assert_close(limiter_after_throttle(10.0, 1.0).cubic_success(1.0), 7.0);
    }

    #[test]
    fn test_cubic_success_curve() {
        let inner = limiter_after_throttle(10.0, 5.0);
        for (now, expected) in [
            (5.0, 7.0),
            (6.0, 9.64893600966),
            (7.0, 10.000030849917364),
            (8.0, 10.453284520772092),
            (9.0, 13.408697022224185),
            (10.0, 21.26626835427364),
            (11.0, 36.425998516920465),
        ] {
            assert_close(inner.cubic_success(now), expected);
        }
    }

    #[test]
    fn test_enabled_by_first_throttle() {
        let limiter = ClientRateLimiter::new(0.0);
        assert!(!limiter.is_enabled());
        assert_eq!(limiter.acquire(0.1, RETRY_COST), Duration::ZERO);

        limiter.update(0.2, false);
        assert!(!limiter.is_enabled());

        limiter.update(0.3, true);
        assert!(limiter.is_enabled());
        assert!(limiter.fill_rate() >= MIN_FILL_RATE);
    }

    #[test]
    fn test_acquire_delays_when_empty() {
        let mut inner = limiter_after_throttle(0.0, 0.0);
        inner.enabled = true;
        inner.fill_rate = 2.0;
        inner.max_capacity = 10.0;
        inner.last_timestamp = Some(0.0);

        assert_eq!(inner.acquire(0.0, 1.0), Duration::from_millis(500));
        assert_eq!(inner.acquire(1.0, 1.0), Duration::ZERO);
        assert_close(inner.current_capacity, 0.0);
    }

    #[test]
    fn test_throttling_lowers_rate() {
        let mut inner = limiter_after_throttle(0.0, 0.0);
        inner.enabled = true;
        inner.fill_rate = 20.0;
        inner.measured_tx_rate = 10.0;

        inner.update(0.2, true);
        assert_close(inner.last_max_rate, 10.0);
        assert_close(inner.fill_rate, 7.0);
        assert_close(inner.max_capacity, 7.0);
    }
}
