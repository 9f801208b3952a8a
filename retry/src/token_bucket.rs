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

use awsign_core::LruCache;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Default capacity of a retry token bucket.
pub const DEFAULT_TOKEN_BUCKET_CAPACITY: u32 = 500;

/// Default number of scopes a [`TokenBucketStore`] keeps buckets for.
pub const DEFAULT_TOKEN_BUCKET_SCOPES: usize = 128;

/// Result of [`TokenBucket::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireResponse {
    /// Tokens asked for.
    pub requested: u32,
    /// Tokens taken: `requested` on success, zero otherwise.
    pub acquired: u32,
    /// Tokens left after the call.
    pub remaining: u32,
    /// Capacity of the bucket.
    pub max: u32,
    /// Whether the bucket held fewer than `requested` tokens.
    pub failed: bool,
}

/// Result of [`TokenBucket::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseResponse {
    /// Tokens asked to give back.
    pub requested: u32,
    /// Tokens actually added; less than requested when the bucket is full.
    pub released: u32,
    /// Tokens held after the call.
    pub current: u32,
    /// Capacity of the bucket.
    pub max: u32,
}

/// A lock free bucket of retry tokens.
///
/// The available count always stays within `0..=capacity`: acquiring never
/// drives it negative and releasing never overfills it.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    available: AtomicU32,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            available: AtomicU32::new(capacity),
        }
    }

    /// Take `cost` tokens if the bucket holds at least that many.
    ///
    /// Nothing is taken on failure.
    pub fn acquire(&self, cost: u32) -> bool {
        !self.try_acquire(cost).failed
    }

    /// Same as [`TokenBucket::acquire`] but reports the bucket state.
    pub fn try_acquire(&self, cost: u32) -> AcquireResponse {
        let result = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(cost)
            });

        match result {
            Ok(previous) => AcquireResponse {
                requested: cost,
                acquired: cost,
                remaining: previous - cost,
                max: self.capacity,
                failed: false,
            },
            Err(current) => AcquireResponse {
                requested: cost,
                acquired: 0,
                remaining: current,
                max: self.capacity,
                failed: true,
            },
        }
    }

    /// Give back `amount` tokens. The bucket never holds more than its capacity.
    pub fn release(&self, amount: u32) -> ReleaseResponse {
        let capacity = self.capacity;
        let previous = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(amount).min(capacity))
            })
            // The closure always returns `Some`.
            .unwrap_or_else(|current| current);
        let current = previous.saturating_add(amount).min(capacity);

        ReleaseResponse {
            requested: amount,
            released: current - previous,
            current,
            max: capacity,
        }
    }

    /// Tokens available right now.
    pub fn current_capacity(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Capacity of the bucket.
    pub fn max_capacity(&self) -> u32 {
        self.capacity
    }
}

/// Token buckets keyed by retry scope.
///
/// Scopes that have not been used recently are dropped once more than
/// `max_scopes` are alive; a dropped scope starts again with a full bucket.
#[derive(Debug)]
pub struct TokenBucketStore {
    bucket_capacity: u32,
    buckets: LruCache<String, Arc<TokenBucket>>,
}

impl Default for TokenBucketStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BUCKET_CAPACITY)
    }
}

impl TokenBucketStore {
    /// Create a store whose buckets hold `bucket_capacity` tokens each.
    pub fn new(bucket_capacity: u32) -> Self {
        Self::with_max_scopes(bucket_capacity, DEFAULT_TOKEN_BUCKET_SCOPES)
    }

    /// Create a store tracking at most `max_scopes` scopes.
    pub fn with_max_scopes(bucket_capacity: u32, max_scopes: usize) -> Self {
        Self {
            bucket_capacity,
            buckets: LruCache::new(max_scopes),
        }
    }

    /// Capacity of every bucket in this store.
    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity
    }

    /// The bucket for `scope`, created full on first use.
    pub fn token_bucket_for_scope(&self, scope: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(scope) {
            return bucket;
        }
        let capacity = self.bucket_capacity;
        self.buckets
            .get_or_insert_with(scope.to_string(), |_| Arc::new(TokenBucket::new(capacity)))
    }
}
