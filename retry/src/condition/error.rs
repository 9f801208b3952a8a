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

use super::{RetryCondition, RetryPolicyContext};
use crate::failure::ErrorKind;
use http::StatusCode;
use std::any::type_name;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Longest cause chain inspected before giving up.
const MAX_CAUSE_DEPTH: usize = 32;

type MatchFn = dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync;

/// Matches a single error value, without looking at its causes.
#[derive(Clone)]
pub struct ErrorMatcher {
    name: Cow<'static, str>,
    matches: Arc<MatchFn>,
}

impl ErrorMatcher {
    /// Match errors of exactly the type `E`.
    pub fn is<E: StdError + 'static>() -> Self {
        Self {
            name: Cow::Borrowed(type_name::<E>()),
            matches: Arc::new(|err: &(dyn StdError + 'static)| err.is::<E>()),
        }
    }

    /// Match a family of errors with a predicate.
    ///
    /// Use this to match several concrete types at once, or to match by an
    /// inner detail such as `io::ErrorKind`.
    pub fn family(
        name: impl Into<Cow<'static, str>>,
        predicate: impl Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            matches: Arc::new(predicate),
        }
    }

    /// Whether `err` matches.
    pub fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        (self.matches)(err)
    }
}

impl Debug for ErrorMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorMatcher").field(&self.name).finish()
    }
}

/// Walk `err` and its sources.
///
/// Stops after [`MAX_CAUSE_DEPTH`] links, or when an error already visited
/// shows up again, so a cyclic `source()` cannot loop forever.
///
/// Visited errors are compared by address and vtable: a wrapper holding its
/// source as the first field shares the source's address.
fn cause_chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> + 'a {
    let mut seen: Vec<*const (dyn StdError + 'static)> = Vec::new();
    let mut next = Some(err);
    std::iter::from_fn(move || {
        let current = next.take()?;
        let ptr: *const (dyn StdError + 'static) = current;
        if seen.iter().any(|visited| std::ptr::eq(*visited, ptr)) {
            return None;
        }
        seen.push(ptr);
        next = current.source();
        Some(current)
    })
    .take(MAX_CAUSE_DEPTH)
}

/// Retry when the failure matches one of the matchers.
///
/// [`RetryOnErrorCondition::direct`] looks at the error itself only;
/// [`RetryOnErrorCondition::with_causes`] also looks at every source in its
/// chain.
#[derive(Debug, Clone)]
pub struct RetryOnErrorCondition {
    matchers: Vec<ErrorMatcher>,
    walk_causes: bool,
}

impl RetryOnErrorCondition {
    /// Match the error itself.
    pub fn direct(matchers: impl IntoIterator<Item = ErrorMatcher>) -> Self {
        Self {
            matchers: matchers.into_iter().collect(),
            walk_causes: false,
        }
    }

    /// Match the error or any of its causes.
    pub fn with_causes(matchers: impl IntoIterator<Item = ErrorMatcher>) -> Self {
        Self {
            matchers: matchers.into_iter().collect(),
            walk_causes: true,
        }
    }

    fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        self.matchers.iter().any(|m| m.matches(err))
    }
}

impl RetryCondition for RetryOnErrorCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        let Some(failure) = ctx.failure() else {
            return false;
        };
        if self.walk_causes {
            cause_chain(failure.error()).any(|err| self.matches(err))
        } else {
            self.matches(failure.error())
        }
    }
}

/// Retry failures the caller classified as one of the given kinds.
#[derive(Debug, Clone)]
pub struct RetryOnErrorKindCondition {
    kinds: Vec<ErrorKind>,
}

impl RetryOnErrorKindCondition {
    /// Retry on any of `kinds`.
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl RetryCondition for RetryOnErrorKindCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        ctx.failure()
            .and_then(|f| f.kind())
            .is_some_and(|kind| self.kinds.contains(&kind))
    }
}

/// Retry failures whose response carried one of the given status codes.
#[derive(Debug, Clone)]
pub struct RetryOnStatusCodeCondition {
    codes: Vec<StatusCode>,
}

impl RetryOnStatusCodeCondition {
    /// Retry on any of `codes`.
    pub fn new(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

impl RetryCondition for RetryOnStatusCodeCondition {
    fn should_retry(&self, ctx: &mut RetryPolicyContext<'_>) -> bool {
        ctx.failure()
            .and_then(|f| f.status())
            .is_some_and(|status| self.codes.contains(&status))
    }
}
