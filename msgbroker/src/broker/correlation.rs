//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Correlation id generation for outbound requests.
//!
//! The broker itself only requires that a request carries a non-empty id that
//! is unique among the requests currently in flight. Callers that have no id
//! scheme of their own can use [`CorrelationIdGenerator`].
//!
//! Both peers on a stream send requests, and an inbound request whose id
//! matches one of our own pending requests is taken as that request's
//! response. Ids must therefore be unique across both peers, which is why the
//! default generator uses a random per-instance prefix.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Generates unique string correlation ids of the form `{prefix}-{n}`.
///
/// # Thread Safety
///
/// The generator is lock-free and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use msgbroker::broker::CorrelationIdGenerator;
///
/// let generator = CorrelationIdGenerator::new("client");
/// assert_eq!(generator.next_id(), "client-1");
/// assert_eq!(generator.next_id(), "client-2");
/// ```
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    prefix: String,
    next_id: AtomicU64,
}

impl CorrelationIdGenerator {
    /// Creates a generator whose ids start at `{prefix}-1`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a generator with a random prefix, so ids never collide with
    /// those of another generator, including one in the peer process.
    #[must_use]
    pub fn unique() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }

    /// Returns the next id.
    #[must_use]
    pub fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }

    /// Returns the prefix used for every id.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::unique()
    }
}
