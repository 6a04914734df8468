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

//! Broker metrics.
//!
//! Counters are kept in atomics so they can be read without the
//! `observability` feature. With the feature enabled each update is mirrored
//! to the [`metrics`](https://docs.rs/metrics) facade under `msgbroker.*`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing broker traffic.
///
/// # Example
///
/// ```rust
/// use msgbroker::observability::BrokerMetrics;
///
/// let metrics = BrokerMetrics::new();
/// metrics.record_request_sent();
/// assert_eq!(metrics.total_requests_sent(), 1);
/// ```
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    requests_sent: AtomicU64,
    responses_delivered: AtomicU64,
    progress_forwarded: AtomicU64,
    messages_dropped: AtomicU64,
    handlers_invoked: AtomicU64,
    handler_errors: AtomicU64,
    transmission_errors: AtomicU64,
}

impl BrokerMetrics {
    /// Creates a zeroed metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a client request handed to the stream.
    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.requests.sent").increment(1);
    }

    /// Records a final response delivered to a waiting caller.
    pub fn record_response_delivered(&self) {
        self.responses_delivered.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.responses.delivered").increment(1);
    }

    /// Records a progress notification delivered to a waiting caller.
    pub fn record_progress_forwarded(&self) {
        self.progress_forwarded.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.progress.forwarded").increment(1);
    }

    /// Records an inbound envelope the dispatcher discarded.
    pub fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.messages.dropped").increment(1);
    }

    /// Records a handler invocation.
    pub fn record_handler_invoked(&self) {
        self.handlers_invoked.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.handlers.invoked").increment(1);
    }

    /// Records a handler that returned an error.
    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.handlers.errors").increment(1);
    }

    /// Records a failed stream write.
    pub fn record_transmission_error(&self) {
        self.transmission_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("msgbroker.transmission.errors").increment(1);
    }

    /// Total requests sent.
    #[must_use]
    pub fn total_requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// Total responses delivered.
    #[must_use]
    pub fn total_responses_delivered(&self) -> u64 {
        self.responses_delivered.load(Ordering::Relaxed)
    }

    /// Total progress notifications forwarded.
    #[must_use]
    pub fn total_progress_forwarded(&self) -> u64 {
        self.progress_forwarded.load(Ordering::Relaxed)
    }

    /// Total messages dropped.
    #[must_use]
    pub fn total_messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Total handlers invoked.
    #[must_use]
    pub fn total_handlers_invoked(&self) -> u64 {
        self.handlers_invoked.load(Ordering::Relaxed)
    }

    /// Total handler errors.
    #[must_use]
    pub fn total_handler_errors(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    /// Total transmission errors.
    #[must_use]
    pub fn total_transmission_errors(&self) -> u64 {
        self.transmission_errors.load(Ordering::Relaxed)
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.requests_sent.store(0, Ordering::Relaxed);
        self.responses_delivered.store(0, Ordering::Relaxed);
        self.progress_forwarded.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.handlers_invoked.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.transmission_errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = BrokerMetrics::new();
        metrics.record_request_sent();
        metrics.record_request_sent();
        metrics.record_response_delivered();
        metrics.record_progress_forwarded();
        metrics.record_message_dropped();
        metrics.record_handler_invoked();
        metrics.record_handler_error();
        metrics.record_transmission_error();

        assert_eq!(metrics.total_requests_sent(), 2);
        assert_eq!(metrics.total_responses_delivered(), 1);
        assert_eq!(metrics.total_progress_forwarded(), 1);
        assert_eq!(metrics.total_messages_dropped(), 1);
        assert_eq!(metrics.total_handlers_invoked(), 1);
        assert_eq!(metrics.total_handler_errors(), 1);
        assert_eq!(metrics.total_transmission_errors(), 1);
    }

    #[test]
    fn test_reset() {
        let metrics = BrokerMetrics::new();
        metrics.record_request_sent();
        metrics.record_message_dropped();
        metrics.reset();
        assert_eq!(metrics.total_requests_sent(), 0);
        assert_eq!(metrics.total_messages_dropped(), 0);
    }
}
