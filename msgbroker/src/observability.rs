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

//! Observability support for the broker.
//!
//! Every [`Broker`](crate::Broker) keeps a [`BrokerMetrics`] instance with
//! lock-free counters for its traffic. With the `observability` feature
//! enabled the same events are also exported through the `metrics` facade
//! under the `msgbroker.` prefix, and the broker emits `tracing` events
//! carrying the `request_id` of the exchange they belong to.
//!
//! ```rust
//! use msgbroker::observability::BrokerMetrics;
//!
//! let metrics = BrokerMetrics::new();
//! metrics.record_request_sent();
//! metrics.record_response_delivered();
//!
//! assert_eq!(metrics.total_requests_sent(), 1);
//! assert_eq!(metrics.total_responses_delivered(), 1);
//! ```

mod metrics;

pub use self::metrics::BrokerMetrics;
