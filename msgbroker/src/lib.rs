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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # msgbroker - Bidirectional request broker
//!
//! `msgbroker` multiplexes request/response exchanges over a single
//! bidirectional stream of envelopes, in both directions at once:
//!
//! - **Client calls**: send an envelope and wait for the reply that carries
//!   the same correlation id, optionally observing progress notifications
//! - **Typed handlers**: register an async handler per request payload type
//!   and let the dispatch loop route inbound requests to it
//! - **Progress reporting**: handlers can stream progress text back to the
//!   caller before their final response
//! - **Pluggable envelopes**: the broker never inspects your wire type; it
//!   goes through the [`MessageEnvelope`] operations you supply
//! - **Pluggable streams**: anything implementing [`stream::StreamSink`] and
//!   [`stream::StreamSource`] can carry the envelopes
//! - **Observability**: `tracing` spans and events plus `metrics` counters,
//!   behind the default `observability` feature
//!
//! ## Architecture
//!
//! - **[`envelope`]**: the operations the broker needs on your envelope type
//! - **[`stream`]**: the duplex stream abstraction and an in-memory stream
//! - **[`broker`]**: correlation, handler dispatch and the public [`Broker`]
//! - **[`config`]**: queue sizes and registration policy
//! - **[`error`]**: the [`BrokerError`] taxonomy
//! - **[`observability`]**: traffic counters
//!
//! ## Feature Flags
//!
//! - `observability` (default): structured logging with `tracing` and
//!   counters exported through the `metrics` facade

pub mod broker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod stream;

pub use broker::{Broker, HandlerFailure, HandlerResult, Progress, StopReason};
pub use config::BrokerConfig;
pub use envelope::{HandlerError, MessageEnvelope};
pub use error::BrokerError;
pub use observability::BrokerMetrics;
