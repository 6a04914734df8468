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

//! Error types for the broker.
//!
//! Errors fall into three groups with different blast radius:
//!
//! 1. **Call-local**: [`BrokerError::MissingCorrelationId`],
//!    [`BrokerError::DuplicateCorrelationId`], [`BrokerError::Transmission`],
//!    [`BrokerError::Cancelled`], [`BrokerError::Timeout`] and
//!    [`BrokerError::Remote`] fail a single `send` and leave the broker healthy.
//! 2. **Broker-wide**: [`BrokerError::ChannelClosed`] is reported once the
//!    dispatch loop has stopped or the broker was closed. The broker does not
//!    recover from this.
//! 3. **Setup**: [`BrokerError::HandlerValidation`],
//!    [`BrokerError::AlreadyStarted`] and [`BrokerError::InvalidConfig`] are
//!    returned by registration and startup and never reach the stream.
//!
//! The broker never retries; retry is the caller's decision.
//!
//! # Examples
//!
//! ```rust
//! use msgbroker::BrokerError;
//!
//! let err = BrokerError::ChannelClosed {
//!     request_id: "r1".to_string(),
//! };
//! assert!(err.is_closed());
//! assert_eq!(err.request_id(), Some("r1"));
//! ```

use crate::envelope::HandlerError;
use crate::stream::StreamError;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Errors returned by [`Broker`](crate::Broker) operations.
#[derive(Debug)]
pub enum BrokerError {
    /// The outbound envelope has no correlation id.
    MissingCorrelationId,

    /// A request with the same correlation id is already waiting.
    DuplicateCorrelationId {
        /// The correlation id that is already in flight.
        request_id: String,
    },

    /// Writing the request to the stream failed.
    Transmission {
        /// The correlation id of the request.
        request_id: String,
        /// The underlying stream error.
        source: StreamError,
    },

    /// The caller's cancellation token fired while waiting.
    Cancelled {
        /// The correlation id of the request.
        request_id: String,
    },

    /// No response arrived within the deadline.
    Timeout {
        /// The correlation id of the request.
        request_id: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The dispatch loop stopped or the broker was closed while waiting.
    ChannelClosed {
        /// The correlation id of the request.
        request_id: String,
    },

    /// A handler was rejected at registration.
    HandlerValidation {
        /// Name of the request payload type.
        request_type: &'static str,
        /// Why the handler was rejected.
        reason: String,
    },

    /// The response envelope carried an error set by the remote handler.
    Remote(HandlerError),

    /// The dispatch loop has already been started.
    AlreadyStarted,

    /// The broker configuration is invalid.
    InvalidConfig(String),
}

impl BrokerError {
    /// Returns true if the broker can no longer deliver responses.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. })
    }

    /// Returns true if the caller cancelled the request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true if the request timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if repeating the same call on this broker may succeed.
    ///
    /// Timeouts, cancellations and transient transmission failures are
    /// recoverable. A closed broker, a malformed request, or a handler-side
    /// error are not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Cancelled { .. } | Self::DuplicateCorrelationId { .. } => {
                true
            }
            Self::Transmission { source, .. } => !source.is_closed(),
            _ => false,
        }
    }

    /// Returns the correlation id associated with this error, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateCorrelationId { request_id }
            | Self::Transmission { request_id, .. }
            | Self::Cancelled { request_id }
            | Self::Timeout { request_id, .. }
            | Self::ChannelClosed { request_id } => Some(request_id),
            Self::MissingCorrelationId
            | Self::HandlerValidation { .. }
            | Self::Remote(_)
            | Self::AlreadyStarted
            | Self::InvalidConfig(_) => None,
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCorrelationId => write!(f, "Message must have a request id"),
            Self::DuplicateCorrelationId { request_id } => {
                write!(f, "Request {} is already in flight", request_id)
            }
            Self::Transmission { request_id, source } => {
                write!(f, "Failed to send request {}: {}", request_id, source)
            }
            Self::Cancelled { request_id } => write!(f, "Request {} was cancelled", request_id),
            Self::Timeout {
                request_id,
                timeout,
            } => write!(f, "Request {} timed out after {:?}", request_id, timeout),
            Self::ChannelClosed { request_id } => {
                write!(f, "Channel for request {} closed by dispatcher", request_id)
            }
            Self::HandlerValidation {
                request_type,
                reason,
            } => write!(f, "Invalid handler for {}: {}", request_type, reason),
            Self::Remote(e) => write!(f, "{}", e),
            Self::AlreadyStarted => write!(f, "Dispatcher already started"),
            Self::InvalidConfig(message) => write!(f, "Invalid broker configuration: {}", message),
        }
    }
}

impl StdError for BrokerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transmission { source, .. } => Some(source),
            Self::Remote(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let cancelled = BrokerError::Cancelled {
            request_id: "a".to_string(),
        };
        assert!(cancelled.is_cancelled());
        assert!(cancelled.is_recoverable());
        assert!(!cancelled.is_closed());

        let closed = BrokerError::ChannelClosed {
            request_id: "a".to_string(),
        };
        assert!(closed.is_closed());
        assert!(!closed.is_recoverable());

        let timeout = BrokerError::Timeout {
            request_id: "a".to_string(),
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_timeout());
    }

    #[test]
    fn test_transmission_recoverability_follows_stream() {
        let closed = BrokerError::Transmission {
            request_id: "a".to_string(),
            source: StreamError::Closed,
        };
        assert!(!closed.is_recoverable());

        let other = BrokerError::Transmission {
            request_id: "a".to_string(),
            source: StreamError::Other("busy".to_string()),
        };
        assert!(other.is_recoverable());
    }

    #[test]
    fn test_request_id() {
        assert_eq!(BrokerError::MissingCorrelationId.request_id(), None);
        assert_eq!(
            BrokerError::Cancelled {
                request_id: "r7".to_string()
            }
            .request_id(),
            Some("r7")
        );
    }

    #[test]
    fn test_display() {
        let err = BrokerError::HandlerValidation {
            request_type: "Ping",
            reason: "request type is the envelope type".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid handler for Ping: request type is the envelope type"
        );

        let remote = BrokerError::Remote("boom".into());
        assert_eq!(remote.to_string(), "boom");
        assert!(remote.source().is_some());
    }
}
