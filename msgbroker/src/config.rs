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

//! Configuration for a [`Broker`](crate::Broker).

use crate::error::BrokerError;

/// Tunables for a [`Broker`](crate::Broker).
///
/// # Example
///
/// ```rust
/// use msgbroker::BrokerConfig;
///
/// let config = BrokerConfig::default()
///     .with_progress_buffer_size(128)
///     .with_strict_registration(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Delivery queue capacity for a plain `send`.
    pub response_buffer_size: usize,

    /// Delivery queue capacity for `send_with_progress`.
    ///
    /// Progress notifications that arrive while the queue is full are
    /// dropped with a warning.
    pub progress_buffer_size: usize,

    /// Reject a second handler for an already registered request type
    /// instead of replacing the first.
    pub strict_registration: bool,

    /// Prefix for ids handed out by `Broker::next_request_id`.
    ///
    /// `None` picks a random prefix per broker. A fixed prefix must differ
    /// from the one the peer uses, or requests from both sides can collide.
    pub request_id_prefix: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            response_buffer_size: 1,
            progress_buffer_size: 50,
            strict_registration: false,
            request_id_prefix: None,
        }
    }
}

impl BrokerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery queue capacity for plain sends.
    #[must_use]
    pub fn with_response_buffer_size(mut self, size: usize) -> Self {
        self.response_buffer_size = size;
        self
    }

    /// Sets the delivery queue capacity for sends with progress.
    #[must_use]
    pub fn with_progress_buffer_size(mut self, size: usize) -> Self {
        self.progress_buffer_size = size;
        self
    }

    /// Enables or disables strict handler registration.
    #[must_use]
    pub fn with_strict_registration(mut self, strict: bool) -> Self {
        self.strict_registration = strict;
        self
    }

    /// Sets a fixed prefix for generated request ids.
    #[must_use]
    pub fn with_request_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request_id_prefix = Some(prefix.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidConfig`] if a buffer size is zero or the
    /// request id prefix is empty.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.response_buffer_size == 0 {
            return Err(BrokerError::InvalidConfig(
                "response_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.progress_buffer_size == 0 {
            return Err(BrokerError::InvalidConfig(
                "progress_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.request_id_prefix.as_deref() == Some("") {
            return Err(BrokerError::InvalidConfig(
                "request_id_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.response_buffer_size, 1);
        assert_eq!(config.progress_buffer_size, 50);
        assert!(!config.strict_registration);
        assert!(config.request_id_prefix.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BrokerConfig::new()
            .with_response_buffer_size(4)
            .with_progress_buffer_size(8)
            .with_strict_registration(true)
            .with_request_id_prefix("client");
        assert_eq!(config.request_id_prefix.as_deref(), Some("client"));
        assert_eq!(config.response_buffer_size, 4);
        assert_eq!(config.progress_buffer_size, 8);
        assert!(config.strict_registration);
    }

    #[test]
    fn test_validate_rejects_zero_buffers() {
        let err = BrokerConfig::new()
            .with_response_buffer_size(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("response_buffer_size"));

        let err = BrokerConfig::new()
            .with_progress_buffer_size(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("progress_buffer_size"));

        let err = BrokerConfig::new()
            .with_request_id_prefix("")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("request_id_prefix"));
    }
}
