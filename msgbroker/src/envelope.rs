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

//! Envelope operations supplied by the owner of the wire message type.
//!
//! The broker is generic over a single envelope type `T` that it never
//! inspects directly. Everything it needs to know about an envelope (its
//! correlation id, whether it carries an error, which payload it wraps,
//! whether it is a progress notification) is answered by an implementation
//! of [`MessageEnvelope`].
//!
//! Implementations must be stateless with respect to the envelopes they are
//! given: the dispatch loop, client callers and running handlers all call into
//! the same instance concurrently.
//!
//! # Example
//!
//! ```rust
//! use msgbroker::{HandlerError, MessageEnvelope};
//! use std::any::{Any, TypeId};
//!
//! #[derive(Debug, Default)]
//! struct Envelope {
//!     request_id: String,
//!     error: Option<String>,
//!     payload: Option<Payload>,
//! }
//!
//! #[derive(Debug)]
//! enum Payload {
//!     Ping(Ping),
//!     Progress(String),
//! }
//!
//! #[derive(Debug)]
//! struct Ping;
//!
//! struct EnvelopeOps;
//!
//! impl MessageEnvelope<Envelope> for EnvelopeOps {
//!     fn request_id(&self, msg: &Envelope) -> String {
//!         msg.request_id.clone()
//!     }
//!
//!     fn set_request_id(&self, msg: &mut Envelope, id: &str) {
//!         msg.request_id = id.to_string();
//!     }
//!
//!     fn error(&self, msg: &Envelope) -> Option<HandlerError> {
//!         msg.error.clone().map(Into::into)
//!     }
//!
//!     fn set_error(&self, msg: &mut Envelope, err: &HandlerError) {
//!         msg.error = Some(err.to_string());
//!     }
//!
//!     fn into_inner_message(&self, msg: Envelope) -> Option<Box<dyn Any + Send>> {
//!         match msg.payload? {
//!             Payload::Ping(ping) => Some(Box::new(ping)),
//!             Payload::Progress(_) => None,
//!         }
//!     }
//!
//!     fn is_progress_message(&self, msg: &Envelope) -> bool {
//!         matches!(msg.payload, Some(Payload::Progress(_)))
//!     }
//!
//!     fn progress_message(&self, msg: &Envelope) -> String {
//!         match &msg.payload {
//!             Some(Payload::Progress(text)) => text.clone(),
//!             _ => String::new(),
//!         }
//!     }
//!
//!     fn create_progress_message(&self, request_id: &str, message: &str) -> Envelope {
//!         Envelope {
//!             request_id: request_id.to_string(),
//!             error: None,
//!             payload: Some(Payload::Progress(message.to_string())),
//!         }
//!     }
//!
//!     fn accepts_request_type(&self, type_id: TypeId) -> bool {
//!         type_id == TypeId::of::<Ping>()
//!     }
//! }
//! ```

use std::any::{Any, TypeId};

/// Error produced by a handler and carried inside a response envelope.
///
/// On the receiving side, [`MessageEnvelope::error`] reconstructs one from the
/// envelope so it can be surfaced as [`BrokerError::Remote`](crate::BrokerError::Remote).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Stateless accessors over the broker's envelope type `T`.
pub trait MessageEnvelope<T>: Send + Sync + 'static {
    /// Returns the correlation id of `msg`, or an empty string if it has none.
    ///
    /// The id must come from the envelope alone. No call or loop token is
    /// passed in: a [`CancellationToken`](tokio_util::sync::CancellationToken)
    /// carries no metadata to derive a key from, and the client path and the
    /// dispatch loop have to compute the same key for the same envelope.
    fn request_id(&self, msg: &T) -> String;

    /// Sets the correlation id on `msg`.
    ///
    /// Envelope types without a correlation field may treat this as a no-op.
    fn set_request_id(&self, msg: &mut T, id: &str);

    /// Returns the error carried by `msg`, if any.
    fn error(&self, msg: &T) -> Option<HandlerError>;

    /// Stores `err` on `msg`.
    fn set_error(&self, msg: &mut T, err: &HandlerError);

    /// Moves the inner payload out of the envelope's oneof field.
    ///
    /// The concrete type of the returned value selects the handler, so it must
    /// be the same type handlers are registered for.
    fn into_inner_message(&self, msg: T) -> Option<Box<dyn Any + Send>>;

    /// Returns true if `msg` is a progress notification.
    fn is_progress_message(&self, msg: &T) -> bool;

    /// Extracts the progress text, or an empty string for other envelopes.
    fn progress_message(&self, msg: &T) -> String;

    /// Builds a new progress envelope for `request_id` carrying `message`.
    ///
    /// The result must satisfy `is_progress_message` and `progress_message`
    /// must return `message` unchanged.
    fn create_progress_message(&self, request_id: &str, message: &str) -> T;

    /// Returns false if the envelope can never carry a payload of this type.
    ///
    /// Envelopes with a closed payload set should override this so handlers
    /// for foreign types are rejected at registration.
    fn accepts_request_type(&self, type_id: TypeId) -> bool {
        let _ = type_id;
        true
    }
}
