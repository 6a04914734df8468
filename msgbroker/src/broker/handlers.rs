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

//! Server-side handler registration.
//!
//! Handlers are keyed by the [`TypeId`] of the request payload they accept.
//! When the dispatch loop receives an envelope that no client is waiting on,
//! it moves the inner payload out of the envelope and uses the payload's
//! concrete type to find the handler. This lets one stream carrying a oneof
//! of many message kinds fan out to type-specific logic without the broker
//! knowing those kinds.
//!
//! The handler's shape (a cancellation token, an owned request payload, an
//! optional [`Progress`] callback, returning an envelope or an error) is
//! enforced by the bounds on [`HandlerDescriptor::new`] and
//! [`HandlerDescriptor::with_progress`]. What the type system cannot rule out
//! is checked by [`HandlerDescriptor::validate`] at registration.

use super::Progress;
use crate::envelope::{HandlerError, MessageEnvelope};
use crate::error::BrokerError;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result returned by a handler.
///
/// `Ok(None)` means the handler has nothing to put in the response; the
/// broker sends a default envelope carrying only the correlation id. An
/// error is written into the response with
/// [`MessageEnvelope::set_error`]. To send a payload together with the
/// error, return a [`HandlerFailure`].
pub type HandlerResult<T> = Result<Option<T>, HandlerError>;

/// Handler error that still carries a response envelope.
///
/// The broker sets the error on `response` instead of on a default envelope,
/// so the caller receives both, e.g. a partial result and the reason it is
/// partial.
///
/// # Example
///
/// ```rust
/// use msgbroker::broker::HandlerFailure;
/// use msgbroker::HandlerResult;
///
/// #[derive(Debug, Default)]
/// struct Envelope {
///     rows: Vec<u32>,
/// }
///
/// fn partial() -> HandlerResult<Envelope> {
///     let response = Envelope { rows: vec![1, 2] };
///     Err(HandlerFailure::new(response, "row limit reached").into())
/// }
///
/// assert_eq!(partial().unwrap_err().to_string(), "row limit reached");
/// ```
pub struct HandlerFailure<T> {
    response: Mutex<Option<T>>,
    error: HandlerError,
}

impl<T> HandlerFailure<T> {
    /// Wraps `error` together with the envelope to send back.
    pub fn new(response: T, error: impl Into<HandlerError>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            error: error.into(),
        }
    }

    /// Splits into the response, if still present, and the error.
    pub fn into_parts(self) -> (Option<T>, HandlerError) {
        (self.response.into_inner(), self.error)
    }
}

impl<T> fmt::Debug for HandlerFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFailure")
            .field("has_response", &self.response.lock().is_some())
            .field("error", &self.error)
            .finish()
    }
}

impl<T> fmt::Display for HandlerFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<T: Send + 'static> std::error::Error for HandlerFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Splits a handler error into the envelope to respond with, if the handler
/// supplied one, and the error to set on it.
pub(crate) fn split_failure<T: Send + 'static>(
    error: HandlerError,
) -> (Option<T>, HandlerError) {
    match error.downcast::<HandlerFailure<T>>() {
        Ok(failure) => failure.into_parts(),
        Err(error) => (None, error),
    }
}

pub(crate) type HandlerFuture<T> = Pin<Box<dyn Future<Output = HandlerResult<T>> + Send>>;

type ErasedHandler<T> =
    dyn Fn(CancellationToken, Box<dyn Any + Send>, Option<Progress>) -> HandlerFuture<T>
        + Send
        + Sync;

/// A type-erased handler together with the request type it accepts.
pub struct HandlerDescriptor<T> {
    request_type: TypeId,
    request_type_name: &'static str,
    expects_progress: bool,
    handler: Box<ErasedHandler<T>>,
}

impl<T: 'static> HandlerDescriptor<T> {
    /// Wraps a handler of the form `fn(ctx, request) -> Future<HandlerResult<T>>`.
    pub fn new<R, F, Fut>(handler: F) -> Self
    where
        R: Any + Send,
        F: Fn(CancellationToken, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
    {
        let request_type_name = std::any::type_name::<R>();
        Self {
            request_type: TypeId::of::<R>(),
            request_type_name,
            expects_progress: false,
            handler: Box::new(move |ctx, payload, _progress| {
                let fut: HandlerFuture<T> = match payload.downcast::<R>() {
                    Ok(request) => Box::pin(handler(ctx, *request)),
                    Err(_) => Box::pin(async move { Err(type_mismatch(request_type_name)) }),
                };
                fut
            }),
        }
    }

    /// Wraps a handler of the form
    /// `fn(ctx, request, progress) -> Future<HandlerResult<T>>`.
    pub fn with_progress<R, F, Fut>(handler: F) -> Self
    where
        R: Any + Send,
        F: Fn(CancellationToken, R, Progress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
    {
        let request_type_name = std::any::type_name::<R>();
        Self {
            request_type: TypeId::of::<R>(),
            request_type_name,
            expects_progress: true,
            handler: Box::new(move |ctx, payload, progress| {
                let progress = progress.unwrap_or_else(|| Progress::from_fn("", |_, _| {}));
                let fut: HandlerFuture<T> = match payload.downcast::<R>() {
                    Ok(request) => Box::pin(handler(ctx, *request, progress)),
                    Err(_) => Box::pin(async move { Err(type_mismatch(request_type_name)) }),
                };
                fut
            }),
        }
    }

    /// Checks that this handler can ever be reached through `ops`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::HandlerValidation`] when the request type is
    /// the envelope type itself, is `()`, is an unresolved
    /// `Box<dyn Any + Send>`, or is not a payload the envelope can carry.
    pub fn validate(&self, ops: &dyn MessageEnvelope<T>) -> Result<(), BrokerError> {
        let reason = if self.request_type == TypeId::of::<T>() {
            Some("request type must be an inner payload, not the envelope type")
        } else if self.request_type == TypeId::of::<()>() {
            Some("request type must carry a payload")
        } else if self.request_type == TypeId::of::<Box<dyn Any + Send>>() {
            Some("request type must be a concrete payload type")
        } else if !ops.accepts_request_type(self.request_type) {
            Some("envelope does not carry this payload type")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(BrokerError::HandlerValidation {
                request_type: self.request_type_name,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn invoke(
        &self,
        ctx: CancellationToken,
        payload: Box<dyn Any + Send>,
        progress: Option<Progress>,
    ) -> HandlerFuture<T> {
        (self.handler)(ctx, payload, progress)
    }
}

impl<T> HandlerDescriptor<T> {
    /// The [`TypeId`] of the accepted request payload.
    #[must_use]
    pub fn request_type(&self) -> TypeId {
        self.request_type
    }

    /// The name of the accepted request payload type.
    #[must_use]
    pub fn request_type_name(&self) -> &'static str {
        self.request_type_name
    }

    /// Whether the handler takes a [`Progress`] callback.
    #[must_use]
    pub fn expects_progress(&self) -> bool {
        self.expects_progress
    }
}

impl<T> fmt::Debug for HandlerDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("request_type", &self.request_type_name)
            .field("expects_progress", &self.expects_progress)
            .finish_non_exhaustive()
    }
}

fn type_mismatch(expected: &'static str) -> HandlerError {
    format!("payload does not match handler request type {}", expected).into()
}

/// Handlers keyed by request payload type.
#[derive(Debug)]
pub struct HandlerRegistry<T> {
    handlers: RwLock<HashMap<TypeId, Arc<HandlerDescriptor<T>>>>,
}

impl<T> HandlerRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `descriptor`, replacing any handler for the same request type.
    ///
    /// Returns `true` if an earlier handler was replaced. With `strict` set an
    /// existing handler is kept and an error returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::HandlerValidation`] on a strict duplicate.
    pub fn insert(
        &self,
        descriptor: HandlerDescriptor<T>,
        strict: bool,
    ) -> Result<bool, BrokerError> {
        let mut handlers = self.handlers.write();
        if strict && handlers.contains_key(&descriptor.request_type) {
            return Err(BrokerError::HandlerValidation {
                request_type: descriptor.request_type_name,
                reason: "a handler is already registered for this type".to_string(),
            });
        }
        Ok(handlers
            .insert(descriptor.request_type, Arc::new(descriptor))
            .is_some())
    }

    /// Returns the handler for `request_type`.
    #[must_use]
    pub fn get(&self, request_type: TypeId) -> Option<Arc<HandlerDescriptor<T>>> {
        self.handlers.read().get(&request_type).cloned()
    }

    /// Returns true if a handler is registered for `request_type`.
    #[must_use]
    pub fn contains(&self, request_type: TypeId) -> bool {
        self.handlers.read().contains_key(&request_type)
    }

    /// Names of every registered request type, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .handlers
            .read()
            .values()
            .map(|d| d.request_type_name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
