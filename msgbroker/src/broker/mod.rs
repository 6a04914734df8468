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

//! Request correlation and handler dispatch over one duplex stream.
//!
//! A [`Broker`] plays both roles on the same stream:
//!
//! - **Client**: [`Broker::send`] and [`Broker::send_with_progress`] write a
//!   request carrying a correlation id and wait for the envelope that comes
//!   back with the same id.
//! - **Server**: [`Broker::on`] and [`Broker::on_with_progress`] register a
//!   handler for one request payload type. Once [`Broker::start`] is running
//!   the dispatch loop, inbound requests are routed to the matching handler
//!   and its result is written back with the request's correlation id.
//!
//! # Architecture
//!
//! - [`PendingRequests`]: correlation id to delivery queue, for client calls
//! - [`HandlerRegistry`]: payload type to [`HandlerDescriptor`], for handlers
//! - dispatch loop: the single task that reads the stream and routes envelopes
//! - writer: the single task that writes the stream, so client requests,
//!   handler responses and [`Progress`] reports never interleave mid-write
//!
//! # Example
//!
//! ```rust,no_run
//! use msgbroker::{Broker, HandlerError, MessageEnvelope};
//! use msgbroker::stream::MemoryStream;
//! use std::any::Any;
//! use tokio_util::sync::CancellationToken;
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
//!     Pong,
//! }
//!
//! #[derive(Debug)]
//! struct Ping;
//!
//! struct Ops;
//!
//! impl MessageEnvelope<Envelope> for Ops {
//!     fn request_id(&self, msg: &Envelope) -> String { msg.request_id.clone() }
//!     fn set_request_id(&self, msg: &mut Envelope, id: &str) { msg.request_id = id.into(); }
//!     fn error(&self, msg: &Envelope) -> Option<HandlerError> { msg.error.clone().map(Into::into) }
//!     fn set_error(&self, msg: &mut Envelope, err: &HandlerError) { msg.error = Some(err.to_string()); }
//!     fn into_inner_message(&self, msg: Envelope) -> Option<Box<dyn Any + Send>> {
//!         match msg.payload? {
//!             Payload::Ping(ping) => Some(Box::new(ping)),
//!             Payload::Pong => None,
//!         }
//!     }
//!     fn is_progress_message(&self, _msg: &Envelope) -> bool { false }
//!     fn progress_message(&self, _msg: &Envelope) -> String { String::new() }
//!     fn create_progress_message(&self, request_id: &str, _message: &str) -> Envelope {
//!         Envelope { request_id: request_id.into(), ..Default::default() }
//!     }
//! }
//!
//! # async fn example() -> Result<(), msgbroker::BrokerError> {
//! let (client_stream, server_stream) = MemoryStream::pair_default();
//!
//! // Server side: answer every Ping with a Pong.
//! let server = Broker::from_stream(server_stream, Ops);
//! server.on(|_ctx, _ping: Ping| async move {
//!     Ok(Some(Envelope { payload: Some(Payload::Pong), ..Default::default() }))
//! })?;
//! let ctx = CancellationToken::new();
//! server.start(ctx.clone())?;
//!
//! // Client side: send a Ping and wait for the correlated reply.
//! let client = Broker::from_stream(client_stream, Ops);
//! client.start(ctx.clone())?;
//! let reply = client
//!     .send(&ctx, Envelope {
//!         request_id: "r1".into(),
//!         payload: Some(Payload::Ping(Ping)),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(reply.request_id, "r1");
//! # Ok(())
//! # }
//! ```

mod correlation;
mod dispatch;
mod handlers;
mod pending;
mod progress;
mod writer;

pub use correlation::CorrelationIdGenerator;
pub use dispatch::StopReason;
pub use handlers::{HandlerDescriptor, HandlerFailure, HandlerRegistry, HandlerResult};
pub use pending::{PendingRequest, PendingRequests};
pub use progress::Progress;

use crate::config::BrokerConfig;
use crate::envelope::MessageEnvelope;
use crate::error::BrokerError;
use crate::observability::BrokerMetrics;
use crate::stream::{DuplexStream, StreamError, StreamSink, StreamSource};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use writer::StreamWriter;

#[cfg(feature = "observability")]
use tracing::{debug, info, instrument, warn};

/// Bidirectional request broker over a duplex stream of envelopes `T`.
///
/// Cloning a broker is cheap and yields another handle to the same broker.
pub struct Broker<T> {
    inner: Arc<BrokerInner<T>>,
}

pub(crate) struct BrokerInner<T> {
    pub(crate) ops: Arc<dyn MessageEnvelope<T>>,
    pub(crate) writer: StreamWriter<T>,
    pub(crate) pending: PendingRequests<T>,
    pub(crate) handlers: HandlerRegistry<T>,
    pub(crate) metrics: Arc<BrokerMetrics>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) running: AtomicBool,
    source: Mutex<Option<Box<dyn StreamSource<T>>>>,
    ids: CorrelationIdGenerator,
    config: BrokerConfig,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Broker<T>
where
    T: Default + Send + 'static,
{
    /// Creates a broker over the given stream halves with default settings.
    ///
    /// The writer task is spawned immediately, so requests can be sent before
    /// [`start`](Self::start); their responses are only observed once the
    /// dispatch loop runs.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<S, R, E>(sink: S, source: R, ops: E) -> Self
    where
        S: StreamSink<T>,
        R: StreamSource<T>,
        E: MessageEnvelope<T>,
    {
        Self::build(sink, source, ops, BrokerConfig::default())
    }

    /// Creates a broker with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidConfig`] if `config` fails validation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config<S, R, E>(
        sink: S,
        source: R,
        ops: E,
        config: BrokerConfig,
    ) -> Result<Self, BrokerError>
    where
        S: StreamSink<T>,
        R: StreamSource<T>,
        E: MessageEnvelope<T>,
    {
        config.validate()?;
        Ok(Self::build(sink, source, ops, config))
    }

    /// Creates a broker by splitting a [`DuplexStream`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_stream<D, E>(stream: D, ops: E) -> Self
    where
        D: DuplexStream<T>,
        E: MessageEnvelope<T>,
    {
        let (sink, source) = stream.split();
        Self::new(sink, source, ops)
    }

    fn build<S, R, E>(sink: S, source: R, ops: E, config: BrokerConfig) -> Self
    where
        S: StreamSink<T>,
        R: StreamSource<T>,
        E: MessageEnvelope<T>,
    {
        let metrics = Arc::new(BrokerMetrics::new());
        let (writer, _writer_task) = StreamWriter::spawn(sink, Arc::clone(&metrics));
        let source: Box<dyn StreamSource<T>> = Box::new(source);

        Self {
            inner: Arc::new(BrokerInner {
                ops: Arc::new(ops),
                writer,
                pending: PendingRequests::new(),
                handlers: HandlerRegistry::new(),
                metrics,
                shutdown: CancellationToken::new(),
                running: AtomicBool::new(false),
                source: Mutex::new(Some(source)),
                ids: config
                    .request_id_prefix
                    .clone()
                    .map_or_else(CorrelationIdGenerator::unique, CorrelationIdGenerator::new),
                config,
            }),
        }
    }

    /// Registers a handler for request payloads of type `R`.
    ///
    /// The handler receives a cancellation token that fires when the dispatch
    /// loop stops, and the request payload moved out of its envelope. It
    /// returns the response envelope, `None` for an empty response, or an
    /// error; the broker sets the correlation id (and the error, if any) on
    /// the response before writing it.
    ///
    /// A later registration for the same `R` replaces this one unless
    /// [`BrokerConfig::strict_registration`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::HandlerValidation`] if `R` can never be
    /// dispatched (see [`HandlerDescriptor::validate`]) or on a strict
    /// duplicate. Nothing is registered on error.
    pub fn on<R, F, Fut>(&self, handler: F) -> Result<(), BrokerError>
    where
        R: Any + Send,
        F: Fn(CancellationToken, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
    {
        self.register(HandlerDescriptor::new(handler))
    }

    /// Registers a handler that also receives a [`Progress`] callback.
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn on_with_progress<R, F, Fut>(&self, handler: F) -> Result<(), BrokerError>
    where
        R: Any + Send,
        F: Fn(CancellationToken, R, Progress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
    {
        self.register(HandlerDescriptor::with_progress(handler))
    }

    /// Validates and stores a prebuilt [`HandlerDescriptor`].
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn register(&self, descriptor: HandlerDescriptor<T>) -> Result<(), BrokerError> {
        descriptor.validate(self.inner.ops.as_ref())?;

        let _request_type = descriptor.request_type_name();
        let _replaced = self
            .inner
            .handlers
            .insert(descriptor, self.inner.config.strict_registration)?;

        #[cfg(feature = "observability")]
        if _replaced {
            warn!(request_type = _request_type, "Replaced existing handler");
        } else {
            info!(request_type = _request_type, "Registered handler");
        }

        Ok(())
    }

    /// Starts the dispatch loop on a new task and returns immediately.
    ///
    /// The loop runs until `ctx` is cancelled, [`close`](Self::close) is
    /// called, or the stream fails to receive. The returned handle resolves
    /// to the reason it stopped. A stopped loop is never restarted.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AlreadyStarted`] on every call after the first.
    pub fn start(&self, ctx: CancellationToken) -> Result<JoinHandle<StopReason>, BrokerError> {
        let source = self
            .inner
            .source
            .lock()
            .take()
            .ok_or(BrokerError::AlreadyStarted)?;

        self.inner.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move {
            inner.run_dispatcher(source, ctx).await
        }))
    }

    /// Sends `message` and waits for the response with the same correlation id.
    ///
    /// Progress notifications for the request are ignored.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::MissingCorrelationId`] if `message` has no id
    /// - [`BrokerError::DuplicateCorrelationId`] if the id is already waiting
    /// - [`BrokerError::Transmission`] if the stream write fails
    /// - [`BrokerError::Cancelled`] if `ctx` is cancelled first
    /// - [`BrokerError::ChannelClosed`] if the dispatch loop stops first
    /// - [`BrokerError::Remote`] if the response carries an error
    pub async fn send(&self, ctx: &CancellationToken, message: T) -> Result<T, BrokerError> {
        self.exchange(ctx, message, self.inner.config.response_buffer_size, None)
            .await
    }

    /// Sends `message`, calling `on_progress` for every progress notification
    /// until the final response arrives.
    ///
    /// Notifications are delivered in arrival order and always before this
    /// call returns. Empty progress texts are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_with_progress<F>(
        &self,
        ctx: &CancellationToken,
        message: T,
        mut on_progress: F,
    ) -> Result<T, BrokerError>
    where
        F: FnMut(&str) + Send,
    {
        self.exchange(
            ctx,
            message,
            self.inner.config.progress_buffer_size,
            Some(&mut on_progress as &mut (dyn FnMut(&str) + Send)),
        )
        .await
    }

    /// Sends `message` and waits at most `timeout` for the response.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Timeout`] when the deadline passes, otherwise
    /// the same errors as [`send`](Self::send).
    pub async fn send_timeout(&self, message: T, timeout: Duration) -> Result<T, BrokerError> {
        let request_id = self.inner.ops.request_id(&message);
        let ctx = CancellationToken::new();
        match tokio::time::timeout(timeout, self.send(&ctx, message)).await {
            Ok(result) => result,
            Err(_) => {
                #[cfg(feature = "observability")]
                warn!(request_id = %request_id, ?timeout, "Request timed out");
                Err(BrokerError::Timeout {
                    request_id,
                    timeout,
                })
            }
        }
    }

    #[cfg_attr(
        feature = "observability",
        instrument(skip_all, fields(request_id))
    )]
    async fn exchange(
        &self,
        ctx: &CancellationToken,
        message: T,
        capacity: usize,
        mut on_progress: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<T, BrokerError> {
        let inner = &self.inner;
        let request_id = inner.ops.request_id(&message);
        if request_id.is_empty() {
            return Err(BrokerError::MissingCorrelationId);
        }

        #[cfg(feature = "observability")]
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut pending = inner.pending.register(&request_id, capacity)?;

        #[cfg(feature = "observability")]
        debug!("Sending request");

        let mut sent = inner.writer.submit(&request_id, message);
        let mut acknowledged = false;
        inner.metrics.record_request_sent();

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    #[cfg(feature = "observability")]
                    debug!("Request cancelled");
                    return Err(BrokerError::Cancelled { request_id });
                }
                written = &mut sent, if !acknowledged => {
                    acknowledged = true;
                    let source = match written {
                        Ok(Ok(())) => {
                            #[cfg(feature = "observability")]
                            debug!("Request sent, waiting for response");
                            continue;
                        }
                        Ok(Err(e)) => e,
                        Err(_) => StreamError::Closed,
                    };
                    #[cfg(feature = "observability")]
                    warn!(error = %source, "Failed to send request");
                    return Err(BrokerError::Transmission { request_id, source });
                }
                delivered = pending.recv() => {
                    let Some(envelope) = delivered else {
                        #[cfg(feature = "observability")]
                        warn!("Channel closed while waiting, dispatcher likely stopped");
                        return Err(BrokerError::ChannelClosed { request_id });
                    };

                    if inner.ops.is_progress_message(&envelope) {
                        if let Some(on_progress) = on_progress.as_deref_mut() {
                            let text = inner.ops.progress_message(&envelope);
                            if !text.is_empty() {
                                on_progress(&text);
                            }
                        }
                        continue;
                    }

                    #[cfg(feature = "observability")]
                    debug!("Received final response");

                    if let Some(e) = inner.ops.error(&envelope) {
                        #[cfg(feature = "observability")]
                        debug!(error = %e, "Response carries error");
                        return Err(BrokerError::Remote(e));
                    }
                    return Ok(envelope);
                }
            }
        }
    }
}

impl<T> Broker<T> {
    /// Tears down the broker.
    ///
    /// Every waiting request fails with [`BrokerError::ChannelClosed`], new
    /// requests are refused, and a running dispatch loop stops with
    /// [`StopReason::BrokerClosed`]. Safe to call repeatedly and alongside a
    /// dispatch loop that is already shutting down.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
        let _closed = self.inner.pending.close_all();

        #[cfg(feature = "observability")]
        info!(pending_closed = _closed, "Broker closed");
    }

    /// Returns a fresh correlation id.
    ///
    /// Ids carry a random per-broker prefix unless
    /// [`BrokerConfig::with_request_id_prefix`] sets one, so two peers using
    /// this method never hand out the same id.
    #[must_use]
    pub fn next_request_id(&self) -> String {
        self.inner.ids.next_id()
    }

    /// Returns true while the dispatch loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Number of client requests currently waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Names of the request types with a registered handler.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.inner.handlers.registered_types()
    }

    /// Traffic counters for this broker.
    #[must_use]
    pub fn metrics(&self) -> &BrokerMetrics {
        &self.inner.metrics
    }

    /// The configuration this broker was built with.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }
}

impl<T> std::fmt::Debug for Broker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("running", &self.is_running())
            .field("pending", &self.pending_count())
            .field("handlers", &self.handler_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
