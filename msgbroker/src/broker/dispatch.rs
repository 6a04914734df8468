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

//! The dispatch loop.
//!
//! One task per broker owns the read half of the stream. For every inbound
//! envelope it decides, in this order:
//!
//! 1. progress notification: forward to the waiting caller, if any;
//! 2. correlation id with a waiting caller: deliver as that caller's response;
//! 3. no inner payload: drop;
//! 4. payload type with a registered handler: run the handler and write its
//!    response, otherwise drop.
//!
//! Handlers run inline, one at a time. The loop ends on cancellation, on
//! [`Broker::close`](crate::Broker::close), or on the first receive error,
//! and closes every pending request on the way out.

use super::handlers::split_failure;
use super::{BrokerInner, HandlerDescriptor, Progress};
use crate::stream::{StreamError, StreamSource};
use std::any::Any;
use std::fmt;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tracing::{debug, error, info, warn};

/// Why the dispatch loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The token passed to [`Broker::start`](crate::Broker::start) was cancelled.
    ContextCancelled,

    /// [`Broker::close`](crate::Broker::close) was called.
    BrokerClosed,

    /// Receiving from the stream failed.
    StreamError(StreamError),
}

impl StopReason {
    /// Returns true if the loop stopped because the stream failed.
    #[must_use]
    pub const fn is_stream_error(&self) -> bool {
        matches!(self, Self::StreamError(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextCancelled => write!(f, "context cancelled"),
            Self::BrokerClosed => write!(f, "broker closed"),
            Self::StreamError(e) => write!(f, "stream error: {}", e),
        }
    }
}

impl<T> BrokerInner<T>
where
    T: Default + Send + 'static,
{
    pub(crate) async fn run_dispatcher(
        &self,
        mut source: Box<dyn StreamSource<T>>,
        ctx: CancellationToken,
    ) -> StopReason {
        #[cfg(feature = "observability")]
        info!("Dispatcher started");

        let handler_ctx = ctx.child_token();
        let reason = loop {
            let envelope = tokio::select! {
                biased;
                reason = self.stop_signal(&ctx) => break reason,
                received = source.recv() => match received {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        #[cfg(feature = "observability")]
                        error!(error = %e, "Stream receive failed");
                        break StopReason::StreamError(e);
                    }
                },
            };

            if let Some(reason) = self.route(&ctx, &handler_ctx, envelope).await {
                break reason;
            }
        };

        handler_ctx.cancel();
        self.running.store(false, Ordering::SeqCst);
        let _closed = self.pending.close_all();

        #[cfg(feature = "observability")]
        info!(reason = %reason, pending_closed = _closed, "Dispatcher stopped");

        reason
    }

    async fn stop_signal(&self, ctx: &CancellationToken) -> StopReason {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => StopReason::ContextCancelled,
            _ = self.shutdown.cancelled() => StopReason::BrokerClosed,
        }
    }

    /// Routes one inbound envelope. Returns a reason if the loop must stop.
    async fn route(
        &self,
        ctx: &CancellationToken,
        handler_ctx: &CancellationToken,
        envelope: T,
    ) -> Option<StopReason> {
        let request_id = self.ops.request_id(&envelope);

        if self.ops.is_progress_message(&envelope) {
            self.forward_progress(&request_id, envelope);
            return None;
        }

        if !request_id.is_empty() {
            if let Some(tx) = self.pending.lookup(&request_id) {
                #[cfg(feature = "observability")]
                if tx.max_capacity() > 1 && tx.capacity() <= 1 {
                    warn!(
                        request_id = %request_id,
                        capacity = tx.max_capacity(),
                        "Delivery queue nearly full"
                    );
                }

                tokio::select! {
                    biased;
                    reason = self.stop_signal(ctx) => return Some(reason),
                    sent = tx.send(envelope) => match sent {
                        Ok(()) => {
                            self.metrics.record_response_delivered();
                            #[cfg(feature = "observability")]
                            debug!(request_id = %request_id, "Response delivered to waiting request");
                        }
                        Err(_) => {
                            self.metrics.record_message_dropped();
                            #[cfg(feature = "observability")]
                            debug!(request_id = %request_id, "Waiting request went away, response dropped");
                        }
                    },
                }
                return None;
            }
        }

        let Some(payload) = self.ops.into_inner_message(envelope) else {
            self.metrics.record_message_dropped();
            #[cfg(feature = "observability")]
            warn!(request_id = %request_id, "No inner message found, message dropped");
            return None;
        };

        let Some(descriptor) = self.handlers.get((*payload).type_id()) else {
            self.metrics.record_message_dropped();
            #[cfg(feature = "observability")]
            warn!(request_id = %request_id, "No handler registered for message type, message dropped");
            return None;
        };

        // close() cancels the running handler's token.
        let token = handler_ctx.child_token();
        let invocation = self.invoke_handler(&descriptor, token.clone(), &request_id, payload);
        tokio::pin!(invocation);
        let response = tokio::select! {
            response = &mut invocation => response,
            _ = self.shutdown.cancelled() => {
                token.cancel();
                invocation.await
            }
        };

        match self.writer.submit(&request_id, response).await {
            Ok(Ok(())) => {
                #[cfg(feature = "observability")]
                debug!(request_id = %request_id, "Handler response sent");
            }
            Ok(Err(_e)) => {
                #[cfg(feature = "observability")]
                error!(request_id = %request_id, error = %_e, "Failed to send handler response");
            }
            Err(_) => {
                #[cfg(feature = "observability")]
                error!(request_id = %request_id, "Writer stopped before handler response was sent");
            }
        }
        None
    }

    fn forward_progress(&self, request_id: &str, envelope: T) {
        let Some(tx) = self.pending.lookup(request_id) else {
            self.metrics.record_message_dropped();
            #[cfg(feature = "observability")]
            warn!(request_id, "No waiting request for progress message, dropped");
            return;
        };

        match tx.try_send(envelope) {
            Ok(()) => self.metrics.record_progress_forwarded(),
            Err(TrySendError::Full(_)) => {
                self.metrics.record_message_dropped();
                #[cfg(feature = "observability")]
                warn!(
                    request_id,
                    capacity = tx.max_capacity(),
                    "Delivery queue full, progress message dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_message_dropped();
                #[cfg(feature = "observability")]
                debug!(request_id, "Waiting request went away, progress message dropped");
            }
        }
    }

    async fn invoke_handler(
        &self,
        descriptor: &HandlerDescriptor<T>,
        ctx: CancellationToken,
        request_id: &str,
        payload: Box<dyn Any + Send>,
    ) -> T {
        #[cfg(feature = "observability")]
        debug!(
            request_id,
            request_type = descriptor.request_type_name(),
            "Dispatching to handler"
        );

        let progress = descriptor
            .expects_progress()
            .then(|| self.progress_for(request_id));

        self.metrics.record_handler_invoked();
        let (mut response, handler_error) = match descriptor.invoke(ctx, payload, progress).await {
            Ok(Some(response)) => (response, None),
            Ok(None) => (T::default(), None),
            Err(e) => {
                let (response, error) = split_failure::<T>(e);
                (response.unwrap_or_default(), Some(error))
            }
        };

        self.ops.set_request_id(&mut response, request_id);

        if let Some(e) = handler_error {
            self.metrics.record_handler_error();
            #[cfg(feature = "observability")]
            warn!(request_id, error = %e, "Handler returned error");
            self.ops.set_error(&mut response, &e);
        }

        response
    }

    fn progress_for(&self, request_id: &str) -> Progress {
        let ops = std::sync::Arc::clone(&self.ops);
        let writer = self.writer.clone();
        Progress::from_fn(request_id, move |id, text| {
            writer.submit_detached(id, ops.create_progress_message(id, text));
        })
    }
}
