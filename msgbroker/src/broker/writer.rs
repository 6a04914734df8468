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

//! Serialized egress to the stream.
//!
//! Requests from client callers, progress notifications from running
//! handlers, and handler responses from the dispatch loop are all written by
//! one task that owns the [`StreamSink`]. Writers enqueue onto an unbounded
//! queue and optionally wait for a per-message acknowledgement, so a sink
//! never sees two concurrent `send` calls and messages from one producer
//! reach the wire in the order they were enqueued.

use crate::observability::BrokerMetrics;
use crate::stream::{StreamError, StreamSink};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[cfg(feature = "observability")]
use tracing::{debug, error, info};

type Ack = oneshot::Sender<Result<(), StreamError>>;

struct Outgoing<T> {
    request_id: String,
    message: T,
    ack: Option<Ack>,
}

/// Handle for enqueueing envelopes onto the writer task.
pub(crate) struct StreamWriter<T> {
    tx: mpsc::UnboundedSender<Outgoing<T>>,
}

impl<T> Clone for StreamWriter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> StreamWriter<T> {
    /// Spawns the writer task for `sink`.
    ///
    /// The task runs until every [`StreamWriter`] handle has been dropped.
    pub(crate) fn spawn<S>(sink: S, metrics: Arc<BrokerMetrics>) -> (Self, JoinHandle<()>)
    where
        S: StreamSink<T>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::write_task(sink, rx, metrics));
        (Self { tx }, task)
    }

    /// Enqueues `message` and returns a receiver for the write result.
    ///
    /// If the writer task is gone the receiver resolves with an error, which
    /// callers treat as a closed stream.
    pub(crate) fn submit(
        &self,
        request_id: &str,
        message: T,
    ) -> oneshot::Receiver<Result<(), StreamError>> {
        let (ack, rx) = oneshot::channel();
        let _ = self.tx.send(Outgoing {
            request_id: request_id.to_string(),
            message,
            ack: Some(ack),
        });
        rx
    }

    /// Enqueues `message` without waiting for the result.
    ///
    /// Write failures are logged by the writer task.
    pub(crate) fn submit_detached(&self, request_id: &str, message: T) {
        if self
            .tx
            .send(Outgoing {
                request_id: request_id.to_string(),
                message,
                ack: None,
            })
            .is_err()
        {
            #[cfg(feature = "observability")]
            debug!(request_id, "Writer task stopped, message discarded");
        }
    }

    async fn write_task<S>(
        mut sink: S,
        mut rx: mpsc::UnboundedReceiver<Outgoing<T>>,
        metrics: Arc<BrokerMetrics>,
    ) where
        S: StreamSink<T>,
    {
        #[cfg(feature = "observability")]
        info!("Writer task started");

        while let Some(outgoing) = rx.recv().await {
            let result = sink.send(outgoing.message).await;

            if let Err(_e) = &result {
                metrics.record_transmission_error();

                #[cfg(feature = "observability")]
                error!(
                    request_id = %outgoing.request_id,
                    error = %_e,
                    "Failed to write message to stream"
                );
            }

            if let Some(ack) = outgoing.ack {
                let _ = ack.send(result);
            }
        }

        #[cfg(feature = "observability")]
        info!("Writer task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{DuplexStream, MemoryStream, StreamSource};

    struct FailingSink;

    #[async_trait::async_trait]
    impl StreamSink<u32> for FailingSink {
        async fn send(&mut self, _message: u32) -> Result<(), StreamError> {
            Err(StreamError::Other("write refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_writes_in_submission_order() {
        let (local, remote) = MemoryStream::<u32>::pair(16);
        let (sink, _source) = local.split();
        let (_peer_sink, mut peer_source) = remote.split();

        let metrics = Arc::new(BrokerMetrics::new());
        let (writer, _task) = StreamWriter::spawn(sink, metrics);

        writer.submit_detached("a", 1);
        let ack = writer.submit("b", 2);
        writer.submit_detached("c", 3);

        assert!(ack.await.unwrap().is_ok());
        assert_eq!(peer_source.recv().await.unwrap(), 1);
        assert_eq!(peer_source.recv().await.unwrap(), 2);
        assert_eq!(peer_source.recv().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failure_is_acknowledged() {
        let metrics = Arc::new(BrokerMetrics::new());
        let (writer, _task) = StreamWriter::spawn(FailingSink, Arc::clone(&metrics));

        let result = writer.submit("a", 1).await.unwrap();
        assert!(matches!(result, Err(StreamError::Other(_))));
        assert_eq!(metrics.total_transmission_errors(), 1);
    }

    #[tokio::test]
    async fn test_task_exits_when_handles_dropped() {
        let metrics = Arc::new(BrokerMetrics::new());
        let (writer, task) = StreamWriter::spawn(FailingSink, metrics);
        drop(writer);
        task.await.unwrap();
    }
}
