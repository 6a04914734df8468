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

//! Duplex stream abstraction consumed by the broker.
//!
//! The broker never establishes or authenticates a connection itself. It is
//! handed a stream that already exists and only needs two capabilities from
//! it: write one envelope, and block until the next envelope arrives. Those
//! are modelled as two halves, [`StreamSink`] and [`StreamSource`], so the
//! write half can live in the broker's single writer task while the read half
//! is owned by the dispatch loop.
//!
//! [`MemoryStream`] is an in-process implementation backed by Tokio channels.

mod memory;

pub use memory::{MemorySink, MemorySource, MemoryStream};

use std::io;
use thiserror::Error;

/// Errors reported by a duplex stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The peer closed the stream; no further envelopes will arrive.
    #[error("Stream closed")]
    Closed,

    /// An I/O error occurred on the underlying connection.
    #[error("Stream I/O error: {0}")]
    Io(#[source] io::Error),

    /// A transport-specific failure that does not map onto [`io::Error`].
    #[error("Stream error: {0}")]
    Other(String),
}

impl StreamError {
    /// Returns true if the stream was closed by the peer.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Closed
        } else {
            Self::Io(e)
        }
    }
}

/// Write half of a duplex stream.
///
/// The broker drives every write through one task, so implementations do not
/// need to tolerate concurrent calls.
#[async_trait::async_trait]
pub trait StreamSink<T>: Send + 'static {
    /// Writes a single envelope to the stream.
    async fn send(&mut self, message: T) -> Result<(), StreamError>;
}

/// Read half of a duplex stream.
///
/// `recv` must be cancel-safe: the dispatch loop races it against shutdown
/// and drops the pending future when shutdown wins.
#[async_trait::async_trait]
pub trait StreamSource<T>: Send + 'static {
    /// Waits for the next envelope from the peer.
    async fn recv(&mut self) -> Result<T, StreamError>;
}

/// A duplex stream that can be split into its write and read halves.
pub trait DuplexStream<T>: Send + 'static {
    /// Write half produced by [`split`](Self::split).
    type Sink: StreamSink<T>;
    /// Read half produced by [`split`](Self::split).
    type Source: StreamSource<T>;

    /// Splits the stream into independently owned halves.
    fn split(self) -> (Self::Sink, Self::Source);
}

#[async_trait::async_trait]
impl<T: Send + 'static> StreamSink<T> for Box<dyn StreamSink<T>> {
    async fn send(&mut self, message: T) -> Result<(), StreamError> {
        (**self).send(message).await
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> StreamSource<T> for Box<dyn StreamSource<T>> {
    async fn recv(&mut self) -> Result<T, StreamError> {
        (**self).recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_eof_maps_to_closed() {
        let err: StreamError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_closed());

        let err: StreamError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(!err.is_closed());
        assert!(matches!(err, StreamError::Io(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(StreamError::Closed.to_string(), "Stream closed");
        assert_eq!(
            StreamError::Other("reset".to_string()).to_string(),
            "Stream error: reset"
        );
    }

    #[test]
    fn test_io_error_is_source() {
        use std::error::Error as _;

        let err = StreamError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(err.to_string(), "Stream I/O error: pipe");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("pipe"));
        assert!(StreamError::Closed.source().is_none());
    }
}
