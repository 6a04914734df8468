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

//! In-memory duplex stream implementation.
//!
//! Uses bounded Tokio channels for each direction. Primarily useful for
//! testing and for embedding two brokers in the same process.

use super::{DuplexStream, StreamError, StreamSink, StreamSource};
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::debug;

const DEFAULT_BUFFER_SIZE: usize = 64;

/// One end of an in-memory duplex stream.
///
/// # Example
///
/// ```rust
/// use msgbroker::stream::{MemoryStream, StreamSink, StreamSource, DuplexStream};
///
/// # async fn example() -> Result<(), msgbroker::stream::StreamError> {
/// let (left, right) = MemoryStream::<String>::pair(16);
/// let (mut left_tx, _left_rx) = left.split();
/// let (_right_tx, mut right_rx) = right.split();
///
/// left_tx.send("hello".to_string()).await?;
/// assert_eq!(right_rx.recv().await?, "hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStream<T> {
    sink: MemorySink<T>,
    source: MemorySource<T>,
}

/// Write half of a [`MemoryStream`].
#[derive(Debug)]
pub struct MemorySink<T> {
    tx: mpsc::Sender<T>,
}

/// Read half of a [`MemoryStream`].
#[derive(Debug)]
pub struct MemorySource<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> MemoryStream<T> {
    /// Creates a connected pair of streams, each direction buffered to
    /// `buffer_size` envelopes.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is zero.
    #[must_use]
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(buffer_size);
        let (tx2, rx2) = mpsc::channel(buffer_size);

        #[cfg(feature = "observability")]
        debug!(buffer_size, "Created memory stream pair");

        let left = Self {
            sink: MemorySink { tx: tx1 },
            source: MemorySource { rx: rx2 },
        };
        let right = Self {
            sink: MemorySink { tx: tx2 },
            source: MemorySource { rx: rx1 },
        };
        (left, right)
    }

    /// Creates a connected pair with the default buffer size.
    #[must_use]
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }
}

impl<T: Send + 'static> DuplexStream<T> for MemoryStream<T> {
    type Sink = MemorySink<T>;
    type Source = MemorySource<T>;

    fn split(self) -> (Self::Sink, Self::Source) {
        (self.sink, self.source)
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> StreamSink<T> for MemorySink<T> {
    async fn send(&mut self, message: T) -> Result<(), StreamError> {
        self.tx.send(message).await.map_err(|_| StreamError::Closed)
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> StreamSource<T> for MemorySource<T> {
    async fn recv(&mut self) -> Result<T, StreamError> {
        self.rx.recv().await.ok_or(StreamError::Closed)
    }
}
