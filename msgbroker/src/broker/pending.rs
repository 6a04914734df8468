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

//! Tracking of client requests awaiting responses.
//!
//! Each in-flight `send` registers its correlation id here together with a
//! bounded delivery queue. The dispatch loop looks the id up for every
//! inbound response or progress notification and pushes the envelope onto
//! the matching queue.

use crate::error::BrokerError;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Registry of pending requests keyed by correlation id.
///
/// # Thread Safety
///
/// All operations take a short synchronous lock that is never held across an
/// `.await`, so the registry can be touched from the dispatch loop, from
/// client callers and from `Drop` without deadlocking.
///
/// # Example
///
/// ```rust
/// use msgbroker::broker::PendingRequests;
///
/// # async fn example() {
/// let pending = PendingRequests::<String>::new();
///
/// // Register a pending request
/// let mut request = pending.register("r1", 1).unwrap();
///
/// // Deliver the response from another task
/// let tx = pending.lookup("r1").unwrap();
/// tx.send("response".to_string()).await.unwrap();
///
/// assert_eq!(request.recv().await.as_deref(), Some("response"));
///
/// // Dropping the handle unregisters it
/// drop(request);
/// assert!(pending.lookup("r1").is_none());
/// # }
/// ```
#[derive(Debug)]
pub struct PendingRequests<T> {
    state: Mutex<PendingState<T>>,
}

#[derive(Debug)]
struct PendingState<T> {
    requests: HashMap<String, mpsc::Sender<T>>,
    closed: bool,
}

impl<T> PendingRequests<T> {
    /// Creates an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PendingState {
                requests: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Registers `request_id` with a delivery queue of `capacity` envelopes.
    ///
    /// The returned handle owns the receiving end and removes the
    /// registration when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ChannelClosed`] once [`close_all`](Self::close_all)
    /// has run, and [`BrokerError::DuplicateCorrelationId`] if the id is
    /// already registered.
    pub fn register(
        &self,
        request_id: &str,
        capacity: usize,
    ) -> Result<PendingRequest<'_, T>, BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ChannelClosed {
                request_id: request_id.to_string(),
            });
        }
        if state.requests.contains_key(request_id) {
            return Err(BrokerError::DuplicateCorrelationId {
                request_id: request_id.to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        state.requests.insert(request_id.to_string(), tx);

        Ok(PendingRequest {
            registry: self,
            request_id: request_id.to_string(),
            rx,
        })
    }

    /// Returns the delivery queue for `request_id`, if a caller is waiting.
    #[must_use]
    pub fn lookup(&self, request_id: &str) -> Option<mpsc::Sender<T>> {
        self.state.lock().requests.get(request_id).cloned()
    }

    /// Removes `request_id` from the registry.
    ///
    /// Returns `true` if the id was registered.
    pub fn remove(&self, request_id: &str) -> bool {
        self.state.lock().requests.remove(request_id).is_some()
    }

    /// Closes every registered queue and refuses further registrations.
    ///
    /// Waiters observe end-of-stream on their queue. Calling this more than
    /// once is harmless. Returns the number of queues closed by this call.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.requests.drain().collect()
        };
        drained.len()
    }

    /// Returns true once [`close_all`](Self::close_all) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of requests currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Returns `true` if no requests are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().requests.is_empty()
    }
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of one registered request.
///
/// Unregisters itself from the owning [`PendingRequests`] on drop, which
/// covers every way a `send` can end, including its future being dropped.
#[derive(Debug)]
pub struct PendingRequest<'a, T> {
    registry: &'a PendingRequests<T>,
    request_id: String,
    rx: mpsc::Receiver<T>,
}

impl<T> PendingRequest<'_, T> {
    /// The correlation id this handle was registered under.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Waits for the next delivered envelope.
    ///
    /// Returns `None` once the registry has been closed and every buffered
    /// envelope has been consumed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for PendingRequest<'_, T> {
    fn drop(&mut self) {
        self.registry.remove(&self.request_id);
    }
}
