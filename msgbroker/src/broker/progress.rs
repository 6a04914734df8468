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

//! Progress reporting from inside a running handler.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::debug;

type EmitFn = dyn Fn(&str, &str) + Send + Sync;

/// Callback handed to handlers registered with
/// [`Broker::on_with_progress`](crate::Broker::on_with_progress).
///
/// Each call to [`report`](Self::report) sends one progress notification for
/// the request being handled back to the caller. Reports are queued on the
/// broker's writer ahead of the handler's eventual response, so the caller
/// always sees them before the final answer.
///
/// # Example
///
/// ```rust
/// use msgbroker::Progress;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let progress = Progress::from_fn("r1", move |id, text| {
///     sink.lock().unwrap().push(format!("{id}:{text}"));
/// });
///
/// progress.report("50%");
/// assert_eq!(*seen.lock().unwrap(), vec!["r1:50%".to_string()]);
/// ```
#[derive(Clone)]
pub struct Progress {
    request_id: Arc<str>,
    emit: Arc<EmitFn>,
}

impl Progress {
    /// Creates a progress handle for `request_id` that forwards every report
    /// to `emit(request_id, text)`.
    ///
    /// The broker builds these itself; this constructor exists so handlers
    /// can be exercised without a stream.
    pub fn from_fn<F>(request_id: impl Into<Arc<str>>, emit: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        Self {
            request_id: request_id.into(),
            emit: Arc::new(emit),
        }
    }

    /// Sends a progress notification with `message`.
    pub fn report(&self, message: &str) {
        #[cfg(feature = "observability")]
        debug!(request_id = %self.request_id, message, "Sending progress");

        (self.emit)(&self.request_id, message);
    }

    /// The correlation id of the request this handle reports on.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reports_in_order_with_request_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::from_fn("r9", move |id, text| {
            sink.lock().unwrap().push((id.to_string(), text.to_string()));
        });

        progress.report("25%");
        progress.clone().report("75%");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("r9".to_string(), "25%".to_string()),
                ("r9".to_string(), "75%".to_string()),
            ]
        );
        assert_eq!(progress.request_id(), "r9");
    }
}
