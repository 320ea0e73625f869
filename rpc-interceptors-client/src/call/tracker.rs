//! Shared progress of a call between the transport and the call handle.

use futures::future::{BoxFuture, FutureExt};
use rpc_interceptors_core::{Metadata, Status};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::CallState;

#[derive(Debug, Default)]
struct Progress {
    headers: Option<Metadata>,
    status: Option<Status>,
    trailers: Option<Metadata>,
}

/// The transport's half of a call: records headers, status and trailers.
///
/// If the tracker is dropped before [`finish`](CallTracker::finish), the
/// call is finished with `Cancelled` when the caller abandoned it and with
/// `Unknown` otherwise.
#[derive(Debug)]
pub struct CallTracker {
    progress: watch::Sender<Progress>,
    abandon: CancellationToken,
}

/// The handle's half of a call: a [`CallState`] reading from a [`CallTracker`].
///
/// Disposing the state before the call has finished abandons it, which the
/// transport observes through [`CallTracker::abandoned`].
#[derive(Debug)]
pub struct TrackedState {
    progress: watch::Receiver<Progress>,
    abandon: CancellationToken,
    disposed: bool,
}

impl CallTracker {
    /// Create a linked tracker and call state.
    pub fn new() -> (CallTracker, TrackedState) {
        let (tx, rx) = watch::channel(Progress::default());
        let abandon = CancellationToken::new();
        let tracker = CallTracker {
            progress: tx,
            abandon: abandon.clone(),
        };
        let state = TrackedState {
            progress: rx,
            abandon,
            disposed: false,
        };
        (tracker, state)
    }

    /// Record the response headers. Only the first headers are kept.
    pub fn send_headers(&self, headers: Metadata) {
        self.progress.send_if_modified(|p| {
            if p.headers.is_some() || p.status.is_some() {
                return false;
            }
            p.headers = Some(headers);
            true
        });
    }

    /// Record the final status and trailers. Only the first call takes effect.
    pub fn finish(&self, status: Status, trailers: Metadata) {
        self.progress.send_if_modified(|p| {
            if p.status.is_some() {
                return false;
            }
            p.status = Some(status);
            p.trailers = Some(trailers);
            true
        });
    }

    /// Returns `true` once a final status has been recorded.
    pub fn is_finished(&self) -> bool {
        self.progress.borrow().status.is_some()
    }

    /// Resolves when the caller disposes the call before it finished.
    pub fn abandoned(&self) -> WaitForCancellationFuture<'_> {
        self.abandon.cancelled()
    }

    /// Returns `true` if the caller abandoned the call.
    pub fn is_abandoned(&self) -> bool {
        self.abandon.is_cancelled()
    }
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        if self.is_finished() {
            return;
        }
        let status = if self.is_abandoned() {
            Status::cancelled("call abandoned by the caller")
        } else {
            Status::unknown("transport dropped the call without a status")
        };
        self.finish(status, Metadata::empty());
    }
}

impl CallState for TrackedState {
    fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>> {
        let mut progress = self.progress.clone();
        async move {
            progress
                .wait_for(|p| p.headers.is_some() || p.status.is_some())
                .await
                .map_err(|_| Status::unknown("call ended before response headers were received"))
                .and_then(|p| match (&p.headers, &p.status) {
                    (Some(headers), _) => Ok(headers.clone()),
                    (None, Some(status)) => Err(status.clone()),
                    (None, None) => Err(Status::unknown("response headers missing")),
                })
        }
        .boxed()
    }

    fn status(&self) -> Option<Status> {
        self.progress.borrow().status.clone()
    }

    fn trailers(&self) -> Option<Metadata> {
        self.progress.borrow().trailers.clone()
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if self.progress.borrow().status.is_none() {
            self.abandon.cancel();
        }
    }
}

impl Drop for TrackedState {
    fn drop(&mut self) {
        self.dispose();
    }
}
