//! Call handles for every async call shape.
//!
//! An async call is split into two parts:
//!
//! - its completion surface (a response future, a response stream, and for
//!   client-side streaming a [`RequestStream`]), which is specific to the shape;
//! - its [`CallState`]: response headers, final status, trailers and disposal,
//!   which is the same for every shape.
//!
//! Interceptors that need to decorate completion (such as the deadline
//! interceptor) wrap only the [`CallState`], through [`AsyncCall::map_state`],
//! which works uniformly for [`AsyncUnaryCall`], [`AsyncServerStreamingCall`],
//! [`AsyncClientStreamingCall`] and [`AsyncDuplexStreamingCall`].

mod completion;
mod request_stream;
mod streaming;
mod tracker;
mod unary;

use futures::future::{self, BoxFuture, FutureExt};
use rpc_interceptors_core::{Metadata, Status};

pub use completion::{CallCompletion, CompletionState};
pub use request_stream::RequestStream;
pub use streaming::{AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall};
pub use tracker::{CallTracker, TrackedState};
pub use unary::AsyncUnaryCall;

/// The accessor set shared by every async call shape.
///
/// # Disposal
///
/// `dispose` releases whatever the call holds. Implementations must make it
/// idempotent and must release on `Drop` if it was never called, so that a
/// handle dropped without explicit disposal still cleans up exactly once.
pub trait CallState: Send {
    /// Resolves with the response headers once the server sends them.
    ///
    /// Fails with the call's final status if the call ends without headers.
    fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>>;

    /// The final status, or `None` while the call is still in flight.
    fn status(&self) -> Option<Status>;

    /// The trailers, or `None` while the call is still in flight.
    fn trailers(&self) -> Option<Metadata>;

    /// Release the call's resources.
    fn dispose(&mut self);
}

impl<S: CallState + ?Sized> CallState for Box<S> {
    fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>> {
        (**self).response_headers()
    }

    fn status(&self) -> Option<Status> {
        (**self).status()
    }

    fn trailers(&self) -> Option<Metadata> {
        (**self).trailers()
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }
}

/// A call handle whose [`CallState`] can be replaced.
pub trait AsyncCall: Sized {
    /// Replace the call state with `f(state)`, keeping the completion surface.
    fn map_state<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn CallState>) -> Box<dyn CallState>;
}

/// State of a call that failed before it reached the transport.
#[derive(Debug, Clone)]
pub(crate) struct FailedState {
    status: Status,
}

impl FailedState {
    pub(crate) fn new(status: Status) -> Self {
        Self { status }
    }
}

impl CallState for FailedState {
    fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>> {
        future::ready(Err(self.status.clone())).boxed()
    }

    fn status(&self) -> Option<Status> {
        Some(self.status.clone())
    }

    fn trailers(&self) -> Option<Metadata> {
        Some(self.status.metadata().clone())
    }

    fn dispose(&mut self) {}
}
