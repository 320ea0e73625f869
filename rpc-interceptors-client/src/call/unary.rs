//! Async unary call handle.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use rpc_interceptors_core::{Metadata, Status};

use super::{AsyncCall, CallState, FailedState};

/// Handle to an in-flight async unary call.
///
/// The handle is itself the response future. Awaiting it by value consumes
/// the handle and releases the call once the response arrives; awaiting
/// `&mut call` keeps the handle around so headers, status and trailers can
/// be read afterwards.
///
/// # Example
///
/// ```ignore
/// let mut call = client.unary(&SAY_HELLO, HelloRequest { name: "WTF".into() }, CallOptions::new());
///
/// let reply = (&mut call).await?;
/// println!("status: {:?}", call.status());
/// ```
pub struct AsyncUnaryCall<Res> {
    response: BoxFuture<'static, Result<Res, Status>>,
    state: Box<dyn CallState>,
}

impl<Res> AsyncUnaryCall<Res> {
    /// Create a call handle from a response future and its call state.
    pub fn new<F, S>(response: F, state: S) -> Self
    where
        F: Future<Output = Result<Res, Status>> + Send + 'static,
        S: CallState + 'static,
    {
        Self {
            response: response.boxed(),
            state: Box::new(state),
        }
    }

    /// Create a call that has already failed with `status`.
    pub fn failed(status: Status) -> Self
    where
        Res: Send + 'static,
    {
        Self {
            response: future::ready(Err(status.clone())).boxed(),
            state: Box::new(FailedState::new(status)),
        }
    }

    /// Resolves with the response headers.
    pub fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>> {
        self.state.response_headers()
    }

    /// The final status, or `None` while the call is in flight.
    pub fn status(&self) -> Option<Status> {
        self.state.status()
    }

    /// The trailers, or `None` while the call is in flight.
    pub fn trailers(&self) -> Option<Metadata> {
        self.state.trailers()
    }

    /// Release the call. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.state.dispose();
    }
}

impl<Res> Future for AsyncUnaryCall<Res> {
    type Output = Result<Res, Status>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().response.as_mut().poll(cx)
    }
}

impl<Res> AsyncCall for AsyncUnaryCall<Res> {
    fn map_state<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn CallState>) -> Box<dyn CallState>,
    {
        Self {
            response: self.response,
            state: f(self.state),
        }
    }
}

impl<Res> std::fmt::Debug for AsyncUnaryCall<Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncUnaryCall")
            .field("status", &self.status())
            .finish()
    }
}
