//! Async streaming call handles.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use rpc_interceptors_core::{Metadata, Status};

use super::{AsyncCall, CallState, FailedState, RequestStream};

// Accessors shared by every streaming handle.
macro_rules! call_state_accessors {
    () => {
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
    };
}

/// Handle to an in-flight server-streaming call.
///
/// The handle is a [`Stream`] of response messages. A message-level error
/// ends the stream.
pub struct AsyncServerStreamingCall<Res> {
    responses: BoxStream<'static, Result<Res, Status>>,
    state: Box<dyn CallState>,
}

impl<Res> AsyncServerStreamingCall<Res> {
    /// Create a call handle from a response stream and its call state.
    pub fn new<St, S>(responses: St, state: S) -> Self
    where
        St: Stream<Item = Result<Res, Status>> + Send + 'static,
        S: CallState + 'static,
    {
        Self {
            responses: responses.boxed(),
            state: Box::new(state),
        }
    }

    /// Create a call that has already failed with `status`.
    ///
    /// The response stream yields the status once, then ends.
    pub fn failed(status: Status) -> Self
    where
        Res: Send + 'static,
    {
        Self {
            responses: stream::once(future::ready(Err(status.clone()))).boxed(),
            state: Box::new(FailedState::new(status)),
        }
    }

    call_state_accessors!();
}

impl<Res> Stream for AsyncServerStreamingCall<Res> {
    type Item = Result<Res, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().responses.poll_next_unpin(cx)
    }
}

impl<Res> AsyncCall for AsyncServerStreamingCall<Res> {
    fn map_state<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn CallState>) -> Box<dyn CallState>,
    {
        Self {
            responses: self.responses,
            state: f(self.state),
        }
    }
}

/// Handle to an in-flight client-streaming call.
///
/// Requests go through [`requests`](AsyncClientStreamingCall::requests); the
/// handle itself is the future of the single response. Complete the request
/// stream before awaiting the response.
pub struct AsyncClientStreamingCall<Req, Res> {
    requests: RequestStream<Req>,
    response: BoxFuture<'static, Result<Res, Status>>,
    state: Box<dyn CallState>,
}

impl<Req, Res> AsyncClientStreamingCall<Req, Res> {
    /// Create a call handle from a request stream, a response future and its call state.
    pub fn new<F, S>(requests: RequestStream<Req>, response: F, state: S) -> Self
    where
        F: Future<Output = Result<Res, Status>> + Send + 'static,
        S: CallState + 'static,
    {
        Self {
            requests,
            response: response.boxed(),
            state: Box::new(state),
        }
    }

    /// Create a call that has already failed with `status`.
    ///
    /// The request stream is already completed.
    pub fn failed(status: Status) -> Self
    where
        Res: Send + 'static,
    {
        Self {
            requests: RequestStream::closed(),
            response: future::ready(Err(status.clone())).boxed(),
            state: Box::new(FailedState::new(status)),
        }
    }

    /// The request stream.
    pub fn requests(&self) -> &RequestStream<Req> {
        &self.requests
    }

    /// Mutable access to the request stream, needed to complete it.
    pub fn requests_mut(&mut self) -> &mut RequestStream<Req> {
        &mut self.requests
    }

    call_state_accessors!();
}

impl<Req, Res> Future for AsyncClientStreamingCall<Req, Res> {
    type Output = Result<Res, Status>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().response.as_mut().poll(cx)
    }
}

impl<Req, Res> AsyncCall for AsyncClientStreamingCall<Req, Res> {
    fn map_state<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn CallState>) -> Box<dyn CallState>,
    {
        Self {
            requests: self.requests,
            response: self.response,
            state: f(self.state),
        }
    }
}

/// Handle to an in-flight duplex-streaming call.
///
/// Requests go through [`requests`](AsyncDuplexStreamingCall::requests); the
/// handle itself is the [`Stream`] of responses.
pub struct AsyncDuplexStreamingCall<Req, Res> {
    requests: RequestStream<Req>,
    responses: BoxStream<'static, Result<Res, Status>>,
    state: Box<dyn CallState>,
}

impl<Req, Res> AsyncDuplexStreamingCall<Req, Res> {
    /// Create a call handle from a request stream, a response stream and its call state.
    pub fn new<St, S>(requests: RequestStream<Req>, responses: St, state: S) -> Self
    where
        St: Stream<Item = Result<Res, Status>> + Send + 'static,
        S: CallState + 'static,
    {
        Self {
            requests,
            responses: responses.boxed(),
            state: Box::new(state),
        }
    }

    /// Create a call that has already failed with `status`.
    pub fn failed(status: Status) -> Self
    where
        Res: Send + 'static,
    {
        Self {
            requests: RequestStream::closed(),
            responses: stream::once(future::ready(Err(status.clone()))).boxed(),
            state: Box::new(FailedState::new(status)),
        }
    }

    /// The request stream.
    pub fn requests(&self) -> &RequestStream<Req> {
        &self.requests
    }

    /// Mutable access to the request stream, needed to complete it.
    pub fn requests_mut(&mut self) -> &mut RequestStream<Req> {
        &mut self.requests
    }

    call_state_accessors!();
}

impl<Req, Res> Stream for AsyncDuplexStreamingCall<Req, Res> {
    type Item = Result<Res, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().responses.poll_next_unpin(cx)
    }
}

impl<Req, Res> AsyncCall for AsyncDuplexStreamingCall<Req, Res> {
    fn map_state<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn CallState>) -> Box<dyn CallState>,
    {
        Self {
            requests: self.requests,
            responses: self.responses,
            state: f(self.state),
        }
    }
}
